//! Line-oriented text tools.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use super::help::format_columns;
use super::{ArgSpec, Category, CommandRegistry, CommandSpec, OptionSpec};
use crate::host::basename;
use crate::process::{Mode, Process, STDERR, STDIN, STDOUT};
use crate::shell::ExitCode;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

const STDIN_SOURCE: &str = "(stdin)";

/// One input of a text tool.
struct Source {
    name: String,
    lines: Vec<String>,
}

/// Read every path in turn; `-` (or no paths at all) reads stdin.
///
/// Empty stdin contributes no source. The flag is set when any file could
/// not be opened; `open` has already reported why.
fn read_sources(paths: &[String], process: &mut Process) -> (Vec<Source>, bool) {
    let mut sources = Vec::new();
    let mut failed = false;

    if paths.is_empty() {
        sources.extend(stdin_source(process));
    }

    for path in paths {
        if path == "-" {
            sources.extend(stdin_source(process));
            continue;
        }
        match read_file(path, process) {
            Some(lines) => sources.push(Source {
                name: basename(&process.host().resolve(path)).to_string(),
                lines,
            }),
            None => failed = true,
        }
    }

    (sources, failed)
}

fn stdin_source(process: &Process) -> Option<Source> {
    let lines = process.read(STDIN);
    if lines.is_empty() {
        return None;
    }
    Some(Source {
        name: STDIN_SOURCE.to_string(),
        lines,
    })
}

fn read_file(path: &str, process: &mut Process) -> Option<Vec<String>> {
    let fd = process.open(path, Mode::Read, false)?;
    let lines = process.read(fd);
    process.close(fd);
    Some(lines)
}

/// Replace (or with `append`, extend) the file at `path` with `lines`.
fn write_file(path: &str, lines: &[String], append: bool, process: &mut Process) -> bool {
    let Some(fd) = process.open(path, Mode::Write, false) else {
        return false;
    };
    if !append {
        process.flush(fd);
    }
    if !lines.is_empty() {
        process.write_lines(fd, lines);
    }
    process.close(fd)
}

fn status(failed: bool) -> ExitCode {
    if failed {
        ExitCode::GENERAL_ERROR
    } else {
        ExitCode::SUCCESS
    }
}

fn echo() -> CommandSpec {
    CommandSpec::new("echo", "Prints the given text", Category::DataOperations)
        .arg(ArgSpec::optional("text", "The text to print").rest())
        .option(OptionSpec::flag("no-new-line", &["-n"], "Do not append new line"))
        .accepts_stdin()
        .example("echo Hello world")
        .run(|_shell, args, options, process| {
            let text = args.join(" ");
            if options.has("no-new-line") {
                process.write_inline(STDOUT, &text);
            } else {
                process.write(STDOUT, &text);
            }
            ExitCode::SUCCESS
        })
}

fn cat() -> CommandSpec {
    CommandSpec::new("cat", "Prints the contents of files", Category::DataOperations)
        .arg(ArgSpec::optional("file", "The path of the file to print, - for stdin").rest())
        .accepts_stdin()
        .example("cat notes.txt")
        .example("echo hi | cat - notes.txt")
        .run(|_shell, args, _options, process| {
            let (sources, failed) = read_sources(args, process);
            for source in sources {
                process.write_lines(STDOUT, &source.lines);
            }
            status(failed)
        })
}

fn tee() -> CommandSpec {
    CommandSpec::new("tee", "Copies stdin to files and to stdout", Category::DataOperations)
        .arg(ArgSpec::required("file", "The path of the file to write to").rest())
        .option(OptionSpec::flag("append", &["-a", "--append"], "Append to files instead of overwriting"))
        .example("echo hi | tee out.txt")
        .run(|_shell, args, options, process| {
            let lines = process.read(STDIN);
            let append = options.has("append");
            let mut failed = false;
            for path in args {
                failed |= !write_file(path, &lines, append, process);
            }
            if !lines.is_empty() {
                process.write_lines(STDOUT, &lines);
            }
            status(failed)
        })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counts {
    lines: usize,
    words: usize,
    chars: usize,
    longest: usize,
}

impl Counts {
    fn of(lines: &[String]) -> Self {
        let mut counts = Counts {
            lines: lines.len(),
            ..Counts::default()
        };
        for line in lines {
            let length = line.chars().count();
            counts.words += WORD.find_iter(line).count();
            counts.chars += length;
            counts.longest = counts.longest.max(length);
        }
        counts
    }

    fn add(&mut self, other: Counts) {
        self.lines += other.lines;
        self.words += other.words;
        self.chars += other.chars;
        self.longest = self.longest.max(other.longest);
    }
}

fn wc() -> CommandSpec {
    CommandSpec::new("wc", "Counts things from inputs", Category::DataOperations)
        .arg(ArgSpec::required("file", "The path of the file to count from").rest())
        .option(OptionSpec::flag("lines", &["-l", "--lines"], "Counts the number of lines"))
        .option(OptionSpec::flag("words", &["-w", "--words"], "Counts the number of words"))
        .option(OptionSpec::flag("characters", &["-m"], "Counts the number of characters"))
        .option(OptionSpec::flag("longest", &["-L", "--longest"], "Prints the length of the longest line"))
        .accepts_stdin()
        .run(|_shell, args, options, process| {
            let defaults = options.is_empty();
            let shown: Vec<&str> = ["lines", "words", "characters", "longest"]
                .into_iter()
                .filter(|name| options.has(name) || (defaults && *name != "longest"))
                .collect();

            let (sources, failed) = read_sources(args, process);

            let row = |first: &str, second: &str, counts: &Counts| {
                let mut row = vec![first.to_string(), second.to_string()];
                for name in &shown {
                    row.push(match *name {
                        "lines" => counts.lines.to_string(),
                        "words" => counts.words.to_string(),
                        "characters" => counts.chars.to_string(),
                        _ => counts.longest.to_string(),
                    });
                }
                row
            };

            let mut rows = vec![{
                let mut header = vec![String::new(), String::new()];
                header.extend(shown.iter().map(|name| match *name {
                    "characters" => "chars".to_string(),
                    other => other.to_string(),
                }));
                header
            }];

            let mut total = Counts::default();
            for source in &sources {
                let counts = Counts::of(&source.lines);
                total.add(counts);
                rows.push(row(&source.name, ">", &counts));
            }
            if sources.len() >= 2 {
                rows.push(row("Total", ">", &total));
            }

            process.write_lines(STDOUT, &format_columns(&rows));
            status(failed)
        })
}

fn sort() -> CommandSpec {
    CommandSpec::new("sort", "Sorts lines of text", Category::DataOperations)
        .arg(ArgSpec::optional("file", "The path of the file to sort, - for stdin").rest())
        .option(OptionSpec::value("output", &["-o", "--output"], "Specifies an output file for sorted data"))
        .option(OptionSpec::flag("reverse", &["-r", "--reverse"], "Sorts data in reverse order"))
        .option(OptionSpec::flag("unique", &["-u", "--unique"], "Removes duplicate lines"))
        .option(OptionSpec::flag(
            "numerical",
            &["-n", "--numerical"],
            "Sorts data numerically (treats data as numbers)",
        ))
        .accepts_stdin()
        .run(|_shell, args, options, process| {
            let (sources, mut failed) = read_sources(args, process);
            let mut lines: Vec<String> = sources.into_iter().flat_map(|s| s.lines).collect();

            if lines.is_empty() {
                process.write(STDERR, "No lines to sort");
                return ExitCode::GENERAL_ERROR;
            }

            if options.has("numerical") {
                let key = |line: &String| line.trim().parse::<f64>().unwrap_or(0.0);
                lines.sort_by(|a, b| key(a).total_cmp(&key(b)));
            } else {
                lines.sort();
            }
            if options.has("reverse") {
                lines.reverse();
            }
            if options.has("unique") {
                let mut seen = HashSet::new();
                lines.retain(|line| seen.insert(line.clone()));
            }

            for path in options.strs("output") {
                failed |= !write_file(path, &lines, false, process);
            }

            process.write_lines(STDOUT, &lines);
            status(failed)
        })
}

/// Digits after the decimal point, as written.
fn fraction_digits(text: &str) -> usize {
    text.split_once('.').map_or(0, |(_, fraction)| {
        fraction.chars().take_while(char::is_ascii_digit).count()
    })
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn seq() -> CommandSpec {
    CommandSpec::new("seq", "Create a range of numbers", Category::DataOperations)
        .arg(ArgSpec::required("first", "The first number in the sequence"))
        .arg(ArgSpec::optional("last", "The last number in the sequence"))
        .arg(ArgSpec::optional("increment", "The increment between numbers. Defaults to 1"))
        .option(OptionSpec::value(
            "separator",
            &["-s", "--separator"],
            "Separate the numbers with a custom string instead of a new line",
        ))
        .example("seq 5")
        .example("seq -s , 0 0.5 2")
        .run(|_shell, args, options, process| {
            let (first, last, increment) = match args {
                [last] => ("1", last.as_str(), "1"),
                [first, last] => (first.as_str(), last.as_str(), "1"),
                [first, last, increment, ..] => (first.as_str(), last.as_str(), increment.as_str()),
                [] => return ExitCode::MISUSE,
            };

            let (Some(start), Some(end), Some(step)) =
                (parse_number(first), parse_number(last), parse_number(increment))
            else {
                process.write(STDERR, "Given arguments are invalid");
                return ExitCode::MISUSE;
            };

            if step == 0.0 || (end < start && step > 0.0) || (end > start && step < 0.0) {
                process.write(STDERR, "The last number is impossible to reach with given values");
                return ExitCode::MISUSE;
            }

            let digits = [first, last, increment]
                .into_iter()
                .map(fraction_digits)
                .max()
                .unwrap_or(0);

            let mut output = Vec::new();
            let mut i = 0u32;
            loop {
                let current = start + step * f64::from(i);
                if (step > 0.0 && current > end) || (step < 0.0 && current < end) {
                    break;
                }
                output.push(format!("{current:.digits$}"));
                i += 1;
            }

            match options.str("separator") {
                Some(separator) => process.write(STDOUT, &output.join(separator)),
                None => process.write_lines(STDOUT, &output),
            };
            ExitCode::SUCCESS
        })
}

/// The last `count` lines.
fn last_lines(lines: &[String], count: i64) -> &[String] {
    let count = usize::try_from(count).unwrap_or(0).min(lines.len());
    &lines[lines.len() - count..]
}

fn tail() -> CommandSpec {
    CommandSpec::new("tail", "View the last few lines of the file", Category::DataOperations)
        .arg(ArgSpec::optional("file", "The path of the file to view").rest())
        .option(OptionSpec::number("lines", &["-n", "--lines"], "The amount of lines to show"))
        .option(OptionSpec::flag("quiet", &["-q", "--quiet"], "Don't print headers for files"))
        .accepts_stdin()
        .example("tail -n 20 log.txt")
        .run(|_shell, args, options, process| {
            let count = options.number("lines").unwrap_or(10);
            let (sources, failed) = read_sources(args, process);
            let headers = sources.len() >= 2 && !options.has("quiet");

            for (i, source) in sources.iter().enumerate() {
                if headers {
                    process.write(STDOUT, &format!("==> {} <==", source.name));
                }
                let lines = last_lines(&source.lines, count);
                if !lines.is_empty() {
                    process.write_lines(STDOUT, lines);
                }
                if headers && i + 1 < sources.len() {
                    process.write(STDOUT, "");
                }
            }

            if failed {
                ExitCode::MISUSE
            } else {
                ExitCode::SUCCESS
            }
        })
}

/// Fields of `line` at the given indices, skipping indices out of range.
fn select_columns(line: &str, delimiter: Option<&str>, columns: &[usize]) -> Vec<String> {
    let fields: Vec<&str> = match delimiter {
        Some(delimiter) => line.split(delimiter).collect(),
        None => line.split_whitespace().collect(),
    };
    columns
        .iter()
        .filter_map(|&column| fields.get(column).map(|field| field.to_string()))
        .collect()
}

fn cols() -> CommandSpec {
    CommandSpec::new("cols", "Selects columns from input", Category::DataOperations)
        .arg(ArgSpec::required("columns", "Columns to select. Index starts from 0").rest())
        .option(OptionSpec::value("file", &["-f", "--file"], "The path of the file to read lines from"))
        .option(OptionSpec::value(
            "delimiter",
            &["-d", "--delimiter"],
            "Items from input are separated by the given string instead of whitespace",
        ))
        .example("cols 0 2")
        .example("cat hosts.txt | cols -d , 1")
        .run(|_shell, args, options, process| {
            let mut lines = process.read(STDIN);
            for path in options.strs("file") {
                match read_file(path, process) {
                    Some(file_lines) => lines.extend(file_lines),
                    None => return ExitCode::GENERAL_ERROR,
                }
            }

            let columns: Vec<usize> = args.iter().filter_map(|arg| arg.parse().ok()).collect();
            let delimiter = options.str("delimiter").filter(|d| !d.is_empty());

            let mut selected_any = false;
            for line in &lines {
                let selected = select_columns(line, delimiter, &columns);
                if selected.is_empty() {
                    continue;
                }
                process.write(STDOUT, &selected.join(" "));
                selected_any = true;
            }

            if selected_any {
                ExitCode::SUCCESS
            } else {
                ExitCode::GENERAL_ERROR
            }
        })
}

fn grep() -> CommandSpec {
    CommandSpec::new("grep", "Filters lines that match a pattern", Category::DataOperations)
        .arg(ArgSpec::required("pattern", "The pattern you want to search for"))
        .arg(ArgSpec::optional("file", "The path of the file to search from").rest())
        .option(OptionSpec::flag(
            "only",
            &["-o", "--only"],
            "Prints only the matched parts instead of the whole line",
        ))
        .option(OptionSpec::flag("invert", &["-v", "--invert"], "Prints lines that don't match the pattern"))
        .option(OptionSpec::flag("ignore_case", &["-i", "--ignore-case"], "Ignore case for matching"))
        .accepts_stdin()
        .example("cat log.txt | grep -i error")
        .run(|_shell, args, options, process| {
            let Some((pattern, files)) = args.split_first() else {
                process.write(STDERR, "No pattern provided for grep");
                return ExitCode::MISUSE;
            };
            let regex = match RegexBuilder::new(pattern)
                .case_insensitive(options.has("ignore_case"))
                .build()
            {
                Ok(regex) => regex,
                Err(e) => {
                    process.write(STDERR, &format!("Invalid pattern: {e}"));
                    return ExitCode::MISUSE;
                }
            };

            let (sources, _) = read_sources(files, process);
            let show_names = sources.len() >= 2;
            let inverted = options.has("invert");
            let only = options.has("only");

            let mut found = false;
            for source in &sources {
                let label = |text: &str| {
                    if show_names {
                        format!("{} > {text}", source.name)
                    } else {
                        text.to_string()
                    }
                };
                for line in &source.lines {
                    if regex.is_match(line) == inverted {
                        continue;
                    }
                    if only && !inverted {
                        for m in regex.find_iter(line) {
                            process.write(STDOUT, &label(m.as_str()));
                        }
                    } else {
                        process.write(STDOUT, &label(line.as_str()));
                    }
                    found = true;
                }
            }

            if found {
                ExitCode::SUCCESS
            } else {
                ExitCode::GENERAL_ERROR
            }
        })
}

pub fn register(registry: &mut CommandRegistry) {
    for spec in [echo(), cat(), tee(), wc(), sort(), seq(), tail(), cols(), grep()] {
        registry.register(spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_digits_from_text() {
        assert_eq!(fraction_digits("1"), 0);
        assert_eq!(fraction_digits("0.25"), 2);
        assert_eq!(fraction_digits("-3.5"), 1);
    }

    #[test]
    fn numbers_must_be_finite() {
        assert_eq!(parse_number("2.5"), Some(2.5));
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn last_lines_clamps_count() {
        let lines: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(last_lines(&lines, 2), &lines[1..]);
        assert_eq!(last_lines(&lines, 10), &lines[..]);
        assert!(last_lines(&lines, 0).is_empty());
        assert!(last_lines(&lines, -4).is_empty());
    }

    #[test]
    fn selects_columns_in_argument_order() {
        assert_eq!(select_columns("a  b\tc", None, &[2, 0]), vec!["c", "a"]);
        assert_eq!(select_columns("x,,z", Some(","), &[1, 2, 7]), vec!["", "z"]);
        assert!(select_columns("", None, &[0]).is_empty());
    }

    #[test]
    fn counts() {
        let lines = vec!["hello world".to_string(), "".to_string(), "a-b".to_string()];
        assert_eq!(
            Counts::of(&lines),
            Counts {
                lines: 3,
                words: 4,
                chars: 14,
                longest: 11
            }
        );
    }
}
