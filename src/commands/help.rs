use super::{ArgSpec, Category, Command, CommandRegistry, CommandSpec};
use crate::process::{Process, STDERR, STDOUT};
use crate::shell::ExitCode;

/// Align cells into columns separated by two spaces.
///
/// The last cell of a row is never padded.
pub fn format_columns(rows: &[Vec<String>]) -> Vec<String> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|row| {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                if i + 1 == row.len() {
                    line.push_str(cell);
                } else {
                    line.push_str(&format!("{cell:<width$}  ", width = widths[i]));
                }
            }
            line.trim_end().to_string()
        })
        .collect()
}

fn indented(rows: Vec<Vec<String>>) -> Vec<String> {
    format_columns(&rows)
        .into_iter()
        .map(|line| format!("  {line}"))
        .collect()
}

impl Command {
    /// One-line usage: `NAME [OPTIONS] (REQUIRED) [OPTIONAL] REST...`.
    pub fn usage(&self) -> String {
        let mut out = self.full_name.clone();
        if !self.options.is_empty() {
            out.push_str(" [OPTIONS]");
        }
        for arg in &self.arguments {
            let name = arg.name.to_uppercase();
            let mut text = if arg.required {
                format!("({name})")
            } else {
                format!("[{name}]")
            };
            if arg.rest {
                text.push_str("...");
            }
            out.push(' ');
            out.push_str(&text);
        }
        out
    }

    /// Full help page, written to `process`'s stdout.
    pub fn show_help(&self, process: &Process) {
        process.write(STDOUT, &self.description);
        process.write(STDOUT, "");
        process.write(STDOUT, "Usage:");
        process.write(STDOUT, &format!("  {}", self.usage()));

        if !self.examples.is_empty() {
            process.write(STDOUT, "\nExample:");
            let examples: Vec<String> = self.examples.iter().map(|e| format!("  {e}")).collect();
            process.write_lines(STDOUT, &examples);
        }

        if !self.subcommands.is_empty() {
            process.write(STDOUT, "\nSubcommands:");
            let rows = self
                .subcommands
                .iter()
                .map(|sub| vec![sub.name.clone(), sub.description.clone()])
                .collect();
            process.write_lines(STDOUT, &indented(rows));
        }

        if !self.options.is_empty() {
            process.write(STDOUT, "\nOptions:");
            let rows = self
                .options
                .iter()
                .map(|option| vec![option.flags.join(", "), option.description.clone()])
                .collect();
            process.write_lines(STDOUT, &indented(rows));
        }

        if !self.arguments.is_empty() {
            process.write(STDOUT, "\nArguments:");
            let rows = self
                .arguments
                .iter()
                .map(|arg| vec![arg.name.to_uppercase(), arg.description.clone()])
                .collect();
            process.write_lines(STDOUT, &indented(rows));
        }
    }
}

const TIPS: &[&str] = &[
    "Standard file descriptors:",
    "  0: stdin (input)",
    "  1: stdout (output)",
    "  2: stderr (error output)",
    "",
    "Redirection operators:",
    "  cmd > file         Redirect stdout to file (overwrite)",
    "  cmd >> file        Redirect stdout to file (append)",
    "  cmd < file         Redirect stdin from file",
    "  cmd 2> file        Redirect stderr to file",
    "  cmd > file 2>&1    Redirect stdout to file, stderr to stdout (both to file)",
    "  cmd &> file        Same as above",
    "  cmd >& file        Same as above",
    "",
    "Pipes:",
    "  cmd1 | cmd2        Feed the output of cmd1 to cmd2",
    "  cmd1 |& cmd2       Same, including stderr",
    "",
    "Here-documents:",
    "  cmd << EOF         Feed multiline input into a command until the delimiter",
    "",
    "Redirections are applied in the order written, and order matters.",
    "Use -- to separate options from arguments (e.g. cat -- -file.txt).",
];

/// Help page for `topic` (a command name optionally followed by subcommand names).
fn show_topic(registry: &CommandRegistry, topic: &[String], process: &Process) -> ExitCode {
    let Some((first, rest)) = topic.split_first() else {
        return ExitCode::MISUSE;
    };
    let Some(mut command) = registry.get(first) else {
        process.write(STDERR, &format!("Unknown help topic: {}", topic.join(" ")));
        return ExitCode::GENERAL_ERROR;
    };

    for part in rest {
        let Some(sub) = command.subcommand(part).cloned() else {
            process.write(
                STDERR,
                &format!("Subcommand '{part}' not found for command '{}'", command.full_name),
            );
            return ExitCode::GENERAL_ERROR;
        };
        command = sub;
    }

    command.show_help(process);
    ExitCode::SUCCESS
}

fn list_commands(registry: &CommandRegistry, process: &Process) {
    let mut by_category: Vec<(Category, Vec<&Command>)> = Vec::new();
    for command in registry.iter().filter(|c| !c.hidden) {
        match by_category.iter_mut().find(|(c, _)| *c == command.category) {
            Some((_, list)) => list.push(command.as_ref()),
            None => by_category.push((command.category, vec![command.as_ref()])),
        }
    }
    by_category.sort_by_key(|(category, _)| *category);

    process.write(STDOUT, "Available Commands");
    for (category, commands) in by_category {
        let indent = if category == Category::None { "" } else { "  " };
        if category != Category::None {
            process.write(STDOUT, &format!("{indent}{}", category.label()));
        }
        let rows: Vec<Vec<String>> = commands
            .iter()
            .map(|c| vec![c.name.clone(), c.description.clone()])
            .collect();
        let lines: Vec<String> = format_columns(&rows)
            .into_iter()
            .map(|line| format!("{indent}  {line}"))
            .collect();
        process.write_lines(STDOUT, &lines);
    }
    process.write(
        STDOUT,
        "\nUse 'help tips' to see some general tips about redirections and command piping",
    );
}

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec::new("help", "Shows available commands", Category::Other)
            .arg(ArgSpec::optional("command", "The command to show help for").rest())
            .example("help xargs")
            .example("help history show")
            .run(|shell, args, _options, process| {
                match args.first().map(String::as_str) {
                    None => {
                        list_commands(shell.commands(), process);
                        ExitCode::SUCCESS
                    }
                    Some("tips") => {
                        process.write_lines(STDOUT, TIPS);
                        ExitCode::SUCCESS
                    }
                    Some(_) => show_topic(shell.commands(), args, process),
                }
            }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::OptionSpec;

    fn seqlike() -> Command {
        Command::build(
            CommandSpec::new("seq", "Create a range of numbers", Category::DataOperations)
                .arg(ArgSpec::required("first", "First number"))
                .arg(ArgSpec::optional("last", "Last number"))
                .arg(ArgSpec::optional("rest", "More").rest())
                .option(OptionSpec::value("separator", &["-s", "--separator"], "Separator")),
        )
    }

    #[test]
    fn usage_marks_required_optional_and_rest() {
        assert_eq!(seqlike().usage(), "seq [OPTIONS] (FIRST) [LAST] [REST]...");
    }

    #[test]
    fn usage_uses_full_name() {
        let parent = Command::build(
            CommandSpec::new("history", "", Category::Other)
                .subcommand(CommandSpec::new("show", "", Category::Other)),
        );
        assert_eq!(parent.subcommand("show").unwrap().usage(), "history show [OPTIONS]");
    }

    #[test]
    fn columns_align() {
        let rows = vec![
            vec!["-s, --separator".to_string(), "Separator".to_string()],
            vec!["-h".to_string(), "Help".to_string()],
        ];
        assert_eq!(
            format_columns(&rows),
            vec!["-s, --separator  Separator", "-h               Help"]
        );
    }

    #[test]
    fn columns_ragged_rows() {
        let rows = vec![vec!["a".to_string()], vec!["bb".to_string(), "x".to_string()]];
        assert_eq!(format_columns(&rows), vec!["a", "bb  x"]);
    }
}
