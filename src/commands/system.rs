//! Session, display and shell lifecycle commands.

use std::rc::Rc;

use super::{ArgSpec, Category, CommandRegistry, CommandSpec, OptionSpec};
use crate::process::{STDERR, STDOUT};
use crate::shell::ExitCode;

fn cd() -> CommandSpec {
    CommandSpec::new("cd", "Changes the working directory", Category::SystemManagement)
        .arg(ArgSpec::optional("dir", "The folder to move to. Defaults to the home folder"))
        .example("cd /var/log")
        .run(|shell, args, _options, process| {
            let host = shell.host().clone();
            let target = match args.first() {
                Some(dir) => host.resolve(dir),
                None => host.home_dir(),
            };

            let Some(file) = host.file(&target) else {
                process.write(STDERR, "Invalid path");
                return ExitCode::GENERAL_ERROR;
            };
            if !file.is_folder() {
                process.write(STDERR, &format!("{} is not a folder.", file.path()));
                return ExitCode::GENERAL_ERROR;
            }

            host.set_working_dir(target.clone());
            shell.set_var("PWD", target);
            ExitCode::SUCCESS
        })
}

fn pwd() -> CommandSpec {
    CommandSpec::new("pwd", "Prints the working directory", Category::SystemManagement).run(
        |shell, _args, _options, process| {
            process.write(STDOUT, &shell.host().working_dir());
            ExitCode::SUCCESS
        },
    )
}

fn constant(name: &str, description: &str, code: ExitCode) -> CommandSpec {
    CommandSpec::new(name, description, Category::Other)
        .hidden()
        .run(move |_, _, _, _| code)
}

/// Formatting shared by `history` and its subcommands.
struct HistoryView {
    /// Width of the entry number column.
    width: usize,
}

impl HistoryView {
    fn numbered<'a>(&self, entries: impl Iterator<Item = (usize, &'a String)>) -> Vec<String> {
        entries
            .map(|(i, line)| format!("{:>width$}  {line}", i + 1, width = self.width))
            .collect()
    }

    fn cleared(&self, count: usize) -> String {
        match count {
            1 => "Cleared 1 entry".to_string(),
            n => format!("Cleared {n} entries"),
        }
    }
}

fn history() -> CommandSpec {
    let view = Rc::new(HistoryView { width: 4 });
    let show_view = view.clone();
    let clear_view = view;

    CommandSpec::new("history", "Shows or clears the input history", Category::SystemManagement)
        .example("history show -n 5")
        .subcommand(
            CommandSpec::new("show", "Prints the recorded input lines", Category::None)
                .option(OptionSpec::number("count", &["-n", "--count"], "Only show the last COUNT lines"))
                .run(move |shell, _args, options, process| {
                    let history = shell.history();
                    let skip = options
                        .number("count")
                        .map_or(0, |count| history.len().saturating_sub(count.max(0) as usize));
                    let lines = show_view.numbered(history.iter().enumerate().skip(skip));
                    if !lines.is_empty() {
                        process.write_lines(STDOUT, &lines);
                    }
                    ExitCode::SUCCESS
                }),
        )
        .subcommand(
            CommandSpec::new("clear", "Forgets every recorded input line", Category::None).run(
                move |shell, _args, _options, process| {
                    let count = shell.history().len();
                    shell.clear_history();
                    process.write(STDOUT, &clear_view.cleared(count));
                    ExitCode::SUCCESS
                },
            ),
        )
}

fn clear() -> CommandSpec {
    CommandSpec::new("clear", "Clears the terminal", Category::Other).run(
        |shell, _args, _options, _process| {
            shell.clear_screen();
            ExitCode::SUCCESS
        },
    )
}

fn quit() -> CommandSpec {
    CommandSpec::new("quit", "Quits the shell", Category::Other)
        .arg(ArgSpec::optional("code", "Exit code to quit with. Defaults to 0"))
        .run(|shell, args, _options, process| {
            let code = match args.first() {
                Some(raw) => match raw.parse::<i32>() {
                    Ok(code) => ExitCode(code),
                    Err(_) => {
                        process.write(STDERR, &format!("Invalid exit code: {raw}"));
                        return ExitCode::MISUSE;
                    }
                },
                None => ExitCode::SUCCESS,
            };
            shell.request_exit(code);
            code
        })
}

pub fn register(registry: &mut CommandRegistry) {
    for spec in [
        cd(),
        pwd(),
        constant("true", "Does nothing, successfully", ExitCode::SUCCESS),
        constant("false", "Does nothing, unsuccessfully", ExitCode::GENERAL_ERROR),
        history(),
        clear(),
        quit(),
    ] {
        registry.register(spec);
    }
}
