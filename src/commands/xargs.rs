use super::{ArgSpec, Category, CommandRegistry, CommandSpec, OptionSpec};
use crate::process::{STDERR, STDIN};
use crate::shell::{ExitCode, Resolved};

/// `initial` with the first occurrence of `key` in each argument replaced by `value`.
fn replace_args(initial: &[String], key: &str, value: &str) -> Vec<String> {
    initial.iter().map(|arg| arg.replacen(key, value, 1)).collect()
}

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec::new(
            "xargs",
            "Runs a command once per input line, with the line as extra arguments",
            Category::DataOperations,
        )
        .arg(ArgSpec::required("command", "The command to run, quoted if it has subcommands"))
        .arg(ArgSpec::optional("initial-args", "Arguments given before those read from input").rest())
        .option(OptionSpec::number(
            "max-args",
            &["-n", "--max-args"],
            "Use at most the given amount of arguments per command line",
        ))
        .option(OptionSpec::value(
            "delimiter",
            &["-d", "--delimiter"],
            "Items from input are separated by the given string. Overrides default tokenization",
        ))
        .option(OptionSpec::value(
            "replace",
            &["-I", "--replace"],
            "Replace the given value in INITIAL-ARGS with args read from input",
        ))
        .example("cat hosts.txt | xargs ping")
        .example("ls | xargs -I {} -- echo found {}")
        .run(|shell, args, options, process| {
            let lines = process.read(STDIN);

            // args[0] may carry subcommands, e.g. "history show".
            let mut command_tokens = shell.expand_words(&args[0]);
            if command_tokens.is_empty() {
                process.write(STDERR, &format!("Command {} doesn't exist", args[0]));
                return ExitCode::CMD_NOT_FOUND;
            }
            let name = command_tokens.remove(0);
            let resolved = shell.resolve_command(&name, &mut command_tokens);
            if let Resolved::NotFound(_) = resolved {
                process.write(STDERR, &format!("Command {} doesn't exist", args[0]));
                return ExitCode::CMD_NOT_FOUND;
            }

            let mut initial = command_tokens;
            initial.extend_from_slice(&args[1..]);

            let max_args = options.number("max-args").map(|n| n.max(0) as usize);
            let delimiter = options.str("delimiter").filter(|d| !d.is_empty());
            let replace = options.str("replace");

            let mut code = ExitCode::SUCCESS;
            for line in lines {
                let line_args: Vec<String> = match delimiter {
                    Some(delimiter) => line.split(delimiter).map(String::from).collect(),
                    None => shell.expand_words(&line),
                };

                let mut command_args = match replace {
                    Some(key) => replace_args(&initial, key, &line_args.join(" ")),
                    None => initial.iter().cloned().chain(line_args).collect(),
                };
                if let Some(max) = max_args {
                    command_args.truncate(max);
                }

                let mut child = process.child(shell.allocate_pid());
                child.set_name(resolved.display_name());
                let result = shell.run_command(&resolved, command_args, &mut child);
                if (1..=125).contains(&result.code()) && code == ExitCode::SUCCESS {
                    code = ExitCode::CMD_EXEC_FAIL;
                }
            }
            code
        }),
    );
}
