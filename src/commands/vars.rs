//! Alias and environment variable management.

use super::help::format_columns;
use super::{ArgSpec, Category, CommandRegistry, CommandSpec, OptionSpec};
use crate::process::{Process, STDERR, STDIN, STDOUT};
use crate::shell::ExitCode;

/// Shell-quoted form of `value`, suitable for pasting back in.
fn quoted(value: &str) -> String {
    match shlex::try_quote(value) {
        Ok(quoted) => quoted.into_owned(),
        Err(_) => format!("'{value}'"),
    }
}

/// `NAME=VALUE` definitions from the arguments followed by stdin lines.
fn definitions(args: &[String], process: &Process) -> Vec<String> {
    let mut all = args.to_vec();
    all.extend(process.read(STDIN).into_iter().filter(|line| !line.trim().is_empty()));
    all
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(char::is_whitespace)
}

/// Write `pairs` as an aligned table, or as reusable `NAME="VALUE"` lines.
fn print_table<'a>(
    title: &str,
    pairs: impl Iterator<Item = (&'a String, &'a String)>,
    reusable: bool,
    process: &Process,
) {
    let rows: Vec<Vec<String>> = pairs
        .map(|(name, value)| {
            if reusable {
                vec![format!("  {name}=\"{value}\"")]
            } else {
                vec![format!("  {name}"), value.clone()]
            }
        })
        .collect();
    process.write(STDOUT, title);
    process.write_lines(STDOUT, &format_columns(&rows));
}

fn alias() -> CommandSpec {
    CommandSpec::new("alias", "Creates or shows aliases", Category::SystemManagement)
        .arg(ArgSpec::optional("definition", "NAME=VALUE to define, or NAME to show").rest())
        .option(OptionSpec::flag(
            "print",
            &["-p"],
            "Outputs a list of all the active aliases in a reusable format",
        ))
        .accepts_stdin()
        .example("alias ll='ls -la'")
        .example("alias ll")
        .run(|shell, args, options, process| {
            let print = |shell: &crate::shell::Shell, reusable: bool| {
                if shell.aliases().is_empty() {
                    process.write(STDOUT, "No aliases exist!");
                } else {
                    print_table("Active aliases:", shell.aliases().iter(), reusable, process);
                }
                ExitCode::SUCCESS
            };

            if options.has("print") {
                return print(shell, true);
            }
            let definitions = definitions(args, process);
            if definitions.is_empty() {
                return print(shell, false);
            }

            let mut code = ExitCode::SUCCESS;
            for definition in definitions {
                let Some((name, value)) = definition.split_once('=') else {
                    match shell.alias(&definition) {
                        Some(value) => {
                            process.write(STDOUT, &format!("alias {definition}={}", quoted(value)));
                        }
                        None => {
                            process.write(STDERR, &format!("Alias {definition} not found"));
                            code = ExitCode::GENERAL_ERROR;
                        }
                    }
                    continue;
                };

                if !valid_name(name) {
                    process.write(STDERR, &format!("Invalid alias name: '{name}'"));
                    code = ExitCode::GENERAL_ERROR;
                    continue;
                }

                process.write(STDOUT, &format!("Set {name} to {value}"));
                shell.set_alias(name, value);
            }
            code
        })
}

fn unalias() -> CommandSpec {
    CommandSpec::new("unalias", "Removes aliases", Category::SystemManagement)
        .arg(ArgSpec::required("name", "The alias to remove"))
        .option(OptionSpec::flag("all", &["-a", "--all"], "Remove all aliases").overrides_args())
        .run(|shell, args, options, process| {
            if options.has("all") {
                shell.clear_aliases();
                return ExitCode::SUCCESS;
            }

            let name = &args[0];
            if shell.remove_alias(name).is_none() {
                process.write(STDERR, &format!("Alias '{name}' doesn't exist!"));
                return ExitCode::GENERAL_ERROR;
            }
            process.write(STDOUT, &format!("Alias '{name}' removed!"));
            ExitCode::SUCCESS
        })
}

fn set() -> CommandSpec {
    CommandSpec::new("set", "Sets environment variables", Category::SystemManagement)
        .arg(ArgSpec::required("assignment", "NAME=VALUE").rest())
        .option(
            OptionSpec::flag(
                "print",
                &["-p"],
                "Outputs a list of all environment variables in a reusable format",
            )
            .overrides_args(),
        )
        .accepts_stdin()
        .example("set EDITOR=vi")
        .run(|shell, args, options, process| {
            let print = |shell: &crate::shell::Shell, reusable: bool| {
                let vars = shell.env().iter().filter(|(name, _)| name.as_str() != "?");
                if vars.clone().next().is_none() {
                    process.write(STDOUT, "No env variables set!");
                } else {
                    print_table("ENV Variables:", vars, reusable, process);
                }
                ExitCode::SUCCESS
            };

            if options.has("print") {
                return print(shell, true);
            }
            let definitions = definitions(args, process);
            if definitions.is_empty() {
                return print(shell, false);
            }

            let mut code = ExitCode::SUCCESS;
            for definition in definitions {
                let Some((name, value)) = definition.split_once('=').filter(|(_, value)| !value.is_empty())
                else {
                    process.write(STDERR, &format!("No value given for {definition}"));
                    code = ExitCode::GENERAL_ERROR;
                    continue;
                };

                if !valid_name(name) {
                    process.write(STDERR, &format!("Invalid variable name: '{name}'"));
                    code = ExitCode::GENERAL_ERROR;
                    continue;
                }

                process.write(STDOUT, &format!("Set {name} to {value}"));
                shell.set_var(name, value);
            }
            code
        })
}

fn unset() -> CommandSpec {
    CommandSpec::new("unset", "Removes environment variables", Category::SystemManagement)
        .arg(ArgSpec::required("name", "The variable to remove"))
        .option(OptionSpec::flag("all", &["-a", "--all"], "Remove all ENV variables").overrides_args())
        .run(|shell, args, options, process| {
            if options.has("all") {
                shell.clear_vars();
                return ExitCode::SUCCESS;
            }

            let name = &args[0];
            if name == "?" || shell.remove_var(name).is_none() {
                process.write(STDERR, &format!("ENV variable ${name} doesn't exist!"));
                return ExitCode::GENERAL_ERROR;
            }
            process.write(STDOUT, &format!("ENV variable ${name} removed!"));
            ExitCode::SUCCESS
        })
}

pub fn register(registry: &mut CommandRegistry) {
    for spec in [alias(), unalias(), set(), unset()] {
        registry.register(spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_for_reuse() {
        assert_eq!(quoted("ls"), "ls");
        assert_eq!(quoted("ls -la"), "'ls -la'");
    }

    #[test]
    fn names() {
        assert!(valid_name("ll"));
        assert!(!valid_name(""));
        assert!(!valid_name("a b"));
    }
}
