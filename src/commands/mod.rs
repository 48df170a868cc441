//! Command descriptors, the command registry and the builtin families.
//!
//! A command is built once from a declarative [`CommandSpec`]: its
//! arguments, options, subcommands and requirements, plus an optional run
//! closure. Helpers shared by a command and its subcommands are captured by
//! those closures (usually through an `Rc`) rather than stored on the
//! descriptor.

/// Usage strings, help pages and the `help` builtin.
pub mod help;
/// Option schema, parsed option values and `extract_options`.
pub mod options;
/// `cd`, `pwd`, `true`, `false`, `history`, `clear` and `quit`.
pub mod system;
/// Line-oriented text tools: `echo`, `cat`, `tee`, `wc`, `sort`, `seq`, `tail`, `cols`, `grep`.
pub mod text;
/// Alias and environment variable management.
pub mod vars;
/// `xargs`: re-entrant dispatch of a command per input line.
pub mod xargs;

pub use options::{OptionKind, OptionSpec, OptionValue, ParsedOptions, extract_options};

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::process::{Process, STDERR};
use crate::shell::{ExitCode, Shell};

/// Entry point of a command.
pub type RunFn = Rc<dyn Fn(&mut Shell, &[String], &ParsedOptions, &mut Process) -> ExitCode>;

/// Grouping used by `help`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Hacking,
    Networking,
    SystemManagement,
    DataOperations,
    #[default]
    Other,
    /// Listed without a heading.
    None,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Hacking => "Hacking",
            Category::Networking => "Networking",
            Category::SystemManagement => "System Management",
            Category::DataOperations => "Data Operations",
            Category::Other => "Other",
            Category::None => "None",
        }
    }
}

/// One positional argument in a command's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    /// Swallows every remaining positional.
    pub rest: bool,
}

impl ArgSpec {
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required: true,
            rest: false,
        }
    }

    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, description)
        }
    }

    pub fn rest(mut self) -> Self {
        self.rest = true;
        self
    }
}

/// Conditions checked before a command runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    /// The session must be able to run programs.
    pub has_shell: bool,
}

/// Declarative schema a [`Command`] is built from.
#[derive(Clone, Default)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub arguments: Vec<ArgSpec>,
    pub options: Vec<OptionSpec>,
    pub subcommands: Vec<CommandSpec>,
    pub requirements: Requirements,
    /// Run even with fewer positionals than required (input comes from stdin).
    pub accepts_stdin: bool,
    pub hidden: bool,
    pub examples: Vec<String>,
    pub run: Option<RunFn>,
}

impl CommandSpec {
    pub fn new(name: &str, description: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category,
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.arguments.push(arg);
        self
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub fn subcommand(mut self, sub: CommandSpec) -> Self {
        self.subcommands.push(sub);
        self
    }

    pub fn requires_shell(mut self) -> Self {
        self.requirements.has_shell = true;
        self
    }

    pub fn accepts_stdin(mut self) -> Self {
        self.accepts_stdin = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn example(mut self, example: &str) -> Self {
        self.examples.push(example.to_string());
        self
    }

    pub fn run<F>(mut self, run: F) -> Self
    where
        F: Fn(&mut Shell, &[String], &ParsedOptions, &mut Process) -> ExitCode + 'static,
    {
        self.run = Some(Rc::new(run));
        self
    }
}

/// A built command, immutable after construction.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    /// `name` prefixed with every ancestor, e.g. `history show`.
    pub full_name: String,
    pub description: String,
    pub category: Category,
    pub arguments: Vec<ArgSpec>,
    pub options: Vec<OptionSpec>,
    pub subcommands: Vec<Rc<Command>>,
    pub requirements: Requirements,
    pub accepts_stdin: bool,
    pub hidden: bool,
    pub examples: Vec<String>,
    pub required_arg_count: usize,
    pub run: Option<RunFn>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("full_name", &self.full_name)
            .field("category", &self.category)
            .field("arguments", &self.arguments.len())
            .field("options", &self.options.len())
            .field("subcommands", &self.subcommands.len())
            .field("required_arg_count", &self.required_arg_count)
            .field("runnable", &self.run.is_some())
            .finish()
    }
}

impl Command {
    /// Build a top-level command.
    pub fn build(spec: CommandSpec) -> Self {
        Self::build_within(spec, None)
    }

    fn build_within(spec: CommandSpec, parent: Option<&str>) -> Self {
        let CommandSpec {
            name,
            description,
            category,
            arguments,
            mut options,
            subcommands,
            requirements,
            accepts_stdin,
            hidden,
            examples,
            run,
        } = spec;

        if !options.iter().any(|option| option.name == "help") {
            options.push(OptionSpec::flag("help", &["-h", "--help"], "Shows help for this command"));
        }

        let full_name = match parent {
            Some(parent) => format!("{parent} {name}"),
            None => name.clone(),
        };

        let subcommands = subcommands
            .into_iter()
            .map(|mut sub| {
                sub.category = category;
                Rc::new(Self::build_within(sub, Some(&full_name)))
            })
            .collect();

        let required_arg_count = arguments.iter().filter(|arg| arg.required).count();

        Self {
            name,
            full_name,
            description,
            category,
            arguments,
            options,
            subcommands,
            requirements,
            accepts_stdin,
            hidden,
            examples,
            required_arg_count,
            run,
        }
    }

    pub fn subcommand(&self, name: &str) -> Option<&Rc<Command>> {
        self.subcommands.iter().find(|sub| sub.name == name)
    }

    /// Declared option matching `flag` (an `=value` suffix is ignored).
    pub fn option_for_flag(&self, flag: &str) -> Option<&OptionSpec> {
        let flag = flag.split_once('=').map_or(flag, |(flag, _)| flag);
        self.options.iter().find(|option| option.matches(flag))
    }

    /// Remove options from `args`; a parse error is written to `process`'s
    /// stderr and yields `None`.
    pub fn extract_options(&self, args: &mut Vec<String>, process: &Process) -> Option<ParsedOptions> {
        match extract_options(&self.options, args) {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                process.write(STDERR, &message);
                None
            }
        }
    }
}

/// Every registered top-level command, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Rc<Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every builtin family.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        text::register(&mut registry);
        vars::register(&mut registry);
        system::register(&mut registry);
        xargs::register(&mut registry);
        help::register(&mut registry);
        registry
    }

    /// Build `spec` and register it under its name, replacing any previous
    /// command of that name.
    pub fn register(&mut self, spec: CommandSpec) -> Rc<Command> {
        let command = Rc::new(Command::build(spec));
        log::debug!("registered command {}", command.name);
        self.commands.insert(command.name.clone(), command.clone());
        command
    }

    pub fn get(&self, name: &str) -> Option<Rc<Command>> {
        self.commands.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Rc<Command>> {
        self.commands.remove(name)
    }

    /// Commands in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<Command>> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CommandSpec {
        CommandSpec::new("history", "Command history", Category::SystemManagement)
            .arg(ArgSpec::required("first", "First"))
            .arg(ArgSpec::optional("second", "Second"))
            .subcommand(CommandSpec::new("show", "Show it", Category::None))
    }

    #[test]
    fn help_option_appended() {
        let cmd = Command::build(sample());
        assert!(cmd.option_for_flag("-h").is_some());
        assert!(cmd.option_for_flag("--help=x").is_some());
    }

    #[test]
    fn declared_help_not_duplicated() {
        let spec = sample().option(OptionSpec::flag("help", &["-?"], "Custom"));
        let cmd = Command::build(spec);
        assert_eq!(cmd.options.iter().filter(|o| o.name == "help").count(), 1);
        assert!(cmd.option_for_flag("-h").is_none());
    }

    #[test]
    fn required_count() {
        assert_eq!(Command::build(sample()).required_arg_count, 1);
    }

    #[test]
    fn subcommand_inherits_category_and_prefix() {
        let cmd = Command::build(sample());
        let show = cmd.subcommand("show").unwrap();
        assert_eq!(show.full_name, "history show");
        assert_eq!(show.category, Category::SystemManagement);
        assert!(show.option_for_flag("--help").is_some());
    }

    #[test]
    fn registry_keys_by_name() {
        let mut registry = CommandRegistry::new();
        registry.register(sample());
        assert!(registry.contains("history"));
        assert!(!registry.contains("show"));
    }

    #[test]
    fn builtins_registered() {
        let registry = CommandRegistry::with_builtins();
        for name in [
            "echo", "cat", "tail", "cols", "xargs", "alias", "set", "help", "clear", "quit", "cd",
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
    }
}
