//! Command resolution and execution: single commands, stages and the
//! pipeline queue.

use std::rc::Rc;

use super::{ExitCode, Shell};
use crate::commands::Command;
use crate::host::Permission;
use crate::parse::{Condition, Stage};
use crate::process::{Process, STDERR, STDOUT};

/// What a command name refers to.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// A registered command (possibly a subcommand after walking args).
    Builtin(Rc<Command>),
    /// A program file, found in the working directory or on `PATH`.
    External { name: String, path: String },
    NotFound(String),
}

impl Resolved {
    /// Name used for the process and stderr attribution.
    pub fn display_name(&self) -> &str {
        match self {
            Resolved::Builtin(command) => &command.full_name,
            Resolved::External { name, .. } | Resolved::NotFound(name) => name,
        }
    }
}

/// Whether a pipeline with `condition` is skipped after an exit of `last`.
fn skips(condition: Condition, last: ExitCode) -> bool {
    match condition {
        Condition::And => !last.is_success(),
        Condition::Or => last.is_success(),
        Condition::None => false,
    }
}

impl Shell {
    /// Resolve `name`. For registered commands, leading `args` naming
    /// subcommands are consumed.
    pub fn resolve_command(&self, name: &str, args: &mut Vec<String>) -> Resolved {
        if let Some(mut command) = self.commands().get(name) {
            while let Some(sub) = args.first().and_then(|arg| command.subcommand(arg).cloned()) {
                args.remove(0);
                command = sub;
            }
            return Resolved::Builtin(command);
        }

        match self.find_program(name) {
            Some(path) => Resolved::External {
                name: name.to_string(),
                path,
            },
            None => Resolved::NotFound(name.to_string()),
        }
    }

    /// Look `name` up relative to the working directory, then in every
    /// `PATH` entry.
    fn find_program(&self, name: &str) -> Option<String> {
        let host = self.host();
        let is_file = |path: &str| host.file(path).is_some_and(|file| !file.is_folder());

        let local = host.resolve(name);
        if is_file(&local) {
            return Some(local);
        }
        if name.contains('/') {
            return None;
        }

        self.var("PATH")?
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(|dir| crate::host::resolve_path(dir, name))
            .find(|path| is_file(path.as_str()))
    }

    /// Run a resolved command on `process` and return its exit code.
    ///
    /// Registered commands get option parsing, `--help`, requirement and
    /// argument-count checks; descriptors above stderr are closed afterwards.
    /// Programs are handed to the launcher with their arguments joined.
    pub fn run_command(&mut self, resolved: &Resolved, args: Vec<String>, process: &mut Process) -> ExitCode {
        match resolved {
            Resolved::NotFound(name) => {
                process.write(STDERR, &format!("Unknown command: {name}"));
                ExitCode::CMD_NOT_FOUND
            }
            Resolved::External { name, path } => self.run_program(name, path, &args, process),
            Resolved::Builtin(command) => {
                let command = command.clone();
                let code = self.run_builtin(&command, args, process);
                process.close_extra_fds();
                code
            }
        }
    }

    fn run_builtin(&mut self, command: &Command, mut args: Vec<String>, process: &mut Process) -> ExitCode {
        let Some(options) = command.extract_options(&mut args, process) else {
            return ExitCode::MISUSE;
        };

        if options.has("help") {
            command.show_help(process);
            return ExitCode::SUCCESS;
        }

        if command.requirements.has_shell && !self.host().has_shell() {
            process.write(STDERR, "This command requires the session to have a shell");
            return ExitCode::GENERAL_ERROR;
        }

        if args.len() < command.required_arg_count && !options.override_args && !command.accepts_stdin {
            process.write(
                STDERR,
                &format!(
                    "Not enough arguments. Requires {}, received {}",
                    command.required_arg_count,
                    args.len()
                ),
            );
            process.write(STDOUT, &format!("Usage: {}", command.usage()));
            return ExitCode::MISUSE;
        }

        let Some(run) = command.run.clone() else {
            process.write(STDERR, "Command doesn't do anything by itself. Use its subcommands.");
            return ExitCode::MISUSE;
        };

        log::debug!("pid {} runs {} {:?}", process.pid(), command.full_name, args);
        self.active.push(process.clone());
        let code = run(self, &args, &options, process);
        self.active.pop();
        code
    }

    fn run_program(&mut self, name: &str, path: &str, args: &[String], process: &Process) -> ExitCode {
        if !self.host().has_shell() {
            process.write(STDERR, "This command requires the session to have a shell");
            return ExitCode::MISUSE;
        }
        let Some(file) = self.host().file(path) else {
            process.write(STDERR, &format!("Unknown command: {name}"));
            return ExitCode::CMD_NOT_FOUND;
        };
        if !file.is_binary() {
            process.write(STDERR, &format!("{name} is not an executable file."));
            return ExitCode::CMD_NOT_EXECUTABLE;
        }
        if !file.has_permission(Permission::Execute) {
            process.write(STDERR, &format!("{path}: Permission denied (x)"));
            return ExitCode::CMD_NOT_EXECUTABLE;
        }

        if self.settings().warn_external && !self.external_warned {
            self.external_warned = true;
            process.write(
                STDERR,
                "Note: external programs receive their arguments as a single string and do not take part in pipes or redirections",
            );
        }

        log::debug!("launching {path} for pid {}", process.pid());
        match self.host().launch(path, &args.join(" ")) {
            Ok(()) => ExitCode::SUCCESS,
            Err(reason) => {
                process.write(STDERR, &format!("Failed to launch program: {reason}"));
                ExitCode::GENERAL_ERROR
            }
        }
    }

    /// Resolve and run one parsed stage.
    fn run_stage(&mut self, stage: Stage) -> ExitCode {
        let Stage {
            tokens,
            mut process,
            invalid,
        } = stage;

        let code = if invalid {
            ExitCode::MISUSE
        } else if let Some((name, rest)) = tokens.split_first() {
            let mut args = rest.to_vec();
            let resolved = self.resolve_command(name, &mut args);
            process.set_name(resolved.display_name());
            self.run_command(&resolved, args, &mut process)
        } else {
            ExitCode::SUCCESS
        };

        process.close_extra_fds();
        code
    }

    /// Drain the pipeline queue.
    ///
    /// `&&`/`||` conditions are checked against the last exit code once a
    /// previous pipeline has run. Stages run strictly in order and the last
    /// exit code is updated after each one. The running pipeline is taken
    /// off the head of the queue first, so pipelines a stage enqueues are
    /// picked up afterwards.
    pub fn execute_pipeline(&mut self) {
        while let Some(mut pipeline) = self.pipelines.pop_front() {
            if self.prev_pipeline.is_some() && skips(pipeline.condition, self.last_exit) {
                log::debug!("pipeline {} skipped ({:?})", pipeline.id, pipeline.condition);
                continue;
            }

            self.parse_pipeline_stages(&mut pipeline);
            for stage in std::mem::take(&mut pipeline.stages) {
                let code = self.run_stage(stage);
                self.set_last_exit(code);
                if self.exit_requested.is_some() {
                    break;
                }
            }

            self.prev_pipeline = Some(pipeline);
            if self.exit_requested.is_some() {
                self.pipelines.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::commands::{ArgSpec, Category, CommandSpec};
    use crate::config::Settings;
    use crate::host::Host;
    use crate::host::memory::{MemoryFs, RecordingLauncher, ScriptedConsole};

    struct Fixture {
        shell: Shell,
        fs: MemoryFs,
        console: Rc<RefCell<ScriptedConsole>>,
        launcher: RecordingLauncher,
    }

    fn fixture() -> Fixture {
        let fs = MemoryFs::new();
        fs.add_folder("/bin").add_folder("/home");
        let launcher = RecordingLauncher::default();
        let console = Rc::new(RefCell::new(ScriptedConsole::default()));
        let host = Host::new(fs.clone(), launcher.clone());
        let mut shell = Shell::new(&Settings::default(), host, console.clone());
        shell.set_var("PATH", "/bin");
        Fixture {
            shell,
            fs,
            console,
            launcher,
        }
    }

    #[test]
    fn skip_rules() {
        assert!(skips(Condition::And, ExitCode::GENERAL_ERROR));
        assert!(!skips(Condition::And, ExitCode::SUCCESS));
        assert!(skips(Condition::Or, ExitCode::SUCCESS));
        assert!(!skips(Condition::None, ExitCode::MISUSE));
    }

    #[test]
    fn resolves_subcommands() {
        let f = fixture();
        let mut args = vec!["show".to_string(), "x".to_string()];
        match f.shell.resolve_command("history", &mut args) {
            Resolved::Builtin(command) => assert_eq!(command.full_name, "history show"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(args, vec!["x"]);
    }

    #[test]
    fn resolves_programs_on_path() {
        let f = fixture();
        f.fs.add_binary("/bin/nmap", true);
        let mut args = Vec::new();
        match f.shell.resolve_command("nmap", &mut args) {
            Resolved::External { path, .. } => assert_eq!(path, "/bin/nmap"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            f.shell.resolve_command("nope", &mut args),
            Resolved::NotFound(_)
        ));
    }

    #[test]
    fn folders_are_not_programs() {
        let f = fixture();
        assert!(matches!(
            f.shell.resolve_command("home", &mut Vec::new()),
            Resolved::NotFound(_)
        ));
    }

    #[test]
    fn unknown_command() {
        let mut f = fixture();
        assert_eq!(f.shell.handle_input("frobnicate"), ExitCode::CMD_NOT_FOUND);
        assert_eq!(f.console.borrow().errors(), "frobnicate > Unknown command: frobnicate");
    }

    #[test]
    fn external_launch_joins_args() {
        let mut f = fixture();
        f.fs.add_binary("/bin/nmap", true);
        assert_eq!(f.shell.handle_input("nmap -p 80 host"), ExitCode::SUCCESS);
        assert_eq!(
            f.launcher.calls(),
            vec![("/bin/nmap".to_string(), "-p 80 host".to_string())]
        );
    }

    #[test]
    fn external_warning_once() {
        let mut f = fixture();
        f.fs.add_binary("/bin/nmap", true);
        f.shell.handle_input("nmap");
        f.shell.handle_input("nmap");
        let errors = f.console.borrow().errors();
        assert_eq!(errors.matches("Note: external programs").count(), 1);
    }

    #[test]
    fn external_without_permission() {
        let mut f = fixture();
        f.fs.add_binary("/bin/locked", false);
        assert_eq!(f.shell.handle_input("locked"), ExitCode::CMD_NOT_EXECUTABLE);
        assert!(f.launcher.calls().is_empty());
    }

    #[test]
    fn text_file_is_not_executable() {
        let mut f = fixture();
        f.fs.add_file("/notes.txt", "hi");
        assert_eq!(f.shell.handle_input("notes.txt"), ExitCode::CMD_NOT_EXECUTABLE);
        assert!(f.console.borrow().errors().ends_with("notes.txt is not an executable file."));
    }

    #[test]
    fn missing_required_args() {
        let mut f = fixture();
        f.shell.register(
            CommandSpec::new("pair", "Needs two", Category::Other)
                .arg(ArgSpec::required("a", "First"))
                .arg(ArgSpec::required("b", "Second"))
                .run(|_, _, _, _| ExitCode::SUCCESS),
        );
        assert_eq!(f.shell.handle_input("pair one"), ExitCode::MISUSE);
        let console = f.console.borrow();
        assert_eq!(console.errors(), "pair > Not enough arguments. Requires 2, received 1");
        assert_eq!(console.output(), "Usage: pair [OPTIONS] (A) (B)");
    }

    #[test]
    fn dispatch_only_parent() {
        let mut f = fixture();
        assert_eq!(f.shell.handle_input("history"), ExitCode::MISUSE);
    }

    #[test]
    fn help_flag_short_circuits() {
        let mut f = fixture();
        assert_eq!(f.shell.handle_input("seq --help"), ExitCode::SUCCESS);
        assert!(f.console.borrow().output().contains("Usage:"));
    }

    #[test]
    fn bad_option_is_misuse() {
        let mut f = fixture();
        assert_eq!(f.shell.handle_input("seq -s"), ExitCode::MISUSE);
    }

    #[test]
    fn requirement_check_uses_session() {
        struct NoShell;
        impl crate::host::Session for NoShell {
            fn working_dir(&self) -> String {
                "/".into()
            }
            fn set_working_dir(&mut self, _dir: String) {}
            fn home_dir(&self) -> String {
                "/".into()
            }
            fn user(&self) -> String {
                "guest".into()
            }
            fn has_shell(&self) -> bool {
                false
            }
        }

        let console = Rc::new(RefCell::new(ScriptedConsole::default()));
        let host = Host::new(MemoryFs::new(), RecordingLauncher::default()).with_session(NoShell);
        let mut shell = Shell::new(&Settings::default(), host, console);
        shell.register(
            CommandSpec::new("scan", "", Category::Networking)
                .requires_shell()
                .run(|_, _, _, _| ExitCode::SUCCESS),
        );
        assert_eq!(shell.handle_input("scan"), ExitCode::GENERAL_ERROR);
    }

    #[test]
    fn and_or_chain() {
        let mut f = fixture();
        f.shell.handle_input("false && echo X");
        assert_eq!(f.console.borrow().output(), "");
        assert_eq!(f.shell.last_exit(), ExitCode::GENERAL_ERROR);

        f.shell.handle_input("false || echo X");
        assert_eq!(f.console.borrow().output(), "X");
    }

    #[test]
    fn skipped_pipeline_keeps_previous_code() {
        let mut f = fixture();
        f.shell.handle_input("true || false && echo ran");
        assert_eq!(f.console.borrow().output(), "ran");
    }

    #[test]
    fn first_pipeline_ignores_condition() {
        let mut f = fixture();
        f.shell.handle_input("false");
        f.shell.handle_input("&& echo fresh");
        assert_eq!(f.console.borrow().output(), "fresh");
    }

    #[test]
    fn invalid_stage_is_misuse() {
        let mut f = fixture();
        assert_eq!(f.shell.handle_input("cat < missing.txt"), ExitCode::MISUSE);
    }

    #[test]
    fn exit_code_updates_per_stage() {
        let mut f = fixture();
        f.shell.handle_input("false | true");
        assert_eq!(f.shell.last_exit(), ExitCode::SUCCESS);
        f.shell.handle_input("true | false");
        assert_eq!(f.shell.var("?"), Some("1"));
    }

    #[test]
    fn quit_abandons_queue() {
        let mut f = fixture();
        f.shell.handle_input("quit 4; echo after");
        assert_eq!(f.shell.exit_requested(), Some(ExitCode(4)));
        assert_eq!(f.console.borrow().output(), "");
    }

    #[test]
    fn enqueued_pipelines_run_after_current() {
        let mut f = fixture();
        f.shell.register(
            CommandSpec::new("later", "", Category::Other).run(|shell, _, _, process| {
                shell.enqueue_input("echo second");
                process.write(STDOUT, "first");
                ExitCode::SUCCESS
            }),
        );
        f.shell.handle_input("later; echo between");
        assert_eq!(f.console.borrow().output(), "first\nbetween\nsecond");
    }

    #[test]
    fn current_process_during_run() {
        let mut f = fixture();
        f.shell.register(
            CommandSpec::new("whoami-pid", "", Category::Other).run(|shell, _, _, process| {
                let same = shell.current_process().pid() == process.pid();
                ExitCode(if same { 0 } else { 1 })
            }),
        );
        assert_eq!(f.shell.handle_input("whoami-pid"), ExitCode::SUCCESS);
        assert_eq!(f.shell.current_process().pid(), 0);
    }
}
