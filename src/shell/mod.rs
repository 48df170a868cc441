//! The shell context: registry, aliases, environment, history, the root
//! process and the pipeline queue, plus the line-level entry points.

pub mod engine;
pub mod exit;
pub mod stages;

pub use engine::Resolved;
pub use exit::ExitCode;

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::commands::{CommandRegistry, CommandSpec};
use crate::config::Settings;
use crate::host::{Console, Host, TableStore};
use crate::parse::{self, Expansion, Pipeline};
use crate::process::{Process, STDERR, STDOUT};

/// Prompt shown while collecting heredoc lines.
const CONTINUATION_PROMPT: &str = "> ";

/// One independent shell instance.
///
/// Lifecycle: [`Shell::new`] → any number of [`Shell::handle_input`] /
/// [`Shell::start_input_loop`] calls → [`Shell::shutdown`].
pub struct Shell {
    settings: Settings,
    host: Rc<Host>,
    console: Rc<RefCell<dyn Console>>,
    commands: CommandRegistry,
    aliases: BTreeMap<String, String>,
    env: BTreeMap<String, String>,
    history: Vec<String>,
    root: Process,
    /// Processes of the commands currently inside `run`, innermost last.
    /// Each entry is a copy taken at dispatch: it shares the command's
    /// streams but not later changes to its descriptor table.
    active: Vec<Process>,
    pipelines: VecDeque<Pipeline>,
    prev_pipeline: Option<Pipeline>,
    last_exit: ExitCode,
    next_pid: u32,
    next_pipeline_id: u64,
    external_warned: bool,
    exit_requested: Option<ExitCode>,
}

impl Shell {
    /// A shell with every builtin registered and the root process's stdout
    /// and stderr mirrored to `console`.
    pub fn new(settings: &Settings, host: Host, console: Rc<RefCell<dyn Console>>) -> Self {
        let host = Rc::new(host);
        let root = Process::root(settings.name.clone(), host.clone());
        attach_console(&root, &console);

        let mut env = BTreeMap::new();
        env.insert("?".to_string(), ExitCode::SUCCESS.to_string());

        log::info!("shell {} initialised", settings.name);
        Self {
            settings: settings.clone(),
            host,
            console,
            commands: CommandRegistry::with_builtins(),
            aliases: BTreeMap::new(),
            env,
            history: Vec::new(),
            root,
            active: Vec::new(),
            pipelines: VecDeque::new(),
            prev_pipeline: None,
            last_exit: ExitCode::SUCCESS,
            next_pid: 1,
            next_pipeline_id: 0,
            external_warned: false,
            exit_requested: None,
        }
    }

    /// Seed aliases and environment from the `aliases` and `env` tables.
    pub fn with_store(mut self, store: &dyn TableStore) -> Self {
        for row in store.get_all("aliases") {
            self.aliases.insert(row.key, row.value);
        }
        for row in store.get_all("env") {
            self.env.insert(row.key, row.value);
        }
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &Rc<Host> {
        &self.host
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Register an extra command on this shell.
    pub fn register(&mut self, spec: CommandSpec) {
        self.commands.register(spec);
    }

    // ── Aliases and environment ──

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn set_alias(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.aliases.insert(name.into(), value.into());
    }

    pub fn remove_alias(&mut self, name: &str) -> Option<String> {
        self.aliases.remove(name)
    }

    pub fn clear_aliases(&mut self) {
        self.aliases.clear();
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    pub fn remove_var(&mut self, name: &str) -> Option<String> {
        self.env.remove(name)
    }

    /// Remove every variable except `?`.
    pub fn clear_vars(&mut self) {
        self.env.retain(|name, _| name == "?");
    }

    // ── History ──

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn push_history(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.history.push(line.to_string());
        let excess = self.history.len().saturating_sub(self.settings.history_size);
        self.history.drain(..excess);
    }

    // ── Exit codes and lifecycle ──

    pub fn last_exit(&self) -> ExitCode {
        self.last_exit
    }

    pub(crate) fn set_last_exit(&mut self, code: ExitCode) {
        self.last_exit = code;
        self.env.insert("?".to_string(), code.to_string());
    }

    /// Stop the shell: the pipeline queue is abandoned after the current
    /// stage and the input loop returns `code`.
    pub fn request_exit(&mut self, code: ExitCode) {
        log::info!("exit requested with {code}");
        self.exit_requested = Some(code);
    }

    pub fn exit_requested(&self) -> Option<ExitCode> {
        self.exit_requested
    }

    /// Drop any queued work and release the root's extra descriptors.
    pub fn shutdown(&mut self) {
        self.pipelines.clear();
        self.prev_pipeline = None;
        self.active.clear();
        self.root.close_extra_fds();
        log::info!("shell {} shut down", self.settings.name);
    }

    // ── Processes ──

    /// The long-lived process every stage is cloned from.
    pub fn root(&self) -> &Process {
        &self.root
    }

    /// Process of the innermost running command, or the root when idle.
    ///
    /// The pid, name and streams are the command's own. Descriptors the
    /// command opens, closes or dups after it starts are not reflected here.
    pub fn current_process(&self) -> &Process {
        self.active.last().unwrap_or(&self.root)
    }

    pub(crate) fn allocate_pid(&mut self) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    /// A new child of the root process.
    pub fn spawn(&mut self) -> Process {
        let pid = self.allocate_pid();
        self.root.child(pid)
    }

    // ── Input ──

    /// Blocking read of one line from the console.
    pub fn read_line(&self, prompt: &str) -> Option<String> {
        self.console.borrow_mut().read_line(prompt)
    }

    pub(crate) fn read_continuation(&self) -> Option<String> {
        self.read_line(CONTINUATION_PROMPT)
    }

    fn expansion(&self) -> Expansion<'_> {
        Expansion {
            env: &self.env,
            host: &self.host,
        }
    }

    /// Tokenize without history substitution (alias values, `xargs` lines).
    pub fn expand_words(&self, input: &str) -> Vec<String> {
        parse::tokenize(input, &self.expansion())
    }

    /// Substitute `!!`, echoing the rewritten line to stdout when it changed.
    fn expand_history(&self, input: &str) -> String {
        match parse::substitute_history(input, self.history.last().map(String::as_str)) {
            Some(expanded) => {
                self.root.write(STDOUT, &expanded);
                expanded
            }
            None => input.to_string(),
        }
    }

    /// Tokenize a full input line, history substitution included.
    pub fn tokenize(&self, input: &str) -> Vec<String> {
        let line = self.expand_history(input.trim());
        self.expand_words(&line)
    }

    /// Run one line: replaces the pipeline queue and drains it.
    pub fn handle_input(&mut self, input: &str) -> ExitCode {
        let line = self.expand_history(input.trim());
        self.push_history(&line);

        let tokens = self.expand_words(&line);
        let pipelines = parse::parse_pipelines(&tokens, &mut self.next_pipeline_id);
        log::debug!("{} pipeline(s) from {line:?}", pipelines.len());

        self.pipelines = pipelines.into();
        self.prev_pipeline = None;
        self.execute_pipeline();

        log::info!("{line:?} exited with {}", self.last_exit);
        self.last_exit
    }

    /// Queue `input` after the pipelines already waiting. The caller drains
    /// the queue with [`Shell::execute_pipeline`].
    pub fn enqueue_input(&mut self, input: &str) {
        let tokens = self.expand_words(input);
        let pipelines = parse::parse_pipelines(&tokens, &mut self.next_pipeline_id);
        self.pipelines.extend(pipelines);
    }

    pub fn queued_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    fn refresh_session_vars(&mut self) {
        let working_dir = self.host.working_dir();
        let user = self.host.user();
        self.env.insert("PWD".to_string(), working_dir);
        self.env.insert("USER".to_string(), user);
    }

    /// `USER:PATH$ `, `#` for root, the home directory shown as `~`.
    pub fn default_prompt(&self) -> String {
        let user = self.host.user();
        let home = self.host.home_dir();
        let working_dir = self.host.working_dir();
        let path = match working_dir.strip_prefix(&home) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("~{rest}"),
            _ => working_dir,
        };
        let sigil = if user == "root" { '#' } else { '$' };
        format!("{user}:{path}{sigil} ")
    }

    /// Read and run lines until the console runs dry or an exit is requested.
    pub fn start_input_loop(&mut self, prompt: Option<&dyn Fn(&Shell) -> String>) -> ExitCode {
        // A command may start the loop while the rest of its line is queued.
        if !self.pipelines.is_empty() {
            self.execute_pipeline();
        }

        loop {
            if self.exit_requested.is_some() {
                break;
            }
            self.refresh_session_vars();
            let text = match prompt {
                Some(prompt) => prompt(self),
                None => self.default_prompt(),
            };
            let Some(line) = self.read_line(&text) else {
                log::debug!("input exhausted");
                break;
            };
            self.handle_input(&line);
        }
        self.exit_requested.unwrap_or(self.last_exit)
    }

    /// Wipe the console display.
    pub fn clear_screen(&self) {
        match self.console.try_borrow_mut() {
            Ok(mut console) => console.clear_screen(),
            Err(_) => log::warn!("console busy, screen not cleared"),
        }
    }

    /// Shell-level diagnostic on the root process's stderr.
    pub fn report(&self, message: &str) {
        self.root.write(STDERR, message);
    }
}

/// Mirror the root's stdout and stderr to the console, draining each write.
fn attach_console(root: &Process, console: &Rc<RefCell<dyn Console>>) {
    if let Some(stdout) = root.stream(STDOUT) {
        let console = console.clone();
        stdout.borrow_mut().on_write(Box::new(move |stream| {
            let Ok(mut console) = console.try_borrow_mut() else {
                log::warn!("console busy, stdout kept buffered");
                return;
            };
            console.print(&stream.read_all());
        }));
    }
    if let Some(stderr) = root.stream(STDERR) {
        let console = console.clone();
        stderr.borrow_mut().on_write(Box::new(move |stream| {
            let Ok(mut console) = console.try_borrow_mut() else {
                log::warn!("console busy, stderr kept buffered");
                return;
            };
            console.print_error(&stream.read_all());
        }));
    }
}
