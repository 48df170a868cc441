//! flux-shell: an in-process, POSIX-flavored command shell.
//!
//! Input lines are tokenized (quotes, `$VAR`, `~`, globs), split into
//! pipelines joined by `&&`, `||` and `;`, and each pipeline into stages
//! wired together with in-memory pipes and redirections. Stages run
//! registered builtin commands or hand off to an external launcher.
//!
//! # Architecture
//!
//! - **[`parse`]**: tokenizer, variable/glob expansion, pipeline splitting, token classification.
//! - **[`process`]**: line-oriented streams and per-process descriptor tables.
//! - **[`commands`]**: declarative command specs, option extraction, help and the builtins.
//! - **[`shell`]**: stage wiring, command resolution and the execution engine.
//! - **[`host`]**: collaborator traits (filesystem, session, launcher, console, store).
//! - **[`config`]**: embedded defaults plus user overlay merge.
//! - **[`logging`]**: file logging to `~/.local/share/flux-shell/flux.log`.

/// Command descriptors, option parsing and builtin families.
pub mod commands;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// External collaborators and their in-memory and OS-backed implementations.
pub mod host;
/// File-based logging setup.
pub mod logging;
/// Tokenizing and pipeline parsing.
pub mod parse;
/// Streams, descriptor tables and processes.
pub mod process;
/// The shell: state, stage wiring and execution.
pub mod shell;

use std::cell::RefCell;
use std::rc::Rc;

use host::Host;
use host::memory::{MemoryFs, RecordingLauncher, ScriptedConsole};
use shell::{ExitCode, Shell};

/// A shell over an in-memory filesystem and a scripted console.
///
/// This is the main entry point for tests and embedding: everything the
/// shell prints is captured, and launched programs are recorded instead of
/// being started.
pub struct Sandbox {
    pub shell: Shell,
    pub fs: MemoryFs,
    pub console: Rc<RefCell<ScriptedConsole>>,
    pub launcher: RecordingLauncher,
}

impl Sandbox {
    /// Default configuration, an empty `/root` home and `/` as working directory.
    pub fn new() -> Self {
        Self::with_input(std::iter::empty::<String>())
    }

    /// Like [`Sandbox::new`], with `lines` queued as console input.
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = config::Config::default_config();
        let fs = MemoryFs::new();
        fs.add_folder("/root").add_folder("/bin").add_folder("/usr/bin");
        let launcher = RecordingLauncher::default();
        let console = Rc::new(RefCell::new(ScriptedConsole::new(lines)));

        let host = Host::new(fs.clone(), launcher.clone());
        let shell = Shell::new(&config.settings, host, console.clone()).with_store(&config.store());
        Self {
            shell,
            fs,
            console,
            launcher,
        }
    }

    /// Run one input line.
    pub fn run(&mut self, line: &str) -> ExitCode {
        self.shell.handle_input(line)
    }

    /// Everything printed to the display so far.
    pub fn output(&self) -> String {
        self.console.borrow().output()
    }

    pub fn errors(&self) -> String {
        self.console.borrow().errors()
    }

    /// Forget captured output and errors.
    pub fn clear(&self) {
        self.console.borrow_mut().clear();
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `line` in a fresh [`Sandbox`] and return it for inspection.
pub fn sandbox(line: &str) -> Sandbox {
    let mut sandbox = Sandbox::new();
    sandbox.run(line);
    sandbox
}
