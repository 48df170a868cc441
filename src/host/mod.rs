//! Collaborator boundary: filesystem, session, program launcher, console and
//! the persistent table store.
//!
//! The engine never touches the real machine directly. Everything it needs
//! from the outside world goes through the traits in this module, bundled in
//! a [`Host`] that is shared (via `Rc`) by the shell and every process.

/// In-memory collaborators for tests and the sandbox entry point.
pub mod memory;
/// Collaborators backed by the real operating system (used by the binary).
pub mod os;

use std::cell::RefCell;

/// Access right checked on a file before opening or launching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Execute,
}

/// A file or folder as seen through the external filesystem.
pub trait FileHandle {
    fn path(&self) -> String;
    fn name(&self) -> String;
    fn is_folder(&self) -> bool;
    fn is_binary(&self) -> bool;
    fn has_permission(&self, permission: Permission) -> bool;
    /// Current content, `None` for folders and unreadable files.
    fn content(&self) -> Option<String>;
    fn set_content(&self, content: &str) -> Result<(), String>;
    fn files(&self) -> Vec<Box<dyn FileHandle>>;
    fn folders(&self) -> Vec<Box<dyn FileHandle>>;
}

/// Path lookup and file creation.
pub trait FileSystem {
    /// Look up an absolute path.
    fn file(&self, path: &str) -> Option<Box<dyn FileHandle>>;
    /// Create an empty file `name` inside the folder `parent`.
    fn touch(&self, parent: &str, name: &str) -> Result<(), String>;
}

/// Optional user/session context. Without one the shell uses [`HostDefaults`].
pub trait Session {
    fn working_dir(&self) -> String;
    fn set_working_dir(&mut self, dir: String);
    fn home_dir(&self) -> String;
    fn user(&self) -> String;
    fn has_shell(&self) -> bool;
}

/// Starts programs that are not registered shell commands.
///
/// Only a single concatenated argument string crosses this boundary.
pub trait Launcher {
    fn launch(&self, path: &str, args: &str) -> Result<(), String>;
}

/// Blocking line input plus the real display.
pub trait Console {
    /// Prompt for one line. `None` means the input is exhausted.
    fn read_line(&mut self, prompt: &str) -> Option<String>;
    fn print(&mut self, text: &str);
    fn print_error(&mut self, text: &str);
    /// Wipe everything shown so far.
    fn clear_screen(&mut self);
}

/// One key/value row of a persistent table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub value: String,
}

/// Persistent store for the `aliases` and `env` tables, read once at startup.
pub trait TableStore {
    fn get_all(&self, table: &str) -> Vec<Row>;
}

/// Fallback context used when no [`Session`] is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDefaults {
    pub working_dir: String,
    pub home_dir: String,
    pub user: String,
}

impl Default for HostDefaults {
    fn default() -> Self {
        Self {
            working_dir: "/".into(),
            home_dir: "/root".into(),
            user: "root".into(),
        }
    }
}

/// Every external collaborator the engine talks to.
pub struct Host {
    fs: Box<dyn FileSystem>,
    launcher: Box<dyn Launcher>,
    session: RefCell<Option<Box<dyn Session>>>,
    defaults: RefCell<HostDefaults>,
}

impl Host {
    pub fn new(fs: impl FileSystem + 'static, launcher: impl Launcher + 'static) -> Self {
        Self {
            fs: Box::new(fs),
            launcher: Box::new(launcher),
            session: RefCell::new(None),
            defaults: RefCell::new(HostDefaults::default()),
        }
    }

    /// Attach a session; working directory, user and home come from it.
    pub fn with_session(self, session: impl Session + 'static) -> Self {
        *self.session.borrow_mut() = Some(Box::new(session));
        self
    }

    pub fn working_dir(&self) -> String {
        match self.session.borrow().as_ref() {
            Some(session) => session.working_dir(),
            None => self.defaults.borrow().working_dir.clone(),
        }
    }

    pub fn set_working_dir(&self, dir: String) {
        match self.session.borrow_mut().as_mut() {
            Some(session) => session.set_working_dir(dir),
            None => self.defaults.borrow_mut().working_dir = dir,
        }
    }

    pub fn home_dir(&self) -> String {
        match self.session.borrow().as_ref() {
            Some(session) => session.home_dir(),
            None => self.defaults.borrow().home_dir.clone(),
        }
    }

    pub fn user(&self) -> String {
        match self.session.borrow().as_ref() {
            Some(session) => session.user(),
            None => self.defaults.borrow().user.clone(),
        }
    }

    /// Whether the current context can run programs. Host defaults always can.
    pub fn has_shell(&self) -> bool {
        self.session
            .borrow()
            .as_ref()
            .is_none_or(|session| session.has_shell())
    }

    /// Resolve `path` against the current working directory.
    pub fn resolve(&self, path: &str) -> String {
        resolve_path(&self.working_dir(), path)
    }

    pub fn file(&self, path: &str) -> Option<Box<dyn FileHandle>> {
        self.fs.file(path)
    }

    pub fn touch(&self, parent: &str, name: &str) -> Result<(), String> {
        self.fs.touch(parent, name)
    }

    pub fn launch(&self, path: &str, args: &str) -> Result<(), String> {
        self.launcher.launch(path, args)
    }
}

/// Resolve `relative` against `base`, collapsing `.` and `..`.
///
/// Absolute `relative` paths restart at `/`. The result is always
/// `/`-anchored and never has a trailing slash (except the root itself).
pub fn resolve_path(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    let start = if relative.starts_with('/') { "/" } else { base };

    let mut parts: Vec<&str> = start.split('/').filter(|p| !p.is_empty()).collect();
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Folder part of an absolute path (`/a/b` → `/a`, `/a` → `/`).
pub fn parent_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

/// Last component of a path.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_relative() {
        assert_eq!(resolve_path("/home/user", "docs"), "/home/user/docs");
    }

    #[test]
    fn resolve_absolute_restarts() {
        assert_eq!(resolve_path("/home/user", "/etc/passwd"), "/etc/passwd");
    }

    #[test]
    fn resolve_collapses_dots() {
        assert_eq!(resolve_path("/home/user", "../other/./x"), "/home/other/x");
    }

    #[test]
    fn resolve_dotdot_past_root() {
        assert_eq!(resolve_path("/", "../../etc"), "/etc");
    }

    #[test]
    fn resolve_empty_is_base() {
        assert_eq!(resolve_path("/tmp", ""), "/tmp");
    }

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent_path("/a/b"), "/a");
        assert_eq!(parent_path("/a"), "/");
    }

    #[test]
    fn basename_of_path() {
        assert_eq!(basename("/usr/bin/ls"), "ls");
        assert_eq!(basename("file"), "file");
    }

    #[test]
    fn defaults_without_session() {
        let host = Host::new(memory::MemoryFs::new(), memory::RecordingLauncher::default());
        assert_eq!(host.working_dir(), "/");
        assert_eq!(host.home_dir(), "/root");
        assert!(host.has_shell());
        host.set_working_dir("/tmp".into());
        assert_eq!(host.resolve("x"), "/tmp/x");
    }
}
