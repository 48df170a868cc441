//! Lightweight execution contexts and their descriptor tables.
//!
//! A [`Process`] is not an OS process: it is a pid, a name and a table of
//! file descriptors pointing at shared [`Stream`]s. Cloning a child shares
//! every open stream with the parent, which is how one stage's stdout becomes
//! the next stage's stdin without copying.

pub mod stream;

pub use stream::{Mode, Stream, StreamRef, WriteListener};

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::host::{Host, Permission, basename, parent_path};

/// File descriptor number.
pub type Fd = u32;

pub const STDIN: Fd = 0;
pub const STDOUT: Fd = 1;
pub const STDERR: Fd = 2;

/// First descriptor handed out by `open`, `pipe` and `dup`.
const FIRST_FREE_FD: Fd = 3;

#[derive(Clone)]
pub struct Process {
    pid: u32,
    name: String,
    parent: Option<u32>,
    resources: BTreeMap<Fd, StreamRef>,
    next_fd: Fd,
    host: Rc<Host>,
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("fds", &self.fds())
            .field("next_fd", &self.next_fd)
            .finish()
    }
}

impl Process {
    /// The long-lived root process with fresh stdin/stdout/stderr.
    pub fn root(name: impl Into<String>, host: Rc<Host>) -> Self {
        let mut resources = BTreeMap::new();
        resources.insert(STDIN, Stream::new("stdin", Mode::ReadWrite).shared());
        resources.insert(STDOUT, Stream::new("stdout", Mode::ReadWrite).shared());
        resources.insert(STDERR, Stream::new("stderr", Mode::ReadWrite).shared());
        Self {
            pid: 0,
            name: name.into(),
            parent: None,
            resources,
            next_fd: FIRST_FREE_FD,
            host,
        }
    }

    /// A child with a new pid sharing every currently open stream.
    pub fn child(&self, pid: u32) -> Self {
        Self {
            pid,
            name: self.name.clone(),
            parent: Some(self.pid),
            resources: self.resources.clone(),
            next_fd: self.next_fd,
            host: self.host.clone(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn parent_pid(&self) -> Option<u32> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn host(&self) -> &Rc<Host> {
        &self.host
    }

    /// Open descriptors in ascending order.
    pub fn fds(&self) -> Vec<Fd> {
        self.resources.keys().copied().collect()
    }

    pub fn has_fd(&self, fd: Fd) -> bool {
        self.resources.contains_key(&fd)
    }

    pub fn stream(&self, fd: Fd) -> Option<StreamRef> {
        self.resources.get(&fd).cloned()
    }

    /// Point `fd` at an existing stream without closing what was there.
    pub fn set_stream(&mut self, fd: Fd, stream: StreamRef) {
        self.resources.insert(fd, stream);
        if fd >= self.next_fd {
            self.next_fd = fd + 1;
        }
    }

    fn allocate_fd(&mut self) -> Fd {
        let fd = self.next_fd;
        self.next_fd += 1;
        fd
    }

    /// Allocate a fresh in-memory stream and return its descriptor.
    pub fn pipe(&mut self) -> Fd {
        let fd = self.allocate_fd();
        self.resources
            .insert(fd, Stream::new("pipe", Mode::ReadWrite).shared());
        fd
    }

    /// Discard everything buffered on `fd`.
    pub fn flush(&self, fd: Fd) -> bool {
        match self.resources.get(&fd) {
            Some(stream) => {
                stream.borrow_mut().flush();
                true
            }
            None => {
                self.bad_fd(fd, "flush");
                false
            }
        }
    }

    /// Write `data` as a new line on `fd`.
    ///
    /// Every line written to stderr is prefixed with the process name.
    pub fn write(&self, fd: Fd, data: &str) -> bool {
        self.write_impl(fd, data, false)
    }

    /// Write `data` directly after the previous content, without a separator.
    pub fn write_inline(&self, fd: Fd, data: &str) -> bool {
        self.write_impl(fd, data, true)
    }

    pub fn write_lines<S: AsRef<str>>(&self, fd: Fd, lines: &[S]) -> bool {
        let joined = lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");
        self.write_impl(fd, &joined, false)
    }

    fn write_impl(&self, fd: Fd, data: &str, omit_newline: bool) -> bool {
        let Some(stream) = self.resources.get(&fd) else {
            if fd == STDERR {
                log::warn!("{} [{}] has no stderr, dropped: {data}", self.name, self.pid);
            } else {
                self.bad_fd(fd, "write");
            }
            return false;
        };

        if fd == STDERR {
            let prefixed = data
                .split('\n')
                .map(|line| format!("{} > {line}", self.name))
                .collect::<Vec<_>>()
                .join("\n");
            stream.borrow_mut().write(&prefixed, omit_newline);
        } else {
            stream.borrow_mut().write(data, omit_newline);
        }
        true
    }

    /// Everything readable on `fd` as one string.
    pub fn read_all(&self, fd: Fd) -> String {
        match self.resources.get(&fd) {
            Some(stream) => stream.borrow_mut().read_all(),
            None => {
                self.bad_fd(fd, "read");
                String::new()
            }
        }
    }

    /// Everything readable on `fd`, split into lines.
    pub fn read(&self, fd: Fd) -> Vec<String> {
        match self.resources.get(&fd) {
            Some(stream) => stream.borrow_mut().read_lines(),
            None => {
                self.bad_fd(fd, "read");
                Vec::new()
            }
        }
    }

    /// Pop a single buffered line from `fd`.
    pub fn read_one(&self, fd: Fd) -> Option<String> {
        match self.resources.get(&fd) {
            Some(stream) => {
                let mut stream = stream.borrow_mut();
                if stream.is_empty() {
                    None
                } else {
                    Some(stream.read_one())
                }
            }
            None => {
                self.bad_fd(fd, "read");
                None
            }
        }
    }

    /// Make `new_fd` (or a freshly allocated descriptor) alias the stream of
    /// `old_fd`, closing whatever `new_fd` pointed at first.
    ///
    /// Returns `None` when `old_fd` is not open.
    pub fn dup(&mut self, old_fd: Fd, new_fd: Option<Fd>) -> Option<Fd> {
        let Some(stream) = self.resources.get(&old_fd).cloned() else {
            self.bad_fd(old_fd, "dup");
            return None;
        };
        let new_fd = match new_fd {
            Some(fd) => fd,
            None => self.allocate_fd(),
        };
        if old_fd == new_fd {
            return Some(old_fd);
        }
        if self.resources.contains_key(&new_fd) {
            self.close(new_fd);
        }
        self.resources.insert(new_fd, stream);
        if new_fd >= self.next_fd {
            self.next_fd = new_fd + 1;
        }
        Some(new_fd)
    }

    /// Open `path` (relative to the working directory) as a file-backed stream.
    ///
    /// Write modes create the file when missing. Reading folders and binaries
    /// is refused unless `ignore_type` is set. Failures are reported on stderr.
    pub fn open(&mut self, path: &str, mode: Mode, ignore_type: bool) -> Option<Fd> {
        let path = self.host.resolve(path);

        let file = match self.host.file(&path) {
            Some(file) => file,
            None if mode == Mode::Read => {
                self.write(STDERR, &format!("{path}: No such file or directory"));
                return None;
            }
            None => {
                if let Err(reason) = self.host.touch(&parent_path(&path), basename(&path)) {
                    self.write(STDERR, &format!("Failed to create file {path}: {reason}"));
                    return None;
                }
                let Some(file) = self.host.file(&path) else {
                    self.write(STDERR, &format!("Failed to create file {path}"));
                    return None;
                };
                file
            }
        };

        if mode.readable() {
            if !file.has_permission(Permission::Read) {
                self.write(STDERR, &format!("{path}: Permission denied (r)"));
                return None;
            }
            if !ignore_type && file.is_binary() {
                self.write(STDERR, &format!("{path}: Is a binary file"));
                return None;
            }
        }
        if !ignore_type && file.is_folder() {
            self.write(STDERR, &format!("{path}: Is a directory"));
            return None;
        }
        if mode.writable() && !file.has_permission(Permission::Write) {
            self.write(STDERR, &format!("{path}: Permission denied (w)"));
            return None;
        }

        let fd = self.allocate_fd();
        self.resources
            .insert(fd, Stream::file_backed(file, mode).shared());
        log::trace!("pid {} opened {path} ({}) as fd {fd}", self.pid, mode.as_str());
        Some(fd)
    }

    /// Close `fd`, writing buffered data back when it is a writable file.
    pub fn close(&mut self, fd: Fd) -> bool {
        let Some(stream) = self.resources.remove(&fd) else {
            self.bad_fd(fd, "close");
            return false;
        };

        let outcome = {
            let stream = stream.borrow();
            match stream.file() {
                Some(file) if stream.mode().writable() => {
                    if !file.has_permission(Permission::Write) {
                        Err(format!("No write permission to file: {}", file.path()))
                    } else {
                        file.set_content(stream.buffered())
                            .map_err(|reason| format!("Failed to write to file: {reason}"))
                    }
                }
                _ => Ok(()),
            }
        };

        match outcome {
            Ok(()) => true,
            Err(message) => {
                log::warn!("pid {} flush of fd {fd} failed: {message}", self.pid);
                self.write(STDERR, &message);
                false
            }
        }
    }

    /// Close every descriptor above stderr, flushing files and releasing pipes.
    pub fn close_extra_fds(&mut self) {
        let extra: Vec<Fd> = self
            .resources
            .keys()
            .copied()
            .filter(|fd| *fd >= FIRST_FREE_FD)
            .collect();
        for fd in extra {
            self.close(fd);
        }
    }

    fn bad_fd(&self, fd: Fd, operation: &str) {
        self.write(STDERR, &format!("Bad file descriptor ({fd}) [{operation}]"));
    }
}
