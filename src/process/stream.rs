use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::host::FileHandle;

/// Shared handle to a stream. Several descriptors (and processes) may alias it.
pub type StreamRef = Rc<RefCell<Stream>>;

/// Observer invoked synchronously after every write.
///
/// It receives the stream itself so it can drain what was just written.
pub type WriteListener = Box<dyn FnMut(&mut Stream)>;

/// Access mode of a stream or an `open` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
    ReadWrite,
}

impl Mode {
    pub fn readable(self) -> bool {
        matches!(self, Mode::Read | Mode::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Mode::Write | Mode::ReadWrite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Read => "r",
            Mode::Write => "w",
            Mode::ReadWrite => "rw",
        }
    }
}

/// Buffered, line-oriented data behind one file descriptor.
///
/// Unbacked streams are pure in-memory buffers (stdio and pipes). File-backed
/// streams read live file content and accumulate writes in the buffer until
/// the owning descriptor is closed.
pub struct Stream {
    name: String,
    mode: Mode,
    file: Option<Box<dyn FileHandle>>,
    buffer: String,
    listeners: Vec<WriteListener>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("file", &self.file.as_ref().map(|file| file.path()))
            .field("buffer", &self.buffer)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Stream {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            file: None,
            buffer: String::new(),
            listeners: Vec::new(),
        }
    }

    /// A stream over `file`, with the file's current content loaded eagerly.
    pub fn file_backed(file: Box<dyn FileHandle>, mode: Mode) -> Self {
        let buffer = file.content().unwrap_or_default();
        Self {
            name: "fileStream".into(),
            mode,
            file: Some(file),
            buffer,
            listeners: Vec::new(),
        }
    }

    pub fn shared(self) -> StreamRef {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file(&self) -> Option<&dyn FileHandle> {
        self.file.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffered data without consuming it.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Discard buffered data.
    pub fn flush(&mut self) {
        self.buffer.clear();
    }

    /// Remove and return the first buffered line.
    pub fn read_one(&mut self) -> String {
        match self.buffer.find('\n') {
            Some(index) => {
                let line = self.buffer[..index].to_string();
                self.buffer.drain(..=index);
                line
            }
            None => std::mem::take(&mut self.buffer),
        }
    }

    /// Everything available as one string.
    ///
    /// In-memory buffers are drained; file-backed streams re-fetch the file.
    pub fn read_all(&mut self) -> String {
        match &self.file {
            Some(file) => file.content().unwrap_or_default(),
            None => std::mem::take(&mut self.buffer),
        }
    }

    /// Same as [`Stream::read_all`], split into lines.
    pub fn read_lines(&mut self) -> Vec<String> {
        let data = self.read_all();
        if data.is_empty() {
            return Vec::new();
        }
        data.split('\n').map(String::from).collect()
    }

    /// Append `data`, separated from earlier content by a newline unless
    /// `omit_newline` is set, then notify the listeners.
    pub fn write(&mut self, data: &str, omit_newline: bool) {
        if !omit_newline && !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(data);
        self.notify();
    }

    pub fn on_write(&mut self, listener: WriteListener) {
        self.listeners.push(listener);
    }

    fn notify(&mut self) {
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            listener(self);
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }
}
