//! In-memory collaborators: a tree filesystem, a scripted console, a table
//! store and a launcher that only records what it was asked to start.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use super::{Console, FileHandle, FileSystem, Launcher, Permission, Row, TableStore, basename, parent_path};

#[derive(Debug, Clone)]
struct Node {
    folder: bool,
    binary: bool,
    content: String,
    read: bool,
    write: bool,
    execute: bool,
}

impl Node {
    fn folder() -> Self {
        Self {
            folder: true,
            binary: false,
            content: String::new(),
            read: true,
            write: true,
            execute: true,
        }
    }

    fn file(content: &str) -> Self {
        Self {
            folder: false,
            binary: false,
            content: content.to_string(),
            read: true,
            write: true,
            execute: false,
        }
    }
}

/// A filesystem held entirely in memory. Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    nodes: Rc<RefCell<BTreeMap<String, Node>>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// A filesystem containing only the root folder.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::folder());
        Self {
            nodes: Rc::new(RefCell::new(nodes)),
        }
    }

    /// Create a folder and any missing parents.
    pub fn add_folder(&self, path: &str) -> &Self {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.nodes
                .borrow_mut()
                .entry(current.clone())
                .or_insert_with(Node::folder);
        }
        self
    }

    /// Create (or replace) a text file, creating parent folders.
    pub fn add_file(&self, path: &str, content: &str) -> &Self {
        self.add_folder(&parent_path(path));
        self.nodes
            .borrow_mut()
            .insert(path.to_string(), Node::file(content));
        self
    }

    /// Create a binary program, optionally executable.
    pub fn add_binary(&self, path: &str, executable: bool) -> &Self {
        self.add_folder(&parent_path(path));
        let mut node = Node::file("");
        node.binary = true;
        node.execute = executable;
        self.nodes.borrow_mut().insert(path.to_string(), node);
        self
    }

    pub fn set_permissions(&self, path: &str, read: bool, write: bool, execute: bool) -> &Self {
        if let Some(node) = self.nodes.borrow_mut().get_mut(path) {
            node.read = read;
            node.write = write;
            node.execute = execute;
        }
        self
    }

    /// Content of a file, for assertions.
    pub fn read(&self, path: &str) -> Option<String> {
        self.nodes
            .borrow()
            .get(path)
            .filter(|n| !n.folder)
            .map(|n| n.content.clone())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.borrow().contains_key(path)
    }

    fn children(&self, folder: &str, want_folders: bool) -> Vec<Box<dyn FileHandle>> {
        self.nodes
            .borrow()
            .iter()
            .filter(|(path, node)| {
                path.as_str() != "/" && node.folder == want_folders && parent_path(path) == folder
            })
            .map(|(path, _)| self.handle(path))
            .collect()
    }

    fn handle(&self, path: &str) -> Box<dyn FileHandle> {
        Box::new(MemoryFile {
            fs: self.clone(),
            path: path.to_string(),
        })
    }

    fn with_node<T>(&self, path: &str, f: impl FnOnce(&Node) -> T) -> Option<T> {
        self.nodes.borrow().get(path).map(f)
    }
}

impl FileSystem for MemoryFs {
    fn file(&self, path: &str) -> Option<Box<dyn FileHandle>> {
        if self.exists(path) {
            Some(self.handle(path))
        } else {
            None
        }
    }

    fn touch(&self, parent: &str, name: &str) -> Result<(), String> {
        let writable = self.with_node(parent, |n| n.folder && n.write);
        match writable {
            None => Err(format!("Can't create file. {parent} doesn't exist")),
            Some(false) => Err("Can't create file. Permission denied".into()),
            Some(true) => {
                let path = if parent == "/" {
                    format!("/{name}")
                } else {
                    format!("{parent}/{name}")
                };
                self.nodes.borrow_mut().insert(path, Node::file(""));
                Ok(())
            }
        }
    }
}

struct MemoryFile {
    fs: MemoryFs,
    path: String,
}

impl FileHandle for MemoryFile {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn name(&self) -> String {
        basename(&self.path).to_string()
    }

    fn is_folder(&self) -> bool {
        self.fs.with_node(&self.path, |n| n.folder).unwrap_or(false)
    }

    fn is_binary(&self) -> bool {
        self.fs.with_node(&self.path, |n| n.binary).unwrap_or(false)
    }

    fn has_permission(&self, permission: Permission) -> bool {
        self.fs
            .with_node(&self.path, |n| match permission {
                Permission::Read => n.read,
                Permission::Write => n.write,
                Permission::Execute => n.execute,
            })
            .unwrap_or(false)
    }

    fn content(&self) -> Option<String> {
        self.fs.read(&self.path)
    }

    fn set_content(&self, content: &str) -> Result<(), String> {
        let mut nodes = self.fs.nodes.borrow_mut();
        match nodes.get_mut(&self.path) {
            Some(node) if node.folder => Err(format!("{} is a folder", self.path)),
            Some(node) => {
                node.content = content.to_string();
                Ok(())
            }
            None => Err(format!("{} no longer exists", self.path)),
        }
    }

    fn files(&self) -> Vec<Box<dyn FileHandle>> {
        self.fs.children(&self.path, false)
    }

    fn folders(&self) -> Vec<Box<dyn FileHandle>> {
        self.fs.children(&self.path, true)
    }
}

/// Console fed from a fixed list of input lines that records everything shown.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<String>,
    prompts: Vec<String>,
    output: Vec<String>,
    errors: Vec<String>,
    screen_clears: usize,
}

impl ScriptedConsole {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn push_input(&mut self, line: impl Into<String>) {
        self.input.push_back(line.into());
    }

    /// Everything printed to the display, one chunk per line.
    pub fn output(&self) -> String {
        self.output.join("\n")
    }

    pub fn errors(&self) -> String {
        self.errors.join("\n")
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn clear(&mut self) {
        self.output.clear();
        self.errors.clear();
    }

    /// How often the display was wiped by [`Console::clear_screen`].
    pub fn screen_clears(&self) -> usize {
        self.screen_clears
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.prompts.push(prompt.to_string());
        self.input.pop_front()
    }

    fn print(&mut self, text: &str) {
        self.output.push(text.to_string());
    }

    fn print_error(&mut self, text: &str) {
        self.errors.push(text.to_string());
    }

    fn clear_screen(&mut self) {
        self.clear();
        self.screen_clears += 1;
    }
}

/// Table store backed by plain maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Vec<Row>>,
}

impl MemoryStore {
    pub fn insert(&mut self, table: &str, key: impl Into<String>, value: impl Into<String>) {
        self.tables.entry(table.to_string()).or_default().push(Row {
            key: key.into(),
            value: value.into(),
        });
    }
}

impl TableStore for MemoryStore {
    fn get_all(&self, table: &str) -> Vec<Row> {
        self.tables.get(table).cloned().unwrap_or_default()
    }
}

/// Launcher that accepts every request and remembers it.
#[derive(Debug, Clone, Default)]
pub struct RecordingLauncher {
    calls: Rc<RefCell<Vec<(String, String)>>>,
}

impl RecordingLauncher {
    /// `(path, argument string)` pairs in launch order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, path: &str, args: &str) -> Result<(), String> {
        self.calls
            .borrow_mut()
            .push((path.to_string(), args.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_file_creates_parents() {
        let fs = MemoryFs::new();
        fs.add_file("/home/user/notes.txt", "hi");
        assert!(fs.file("/home").is_some_and(|f| f.is_folder()));
        assert_eq!(fs.read("/home/user/notes.txt").as_deref(), Some("hi"));
    }

    #[test]
    fn folder_listing_separates_files_and_folders() {
        let fs = MemoryFs::new();
        fs.add_file("/d/a.txt", "").add_file("/d/b.txt", "").add_folder("/d/sub");
        let dir = fs.file("/d").unwrap();
        let files: Vec<String> = dir.files().iter().map(|f| f.name()).collect();
        let folders: Vec<String> = dir.folders().iter().map(|f| f.name()).collect();
        assert_eq!(files, vec!["a.txt", "b.txt"]);
        assert_eq!(folders, vec!["sub"]);
    }

    #[test]
    fn touch_requires_existing_parent() {
        let fs = MemoryFs::new();
        assert!(fs.touch("/missing", "x").is_err());
        fs.add_folder("/tmp");
        assert!(fs.touch("/tmp", "x").is_ok());
        assert!(fs.exists("/tmp/x"));
    }

    #[test]
    fn touch_respects_folder_permission() {
        let fs = MemoryFs::new();
        fs.add_folder("/ro").set_permissions("/ro", true, false, true);
        assert!(fs.touch("/ro", "x").is_err());
    }

    #[test]
    fn scripted_console_replays_input() {
        let mut console = ScriptedConsole::new(["one", "two"]);
        assert_eq!(console.read_line("> ").as_deref(), Some("one"));
        assert_eq!(console.read_line("> ").as_deref(), Some("two"));
        assert_eq!(console.read_line("> "), None);
        assert_eq!(console.prompts().len(), 3);
    }
}
