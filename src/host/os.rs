//! Collaborators backed by the machine the binary runs on.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use super::{Console, FileHandle, FileSystem, Launcher, Permission, Session};

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8000;

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn file(&self, path: &str) -> Option<Box<dyn FileHandle>> {
        let path = PathBuf::from(path);
        if fs::symlink_metadata(&path).is_ok() {
            Some(Box::new(OsFile { path }))
        } else {
            None
        }
    }

    fn touch(&self, parent: &str, name: &str) -> Result<(), String> {
        let path = Path::new(parent).join(name);
        fs::File::create(&path)
            .map(|_| ())
            .map_err(|e| format!("Can't create file. {e}"))
    }
}

struct OsFile {
    path: PathBuf,
}

impl OsFile {
    fn entries(&self, want_folders: bool) -> Vec<Box<dyn FileHandle>> {
        let Ok(entries) = fs::read_dir(&self.path) else {
            return Vec::new();
        };
        let mut out: Vec<Box<dyn FileHandle>> = Vec::new();
        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir == want_folders {
                out.push(Box::new(OsFile { path: entry.path() }));
            }
        }
        out
    }
}

impl FileHandle for OsFile {
    fn path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".into())
    }

    fn is_folder(&self) -> bool {
        self.path.is_dir()
    }

    fn is_binary(&self) -> bool {
        if self.is_folder() {
            return false;
        }
        match fs::read(&self.path) {
            Ok(bytes) => looks_binary(&bytes[..bytes.len().min(BINARY_SNIFF_LEN)]),
            Err(_) => false,
        }
    }

    fn has_permission(&self, permission: Permission) -> bool {
        let Ok(meta) = fs::metadata(&self.path) else {
            return false;
        };
        match permission {
            Permission::Read if meta.is_dir() => fs::read_dir(&self.path).is_ok(),
            Permission::Read => fs::File::open(&self.path).is_ok(),
            Permission::Write => !meta.permissions().readonly(),
            Permission::Execute => has_exec_bit(&self.path),
        }
    }

    fn content(&self) -> Option<String> {
        if self.is_folder() {
            return None;
        }
        fs::read(&self.path)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    fn set_content(&self, content: &str) -> Result<(), String> {
        fs::write(&self.path, content).map_err(|e| e.to_string())
    }

    fn files(&self) -> Vec<Box<dyn FileHandle>> {
        self.entries(false)
    }

    fn folders(&self) -> Vec<Box<dyn FileHandle>> {
        self.entries(true)
    }
}

/// NUL bytes or invalid UTF-8. A sequence cut off at the end of `head` is still text.
fn looks_binary(head: &[u8]) -> bool {
    head.contains(&0) || matches!(std::str::from_utf8(head), Err(e) if e.error_len().is_some())
}

#[cfg(unix)]
fn has_exec_bit(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn has_exec_bit(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "exe")
}

/// Starts programs with `std::process`, inheriting the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLauncher;

impl Launcher for OsLauncher {
    fn launch(&self, path: &str, args: &str) -> Result<(), String> {
        let argv = shlex::split(args).unwrap_or_else(|| {
            // Unbalanced quotes: fall back to plain whitespace splitting
            args.split_whitespace().map(String::from).collect()
        });
        log::debug!("launching {path} with {} argument(s)", argv.len());
        let status = std::process::Command::new(path)
            .args(&argv)
            .status()
            .map_err(|e| e.to_string())?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("{path} exited with {status}"))
        }
    }
}

/// Session for the local user, seeded from the process environment.
#[derive(Debug, Clone)]
pub struct LocalSession {
    working_dir: String,
    home_dir: String,
    user: String,
}

impl LocalSession {
    pub fn from_env() -> Self {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| "/".into());
        let working_dir = std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| home_dir.clone());
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "user".into());
        Self {
            working_dir,
            home_dir,
            user,
        }
    }
}

impl Session for LocalSession {
    fn working_dir(&self) -> String {
        self.working_dir.clone()
    }

    fn set_working_dir(&mut self, dir: String) {
        if let Err(e) = std::env::set_current_dir(&dir) {
            log::warn!("could not change process directory to {dir}: {e}");
        }
        self.working_dir = dir;
    }

    fn home_dir(&self) -> String {
        self.home_dir.clone()
    }

    fn user(&self) -> String {
        self.user.clone()
    }

    fn has_shell(&self) -> bool {
        true
    }
}

/// Console on the process's stdin/stdout/stderr.
#[derive(Debug, Clone, Copy)]
pub struct TerminalConsole {
    color_errors: bool,
}

impl TerminalConsole {
    pub fn new(color_errors: bool) -> Self {
        Self { color_errors }
    }
}

impl Console for TerminalConsole {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{prompt}");
        let _ = stdout.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Some(line)
            }
        }
    }

    fn print(&mut self, text: &str) {
        println!("{text}");
    }

    fn print_error(&mut self, text: &str) {
        if self.color_errors {
            eprintln!("\x1b[31m{text}\x1b[0m");
        } else {
            eprintln!("{text}");
        }
    }

    fn clear_screen(&mut self) {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\x1b[2J\x1b[H");
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_not_binary() {
        assert!(!looks_binary(b"#!/bin/sh\necho hi\n"));
        assert!(!looks_binary("grüße".as_bytes()));
    }

    #[test]
    fn truncated_character_is_text() {
        let bytes = "ab€".as_bytes();
        assert!(!looks_binary(&bytes[..bytes.len() - 1]));
    }

    #[test]
    fn nul_or_invalid_bytes_are_binary() {
        assert!(looks_binary(b"\x7fELF\x02\x01\x00"));
        assert!(looks_binary(&[b'a', 0xff, b'b']));
    }
}
