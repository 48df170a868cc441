//! Filename globbing with `*` and `?`.

use crate::host::{Host, resolve_path};

/// Whether `word` contains glob metacharacters.
pub fn has_glob_chars(word: &str) -> bool {
    word.contains(['*', '?'])
}

/// Full-string match: `*` is zero or more chars, `?` exactly one.
pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_from(&pattern, &name)
}

fn match_from(pattern: &[char], name: &[char]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some(('*', rest)) => (0..=name.len()).any(|skip| match_from(rest, &name[skip..])),
        Some(('?', rest)) => !name.is_empty() && match_from(rest, &name[1..]),
        Some((c, rest)) => name.first() == Some(c) && match_from(rest, &name[1..]),
    }
}

/// Expand `pattern` against the folder it names, sorted.
///
/// Only the last path component may contain wildcards. Matches keep the
/// folder part exactly as written. An empty result means "leave the word".
pub fn expand(pattern: &str, host: &Host, working_dir: &str) -> Vec<String> {
    let (given_dir, file_pattern) = match pattern.rfind('/') {
        Some(index) => (Some(&pattern[..index]), &pattern[index + 1..]),
        None => (None, pattern),
    };

    let dir_path = match given_dir {
        Some("") => "/".to_string(),
        Some(dir) => resolve_path(working_dir, dir),
        None => working_dir.to_string(),
    };

    let Some(dir) = host.file(&dir_path) else {
        return Vec::new();
    };
    if !dir.is_folder() {
        return Vec::new();
    }

    let mut found: Vec<String> = dir
        .files()
        .into_iter()
        .chain(dir.folders())
        .map(|entry| entry.name())
        .filter(|name| matches(file_pattern, name))
        .map(|name| match given_dir {
            Some(dir) => format!("{dir}/{name}"),
            None => name,
        })
        .collect();
    found.sort();
    found
}
