//! Option schema and the option extraction algorithm.

use std::collections::BTreeMap;

/// What an option accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Number,
    #[default]
    Boolean,
}

/// One declared option of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    /// Canonical name parsed values are stored under.
    pub name: String,
    /// One or two spellings, e.g. `-n` and `--count`.
    pub flags: Vec<String>,
    pub description: String,
    pub kind: OptionKind,
    /// Presence lifts the required argument count check.
    pub override_args: bool,
}

impl OptionSpec {
    fn with_kind(name: &str, flags: &[&str], description: &str, kind: OptionKind) -> Self {
        Self {
            name: name.to_string(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
            description: description.to_string(),
            kind,
            override_args: false,
        }
    }

    /// A boolean switch.
    pub fn flag(name: &str, flags: &[&str], description: &str) -> Self {
        Self::with_kind(name, flags, description, OptionKind::Boolean)
    }

    /// An option taking a string value.
    pub fn value(name: &str, flags: &[&str], description: &str) -> Self {
        Self::with_kind(name, flags, description, OptionKind::String)
    }

    /// An option taking an integer value (negative numbers allowed).
    pub fn number(name: &str, flags: &[&str], description: &str) -> Self {
        Self::with_kind(name, flags, description, OptionKind::Number)
    }

    pub fn overrides_args(mut self) -> Self {
        self.override_args = true;
        self
    }

    pub fn takes_value(&self) -> bool {
        self.kind != OptionKind::Boolean
    }

    pub fn matches(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// A parsed option occurrence, typed at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Str(String),
    Number(i64),
    Flag,
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            OptionValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Options found on a command line, keyed by canonical name.
///
/// Every occurrence is kept, in command-line order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedOptions {
    values: BTreeMap<String, Vec<OptionValue>>,
    /// Set when any matched option carries `override_args`.
    pub override_args: bool,
}

impl ParsedOptions {
    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn values(&self, name: &str) -> &[OptionValue] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values(name).iter().find_map(OptionValue::as_str)
    }

    /// Every string value given for `name`.
    pub fn strs(&self, name: &str) -> Vec<&str> {
        self.values(name).iter().filter_map(OptionValue::as_str).collect()
    }

    pub fn number(&self, name: &str) -> Option<i64> {
        self.values(name).iter().find_map(OptionValue::as_number)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert(&mut self, name: &str, value: OptionValue) {
        self.values.entry(name.to_string()).or_default().push(value);
    }
}

fn find<'a>(options: &'a [OptionSpec], flag: &str) -> Option<&'a OptionSpec> {
    options.iter().find(|option| option.matches(flag))
}

/// Pull declared options out of `args`, leaving only positionals.
///
/// Only tokens before a literal `--` are considered, and the `--` itself is
/// removed. Tokens are examined right to left so that a value-taking option
/// looks at its neighbour before that neighbour is removed. Combined short
/// flags (`-abc`) are expanded; unknown characters in a cluster are ignored,
/// and a cluster with no known flag is left as a positional.
///
/// Returns an error message for a value-taking option without a value, or a
/// numeric option with a non-numeric value.
pub fn extract_options(options: &[OptionSpec], args: &mut Vec<String>) -> Result<ParsedOptions, String> {
    let mut end = match args.iter().position(|arg| arg == "--") {
        Some(index) => {
            args.remove(index);
            index
        }
        None => args.len(),
    };

    // Collected right to left, reversed at the end.
    let mut found: Vec<(String, OptionValue)> = Vec::new();
    let mut override_args = false;

    let mut i = end;
    while i > 0 {
        i -= 1;
        let arg = args[i].clone();
        if !arg.starts_with('-') || arg == "-" {
            continue;
        }

        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (arg.as_str(), None),
        };

        if let Some(option) = find(options, flag) {
            override_args |= option.override_args;

            let value = if option.takes_value() {
                let raw = match inline {
                    // `--flag=` names an empty value, never the next token.
                    Some(value) => Some(value.to_string()).filter(|value| !value.is_empty()),
                    None if i + 1 < end => {
                        let next = &args[i + 1];
                        let numeric = next.parse::<i64>().is_ok();
                        if !next.starts_with('-') || (numeric && option.kind == OptionKind::Number) {
                            end -= 1;
                            Some(args.remove(i + 1))
                        } else {
                            None
                        }
                    }
                    None => None,
                };

                let Some(raw) = raw else {
                    return Err(format!("Option requires an argument: {arg}"));
                };

                match option.kind {
                    OptionKind::Number => match raw.parse::<i64>() {
                        Ok(n) => OptionValue::Number(n),
                        Err(_) => return Err(format!("Option {flag} expects a number, got: {raw}")),
                    },
                    _ => OptionValue::Str(raw),
                }
            } else {
                OptionValue::Flag
            };

            found.push((option.name.clone(), value));
            args.remove(i);
            end -= 1;
            continue;
        }

        if flag.starts_with("--") {
            continue;
        }

        let mut matched = false;
        for c in flag.chars().skip(1) {
            if let Some(option) = find(options, &format!("-{c}")) {
                override_args |= option.override_args;
                found.push((option.name.clone(), OptionValue::Flag));
                matched = true;
            }
        }
        if matched {
            args.remove(i);
            end -= 1;
        }
    }

    let mut parsed = ParsedOptions {
        override_args,
        ..ParsedOptions::default()
    };
    for (name, value) in found.into_iter().rev() {
        parsed.insert(&name, value);
    }
    Ok(parsed)
}
