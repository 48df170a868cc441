//! Splitting token lists into pipelines and classifying redirection words.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Condition, Operator, Pipeline};
use crate::process::{Fd, STDOUT};

/// Split tokens at top-level `;`, `&&` and `||`.
///
/// The operator before a pipeline becomes its condition. Empty segments
/// (`a ;; b`, a trailing `;`) produce no pipeline. `next_id` supplies ids.
pub fn parse_pipelines(tokens: &[String], next_id: &mut u64) -> Vec<Pipeline> {
    let mut pipelines = Vec::new();
    let mut condition = Condition::None;
    let mut current: Vec<String> = Vec::new();

    let mut push = |current: &mut Vec<String>, condition: Condition| {
        if current.is_empty() {
            return;
        }
        *next_id += 1;
        pipelines.push(Pipeline::new(*next_id, std::mem::take(current), condition));
    };

    for token in tokens {
        match Operator::from_token(token) {
            Some(op) if op.is_list_separator() => {
                push(&mut current, condition);
                condition = match op {
                    Operator::And => Condition::And,
                    Operator::Or => Condition::Or,
                    _ => Condition::None,
                };
            }
            _ => current.push(token.clone()),
        }
    }
    push(&mut current, condition);

    pipelines
}

/// A token with stage-level meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// `>&file`, `&>file`, or `>&`/`&>` with the file in the next token.
    Both { target: Option<String> },
    /// `N>&M`: make `fd` an alias of `source`.
    Dup { fd: Fd, source: Fd },
    /// `N>>` followed by a file.
    Append { fd: Fd },
    /// `N>` followed by a file.
    Truncate { fd: Fd },
    /// `<<DELIM`, or `<<` with the delimiter in the next token.
    Heredoc { delimiter: Option<String> },
    /// `<` followed by a file.
    Input,
    Pipe,
    PipeErr,
}

impl Redirect {
    /// Whether this form consumes the following token.
    pub fn takes_operand(&self) -> bool {
        match self {
            Redirect::Both { target } => target.is_none(),
            Redirect::Heredoc { delimiter } => delimiter.is_none(),
            Redirect::Append { .. } | Redirect::Truncate { .. } | Redirect::Input => true,
            Redirect::Dup { .. } | Redirect::Pipe | Redirect::PipeErr => false,
        }
    }
}

static DUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d)?>&(\d)$").expect("valid regex"));
static APPEND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d)?>>$").expect("valid regex"));
static TRUNCATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d)?>$").expect("valid regex"));
static BOTH_INLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:>&|&>)(\S+)$").expect("valid regex"));
static HEREDOC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^<<(\S*)$").expect("valid regex"));

fn fd_or(caps: &regex::Captures<'_>, group: usize, default: Fd) -> Fd {
    caps.get(group)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(default)
}

/// Classify a stage token. `None` means an ordinary argument.
pub fn classify(token: &str) -> Option<Redirect> {
    match token {
        "|" => return Some(Redirect::Pipe),
        "|&" => return Some(Redirect::PipeErr),
        "<" => return Some(Redirect::Input),
        ">&" | "&>" => return Some(Redirect::Both { target: None }),
        _ => {}
    }

    if let Some(caps) = DUP.captures(token) {
        return Some(Redirect::Dup {
            fd: fd_or(&caps, 1, STDOUT),
            source: fd_or(&caps, 2, STDOUT),
        });
    }
    if let Some(caps) = BOTH_INLINE.captures(token) {
        return Some(Redirect::Both {
            target: Some(caps[1].to_string()),
        });
    }
    if let Some(caps) = APPEND.captures(token) {
        return Some(Redirect::Append {
            fd: fd_or(&caps, 1, STDOUT),
        });
    }
    if let Some(caps) = TRUNCATE.captures(token) {
        return Some(Redirect::Truncate {
            fd: fd_or(&caps, 1, STDOUT),
        });
    }
    if let Some(caps) = HEREDOC.captures(token) {
        let delimiter = Some(caps[1].to_string()).filter(|d| !d.is_empty());
        return Some(Redirect::Heredoc { delimiter });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn shape(pipelines: &[Pipeline]) -> Vec<(Vec<String>, Condition)> {
        pipelines
            .iter()
            .map(|p| (p.tokens.clone(), p.condition))
            .collect()
    }

    #[test]
    fn single_pipeline() {
        let mut id = 0;
        let p = parse_pipelines(&words("echo hi | cat"), &mut id);
        assert_eq!(shape(&p), vec![(words("echo hi | cat"), Condition::None)]);
    }

    #[test]
    fn conditions_describe_how_we_got_here() {
        let mut id = 0;
        let p = parse_pipelines(&words("a && b || c"), &mut id);
        assert_eq!(
            shape(&p),
            vec![
                (words("a"), Condition::None),
                (words("b"), Condition::And),
                (words("c"), Condition::Or),
            ]
        );
    }

    #[test]
    fn semicolon_resets_condition() {
        let mut id = 0;
        let p = parse_pipelines(&words("a && b ; c"), &mut id);
        assert_eq!(p[2].condition, Condition::None);
    }

    #[test]
    fn trailing_and_empty_segments_dropped() {
        let mut id = 0;
        let p = parse_pipelines(&words("a ; ; b ;"), &mut id);
        assert_eq!(shape(&p), vec![(words("a"), Condition::None), (words("b"), Condition::None)]);
    }

    #[test]
    fn ids_keep_counting() {
        let mut id = 10;
        let p = parse_pipelines(&words("a ; b"), &mut id);
        assert_eq!(p.iter().map(|p| p.id).collect::<Vec<_>>(), vec![11, 12]);
        assert_eq!(id, 12);
    }

    #[test]
    fn empty_input() {
        let mut id = 0;
        assert!(parse_pipelines(&[], &mut id).is_empty());
    }

    #[test]
    fn classify_dup() {
        assert_eq!(classify("2>&1"), Some(Redirect::Dup { fd: 2, source: 1 }));
        assert_eq!(classify(">&2"), Some(Redirect::Dup { fd: 1, source: 2 }));
    }

    #[test]
    fn classify_both() {
        assert_eq!(
            classify(">&out.log"),
            Some(Redirect::Both { target: Some("out.log".into()) })
        );
        assert_eq!(
            classify("&>out.log"),
            Some(Redirect::Both { target: Some("out.log".into()) })
        );
        assert_eq!(classify("&>"), Some(Redirect::Both { target: None }));
    }

    #[test]
    fn classify_files() {
        assert_eq!(classify(">"), Some(Redirect::Truncate { fd: 1 }));
        assert_eq!(classify("2>"), Some(Redirect::Truncate { fd: 2 }));
        assert_eq!(classify(">>"), Some(Redirect::Append { fd: 1 }));
        assert_eq!(classify("2>>"), Some(Redirect::Append { fd: 2 }));
        assert_eq!(classify("<"), Some(Redirect::Input));
    }

    #[test]
    fn classify_heredoc() {
        assert_eq!(classify("<<"), Some(Redirect::Heredoc { delimiter: None }));
        assert_eq!(
            classify("<<EOF"),
            Some(Redirect::Heredoc { delimiter: Some("EOF".into()) })
        );
    }

    #[test]
    fn classify_plain_words() {
        assert_eq!(classify("file>"), None);
        assert_eq!(classify("-n"), None);
        assert_eq!(classify("a|b"), None);
    }

    #[test]
    fn operand_consumption() {
        assert!(Redirect::Truncate { fd: 1 }.takes_operand());
        assert!(!Redirect::Dup { fd: 2, source: 1 }.takes_operand());
        assert!(!Redirect::Both { target: Some("f".into()) }.takes_operand());
    }
}
