//! Types produced by the parser and consumed by the execution engine.

use crate::process::Process;

/// Shell operator separating pipelines or stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `&&`: run next only if previous succeeded
    And,
    /// `||`: run next only if previous failed
    Or,
    /// `;`: run next unconditionally
    Semi,
    /// `|`: pipe stdout
    Pipe,
    /// `|&`: pipe stdout+stderr
    PipeErr,
}

impl Operator {
    /// The operator's shell syntax.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Semi => ";",
            Operator::Pipe => "|",
            Operator::PipeErr => "|&",
        }
    }

    /// Recognise a standalone operator token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "&&" => Some(Operator::And),
            "||" => Some(Operator::Or),
            ";" => Some(Operator::Semi),
            "|" => Some(Operator::Pipe),
            "|&" => Some(Operator::PipeErr),
            _ => None,
        }
    }

    /// Whether this operator separates pipelines (as opposed to stages).
    pub fn is_list_separator(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Semi)
    }
}

/// How a pipeline was reached from the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Condition {
    /// First pipeline, or preceded by `;`.
    #[default]
    None,
    /// Preceded by `&&`: runs only if the previous exit code was zero.
    And,
    /// Preceded by `||`: runs only if the previous exit code was non-zero.
    Or,
}

/// A word moving through the expansion steps.
///
/// `original` marks text typed by the user. Text injected by expansion
/// (glob results) is never re-expanded or quote-stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub original: bool,
}

impl Token {
    pub fn original(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            original: true,
        }
    }

    pub fn injected(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            original: false,
        }
    }
}

/// One command invocation plus its resolved redirections.
#[derive(Debug, Clone)]
pub struct Stage {
    pub tokens: Vec<String>,
    pub process: Process,
    /// A redirection failed; the stage is skipped and reports `MISUSE`.
    pub invalid: bool,
}

impl Stage {
    pub fn new(process: Process) -> Self {
        Self {
            tokens: Vec::new(),
            process,
            invalid: false,
        }
    }
}

/// Stages bounded by `;`, `&&` or `||`.
///
/// `stages` is filled lazily from `tokens`, exactly once.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub id: u64,
    pub tokens: Vec<String>,
    pub condition: Condition,
    pub stages: Vec<Stage>,
    parsed: bool,
}

impl Pipeline {
    pub fn new(id: u64, tokens: Vec<String>, condition: Condition) -> Self {
        Self {
            id,
            tokens,
            condition,
            stages: Vec::new(),
            parsed: false,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    pub(crate) fn mark_parsed(&mut self) {
        self.parsed = true;
    }
}
