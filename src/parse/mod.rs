//! Turning an input line into pipelines: scanning, expansion and splitting.

pub mod expand;
pub mod glob;
pub mod pipeline;
pub mod tokenize;
pub mod types;

pub use pipeline::{Redirect, classify, parse_pipelines};
pub use tokenize::{Expansion, scan, substitute_history, tokenize};
pub use types::{Condition, Operator, Pipeline, Stage, Token};
