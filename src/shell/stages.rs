//! Splitting a pipeline into stages and wiring their redirections.

use std::collections::BTreeSet;

use super::Shell;
use crate::parse::expand::expand_variables;
use crate::parse::{Pipeline, Redirect, Stage, classify};
use crate::process::{Mode, Process, STDERR, STDIN, STDOUT};

impl Shell {
    /// Fill `pipeline.stages` from its tokens. Runs once per pipeline; later
    /// calls are no-ops.
    ///
    /// A stage whose redirection cannot be set up is marked invalid but kept
    /// in place.
    pub fn parse_pipeline_stages(&mut self, pipeline: &mut Pipeline) {
        if pipeline.is_parsed() || pipeline.tokens.is_empty() {
            return;
        }
        pipeline.mark_parsed();

        let tokens = self.expand_aliases(pipeline.tokens.clone());
        let mut stage = Stage::new(self.spawn());
        let mut iter = tokens.into_iter();

        while let Some(token) = iter.next() {
            let Some(redirect) = classify(&token) else {
                stage.tokens.push(token);
                continue;
            };

            let operand = if redirect.takes_operand() {
                match iter.next() {
                    Some(operand) => Some(operand),
                    None => {
                        stage.tokens.push(token);
                        continue;
                    }
                }
            } else {
                None
            };

            match redirect {
                Redirect::Pipe | Redirect::PipeErr => {
                    if stage.tokens.is_empty() {
                        stage.tokens.push(token);
                        continue;
                    }
                    let next = self.connect(&mut stage, redirect == Redirect::PipeErr);
                    pipeline.stages.push(std::mem::replace(&mut stage, next));
                }
                Redirect::Heredoc { delimiter } => {
                    let Some(delimiter) = delimiter.or(operand) else {
                        continue;
                    };
                    self.read_heredoc(&mut stage.process, &delimiter);
                }
                redirect => {
                    let target = match &redirect {
                        Redirect::Both { target } => target.clone().or(operand),
                        _ => operand,
                    };
                    if !apply_redirect(&mut stage.process, &redirect, target.as_deref()) {
                        stage.invalid = true;
                    }
                }
            }
        }

        if !stage.tokens.is_empty() || stage.invalid || pipeline.stages.is_empty() {
            pipeline.stages.push(stage);
        }
        log::debug!(
            "pipeline {} parsed into {} stage(s)",
            pipeline.id,
            pipeline.stages.len()
        );
    }

    /// Replace the first token with its alias value until it no longer names
    /// an alias, expanding each alias at most once.
    fn expand_aliases(&self, mut tokens: Vec<String>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        while let Some(first) = tokens.first() {
            let Some(value) = self.alias(first) else {
                break;
            };
            if !seen.insert(first.clone()) {
                break;
            }
            let mut expanded = self.expand_words(value);
            expanded.extend(tokens.drain(1..));
            tokens = expanded;
        }
        tokens
    }

    /// Pipe `stage`'s stdout (and stderr with `with_stderr`) into a new
    /// stage, which is returned.
    fn connect(&mut self, stage: &mut Stage, with_stderr: bool) -> Stage {
        let process = &mut stage.process;
        let pipe = process.pipe();
        if process.dup(pipe, Some(STDOUT)).is_none() {
            stage.invalid = true;
        }
        if with_stderr && process.dup(STDOUT, Some(STDERR)).is_none() {
            stage.invalid = true;
        }

        let mut next = Stage::new(self.spawn());
        if let Some(stream) = stage.process.stream(STDOUT) {
            next.process.set_stream(STDIN, stream);
        }
        next
    }

    /// Collect lines until `delimiter` into a fresh stream on fd 0.
    fn read_heredoc(&self, process: &mut Process, delimiter: &str) {
        let fd = process.pipe();
        while let Some(line) = self.read_continuation() {
            if line == delimiter {
                break;
            }
            process.write(fd, &expand_variables(&line, self.env()));
        }
        process.dup(fd, Some(STDIN));
    }
}

/// Apply one file or descriptor redirection. `false` means it failed and
/// the diagnostic is already on the process's stderr.
fn apply_redirect(process: &mut Process, redirect: &Redirect, target: Option<&str>) -> bool {
    match (redirect, target) {
        (Redirect::Dup { fd, source }, _) => process.dup(*source, Some(*fd)).is_some(),
        (Redirect::Both { .. }, Some(path)) => {
            let Some(file) = process.open(path, Mode::Write, false) else {
                return false;
            };
            process.flush(file);
            process.dup(file, Some(STDOUT)).is_some() && process.dup(file, Some(STDERR)).is_some()
        }
        (Redirect::Append { fd }, Some(path)) => match process.open(path, Mode::ReadWrite, false) {
            Some(file) => process.dup(file, Some(*fd)).is_some(),
            None => false,
        },
        (Redirect::Truncate { fd }, Some(path)) => match process.open(path, Mode::Write, false) {
            Some(file) => {
                process.flush(file);
                process.dup(file, Some(*fd)).is_some()
            }
            None => false,
        },
        (Redirect::Input, Some(path)) => match process.open(path, Mode::Read, false) {
            Some(file) => process.dup(file, Some(STDIN)).is_some(),
            None => false,
        },
        _ => false,
    }
}
