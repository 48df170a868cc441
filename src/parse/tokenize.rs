//! Input line scanning and the ordered expansion steps.

use std::collections::BTreeMap;

use super::types::Token;
use super::{expand, glob};
use crate::host::Host;

/// What the expansion steps need to know about the shell.
pub struct Expansion<'a> {
    pub env: &'a BTreeMap<String, String>,
    pub host: &'a Host,
}

/// Replace the first `!!` with the last history entry, if both exist.
pub fn substitute_history(input: &str, last: Option<&str>) -> Option<String> {
    match last {
        Some(last) if input.contains("!!") => Some(input.replacen("!!", last, 1)),
        _ => None,
    }
}

/// Split a line into raw words and the list operators `&&`, `||` and `;`.
///
/// Quotes are kept in the words; inside them everything is literal.
pub fn scan(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    let flush = |buf: &mut String, tokens: &mut Vec<String>| {
        if !buf.is_empty() {
            tokens.push(std::mem::take(buf));
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            buf.push(c);
            i += 1;
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
            buf.push(c);
            i += 1;
            continue;
        }

        let pair = (c, chars.get(i + 1).copied());
        match pair {
            (c, _) if c.is_whitespace() => flush(&mut buf, &mut tokens),
            ('&', Some('&')) | ('|', Some('|')) => {
                flush(&mut buf, &mut tokens);
                tokens.push(format!("{c}{c}"));
                i += 1;
            }
            (';', _) => {
                flush(&mut buf, &mut tokens);
                tokens.push(";".into());
            }
            _ => buf.push(c),
        }
        i += 1;
    }
    flush(&mut buf, &mut tokens);

    tokens
}

/// Scan `input` and run every expansion step over the words.
pub fn tokenize(input: &str, expansion: &Expansion<'_>) -> Vec<String> {
    let input = input.trim();
    if input.is_empty() {
        return Vec::new();
    }

    let mut tokens: Vec<Token> = scan(input).into_iter().map(Token::original).collect();
    expand_tokens(&mut tokens, expansion);
    log::trace!("tokenized {input:?} into {} token(s)", tokens.len());
    tokens.into_iter().map(|token| token.value).collect()
}

/// Tilde, parameter, filename expansion and quote removal, in that order.
///
/// Brace expansion, arithmetic expansion and word splitting are not
/// performed; words are already split by [`scan`].
pub fn expand_tokens(tokens: &mut Vec<Token>, expansion: &Expansion<'_>) {
    let home = expansion.host.home_dir();
    for token in tokens.iter_mut() {
        token.value = expand::expand_tilde(&token.value, &home);
        token.value = expand::expand_parameters(&token.value, expansion.env);
    }

    expand_filenames(tokens, expansion.host);

    for token in tokens.iter_mut().filter(|token| token.original) {
        token.value = expand::remove_quotes(&token.value);
    }
}

fn expand_filenames(tokens: &mut Vec<Token>, host: &Host) {
    let working_dir = host.working_dir();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if !token.original || expand::is_quoted(&token.value) || !glob::has_glob_chars(&token.value) {
            i += 1;
            continue;
        }

        let found = glob::expand(&token.value, host, &working_dir);
        if found.is_empty() {
            i += 1;
            continue;
        }

        let count = found.len();
        tokens.splice(i..=i, found.into_iter().map(Token::injected));
        i += count;
    }
}
