//! Word expansions applied to tokens after scanning: tilde, parameters and
//! quote removal. Filename globbing lives in [`super::glob`].

use std::collections::BTreeMap;

/// Replace a leading `~` with `home`.
pub fn expand_tilde(word: &str, home: &str) -> String {
    shellexpand::tilde_with_context(word, || Some(home)).into_owned()
}

/// Expand `$NAME`, `${NAME}` and `$?` from `env`, ignoring quoting.
///
/// Used for heredoc bodies. `\$` yields a literal `$`; unknown names are
/// left untouched.
pub fn expand_variables(input: &str, env: &BTreeMap<String, String>) -> String {
    expand(input, env, false)
}

/// Like [`expand_variables`], but nothing inside single quotes is expanded.
pub fn expand_parameters(word: &str, env: &BTreeMap<String, String>) -> String {
    expand(word, env, true)
}

fn expand(input: &str, env: &BTreeMap<String, String>, respect_quotes: bool) -> String {
    if !input.contains('$') {
        return input.to_string();
    }

    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let (mut sq, mut dq) = (false, false);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' if respect_quotes && !dq => {
                sq = !sq;
                out.push(c);
                i += 1;
            }
            '"' if respect_quotes && !sq => {
                dq = !dq;
                out.push(c);
                i += 1;
            }
            '\\' if !sq && chars.get(i + 1) == Some(&'$') => {
                out.push('$');
                i += 2;
            }
            '$' if !sq => match variable_at(&chars[i + 1..]) {
                Some((name, len)) => {
                    match env.get(&name) {
                        Some(value) => out.push_str(value),
                        None => out.extend(&chars[i..=i + len]),
                    }
                    i += 1 + len;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Variable name following a `$`, and how many chars it spans.
fn variable_at(rest: &[char]) -> Option<(String, usize)> {
    match rest.first()? {
        '{' => {
            let close = rest.iter().position(|c| *c == '}')?;
            if close == 1 {
                return None;
            }
            Some((rest[1..close].iter().collect(), close + 1))
        }
        '?' => Some(("?".into(), 1)),
        c if is_name_char(*c) => {
            let len = rest.iter().take_while(|c| is_name_char(**c)).count();
            Some((rest[..len].iter().collect(), len))
        }
        _ => None,
    }
}

/// Whether the word contains quoting (which disables globbing).
pub fn is_quoted(word: &str) -> bool {
    word.contains(['"', '\''])
}

/// Strip every matched pair of quotes, keeping what they enclose.
pub fn remove_quotes(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut quote: Option<char> = None;

    for c in word.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => out.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None => out.push(c),
        }
    }

    out
}
