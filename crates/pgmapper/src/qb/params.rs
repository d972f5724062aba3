//! `:name` → `$n` substitution.
//!
//! Keys are visited longest first and each key takes the next placeholder
//! number only if it occurs in the text. Matching is delimiter-safe: an
//! occurrence of `:key` counts only when
//!
//! - the next character is not an identifier character (`:id` never matches
//!   inside `:identifier` or `:id2`),
//! - the colon is not part of a `::type` cast,
//! - it is outside string literals (`'...'`, `E'...'`, `$tag$...$tag$`),
//!   quoted identifiers and comments (`--`, nested `/* */`).

use crate::value::SqlValue;

/// Result of substituting named parameters into SQL text.
#[derive(Debug)]
pub(crate) struct Substituted {
    pub text: String,
    pub values: Vec<SqlValue>,
    /// Keys that were supplied but never referenced.
    pub unused: Vec<String>,
}

/// Replace every named parameter in `text`, numbering from `first_index`.
pub(crate) fn substitute(
    text: &str,
    params: &[(String, SqlValue)],
    first_index: usize,
) -> Substituted {
    let mut ordered: Vec<&(String, SqlValue)> = params.iter().collect();
    // stable: equal-length keys keep insertion order
    ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut text = text.to_string();
    let mut values = Vec::new();
    let mut unused = Vec::new();
    let mut index = first_index;

    for (key, value) in ordered {
        match replace_key(&text, key, &format!("${index}")) {
            Some(replaced) => {
                text = replaced;
                values.push(value.clone());
                index += 1;
            }
            None => unused.push(key.clone()),
        }
    }

    Substituted {
        text,
        values,
        unused,
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Lexical context of the byte under the cursor.
#[derive(Debug, Clone, PartialEq)]
enum State {
    Normal,
    /// `'...'`; `escapes` is set for `E'...'` strings, where `\` escapes.
    Quoted { escapes: bool },
    DoubleQuoted,
    LineComment,
    /// Block comments nest in Postgres.
    BlockComment(usize),
    DollarQuoted(String),
}

/// Replace each safe occurrence of `:key`; `None` if nothing matched.
fn replace_key(text: &str, key: &str, placeholder: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }

    let bytes = text.as_bytes();
    let token_len = key.len() + 1;
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut hits = 0;
    let mut state = State::Normal;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match &state {
            State::Normal => match b {
                b'\'' => {
                    state = State::Quoted {
                        escapes: is_escape_string_start(bytes, i),
                    }
                }
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    i += 1;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    i += 1;
                }
                b'$' => {
                    if let Some(tag) = dollar_tag_at(bytes, i) {
                        i += tag.len() + 1;
                        state = State::DollarQuoted(tag);
                    }
                }
                b':' if text[i + 1..].starts_with(key)
                    && (i == 0 || bytes[i - 1] != b':')
                    && bytes.get(i + token_len).is_none_or(|b| !is_ident_byte(*b)) =>
                {
                    out.push_str(&text[copied..i]);
                    out.push_str(placeholder);
                    i += token_len;
                    copied = i;
                    hits += 1;
                    continue;
                }
                _ => {}
            },
            State::Quoted { escapes } => match b {
                b'\\' if *escapes => i += 1,
                b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 1,
                b'\'' => state = State::Normal,
                _ => {}
            },
            State::DoubleQuoted => match b {
                b'"' if bytes.get(i + 1) == Some(&b'"') => i += 1,
                b'"' => state = State::Normal,
                _ => {}
            },
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                let depth = *depth;
                if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    i += 1;
                } else if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    i += 1;
                }
            }
            State::DollarQuoted(tag) => {
                if b == b'$' && closes_dollar_quote(bytes, i, tag) {
                    i += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        i += 1;
    }

    if hits == 0 {
        return None;
    }
    out.push_str(&text[copied..]);
    Some(out)
}

/// `'` at `quote` opens an `E'...'` string: preceded by a standalone `E`/`e`.
fn is_escape_string_start(bytes: &[u8], quote: usize) -> bool {
    quote >= 1
        && matches!(bytes[quote - 1], b'E' | b'e')
        && (quote == 1 || !is_ident_byte(bytes[quote - 2]))
}

/// Tag of a `$tag$` opener at `start` (empty for `$$`).
///
/// Tags never start with a digit, so positional `$1` placeholders are not
/// mistaken for quotes.
fn dollar_tag_at(bytes: &[u8], start: usize) -> Option<String> {
    if start > 0 && is_ident_byte(bytes[start - 1]) {
        return None;
    }
    let rest = bytes.get(start + 1..)?;
    if rest.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let len = rest.iter().take_while(|b| is_ident_byte(**b)).count();
    if rest.get(len) != Some(&b'$') {
        return None;
    }
    std::str::from_utf8(&rest[..len]).ok().map(str::to_string)
}

fn closes_dollar_quote(bytes: &[u8], start: usize, tag: &str) -> bool {
    let end = start + tag.len() + 1;
    bytes.get(start + 1..end) == Some(tag.as_bytes()) && bytes.get(end) == Some(&b'$')
}
