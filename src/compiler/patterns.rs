//! Lexical rules shared by the tokenizer, the path compiler and the scanner
//!
//! Every `*_len` function measures how many bytes at the start of its input
//! belong to the construct, returning `None` (or 0) when it does not match.
//! All rules are ASCII-only, so returned lengths always land on char
//! boundaries.

/// `[a-zA-Z0-9_]`
pub fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// `[a-zA-Z0-9_]*`
pub fn word_len(s: &str) -> usize {
    s.bytes().take_while(|b| is_word_byte(*b)).count()
}

/// `[0-9]*`
pub fn digits_len(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

/// A single or double quoted string with backslash escapes
pub fn quoted_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let quote = *bytes.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// `.name` where the name starts with a letter or underscore
pub fn selector_len(s: &str) -> Option<usize> {
    let rest = s.strip_prefix('.')?;
    let first = *rest.as_bytes().first()?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    Some(1 + word_len(rest))
}

/// `[123]`, `["key"]` or `['key']`
pub fn bracket_len(s: &str) -> Option<usize> {
    let rest = s.strip_prefix('[')?;
    let inner = match digits_len(rest) {
        0 => quoted_len(rest)?,
        n => n,
    };
    rest[inner..].starts_with(']').then_some(inner + 2)
}

/// Any run of selectors and brackets following a variable base
pub fn path_steps_len(s: &str) -> usize {
    let mut len = 0;
    while let Some(step) = selector_len(&s[len..]).or_else(|| bracket_len(&s[len..])) {
        len += step;
    }
    len
}

/// `%name` followed by any steps
pub fn path_len(s: &str) -> Option<usize> {
    let rest = s.strip_prefix('%')?;
    let base = word_len(rest);
    if base == 0 {
        return None;
    }
    Some(1 + base + path_steps_len(&rest[base..]))
}

/// `x1f` after a leading `0`
pub fn hex_tail_len(s: &str) -> Option<usize> {
    let rest = s.strip_prefix('x').or_else(|| s.strip_prefix('X'))?;
    let digits = rest.bytes().take_while(u8::is_ascii_hexdigit).count();
    (digits > 0).then_some(1 + digits)
}

/// `.25` after an integer part
pub fn fraction_len(s: &str) -> Option<usize> {
    let rest = s.strip_prefix('.')?;
    match digits_len(rest) {
        0 => None,
        n => Some(1 + n),
    }
}

/// Strip the quotes from a quoted string and resolve its escapes
pub fn unquote(literal: &str) -> String {
    let mut chars = literal.chars();
    let quote = chars.next();
    let body = chars.as_str();
    let body = body.strip_suffix(|c| Some(c) == quote).unwrap_or(body);

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') if quote == Some('"') => out.push('\n'),
            Some('t') if quote == Some('"') => out.push('\t'),
            Some('r') if quote == Some('"') => out.push('\r'),
            Some(c) if Some(c) == quote || c == '\\' => out.push(c),
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => out.push('\\'),
        }
    }
    out
}
