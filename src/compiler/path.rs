//! Compiles `%name.selector[index]` text into a [`VariablePath`]

use super::ast::{Index, Step, VariablePath};
use super::patterns;

/// Measure and compile the variable path at the start of `s`
///
/// Returns the path and the number of bytes it spans, or `None` when `s`
/// does not start with `%name`.
pub fn parse_prefix(s: &str) -> Option<(VariablePath, usize)> {
    let len = patterns::path_len(s)?;
    let path = compile(&s[..len])?;
    Some((path, len))
}

/// Compile a complete path; the whole input must be consumed
pub fn compile(text: &str) -> Option<VariablePath> {
    let rest = text.strip_prefix('%')?;
    let base_len = patterns::word_len(rest);
    if base_len == 0 {
        return None;
    }
    let mut path = VariablePath::new(&rest[..base_len]);
    let mut rest = &rest[base_len..];

    while !rest.is_empty() {
        if let Some(len) = patterns::selector_len(rest) {
            path.steps.push(Step::Key(rest[1..len].to_string()));
            rest = &rest[len..];
        } else if let Some(len) = patterns::bracket_len(rest) {
            path.steps.push(Step::Index(index(&rest[1..len - 1])));
            rest = &rest[len..];
        } else {
            return None;
        }
    }
    Some(path)
}

fn index(inner: &str) -> Index {
    if inner.starts_with(['"', '\'']) {
        return Index::Str(patterns::unquote(inner));
    }
    // too large for i64 can never address anything; keep it as a key
    match inner.parse::<i64>() {
        Ok(i) => Index::Int(i),
        Err(_) => Index::Str(inner.to_string()),
    }
}
