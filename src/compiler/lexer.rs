//! Tokenizer for tag bodies using logos
//!
//! The right delimiter is configurable, so it is matched outside of logos:
//! [`TagLexer`] checks for it before asking logos for the next token.

use logos::{Lexer, Logos};

use super::patterns;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"%[a-zA-Z0-9_]+", path_tail)]
    Var,

    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r#"'([^'\\]|\\.)*'"#)]
    Str,

    #[regex(r"-?[0-9]+", number_tail)]
    #[regex(r"\.[0-9]+")]
    Number,

    #[token("true")]
    #[token("false")]
    Bool,

    // Longer operators first for readability; logos picks the longest match
    #[token("===")]
    #[token("!==")]
    #[token("==")]
    #[token("!=")]
    #[token("<>")]
    #[token("<<")]
    #[token(">>")]
    #[token("<=")]
    #[token(">=")]
    #[token("&&")]
    #[token("||")]
    #[token(",")]
    #[token("^")]
    #[token("|")]
    #[token("&")]
    #[token("<")]
    #[token(">")]
    #[token("%")]
    #[token("+")]
    #[token("-")]
    #[token("/")]
    #[token("*")]
    BinaryOp,

    #[token("~")]
    #[token("!")]
    #[token("@")]
    UnaryOp,

    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,

    #[token("=")]
    Assign,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

/// Extend `%name` over its selector and bracket steps
fn path_tail(lex: &mut Lexer<RawToken>) -> bool {
    let steps = patterns::path_steps_len(lex.remainder());
    lex.bump(steps);
    true
}

/// Extend an integer over a hex body (`0x1f`) or a fraction (`1.5`)
fn number_tail(lex: &mut Lexer<RawToken>) -> bool {
    let digits = lex.slice().trim_start_matches('-');
    let rest = lex.remainder();
    let tail = if digits == "0" {
        patterns::hex_tail_len(rest).or_else(|| patterns::fraction_len(rest))
    } else {
        patterns::fraction_len(rest)
    };
    if let Some(n) = tail {
        lex.bump(n);
    }
    true
}

/// Classification of a tag-body token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A `%name...` variable path
    Var,
    StringLit,
    NumberLit,
    BoolLit,
    BinaryOp,
    UnaryOp,
    ParenOpen,
    ParenClose,
    /// A bare word; a candidate function name
    Identifier,
    /// A single `=`
    Assign,
    RightDelimiter,
    /// Anything else, up to the next whitespace
    Other,
}

impl TokenKind {
    /// Variables and literals
    pub fn is_operand(self) -> bool {
        matches!(
            self,
            TokenKind::Var | TokenKind::StringLit | TokenKind::NumberLit | TokenKind::BoolLit
        )
    }
}

impl From<RawToken> for TokenKind {
    fn from(raw: RawToken) -> Self {
        match raw {
            RawToken::Var => TokenKind::Var,
            RawToken::Str => TokenKind::StringLit,
            RawToken::Number => TokenKind::NumberLit,
            RawToken::Bool => TokenKind::BoolLit,
            RawToken::BinaryOp => TokenKind::BinaryOp,
            RawToken::UnaryOp => TokenKind::UnaryOp,
            RawToken::ParenOpen => TokenKind::ParenOpen,
            RawToken::ParenClose => TokenKind::ParenClose,
            RawToken::Assign => TokenKind::Assign,
            RawToken::Ident => TokenKind::Identifier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    /// Byte offset in the template
    pub offset: usize,
}

/// Iterates the tokens of a tag body, stopping after the right delimiter
pub struct TagLexer<'s> {
    source: &'s str,
    right: &'s str,
    pos: usize,
    done: bool,
}

impl<'s> TagLexer<'s> {
    pub fn new(source: &'s str, start: usize, right_delimiter: &'s str) -> Self {
        Self {
            source,
            right: right_delimiter,
            pos: start,
            done: false,
        }
    }

    /// Byte offset just past the last token produced
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'s> Iterator for TagLexer<'s> {
    type Item = Token<'s>;

    fn next(&mut self) -> Option<Token<'s>> {
        if self.done {
            return None;
        }
        let rest = &self.source[self.pos..];
        let start = self.pos + (rest.len() - rest.trim_start().len());
        let rest = &self.source[start..];
        if rest.is_empty() {
            self.pos = start;
            self.done = true;
            return None;
        }

        let (kind, len) = if rest.starts_with(self.right) {
            self.done = true;
            (TokenKind::RightDelimiter, self.right.len())
        } else {
            let mut lex = RawToken::lexer(rest);
            match lex.next() {
                Some(Ok(raw)) => (raw.into(), lex.span().end),
                _ => (TokenKind::Other, other_len(rest, self.right)),
            }
        };

        self.pos = start + len;
        Some(Token {
            kind,
            text: &self.source[start..start + len],
            offset: start,
        })
    }
}

/// A run of non-whitespace that stops before the right delimiter
fn other_len(s: &str, right: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        if c.is_whitespace() || (i > 0 && s[i..].starts_with(right)) {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}
