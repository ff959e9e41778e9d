//! Validation of `if`/`elseif` conditions
//!
//! Conditions use a flat grammar: operands joined by binary operators, with
//! optional unary prefixes, parentheses and calls to whitelisted functions.
//! Validation is a state machine over the set of token classes allowed next.
//! An accepted condition is folded into an [`Expr`] strictly left to right;
//! there is no operator precedence.

use super::ast::{BinaryOp, Expr, Function, UnaryOp};
use super::lexer::{TagLexer, Token, TokenKind};
use super::{path, patterns};
use crate::error::{Diagnostic, Diagnostics, ErrorKind, Halt};
use crate::value::Value;

/// Token classes the state machine reasons about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Var,
    Func,
    BinaryOp,
    UnaryOp,
    ParenOpen,
    ParenClose,
}

impl Class {
    fn bit(self) -> u8 {
        match self {
            Class::Var => 1,
            Class::Func => 1 << 1,
            Class::BinaryOp => 1 << 2,
            Class::UnaryOp => 1 << 3,
            Class::ParenOpen => 1 << 4,
            Class::ParenClose => 1 << 5,
        }
    }
}

/// Deepest nesting of groups, calls and unary operators a condition may use
pub const MAX_NESTING: usize = 64;

/// Set of classes allowed as the next token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Allowed(u8);

impl Allowed {
    fn of(classes: &[Class]) -> Self {
        Self(classes.iter().fold(0, |bits, c| bits | c.bit()))
    }

    fn operand_start() -> Self {
        Self::of(&[Class::Var, Class::Func, Class::ParenOpen, Class::UnaryOp])
    }

    fn after_operand() -> Self {
        Self::of(&[Class::BinaryOp, Class::ParenClose])
    }

    fn contains(self, class: Class) -> bool {
        self.0 & class.bit() != 0
    }

    fn with(self, class: Class) -> Self {
        Self(self.0 | class.bit())
    }
}

/// A condition that passed validation
#[derive(Debug)]
pub struct Condition {
    pub expr: Expr,
    /// Offset just past the closing delimiter
    pub end: usize,
}

/// Tokenize and validate the condition starting at `start`
///
/// Returns `Ok(None)` when the condition has grammar errors; those are
/// recorded in `diags` and the tag is left for the scanner to treat as text.
pub(crate) fn compile_condition(
    source: &str,
    start: usize,
    right_delimiter: &str,
    diags: &mut Diagnostics,
) -> Result<Option<Condition>, Halt> {
    let mut lexer = TagLexer::new(source, start, right_delimiter);
    let mut tokens = Vec::new();
    let mut rdelim_found = false;
    let mut parens_open = 0usize;
    let mut parens_close = 0usize;

    for token in lexer.by_ref() {
        match token.kind {
            TokenKind::RightDelimiter => {
                rdelim_found = true;
                break;
            }
            TokenKind::ParenOpen => parens_open += 1,
            TokenKind::ParenClose => parens_close += 1,
            _ => {}
        }
        tokens.push(token);
    }
    let end = lexer.position();
    let body_end = tokens.last().map_or(start, |t| t.offset + t.text.len());

    if !rdelim_found {
        return Err(diags.halt(Diagnostic::new(
            ErrorKind::IfNoRightDelimiter,
            start,
            "",
            format!("No right delimiter found for if statement starting at position {start}"),
        )));
    }
    if tokens.is_empty() {
        return Err(diags.halt(Diagnostic::new(
            ErrorKind::IfNoArguments,
            start,
            "",
            format!("Error parsing if statement starting at position {start}"),
        )));
    }
    if parens_open != parens_close {
        return Err(diags.halt(Diagnostic::new(
            ErrorKind::IfUnbalancedParens,
            body_end,
            "",
            format!("Unbalanced parenthesis in if statement at position {body_end}"),
        )));
    }

    let errors_before = diags.error_count();
    validate(&mut tokens, diags);
    if diags.error_count() != errors_before {
        return Ok(None);
    }
    if let Some(token) = too_deep(&tokens) {
        diags.record(Diagnostic::new(
            ErrorKind::IfNestingTooDeep,
            token.offset,
            token.text,
            format!(
                "Expression nested deeper than {MAX_NESTING} levels at position {}",
                token.offset
            ),
        ));
        return Ok(None);
    }

    let mut builder = Builder {
        tokens: &tokens,
        pos: 0,
    };
    match builder.sequence() {
        Some(expr) if builder.pos == tokens.len() => Ok(Some(Condition { expr, end })),
        _ => {
            diags.record(Diagnostic::new(
                ErrorKind::IfUnknownExpression,
                start,
                "",
                format!("Unknown expression in if statement at position {start}"),
            ));
            Ok(None)
        }
    }
}

/// Run the allowed-next state machine, recording every violation
///
/// A single `=` where an operator may appear is rewritten to `==` in place.
fn validate(tokens: &mut [Token<'_>], diags: &mut Diagnostics) {
    let mut allowed = Allowed::operand_start();
    let mut parens_opened = 0usize;
    let mut void_parens_allowed = false;
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        let last = i + 1 == tokens.len();
        let at = token.offset;

        match token.kind {
            TokenKind::BinaryOp | TokenKind::UnaryOp => {
                let class = if token.kind == TokenKind::BinaryOp {
                    Class::BinaryOp
                } else {
                    Class::UnaryOp
                };
                if !allowed.contains(class) {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfOperatorNotAllowed,
                        at,
                        token.text,
                        format!("Operator \"{}\" not allowed at position {at}", token.text),
                    ));
                } else if last {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfMissingExpressionAfter,
                        at,
                        token.text,
                        format!("Missing expression after \"{}\" at position {at}", token.text),
                    ));
                }
                allowed = Allowed::operand_start();
            }
            kind if kind.is_operand() => {
                if !allowed.contains(Class::Var) {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfVarNotAllowed,
                        at,
                        token.text,
                        format!("Variable not allowed at position {at}"),
                    ));
                }
                if kind == TokenKind::Var && path::compile(token.text).is_none() {
                    diags.record(Diagnostic::new(
                        ErrorKind::VarSyntax,
                        at,
                        token.text,
                        format!("Error parsing variable expression starting at position {at}"),
                    ));
                }
                allowed = Allowed::after_operand();
            }
            TokenKind::Identifier => {
                if !allowed.contains(Class::Func) {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfFuncNotAllowed,
                        at,
                        token.text,
                        format!("Function not allowed at position {at}"),
                    ));
                } else if Function::from_name(token.text).is_none() {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfFuncNotSupported,
                        at,
                        token.text,
                        format!("Unsupported function call at position {at}"),
                    ));
                } else if last {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfMissingExpressionAfter,
                        at,
                        token.text,
                        format!("Missing argument list after \"{}\" at position {at}", token.text),
                    ));
                }
                void_parens_allowed = true;
                allowed = Allowed::of(&[Class::ParenOpen]);
            }
            TokenKind::ParenOpen => {
                if !allowed.contains(Class::ParenOpen) {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfOpenParenNotAllowed,
                        at,
                        token.text,
                        format!("Opening parenthesis not allowed at position {at}"),
                    ));
                } else {
                    parens_opened += 1;
                }
                allowed = Allowed::operand_start();
                if void_parens_allowed {
                    allowed = allowed.with(Class::ParenClose);
                    void_parens_allowed = false;
                }
            }
            TokenKind::ParenClose => {
                if !allowed.contains(Class::ParenClose) {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfCloseParenNotAllowed,
                        at,
                        token.text,
                        format!("Closing parenthesis not allowed at position {at}"),
                    ));
                } else if parens_opened > 0 {
                    parens_opened -= 1;
                } else {
                    diags.record(Diagnostic::new(
                        ErrorKind::IfNoOpenParenBefore,
                        at,
                        token.text,
                        format!("No opening parenthesis found before position {at}"),
                    ));
                }
                allowed = Allowed::after_operand();
            }
            TokenKind::Assign if allowed.contains(Class::BinaryOp) => {
                tracing::warn!(offset = at, "single '=' in condition treated as '=='");
                diags.record(Diagnostic::new(
                    ErrorKind::IfSingleEqualSign,
                    at,
                    token.text,
                    format!("Should be == at position {at}"),
                ));
                tokens[i].kind = TokenKind::BinaryOp;
                tokens[i].text = "==";
                // re-examine the corrected token
                continue;
            }
            _ => {
                diags.record(Diagnostic::new(
                    ErrorKind::IfUnknownExpression,
                    at,
                    token.text,
                    format!("Unknown expression at position {at}"),
                ));
            }
        }

        i += 1;
    }
}

/// The first token that takes a validated condition past [`MAX_NESTING`]
///
/// Each open group or call adds a level, as does each unary operator still
/// waiting for its operand.
fn too_deep<'t, 's>(tokens: &'t [Token<'s>]) -> Option<&'t Token<'s>> {
    // pending unary operators per open group, outermost first
    let mut groups = vec![0usize];
    let mut depth = 0usize;
    for token in tokens {
        match token.kind {
            TokenKind::UnaryOp => {
                depth += 1;
                if let Some(pending) = groups.last_mut() {
                    *pending += 1;
                }
            }
            TokenKind::ParenOpen => {
                depth += 1;
                groups.push(0);
            }
            TokenKind::ParenClose => {
                depth = depth.saturating_sub(1 + groups.pop().unwrap_or(0));
                if let Some(pending) = groups.last_mut() {
                    depth = depth.saturating_sub(*pending);
                    *pending = 0;
                }
            }
            kind if kind.is_operand() => {
                if let Some(pending) = groups.last_mut() {
                    depth = depth.saturating_sub(*pending);
                    *pending = 0;
                }
            }
            _ => {}
        }
        if depth > MAX_NESTING {
            return Some(token);
        }
    }
    None
}

/// Folds validated tokens into an expression tree
struct Builder<'t, 's> {
    tokens: &'t [Token<'s>],
    pos: usize,
}

impl<'t, 's> Builder<'t, 's> {
    fn peek(&self) -> Option<&'t Token<'s>> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token<'s>> {
        let token = *self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn expect(&mut self, kind: TokenKind) -> Option<()> {
        (self.bump()?.kind == kind).then_some(())
    }

    /// `operand (op operand)*`, kept flat
    fn sequence(&mut self) -> Option<Expr> {
        let first = self.operand()?;
        let mut rest = Vec::new();
        while self.peek().map(|t| t.kind) == Some(TokenKind::BinaryOp) {
            let op = BinaryOp::from_symbol(self.bump()?.text)?;
            rest.push((op, self.operand()?));
        }
        if rest.is_empty() {
            return Some(first);
        }
        Some(Expr::Chain {
            first: Box::new(first),
            rest,
        })
    }

    fn operand(&mut self) -> Option<Expr> {
        let token = self.bump()?;
        match token.kind {
            TokenKind::UnaryOp => Some(Expr::Unary {
                op: UnaryOp::from_symbol(token.text)?,
                operand: Box::new(self.operand()?),
            }),
            TokenKind::ParenOpen => {
                let inner = self.sequence()?;
                self.expect(TokenKind::ParenClose)?;
                Some(Expr::Grouped(Box::new(inner)))
            }
            TokenKind::Identifier => {
                let function = Function::from_name(token.text)?;
                self.expect(TokenKind::ParenOpen)?;
                let arg = if self.peek().map(|t| t.kind) == Some(TokenKind::ParenClose) {
                    None
                } else {
                    Some(Box::new(self.sequence()?))
                };
                self.expect(TokenKind::ParenClose)?;
                Some(Expr::Call { function, arg })
            }
            TokenKind::Var => path::compile(token.text).map(Expr::Variable),
            TokenKind::StringLit => Some(Expr::Literal(Value::Str(patterns::unquote(token.text)))),
            TokenKind::NumberLit => Value::parse_number(token.text).map(Expr::Literal),
            TokenKind::BoolLit => Some(Expr::Literal(Value::Bool(token.text == "true"))),
            _ => None,
        }
    }
}
