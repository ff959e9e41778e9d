//! Compiled program types
//!
//! Everything here is immutable once `compile` returns, so a
//! [`CompiledProgram`] can be shared between threads and evaluated
//! concurrently against independent contexts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Diagnostic;
use crate::value::Value;

/// Format marker written into serialized programs
pub const PROGRAM_FORMAT: &str = "zenplate";

/// One accessor step after the base variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// `.name`
    Key(String),
    /// `[3]` or `["name"]`
    Index(Index),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Index {
    Int(i64),
    Str(String),
}

/// `%base.key[0]["x"]`, resolved against the context left to right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariablePath {
    pub base: String,
    pub steps: Vec<Step>,
}

impl VariablePath {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}

impl std::fmt::Display for VariablePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.base)?;
        for step in &self.steps {
            match step {
                Step::Key(k) => write!(f, ".{}", k)?,
                Step::Index(Index::Int(i)) => write!(f, "[{}]", i)?,
                Step::Index(Index::Str(s)) => write!(f, "[{:?}]", s)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Shl,
    Shr,
    Le,
    Ge,
    And,
    Or,
    Comma,
    BitXor,
    BitOr,
    BitAnd,
    Lt,
    Gt,
    Mod,
    Add,
    Sub,
    Div,
    Mul,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNe,
            "==" => BinaryOp::Eq,
            "!=" | "<>" => BinaryOp::Ne,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "," => BinaryOp::Comma,
            "^" => BinaryOp::BitXor,
            "|" => BinaryOp::BitOr,
            "&" => BinaryOp::BitAnd,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "%" => BinaryOp::Mod,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "/" => BinaryOp::Div,
            "*" => BinaryOp::Mul,
            _ => return None,
        })
    }

    /// Canonical spelling; `<>` is written as `!=`
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Comma => ",",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::BitAnd => "&",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Div => "/",
            BinaryOp::Mul => "*",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `~`
    BitNot,
    /// `!`
    Not,
    /// `@`, kept for grammar compatibility; evaluates to its operand
    Silence,
}

impl UnaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "~" => Some(UnaryOp::BitNot),
            "!" => Some(UnaryOp::Not),
            "@" => Some(UnaryOp::Silence),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
            UnaryOp::Silence => "@",
        }
    }
}

/// The closed set of functions callable from conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Function {
    Length,
    Uppercase,
    Lowercase,
}

impl Function {
    /// Case-insensitive lookup
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "length" => Some(Function::Length),
            "uppercase" => Some(Function::Uppercase),
            "lowercase" => Some(Function::Lowercase),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Length => "length",
            Function::Uppercase => "uppercase",
            Function::Lowercase => "lowercase",
        }
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated condition
///
/// Operators carry no precedence. A run of `operand op operand ...` is kept
/// flat as a [`Expr::Chain`] and applied strictly left to right, so
/// `a + b * c` means `(a + b) * c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Variable(VariablePath),
    Literal(Value),
    Call {
        function: Function,
        arg: Option<Box<Expr>>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Chain {
        first: Box<Expr>,
        rest: Vec<(BinaryOp, Expr)>,
    },
    Grouped(Box<Expr>),
}

/// Canonical condition text, as it would be written inside a tag
impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Variable(path) => write!(f, "{}", path),
            Expr::Literal(Value::Str(s)) => write!(f, "{:?}", s),
            Expr::Literal(Value::Bool(b)) => write!(f, "{}", b),
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Call {
                function,
                arg: Some(arg),
            } => write!(f, "{}({})", function, arg),
            Expr::Call {
                function,
                arg: None,
            } => write!(f, "{}()", function),
            Expr::Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            Expr::Chain { first, rest } => {
                write!(f, "{}", first)?;
                for (op, operand) in rest {
                    write!(f, " {} {}", op.symbol(), operand)?;
                }
                Ok(())
            }
            Expr::Grouped(inner) => write!(f, "({})", inner),
        }
    }
}

/// One `if`/`elseif` arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub test: Expr,
    pub body: Vec<CompiledNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompiledNode {
    Literal(String),
    Interpolation(VariablePath),
    Conditional {
        branches: Vec<Branch>,
        else_branch: Option<Vec<CompiledNode>>,
    },
}

/// Errors when loading a serialized program
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("not a valid zenplate compiled template")]
    NotAProgram,
    #[error("malformed compiled template: {0}")]
    Json(#[from] serde_json::Error),
}

/// The durable result of a successful compile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    format: String,
    version: String,
    pub nodes: Vec<CompiledNode>,
    /// Non-fatal diagnostics, e.g. an auto-corrected `=`
    pub warnings: Vec<Diagnostic>,
}

impl CompiledProgram {
    pub fn new(nodes: Vec<CompiledNode>, warnings: Vec<Diagnostic>) -> Self {
        Self {
            format: PROGRAM_FORMAT.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            nodes,
            warnings,
        }
    }

    /// Crate version that produced this program
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn to_json(&self) -> Result<String, ProgramError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a program written by [`CompiledProgram::to_json`]
    ///
    /// Nesting depth is unbounded; the stack grows on demand for deeply
    /// nested blocks instead of failing at serde_json's recursion limit.
    pub fn from_json(json: &str) -> Result<Self, ProgramError> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let program =
            CompiledProgram::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;
        if program.format != PROGRAM_FORMAT {
            return Err(ProgramError::NotAProgram);
        }
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_symbols() {
        assert_eq!(BinaryOp::from_symbol("<>"), Some(BinaryOp::Ne));
        assert_eq!(BinaryOp::from_symbol("==="), Some(BinaryOp::StrictEq));
        assert_eq!(BinaryOp::from_symbol("="), None);
        assert_eq!(UnaryOp::from_symbol("@"), Some(UnaryOp::Silence));
    }

    #[test]
    fn test_function_lookup_ignores_case() {
        assert_eq!(Function::from_name("LENGTH"), Some(Function::Length));
        assert_eq!(Function::from_name("UpperCase"), Some(Function::Uppercase));
        assert_eq!(Function::from_name("strlen"), None);
    }

    #[test]
    fn test_path_display() {
        let path = VariablePath::new("user")
            .with_step(Step::Key("tags".into()))
            .with_step(Step::Index(Index::Int(0)))
            .with_step(Step::Index(Index::Str("x".into())));
        assert_eq!(path.to_string(), r#"%user.tags[0]["x"]"#);
    }

    #[test]
    fn test_from_json_rejects_foreign_documents() {
        let json = r#"{"format":"other","version":"1","nodes":[],"warnings":[]}"#;
        assert!(matches!(
            CompiledProgram::from_json(json),
            Err(ProgramError::NotAProgram)
        ));
        assert!(matches!(
            CompiledProgram::from_json("{"),
            Err(ProgramError::Json(_))
        ));
    }

    #[test]
    fn test_expr_display() {
        let expr = Expr::Chain {
            first: Box::new(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(Expr::Call {
                    function: Function::Length,
                    arg: Some(Box::new(Expr::Variable(VariablePath::new("name")))),
                }),
            }),
            rest: vec![
                (BinaryOp::Ne, Expr::Literal(Value::Str("x".into()))),
                (
                    BinaryOp::And,
                    Expr::Grouped(Box::new(Expr::Literal(Value::Bool(true)))),
                ),
                (BinaryOp::Add, Expr::Literal(Value::Int(2))),
            ],
        };
        assert_eq!(expr.to_string(), r#"!length(%name) != "x" && (true) + 2"#);
    }

    #[test]
    fn test_deeply_nested_program_round_trips() {
        let mut nodes = vec![CompiledNode::Literal("core".into())];
        for depth in 0..40 {
            nodes = vec![CompiledNode::Conditional {
                branches: vec![Branch {
                    test: Expr::Variable(VariablePath::new(format!("v{depth}"))),
                    body: nodes,
                }],
                else_branch: None,
            }];
        }
        let program = CompiledProgram::new(nodes, vec![]);
        let loaded = CompiledProgram::from_json(&program.to_json().unwrap()).unwrap();
        assert_eq!(loaded, program);
    }

    #[test]
    fn test_from_json_rejects_trailing_data() {
        let json = CompiledProgram::new(vec![], vec![]).to_json().unwrap();
        assert!(matches!(
            CompiledProgram::from_json(&format!("{json} extra")),
            Err(ProgramError::Json(_))
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_version() {
        let program = CompiledProgram::new(vec![CompiledNode::Literal("hi".into())], vec![]);
        let loaded = CompiledProgram::from_json(&program.to_json().unwrap()).unwrap();
        assert_eq!(loaded, program);
        assert_eq!(loaded.version(), env!("CARGO_PKG_VERSION"));
    }
}
