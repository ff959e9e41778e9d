//! Evaluates a [`CompiledProgram`] against a [`Context`]
//!
//! Evaluation never fails: absent variables resolve to nothing, operators
//! that cannot apply to their operands produce [`Value::Null`], and empty
//! values interpolate as empty text.

use std::borrow::Cow;

use crate::compiler::{
    BinaryOp, CompiledNode, CompiledProgram, Expr, Function, Index, Step, UnaryOp, VariablePath,
};
use crate::value::{Context, Number, Value};

/// Render `program` with the variables in `context`
pub fn evaluate(program: &CompiledProgram, context: &Context) -> String {
    let mut out = String::new();
    Evaluator { context }.render(&program.nodes, &mut out);
    out
}

impl CompiledProgram {
    /// Shorthand for [`evaluate`]
    pub fn evaluate(&self, context: &Context) -> String {
        evaluate(self, context)
    }
}

struct Evaluator<'c> {
    context: &'c Context,
}

impl<'c> Evaluator<'c> {
    fn render(&self, nodes: &[CompiledNode], out: &mut String) {
        for node in nodes {
            match node {
                CompiledNode::Literal(text) => out.push_str(text),
                CompiledNode::Interpolation(path) => {
                    if let Some(value) = self.resolve(path).filter(|v| v.is_truthy()) {
                        out.push_str(&value.to_string());
                    }
                }
                CompiledNode::Conditional {
                    branches,
                    else_branch,
                } => {
                    match branches.iter().find(|b| self.eval(&b.test).is_truthy()) {
                        Some(branch) => self.render(&branch.body, out),
                        None => {
                            if let Some(body) = else_branch {
                                self.render(body, out);
                            }
                        }
                    }
                }
            }
        }
    }

    fn resolve(&self, path: &VariablePath) -> Option<&'c Value> {
        let mut value = self.context.get(&path.base)?;
        for step in &path.steps {
            value = match step {
                Step::Key(key) | Step::Index(Index::Str(key)) => value.get_key(key)?,
                Step::Index(Index::Int(i)) => value.get_index(*i)?,
            };
        }
        Some(value)
    }

    fn eval(&self, expr: &Expr) -> Cow<'c, Value> {
        match expr {
            Expr::Variable(path) => match self.resolve(path) {
                Some(value) => Cow::Borrowed(value),
                None => Cow::Owned(Value::Null),
            },
            Expr::Literal(value) => Cow::Owned(value.clone()),
            Expr::Grouped(inner) => self.eval(inner),
            Expr::Call { function, arg } => {
                let value = match arg {
                    Some(arg) => self.eval(arg),
                    None => Cow::Owned(Value::Null),
                };
                Cow::Owned(call(*function, &value))
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand);
                match op {
                    UnaryOp::Silence => value,
                    UnaryOp::Not => Cow::Owned(Value::Bool(!value.is_truthy())),
                    UnaryOp::BitNot => {
                        Cow::Owned(value.as_int().map_or(Value::Null, |i| Value::Int(!i)))
                    }
                }
            }
            Expr::Chain { first, rest } => {
                // folded left to right with no precedence
                rest.iter().fold(self.eval(first), |acc, (op, operand)| match op {
                    BinaryOp::And if !acc.is_truthy() => Cow::Owned(Value::Bool(false)),
                    BinaryOp::Or if acc.is_truthy() => Cow::Owned(Value::Bool(true)),
                    BinaryOp::And | BinaryOp::Or => {
                        Cow::Owned(Value::Bool(self.eval(operand).is_truthy()))
                    }
                    BinaryOp::Comma => self.eval(operand),
                    _ => Cow::Owned(binary(*op, &acc, &self.eval(operand))),
                })
            }
        }
    }
}

fn call(function: Function, value: &Value) -> Value {
    match function {
        Function::Length => {
            let len = match value {
                Value::Null => 0,
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => other.to_string().chars().count(),
            };
            Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
        }
        Function::Uppercase => Value::Str(value.to_string().to_uppercase()),
        Function::Lowercase => Value::Str(value.to_string().to_lowercase()),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNe => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(left.loose_cmp(right).is_some_and(|o| o.is_lt())),
        BinaryOp::Gt => Value::Bool(left.loose_cmp(right).is_some_and(|o| o.is_gt())),
        BinaryOp::Le => Value::Bool(left.loose_cmp(right).is_some_and(|o| o.is_le())),
        BinaryOp::Ge => Value::Bool(left.loose_cmp(right).is_some_and(|o| o.is_ge())),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => arithmetic(op, a, b),
                _ => Value::Null,
            }
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
            match (left.as_int(), right.as_int()) {
                (Some(a), Some(b)) => bitwise(op, a, b),
                _ => Value::Null,
            }
        }
        // short-circuit and sequencing operators are handled by the evaluator
        BinaryOp::And => Value::Bool(left.is_truthy() && right.is_truthy()),
        BinaryOp::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
        BinaryOp::Comma => right.clone(),
    }
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Value {
    if let (Number::Int(a), Number::Int(b)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div if b == 0 => return Value::Null,
            BinaryOp::Div => a.checked_rem(b).filter(|r| *r == 0).and_then(|_| a.checked_div(b)),
            BinaryOp::Mod => return a.checked_rem(b).map_or(Value::Null, Value::Int),
            _ => None,
        };
        if let Some(n) = exact {
            return Value::Int(n);
        }
    }

    let (a, b) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return Value::Null,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => return Value::Null,
    };
    Number::Float(result).into_value()
}

fn bitwise(op: BinaryOp, a: i64, b: i64) -> Value {
    let shift = || u32::try_from(b).ok().filter(|s| *s < i64::BITS);
    let result = match op {
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::Shl => shift().map(|s| a << s),
        BinaryOp::Shr => shift().map(|s| a >> s),
        _ => None,
    };
    result.map_or(Value::Null, Value::Int)
}
