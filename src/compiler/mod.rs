//! Template compiler
//!
//! Turns template text into a [`CompiledProgram`]:
//! - `scanner` walks the text, splitting literals from tags
//! - `path` compiles `{%name...}` interpolations
//! - `expr` validates `if`/`elseif` conditions and builds [`Expr`] trees
//! - `blocks` tracks open blocks until their closing tag
//!
//! All diagnostics of a run are collected; a run fails when any of them is an
//! error, and the caller receives every one of them.

pub mod ast;
mod blocks;
mod expr;
mod lexer;
mod path;
mod patterns;
mod scanner;

pub use ast::{
    BinaryOp, Branch, CompiledNode, CompiledProgram, Expr, Function, Index, ProgramError, Step,
    UnaryOp, VariablePath, PROGRAM_FORMAT,
};

use crate::config::CompilerConfig;
use crate::error::Diagnostic;

/// Compile a template with the default `{` / `}` delimiters
///
/// # Example
///
/// ```rust
/// use zenplate::compiler::compile;
///
/// let program = compile("Hello {%name}!").unwrap();
/// assert_eq!(program.nodes.len(), 3);
/// ```
pub fn compile(template: &str) -> Result<CompiledProgram, Vec<Diagnostic>> {
    compile_with_config(template, &CompilerConfig::default())
}

/// Compile a template using the delimiters in `config`
pub fn compile_with_config(
    template: &str,
    config: &CompilerConfig,
) -> Result<CompiledProgram, Vec<Diagnostic>> {
    scanner::Scanner::new(template, &config.delimiters).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delimiters;
    use crate::error::ErrorKind;

    #[test]
    fn test_compile_collects_diagnostics() {
        let errors = compile("{if %a}x").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::IfNoEndIf);
    }

    #[test]
    fn test_compile_with_config() {
        let config =
            CompilerConfig::new().with_delimiters(Delimiters::new("{{", "}}").unwrap());
        let program = compile_with_config("{{%a}} {%b}", &config).unwrap();
        assert_eq!(
            program.nodes,
            vec![
                CompiledNode::Interpolation(VariablePath::new("a")),
                CompiledNode::Literal(" {%b}".into()),
            ]
        );
    }
}
