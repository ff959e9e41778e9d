//! Zenplate - a small template language with interpolation and conditionals
//!
//! Templates mix literal text with `{%variable}` interpolations and
//! `{if ...}{elseif ...}{else}{/if}` blocks. A template is compiled once into
//! a [`CompiledProgram`] and evaluated any number of times against a
//! [`Context`].
//!
//! # Example
//!
//! ```rust
//! use zenplate::{render, Context};
//!
//! let mut context = Context::new();
//! context.insert("name", "Bob").insert("count", 3);
//!
//! let template = "Hi {%name}{if %count > 1}, you have {%count} items{/if}.";
//! let text = render(template, &context).unwrap();
//! assert_eq!(text, "Hi Bob, you have 3 items.");
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod eval;
pub mod value;

pub use compiler::{compile, compile_with_config, CompiledNode, CompiledProgram, ProgramError};
pub use config::{CompilerConfig, ConfigError, Delimiters};
pub use error::{Diagnostic, ErrorCategory, ErrorKind, Severity};
pub use eval::evaluate;
pub use value::{Context, Value};

use thiserror::Error;

/// Errors from the compile-then-evaluate pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template did not compile
    #[error("error compiling template; error messages: {}", format_diagnostics(.0))]
    Compile(Vec<Diagnostic>),
}

impl From<Vec<Diagnostic>> for RenderError {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        RenderError::Compile(diagnostics)
    }
}

impl RenderError {
    /// Every diagnostic behind this error
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            RenderError::Compile(diagnostics) => diagnostics,
        }
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compile and evaluate a template with the default delimiters
pub fn render(template: &str, context: &Context) -> Result<String, RenderError> {
    render_with_config(template, context, &CompilerConfig::default())
}

/// Compile and evaluate a template with custom configuration
///
/// # Example
///
/// ```rust
/// use zenplate::{render_with_config, CompilerConfig, Context, Delimiters};
///
/// let config = CompilerConfig::new().with_delimiters(Delimiters::new("<%", "%>").unwrap());
/// let context: Context = [("x", 1)].into_iter().collect();
///
/// let text = render_with_config("{x} <%if %x%>one<%/if%>", &context, &config).unwrap();
/// assert_eq!(text, "{x} one");
/// ```
pub fn render_with_config(
    template: &str,
    context: &Context,
    config: &CompilerConfig,
) -> Result<String, RenderError> {
    let program = compile_with_config(template, config)?;
    Ok(program.evaluate(context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain_text() {
        assert_eq!(render("no tags here", &Context::new()).unwrap(), "no tags here");
    }

    #[test]
    fn test_render_interpolation() {
        let context: Context = [("name", "Bob")].into_iter().collect();
        assert_eq!(
            render("before {%name} after", &context).unwrap(),
            "before Bob after"
        );
    }

    #[test]
    fn test_render_compile_error_message() {
        let err = render("{/if}{if %a}", &Context::new()).unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert_eq!(
            err.to_string(),
            "error compiling template; error messages: \
             No if-statement found for end-if structure at position 4, \
             No closing end-if structure found for if starting at position 5"
        );
    }

    #[test]
    fn test_render_ignores_warnings() {
        let context: Context = [("x", 5)].into_iter().collect();
        assert_eq!(render("{if %x = 5}yes{/if}", &context).unwrap(), "yes");
    }
}
