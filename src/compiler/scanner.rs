//! The outer scan loop: alternates literal text with tags and dispatches
//! each tag to its parser

use std::mem;

use super::ast::{Branch, CompiledNode, CompiledProgram, Expr, VariablePath};
use super::blocks::BlockStack;
use super::expr;
use super::{path, patterns};
use crate::config::Delimiters;
use crate::error::{Diagnostic, Diagnostics, ErrorKind, Halt};

/// Mutable state threaded through one compile run
#[derive(Debug, Default)]
pub(crate) struct ScannerState {
    /// Byte offset of the next unscanned input
    pub offset: usize,
    pub diagnostics: Diagnostics,
    pub blocks: BlockStack,
}

/// A recognised tag
#[derive(Debug)]
enum Tag {
    Interpolate(VariablePath),
    If(Expr),
    ElseIf(Expr),
    Else,
    EndIf,
}

impl Tag {
    fn trace(&self, offset: usize) {
        match self {
            Tag::Interpolate(path) => tracing::trace!(offset, %path, "interpolate"),
            Tag::If(test) => tracing::trace!(offset, condition = %test, "if"),
            Tag::ElseIf(test) => tracing::trace!(offset, condition = %test, "elseif"),
            Tag::Else => tracing::trace!(offset, "else"),
            Tag::EndIf => tracing::trace!(offset, "end-if"),
        }
    }
}

#[derive(Debug)]
enum Parsed {
    Tag { tag: Tag, end: usize },
    /// Not a tag after all; the scanner emits it as text
    Unmatched,
}

/// An `if` whose `{/if}` has not been seen yet
#[derive(Debug)]
struct OpenConditional {
    branches: Vec<Branch>,
    /// Test of the arm being filled; `None` once inside `{else}`
    current: Option<Expr>,
    body: Vec<CompiledNode>,
    else_branch: Option<Vec<CompiledNode>>,
}

impl OpenConditional {
    fn new(test: Expr) -> Self {
        Self {
            branches: Vec::new(),
            current: Some(test),
            body: Vec::new(),
            else_branch: None,
        }
    }

    fn finish_arm(&mut self) {
        let body = mem::take(&mut self.body);
        match self.current.take() {
            Some(test) => self.branches.push(Branch { test, body }),
            None => self.else_branch = Some(body),
        }
    }

    fn start_arm(&mut self, test: Option<Expr>) {
        self.finish_arm();
        self.current = test;
    }

    fn close(mut self) -> CompiledNode {
        self.finish_arm();
        CompiledNode::Conditional {
            branches: self.branches,
            else_branch: self.else_branch,
        }
    }
}

/// Nested node tree under construction
#[derive(Debug, Default)]
struct Tree {
    root: Vec<CompiledNode>,
    open: Vec<OpenConditional>,
}

impl Tree {
    fn sink(&mut self) -> &mut Vec<CompiledNode> {
        match self.open.last_mut() {
            Some(cond) => &mut cond.body,
            None => &mut self.root,
        }
    }

    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let sink = self.sink();
        match sink.last_mut() {
            Some(CompiledNode::Literal(prev)) => prev.push_str(text),
            _ => sink.push(CompiledNode::Literal(text.to_string())),
        }
    }

    fn apply(&mut self, tag: Tag) {
        match tag {
            Tag::Interpolate(path) => self.sink().push(CompiledNode::Interpolation(path)),
            Tag::If(test) => self.open.push(OpenConditional::new(test)),
            Tag::ElseIf(test) => {
                if let Some(cond) = self.open.last_mut() {
                    cond.start_arm(Some(test));
                }
            }
            Tag::Else => {
                if let Some(cond) = self.open.last_mut() {
                    cond.start_arm(None);
                }
            }
            Tag::EndIf => {
                if let Some(cond) = self.open.pop() {
                    let node = cond.close();
                    self.sink().push(node);
                }
            }
        }
    }
}

pub(crate) struct Scanner<'s> {
    source: &'s str,
    left: &'s str,
    right: &'s str,
    state: ScannerState,
    tree: Tree,
}

impl<'s> Scanner<'s> {
    pub fn new(source: &'s str, delimiters: &'s Delimiters) -> Self {
        Self {
            source,
            left: delimiters.left(),
            right: delimiters.right(),
            state: ScannerState::default(),
            tree: Tree::default(),
        }
    }

    /// Scan the whole template and produce the program or every diagnostic
    pub fn run(mut self) -> Result<CompiledProgram, Vec<Diagnostic>> {
        if let Err(Halt) = self.scan() {
            let diagnostics = self.state.diagnostics.into_vec();
            tracing::debug!(
                offset = self.state.offset,
                diagnostics = diagnostics.len(),
                "compile halted"
            );
            return Err(diagnostics);
        }
        self.finish()
    }

    fn scan(&mut self) -> Result<(), Halt> {
        let source = self.source;

        while let Some(found) = source[self.state.offset..].find(self.left) {
            let pos = self.state.offset + found;
            self.tree.push_literal(&source[self.state.offset..pos]);
            self.state.offset = pos;

            let test = pos + self.left.len();
            if test >= source.len() {
                break;
            }

            let parsed = if source[test..].starts_with('%') {
                self.parse_variable(test)?
            } else {
                self.parse_block(pos, test)?
            };

            let next = match parsed {
                Parsed::Tag { tag, end } => {
                    tag.trace(pos);
                    self.tree.apply(tag);
                    end
                }
                Parsed::Unmatched => {
                    let skip = source[test..].chars().next().map_or(0, char::len_utf8);
                    self.tree.push_literal(&source[pos..test + skip]);
                    test + skip
                }
            };

            if next <= self.state.offset {
                return Err(self.state.diagnostics.halt(Diagnostic::new(
                    ErrorKind::ScannerStalled,
                    pos,
                    "",
                    format!("Main parser loop is broken at position {pos}"),
                )));
            }
            self.state.offset = next;
        }

        self.tree.push_literal(&source[self.state.offset..]);
        self.state.offset = source.len();
        Ok(())
    }

    fn finish(mut self) -> Result<CompiledProgram, Vec<Diagnostic>> {
        for (kind, frame) in self.state.blocks.drain_open() {
            let diagnostic = if kind == "if" {
                Diagnostic::new(
                    ErrorKind::IfNoEndIf,
                    frame.offset,
                    "",
                    format!(
                        "No closing end-if structure found for if starting at position {}",
                        frame.offset
                    ),
                )
            } else {
                Diagnostic::new(
                    ErrorKind::BlockNoEndBlock,
                    frame.offset,
                    kind.as_str(),
                    format!(
                        "No closing end-{kind} structure found for {kind} starting at position {}",
                        frame.offset
                    ),
                )
            };
            self.state.diagnostics.record(diagnostic);
        }

        let failed = self.state.diagnostics.has_errors();
        let diagnostics = self.state.diagnostics.into_vec();
        tracing::debug!(
            nodes = self.tree.root.len(),
            diagnostics = diagnostics.len(),
            failed,
            "compile finished"
        );
        if failed {
            return Err(diagnostics);
        }
        Ok(CompiledProgram::new(self.tree.root, diagnostics))
    }

    /// `{%path}`; `test` points at the `%`
    fn parse_variable(&mut self, test: usize) -> Result<Parsed, Halt> {
        let Some((path, len)) = path::parse_prefix(&self.source[test..]) else {
            return Ok(Parsed::Unmatched);
        };
        let after = test + len;
        if !self.source[after..].starts_with(self.right) {
            return Err(self.state.diagnostics.halt(Diagnostic::new(
                ErrorKind::VarSyntax,
                test,
                &self.source[test..after],
                format!("Error parsing variable expression starting at position {test}"),
            )));
        }
        Ok(Parsed::Tag {
            tag: Tag::Interpolate(path),
            end: after + self.right.len(),
        })
    }

    /// `{if ...}`, `{elseif ...}`, `{else}` and `{/if}`, names case-insensitive
    fn parse_block(&mut self, tag_start: usize, test: usize) -> Result<Parsed, Halt> {
        let rest = &self.source[test..];
        let slash = usize::from(rest.starts_with('/'));
        let word = patterns::word_len(&rest[slash..]);
        if word == 0 {
            return Ok(Parsed::Unmatched);
        }
        let name_end = test + slash + word;
        let after = &self.source[name_end..];
        let boundary = after.is_empty()
            || after.starts_with(char::is_whitespace)
            || after.starts_with(self.right);
        if !boundary {
            return Ok(Parsed::Unmatched);
        }

        match self.source[test..name_end].to_ascii_lowercase().as_str() {
            "if" => self.parse_if(tag_start, name_end, false),
            "elseif" => self.parse_if(tag_start, name_end, true),
            "else" => self.parse_else(name_end),
            "/if" => self.parse_endif(name_end),
            _ => Ok(Parsed::Unmatched),
        }
    }

    fn parse_if(&mut self, tag_start: usize, start: usize, elseif: bool) -> Result<Parsed, Halt> {
        if elseif {
            let Some(has_else) = self.state.blocks.current("if").map(|f| f.has_else) else {
                return Err(self.state.diagnostics.halt(Diagnostic::new(
                    ErrorKind::ElseIfNoIf,
                    start,
                    "",
                    format!("No if-statement found for elseif structure at position {start}"),
                )));
            };
            if has_else {
                self.state.diagnostics.record(Diagnostic::new(
                    ErrorKind::ElseOnlyOneAllowed,
                    start,
                    "",
                    format!("Only one else per if-statement is allowed at position {start}"),
                ));
            }
        }

        let condition =
            expr::compile_condition(self.source, start, self.right, &mut self.state.diagnostics)?;
        let Some(condition) = condition else {
            return Ok(Parsed::Unmatched);
        };

        let tag = if elseif {
            Tag::ElseIf(condition.expr)
        } else {
            self.state.blocks.push("if", tag_start);
            Tag::If(condition.expr)
        };
        Ok(Parsed::Tag {
            tag,
            end: condition.end,
        })
    }

    fn parse_else(&mut self, start: usize) -> Result<Parsed, Halt> {
        let Some(end) = self.closing_delimiter(start) else {
            return Err(self.state.diagnostics.halt(Diagnostic::new(
                ErrorKind::ElseNoRightDelimiter,
                start,
                "",
                format!("No right delimiter found for else structure at position {start}"),
            )));
        };

        match self.state.blocks.current_mut("if") {
            None => {
                self.state.diagnostics.record(Diagnostic::new(
                    ErrorKind::ElseNoIf,
                    start,
                    "",
                    format!("No if-statement found for else structure at position {start}"),
                ));
                Ok(Parsed::Unmatched)
            }
            Some(frame) if frame.has_else => {
                self.state.diagnostics.record(Diagnostic::new(
                    ErrorKind::ElseOnlyOneAllowed,
                    start,
                    "",
                    format!("Only one else per if-statement is allowed at position {start}"),
                ));
                Ok(Parsed::Unmatched)
            }
            Some(frame) => {
                frame.has_else = true;
                Ok(Parsed::Tag {
                    tag: Tag::Else,
                    end,
                })
            }
        }
    }

    fn parse_endif(&mut self, start: usize) -> Result<Parsed, Halt> {
        let Some(end) = self.closing_delimiter(start) else {
            return Err(self.state.diagnostics.halt(Diagnostic::new(
                ErrorKind::EndIfNoRightDelimiter,
                start,
                "",
                format!("No right delimiter found for end-if structure at position {start}"),
            )));
        };

        if self.state.blocks.pop("if").is_none() {
            self.state.diagnostics.record(Diagnostic::new(
                ErrorKind::EndIfNoIf,
                start,
                "",
                format!("No if-statement found for end-if structure at position {start}"),
            ));
            return Ok(Parsed::Unmatched);
        }
        Ok(Parsed::Tag {
            tag: Tag::EndIf,
            end,
        })
    }

    /// Offset past a right delimiter that follows `start` after optional whitespace
    fn closing_delimiter(&self, start: usize) -> Option<usize> {
        let rest = &self.source[start..];
        let pos = start + (rest.len() - rest.trim_start().len());
        self.source[pos..]
            .starts_with(self.right)
            .then(|| pos + self.right.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ast::{BinaryOp, Index, Step};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn scan(source: &str) -> Result<CompiledProgram, Vec<Diagnostic>> {
        let delimiters = Delimiters::default();
        Scanner::new(source, &delimiters).run()
    }

    fn nodes(source: &str) -> Vec<CompiledNode> {
        scan(source).expect("should compile").nodes
    }

    fn error_kinds(source: &str) -> Vec<ErrorKind> {
        scan(source)
            .expect_err("should fail")
            .iter()
            .map(|d| d.kind)
            .collect()
    }

    fn lit(text: &str) -> CompiledNode {
        CompiledNode::Literal(text.to_string())
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(nodes("hello world"), vec![lit("hello world")]);
        assert_eq!(nodes(""), vec![]);
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            nodes("before {%user.name} after"),
            vec![
                lit("before "),
                CompiledNode::Interpolation(
                    VariablePath::new("user").with_step(Step::Key("name".into()))
                ),
                lit(" after"),
            ]
        );
        assert_eq!(
            nodes("{%a[1]}"),
            vec![CompiledNode::Interpolation(
                VariablePath::new("a").with_step(Step::Index(Index::Int(1)))
            )]
        );
    }

    #[test]
    fn test_unrecognised_tags_are_text() {
        assert_eq!(
            nodes("a {b} {iffy} { x } {% x}"),
            vec![lit("a {b} {iffy} { x } {% x}")]
        );
        assert_eq!(nodes("json: {\"k\": 1}"), vec![lit("json: {\"k\": 1}")]);
    }

    #[test]
    fn test_trailing_delimiter() {
        assert_eq!(nodes("end {"), vec![lit("end {")]);
    }

    #[test]
    fn test_variable_without_closing_delimiter_is_fatal() {
        let diags = scan("x {%name y").unwrap_err();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, ErrorKind::VarSyntax);
        assert_eq!(diags[0].offset, 3);
        assert_eq!(diags[0].token, "%name");
        assert!(diags[0].fatal);
    }

    #[test]
    fn test_conditional_structure() {
        let program = nodes("{if %x}a{elseif %y}b{else}c{/if}!");
        assert_eq!(program.len(), 2);
        let CompiledNode::Conditional {
            branches,
            else_branch,
        } = &program[0]
        else {
            panic!("expected conditional, got {:?}", program[0]);
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].test, Expr::Variable(VariablePath::new("x")));
        assert_eq!(branches[0].body, vec![lit("a")]);
        assert_eq!(branches[1].body, vec![lit("b")]);
        assert_eq!(else_branch.as_deref(), Some(&[lit("c")][..]));
        assert_eq!(program[1], lit("!"));
    }

    #[test]
    fn test_nested_conditionals() {
        let program = nodes("{IF %a}{if %b}x{/if}{/IF}");
        let CompiledNode::Conditional { branches, .. } = &program[0] else {
            panic!("expected conditional");
        };
        assert!(matches!(
            branches[0].body.as_slice(),
            [CompiledNode::Conditional { .. }]
        ));
    }

    #[test]
    fn test_whitespace_before_closing_delimiter() {
        let program = nodes("{if %a}x{else  }y{/if }");
        assert!(matches!(
            program.as_slice(),
            [CompiledNode::Conditional {
                else_branch: Some(_),
                ..
            }]
        ));
    }

    #[test]
    fn test_single_equal_warning_keeps_program() {
        let program = scan("{if %x = 5}yes{/if}").unwrap();
        assert_eq!(program.warnings.len(), 1);
        assert_eq!(program.warnings[0].kind, ErrorKind::IfSingleEqualSign);
        let CompiledNode::Conditional { branches, .. } = &program.nodes[0] else {
            panic!("expected conditional");
        };
        let Expr::Chain { rest, .. } = &branches[0].test else {
            panic!("expected a comparison");
        };
        assert_eq!(rest, &vec![(BinaryOp::Eq, Expr::Literal(Value::Int(5)))]);
        assert_eq!(branches[0].test.to_string(), "%x == 5");
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(error_kinds("{/if}"), vec![ErrorKind::EndIfNoIf]);
        assert_eq!(error_kinds("{else}"), vec![ErrorKind::ElseNoIf]);
        assert_eq!(
            error_kinds("{if %a}{else}{else}{/if}"),
            vec![ErrorKind::ElseOnlyOneAllowed]
        );
        assert_eq!(
            error_kinds("{if %a}{else}{elseif %b}{/if}"),
            vec![ErrorKind::ElseOnlyOneAllowed]
        );
    }

    #[test]
    fn test_fatal_structural_errors() {
        assert_eq!(error_kinds("{elseif %a}"), vec![ErrorKind::ElseIfNoIf]);
        assert_eq!(error_kinds("{if %a}{else x}"), vec![ErrorKind::ElseNoRightDelimiter]);
        assert_eq!(error_kinds("{if %a}{/if x}"), vec![ErrorKind::EndIfNoRightDelimiter]);
        assert_eq!(error_kinds("{if}{/if}"), vec![ErrorKind::IfNoArguments]);
    }

    #[test]
    fn test_unterminated_ifs_reported_innermost_first() {
        let diags = scan("{if %a}x{if %b}y").unwrap_err();
        let reported: Vec<_> = diags.iter().map(|d| (d.kind, d.offset)).collect();
        assert_eq!(
            reported,
            vec![(ErrorKind::IfNoEndIf, 8), (ErrorKind::IfNoEndIf, 0)]
        );
        assert!(diags.iter().all(|d| !d.fatal));
    }

    #[test]
    fn test_errors_are_collected_across_tags() {
        let kinds = error_kinds("{if %a %b}x{/if}{/if}{if foo()}y{/if}");
        assert_eq!(
            kinds,
            vec![
                ErrorKind::IfVarNotAllowed,
                ErrorKind::EndIfNoIf,
                ErrorKind::EndIfNoIf,
                ErrorKind::IfFuncNotSupported,
                ErrorKind::EndIfNoIf,
            ]
        );
    }

    #[test]
    fn test_custom_delimiters() {
        let delimiters = Delimiters::new("<%", "%>").unwrap();
        let program = Scanner::new("a <%%x%> {%y} <%if %x%>z<%/if%>", &delimiters)
            .run()
            .unwrap();
        assert_eq!(program.nodes.len(), 4);
        assert_eq!(
            program.nodes[1],
            CompiledNode::Interpolation(VariablePath::new("x"))
        );
        assert_eq!(program.nodes[2], lit(" {%y} "));
    }
}
