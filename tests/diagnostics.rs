//! Diagnostic reporting for malformed templates

use insta::assert_snapshot;
use zenplate::{compile, render, Context, ErrorKind, Severity};

/// One `Kind@offset: message` line per diagnostic
fn listing(template: &str) -> String {
    let diagnostics = match compile(template) {
        Ok(program) => program.warnings,
        Err(diagnostics) => diagnostics,
    };
    diagnostics
        .iter()
        .map(|d| format!("{:?}@{}: {}", d.kind, d.offset, d.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_grammar_error_leaves_tag_as_text() {
    assert_snapshot!(listing("{if %a %b}x{/if}"), @r"
    IfVarNotAllowed@7: Variable not allowed at position 7
    EndIfNoIf@15: No if-statement found for end-if structure at position 15
    ");
}

#[test]
fn test_several_errors_in_one_condition() {
    assert_snapshot!(listing("{if > %a %b}"), @r#"
    IfOperatorNotAllowed@4: Operator ">" not allowed at position 4
    IfVarNotAllowed@9: Variable not allowed at position 9
    "#);
}

#[test]
fn test_fatal_error_stops_scanning() {
    assert_snapshot!(
        listing("{if (%a > 1}{/if}{/if}"),
        @"IfUnbalancedParens@11: Unbalanced parenthesis in if statement at position 11"
    );
    assert_snapshot!(
        listing("{if }x"),
        @"IfNoArguments@3: Error parsing if statement starting at position 3"
    );
    assert_snapshot!(
        listing("Hello {%name"),
        @"VarSyntax@7: Error parsing variable expression starting at position 7"
    );
}

#[test]
fn test_warnings_accompany_errors() {
    assert_snapshot!(listing("{if %x = 1}a{/if}{else}"), @r"
    IfSingleEqualSign@7: Should be == at position 7
    ElseNoIf@22: No if-statement found for else structure at position 22
    ");
}

#[test]
fn test_warning_only_compiles() {
    let program = compile("{if %x = 1}a{/if}").unwrap();
    assert_eq!(program.warnings.len(), 1);
    assert_eq!(program.warnings[0].kind.severity(), Severity::Warning);
    assert_eq!(program.warnings[0].kind.code(), ErrorKind::IfSingleEqualSign.code());
}

#[test]
fn test_render_error_joins_messages() {
    let err = render("{else}{if %a}", &Context::new()).unwrap_err();
    assert_snapshot!(
        err.to_string(),
        @"error compiling template; error messages: \
        No if-statement found for else structure at position 5, \
        No closing end-if structure found for if starting at position 6"
    );
}

#[test]
fn test_deep_nesting_is_reported() {
    let template = format!("{{if {}%a{}}}x{{/if}}", "(".repeat(100), ")".repeat(100));
    assert_snapshot!(listing(&template), @r"
    IfNestingTooDeep@68: Expression nested deeper than 64 levels at position 68
    EndIfNoIf@212: No if-statement found for end-if structure at position 212
    ");
}

#[test]
fn test_formatted_report_names_file_and_message() {
    let source = "line one\n{/if}\n";
    let errors = compile(source).unwrap_err();
    let report = errors[0].format(source, "page.tpl");
    assert!(report.contains("page.tpl"));
    assert!(report.contains("No if-statement found for end-if structure at position 13"));
}
