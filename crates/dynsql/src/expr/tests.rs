use super::*;
use crate::params::MapParameters;
use serde_json::json;

fn eval(src: &str, params: &MapParameters) -> DynSqlResult<bool> {
    Expression::compile(src)?.evaluate(params)
}

fn sample() -> MapParameters {
    MapParameters::new()
        .with("test", 1)
        .with("title", "nihao")
        .with("empty", "")
        .with("zero", 0)
        .with("flag", false)
        .with("nothing", Value::Null)
        .with("ratio", 0.5)
        .with("ids", json!([1, 2, 3]))
        .with("user", json!({"name": "alice", "age": 30}))
}

#[test]
fn bare_field_is_truthiness() {
    let p = sample();
    assert!(eval(".title", &p).unwrap());
    assert!(eval(".test", &p).unwrap());
    assert!(eval(".ids", &p).unwrap());
    assert!(!eval(".missing", &p).unwrap());
    assert!(!eval(".empty", &p).unwrap());
    assert!(!eval(".zero", &p).unwrap());
    assert!(!eval(".flag", &p).unwrap());
    assert!(!eval(".nothing", &p).unwrap());
}

#[test]
fn infix_comparisons() {
    let p = sample();
    assert!(eval(".test == 1", &p).unwrap());
    assert!(!eval(".test != 1", &p).unwrap());
    assert!(eval(".test < 2", &p).unwrap());
    assert!(eval(".test <= 1", &p).unwrap());
    assert!(eval(".test > 0", &p).unwrap());
    assert!(eval(".test >= 1", &p).unwrap());
    assert!(eval(".ratio < 1", &p).unwrap());
    assert!(eval(".ratio == 0.5", &p).unwrap());
    assert!(eval(".title == 'nihao'", &p).unwrap());
    assert!(eval(".title >= \"a\"", &p).unwrap());
    assert!(eval(".nothing == null", &p).unwrap());
    assert!(eval(".title != nil", &p).unwrap());
    assert!(eval(".test > -5", &p).unwrap());
}

#[test]
fn template_style_calls() {
    let p = sample();
    assert!(eval("eq .test 1", &p).unwrap());
    assert!(!eval("eq .test 0", &p).unwrap());
    assert!(eval("ne .title \"x\"", &p).unwrap());
    assert!(eval("lt .test 2", &p).unwrap());
    assert!(eval("ge .test 1", &p).unwrap());
    assert!(eval("eq .test 5 6 1", &p).unwrap());
    assert!(eval("and .test .title", &p).unwrap());
    assert!(!eval("and .test .missing", &p).unwrap());
    assert!(eval("or .missing .title", &p).unwrap());
    assert!(eval("not .missing", &p).unwrap());
    assert!(eval("and (eq .test 1) (ne .title 'x')", &p).unwrap());
}

#[test]
fn boolean_connectives_and_precedence() {
    let p = sample();
    assert!(eval(".test == 1 and .title", &p).unwrap());
    assert!(eval(".missing or .test == 1", &p).unwrap());
    assert!(eval(".missing || .test == 1 && .title", &p).unwrap());
    assert!(!eval("!.title", &p).unwrap());
    assert!(eval("!(.test == 2)", &p).unwrap());
    assert!(eval("not .flag and .test", &p).unwrap());
    // and binds tighter than or
    assert!(eval(".title or .missing and .flag", &p).unwrap());
}

#[test]
fn short_circuit_skips_undefined_fields() {
    let p = sample();
    assert!(!eval(".missing and .missing > 3", &p).unwrap());
    assert!(eval(".test or .missing > 3", &p).unwrap());
}

#[test]
fn dotted_paths() {
    let p = sample();
    assert!(eval(".user.name == 'alice'", &p).unwrap());
    assert!(eval(".user.age > 18", &p).unwrap());
    assert!(!eval(".user.email", &p).unwrap());
}

#[test]
fn undefined_field_in_comparison_fails() {
    let err = eval(".missing == 1", &sample()).unwrap_err();
    match err {
        DynSqlError::TemplateExecution(msg) => assert!(msg.contains("undefined field .missing")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn incompatible_comparison_fails() {
    let p = sample();
    assert!(matches!(
        eval(".title > 1", &p),
        Err(DynSqlError::TemplateExecution(_))
    ));
    assert!(matches!(
        eval(".test == 'x'", &p),
        Err(DynSqlError::TemplateExecution(_))
    ));
    assert!(matches!(
        eval(".flag < true", &p),
        Err(DynSqlError::TemplateExecution(_))
    ));
}

#[test]
fn syntax_errors_report_position() {
    for src in ["", ".", ".a ==", "(.a", ".a .b", "foo .a", "'open", "eq .a", ".a # 1"] {
        let err = Expression::compile(src).unwrap_err();
        assert!(
            matches!(err, DynSqlError::ExpressionSyntax { .. }),
            "{src:?} gave {err:?}"
        );
    }

    match Expression::compile(".a == @").unwrap_err() {
        DynSqlError::ExpressionSyntax { position, .. } => assert_eq!(position, 6),
        other => panic!("unexpected error: {other:?}"),
    }
}
