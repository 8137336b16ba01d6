use jsonrules::{array, member, object, target, value, ConfigError, RulesetBuilder, ValueRule};
use serde_json::json;

#[test]
fn success_produces_empty_report() {
    let ctx = RulesetBuilder::new()
        .root(object([member("a", value(ValueRule::IntegerType))]))
        .build()
        .unwrap();
    let report = ctx.evaluate_detailed(&json!({"a": 1}), None).unwrap();
    assert!(report.evaluation().success);
    assert!(report.report_lines().is_empty());
    assert!(report.failed_roots().is_empty());
}

#[test]
fn failure_report_groups_by_root() {
    let ctx = RulesetBuilder::new()
        .rule("numbers", array([value(ValueRule::IntegerType).one_or_more()]).root())
        .rule("words", array([value(ValueRule::StringType).one_or_more()]).root())
        .build()
        .unwrap();

    let report = ctx.evaluate_detailed(&json!([null]), None).unwrap();
    assert!(!report.evaluation().success);
    assert_eq!(report.failed_roots().len(), 2);

    let lines = report.report_lines();
    assert_eq!(lines[0], "- Failures for root rule named 'numbers'");
    assert!(lines.iter().any(|l| l == "- Failures for root rule named 'words'"));
    assert!(lines.iter().any(|l| l.contains("failure at rule level")));
}

#[test]
fn nameless_root_reported_by_line() {
    let ctx = RulesetBuilder::new()
        .root(value(ValueRule::IntegerType))
        .build()
        .unwrap();
    let report = ctx.evaluate_detailed(&json!("nope"), None).unwrap();
    let lines = report.report_lines();
    assert_eq!(lines[0], "- Failures for root rule at line 1");
}

#[test]
fn deeper_failures_keep_only_failing_path() {
    // first member passes, second fails: only the failing member's trace
    // should survive the success-trim
    let ctx = RulesetBuilder::new()
        .root(object([
            member("good", value(ValueRule::IntegerType)),
            member("bad", value(ValueRule::IntegerType)),
        ]))
        .build()
        .unwrap();
    let report = ctx
        .evaluate_detailed(&json!({"good": 1, "bad": "oops"}), None)
        .unwrap();
    assert!(!report.evaluation().success);
    let lines = report.report_lines().join("\n");
    assert!(lines.contains("failed rule"), "report: {lines}");
    // the passing member does not appear as a failure
    assert!(!lines.contains("<< 1 >>"), "report: {lines}");
}

#[test]
fn same_depth_failures_render_as_disjunction() {
    let ctx = RulesetBuilder::new()
        .root(
            array([
                value(ValueRule::IntegerType),
                value(ValueRule::StringType),
            ])
            .choice(),
        )
        .build()
        .unwrap();
    let report = ctx.evaluate_detailed(&json!([null]), None).unwrap();
    let lines = report.report_lines();
    assert!(
        lines
            .iter()
            .any(|l| l.contains("one of the following") && l.contains("reasons")),
        "report: {lines:?}"
    );
}

#[test]
fn long_data_is_elided_in_report() {
    let ctx = RulesetBuilder::new()
        .root(value(ValueRule::IntegerType))
        .build()
        .unwrap();
    let long_string = "x".repeat(200);
    let report = ctx.evaluate_detailed(&json!(long_string), None).unwrap();
    let lines = report.report_lines();
    assert!(lines.iter().any(|l| l.contains("...")), "report: {lines:?}");
    assert!(lines.iter().all(|l| l.len() < 120), "report: {lines:?}");
}

#[test]
fn ambiguous_regex_match_aborts_evaluation() {
    use jsonrules::member_regex;
    let ctx = RulesetBuilder::new()
        .root(object([
            member_regex("^fo.", "", value(ValueRule::Any)).optional(),
            member_regex("^f.e", "", value(ValueRule::Any)).optional(),
        ]))
        .build()
        .unwrap();
    // "foe" matches both declared regex slots: a configuration error, not a
    // validation failure
    let result = ctx.evaluate(&json!({"foe": 1}));
    assert!(matches!(
        result,
        Err(ConfigError::AmbiguousMemberName { name, .. }) if name == "foe"
    ));
}

#[test]
fn report_line_length_is_configurable() {
    let mut ctx = RulesetBuilder::new()
        .root(value(ValueRule::IntegerType))
        .build()
        .unwrap();
    ctx.set_report_line_length(40);
    let report = ctx
        .evaluate_detailed(&json!("a fairly long piece of data here"), None)
        .unwrap();
    for line in report.report_lines() {
        assert!(line.len() <= 60, "line too long: {line}");
    }
}
