use jsonrules::{
    array, member, object, target, value, CallbackFn, CallbackVerdict, Evaluation, RuleCallback,
    RuleNode, RulesetBuilder, ValueRule,
};
use serde_json::{json, Value};

/// Accepts only even integers, something the declarative ruleset cannot say.
struct EvenOnly;

impl RuleCallback for EvenOnly {
    fn on_success(&self, _rule: &RuleNode, data: &Value) -> CallbackVerdict {
        match data.as_i64() {
            Some(n) if n % 2 == 0 => CallbackVerdict::Pass,
            _ => CallbackVerdict::FailWith("value must be even".to_owned()),
        }
    }
}

#[test]
fn callback_rejects_structurally_valid_data() {
    let mut ctx = RulesetBuilder::new()
        .rule("num", value(ValueRule::IntegerType))
        .root(object([member("n", target("num"))]))
        .build()
        .unwrap();
    ctx.register_callback("num", EvenOnly);

    assert!(ctx.evaluate(&json!({"n": 4})).unwrap().success);
    let eval = ctx.evaluate(&json!({"n": 3})).unwrap();
    assert!(!eval.success);
}

#[test]
fn callback_failure_reason_reaches_report() {
    let mut ctx = RulesetBuilder::new()
        .rule("num", value(ValueRule::IntegerType))
        .root(array([target("num").one_or_more()]))
        .build()
        .unwrap();
    ctx.register_callback("num", EvenOnly);

    let report = ctx.evaluate_detailed(&json!([3]), None).unwrap();
    assert!(!report.evaluation().success);
    assert!(!report.report_lines().is_empty());
}

/// Rescues a structural failure: treats any string as acceptable.
struct RescueStrings;

impl RuleCallback for RescueStrings {
    fn on_failure(&self, _rule: &RuleNode, data: &Value, _tentative: &Evaluation) -> CallbackVerdict {
        if data.is_string() {
            CallbackVerdict::Pass
        } else {
            CallbackVerdict::Fail
        }
    }
}

#[test]
fn callback_can_rescue_a_failure() {
    let mut ctx = RulesetBuilder::new()
        .rule("num", value(ValueRule::IntegerType))
        .root(array([target("num")]))
        .build()
        .unwrap();
    ctx.register_callback("num", RescueStrings);

    assert!(ctx.evaluate(&json!([1])).unwrap().success);
    assert!(ctx.evaluate(&json!(["rescued"])).unwrap().success);
    assert!(!ctx.evaluate(&json!([null])).unwrap().success);
}

#[test]
fn closure_adapter_sees_both_paths() {
    let mut ctx = RulesetBuilder::new()
        .rule("num", value(ValueRule::IntegerType))
        .root(array([target("num")]))
        .build()
        .unwrap();
    ctx.register_callback(
        "num",
        CallbackFn(|_rule: &RuleNode, _data: &Value, tentative: Option<&Evaluation>| {
            match tentative {
                // failure path: keep the failure but rewrite the reason
                Some(_) => CallbackVerdict::FailWith("callback saw the failure".to_owned()),
                // success path: keep the success
                None => CallbackVerdict::Pass,
            }
        }),
    );

    assert!(ctx.evaluate(&json!([1])).unwrap().success);
    let eval = ctx.evaluate(&json!(["x"])).unwrap();
    assert!(!eval.success);
}

#[test]
fn callbacks_survive_override() {
    let mut ctx = RulesetBuilder::new()
        .rule("num", value(ValueRule::IntegerType))
        .root(array([target("num")]))
        .build()
        .unwrap();
    ctx.register_callback("num", EvenOnly);

    let widened = ctx
        .override_with(RulesetBuilder::new().root(array([target("num").one_or_more()])))
        .unwrap();
    // the callback registered on the original still applies in the override
    assert!(widened.evaluate(&json!([2, 4])).unwrap().success);
    assert!(!widened.evaluate(&json!([2, 3])).unwrap().success);
}

#[test]
fn unregistered_names_are_untouched() {
    let mut ctx = RulesetBuilder::new()
        .rule("num", value(ValueRule::IntegerType))
        .rule("word", value(ValueRule::StringType))
        .root(array([target("num"), target("word")]))
        .build()
        .unwrap();
    ctx.register_callback("num", EvenOnly);

    assert!(ctx.evaluate(&json!([2, "any string"])).unwrap().success);
}
