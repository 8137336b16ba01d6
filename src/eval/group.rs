use serde_json::Value;
use tracing::trace;

use super::{evaluate_not, evaluate_rule, record, EvalConditions};
use crate::render;
use crate::types::rule::{Annotation, RuleId};
use crate::types::{ConfigError, Evaluation};

/// Evaluate a group in value position (a type choice) or standalone: each
/// sub-rule is tried against the same data value, honoring the group's
/// combinator.
///
/// Groups mixed into an object or array never reach here; the dispatcher
/// routes those through the container evaluators via the supplied Behavior.
pub(crate) fn evaluate(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    conds.push(node.pos);
    trace!(rule = %render::rule_to_string(ctx, id), "evaluating group rule");

    let result = evaluate_group(conds, id, origin, data, ref_annotations);
    if let Ok(evaluation) = &result {
        record(conds, evaluation, id, data, "group");
    }
    conds.pop();
    result
}

fn evaluate_group(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    let annotations = node.annotations.clone();
    let refs = ref_annotations.as_deref();

    let children: Vec<RuleId> = node.children().unwrap_or_default().to_vec();
    let is_choice = node.is_choice();

    let mut retval: Option<Evaluation> = None;
    for (idx, &child_id) in children.iter().enumerate() {
        if idx > 0 {
            if is_choice {
                if retval.as_ref().is_some_and(|r| r.success) {
                    continue;
                }
            } else if let Some(prior) = &retval {
                if !prior.success {
                    return Ok(evaluate_not(&annotations, prior.clone(), refs));
                }
            }
        }
        retval = Some(evaluate_rule(conds, child_id, origin, data, None, None)?);
    }

    let overall = retval.unwrap_or_else(Evaluation::pass);
    Ok(evaluate_not(&annotations, overall, refs))
}

#[cfg(test)]
mod tests {
    use crate::{array, group, target, value, RulesetBuilder, ValueRule};
    use serde_json::json;

    fn check(builder: RulesetBuilder, data: serde_json::Value) -> bool {
        builder.build().unwrap().evaluate(&data).unwrap().success
    }

    #[test]
    fn value_choice_group() {
        let builder = || {
            RulesetBuilder::new()
                .rule(
                    "strs",
                    group([
                        value(ValueRule::literal("foo")),
                        value(ValueRule::literal("bar")),
                    ])
                    .choice(),
                )
                .root(array([target("strs").exactly(2)]))
        };
        assert!(check(builder(), json!(["foo", "bar"])));
        assert!(check(builder(), json!(["foo", "foo"])));
        assert!(!check(builder(), json!(["foo", "baz"])));
    }

    #[test]
    fn sequence_group_requires_every_check() {
        // a sequence group in value position conjoins its checks
        let builder = || {
            RulesetBuilder::new().root(group([
                value(ValueRule::StringType),
                value(ValueRule::pattern("^[a-z]+$")),
            ]))
        };
        assert!(check(builder(), json!("lower")));
        assert!(!check(builder(), json!("UPPER")));
        assert!(!check(builder(), json!(42)));
    }

    #[test]
    fn empty_group_passes() {
        assert!(check(RulesetBuilder::new().root(group([])), json!(null)));
    }

    #[test]
    fn negated_choice_group() {
        let builder = || {
            RulesetBuilder::new().root(
                group([
                    value(ValueRule::literal("a")),
                    value(ValueRule::literal("b")),
                ])
                .choice()
                .not(),
            )
        };
        assert!(!check(builder(), json!("a")));
        assert!(check(builder(), json!("c")));
    }
}
