use serde_json::Value;
use tracing::trace;

use super::{evaluate_not, evaluate_rule, group_rule, record, Behavior, EvalConditions};
use crate::render;
use crate::types::rule::{Annotation, Repetition, RuleId, RuleKind};
use crate::types::ruleset::Context;
use crate::types::{ConfigError, Evaluation};

/// Ephemeral per-array bookkeeping: which elements have been consumed.
///
/// Ordered matching advances a cursor over a contiguous run; unordered
/// matching marks elements taken wherever they sit. Groups nested in the
/// array share the behavior so their items continue where the parent left
/// off.
pub(crate) struct ArrayBehavior {
    pub(crate) ordered: bool,
    cursor: usize,
    taken: Vec<bool>,
}

#[derive(Clone)]
struct Checkpoint {
    cursor: usize,
    taken: Vec<bool>,
}

impl ArrayBehavior {
    fn new(ordered: bool, len: usize) -> Self {
        Self {
            ordered,
            cursor: 0,
            taken: vec![false; len],
        }
    }

    fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            cursor: self.cursor,
            taken: self.taken.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.cursor = checkpoint.cursor;
        self.taken = checkpoint.taken;
    }

    /// Total elements consumed so far, in either mode.
    fn consumed(&self) -> usize {
        if self.ordered {
            self.cursor
        } else {
            self.taken.iter().filter(|&&t| t).count()
        }
    }

    fn leftover(&self, len: usize) -> usize {
        len - self.consumed()
    }
}

pub(crate) fn evaluate(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    behavior: Option<&mut ArrayBehavior>,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    let label = if matches!(node.kind, RuleKind::Group { .. }) {
        "array group"
    } else {
        "array"
    };
    conds.push(node.pos);
    trace!(rule = %render::rule_to_string(ctx, id), kind = label, "evaluating array rule");

    let result = evaluate_array(conds, id, origin, data, behavior, ref_annotations);
    if let Ok(evaluation) = &result {
        record(conds, evaluation, id, data, label);
    }
    conds.pop();
    result
}

fn evaluate_array(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    behavior: Option<&mut ArrayBehavior>,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    let annotations = node.annotations.clone();
    let refs = ref_annotations.as_deref();

    let Some(items) = data.as_array() else {
        return Ok(evaluate_not(
            &annotations,
            Evaluation::fail(format!(
                "{} is not an array for{}",
                render::data_snippet(data),
                render::raised_rule(ctx, id, origin),
            )),
            refs,
        ));
    };

    // An array rule with zero item sub-rules accepts any array.
    let children: Vec<RuleId> = node.children().unwrap_or_default().to_vec();
    if children.is_empty() {
        return Ok(evaluate_not(&annotations, Evaluation::pass(), refs));
    }

    let owns_behavior = behavior.is_none();
    let mut own_behavior;
    let behavior = match behavior {
        Some(supplied) => supplied,
        None => {
            let ordered = !node.has_annotation(Annotation::Unordered);
            own_behavior = ArrayBehavior::new(ordered, items.len());
            &mut own_behavior
        }
    };

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

        let repetition = ctx.node(child_id).repetition;
        let checkpoint = behavior.snapshot();

        let result = if let Some((group_id, group_refs)) = group_rule(ctx, child_id)? {
            // A nested group is matched repeatedly against successive
            // element slices; unlike object sub-groups its repetition is
            // unrestricted.
            let mut successes: u64 = 0;
            loop {
                if repetition.max.is_some_and(|max| successes >= max) {
                    break;
                }
                let before = behavior.snapshot();
                let consumed_before = behavior.consumed();
                let evaluation = evaluate_rule(
                    conds,
                    group_id,
                    origin,
                    data,
                    Some(Behavior::Array(&mut *behavior)),
                    group_refs.clone(),
                )?;
                if !evaluation.success {
                    behavior.restore(before);
                    break;
                }
                successes += 1;
                if behavior.consumed() == consumed_before {
                    // an all-optional group that consumed nothing would
                    // otherwise repeat forever
                    break;
                }
            }
            fold_count(ctx, id, origin, child_id, successes, repetition, "group")
        } else {
            // single-element rule: consume a run of elements sized within
            // the repetition span
            let mut successes: u64 = 0;
            if behavior.ordered {
                while repetition.max.is_none_or(|max| successes < max)
                    && behavior.cursor < items.len()
                {
                    let evaluation =
                        evaluate_rule(conds, child_id, origin, &items[behavior.cursor], None, None)?;
                    if !evaluation.success {
                        break;
                    }
                    behavior.cursor += 1;
                    successes += 1;
                }
            } else {
                for i in 0..items.len() {
                    if behavior.taken[i] {
                        continue;
                    }
                    if repetition.max.is_some_and(|max| successes >= max) {
                        break;
                    }
                    let evaluation = evaluate_rule(conds, child_id, origin, &items[i], None, None)?;
                    if evaluation.success {
                        behavior.taken[i] = true;
                        successes += 1;
                    }
                }
            }
            fold_count(ctx, id, origin, child_id, successes, repetition, "item")
        };

        if is_choice && !result.success {
            behavior.restore(checkpoint);
        }
        retval = Some(result);
    }

    let mut overall = retval.unwrap_or_else(Evaluation::pass);
    if owns_behavior && overall.success {
        let leftover = behavior.leftover(items.len());
        if leftover > 0 {
            overall = Evaluation::fail(format!(
                "array has {leftover} more elements than specified for{}",
                render::raised_rule(ctx, id, origin),
            ));
        }
    }
    Ok(evaluate_not(&annotations, overall, refs))
}

fn fold_count(
    ctx: &Context,
    id: RuleId,
    origin: RuleId,
    child_id: RuleId,
    successes: u64,
    repetition: Repetition,
    what: &str,
) -> Evaluation {
    trace!(
        matches = successes,
        min = repetition.min,
        "matching array {what} repetitions"
    );
    if successes == 0 && repetition.min > 0 {
        Evaluation::fail(format!(
            "array does not contain {what} {} for{}",
            render::rule_to_string(ctx, child_id),
            render::raised_rule(ctx, id, origin),
        ))
    } else if successes < repetition.min {
        Evaluation::fail(format!(
            "array does not have enough of {what} {} for{}",
            render::rule_to_string(ctx, child_id),
            render::raised_rule(ctx, id, origin),
        ))
    } else if !repetition.accepts(successes) {
        Evaluation::fail(format!(
            "array matches ({successes}) do not satisfy repetition step {} for {}",
            repetition.step,
            render::rule_to_string(ctx, child_id),
        ))
    } else {
        Evaluation::pass()
    }
}
