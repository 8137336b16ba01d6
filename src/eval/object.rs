use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::trace;

use super::name_association::{NameAssociation, NameKey};
use super::{
    evaluate_not, evaluate_rule, group_or_object_mixin, leaf_rule, record, walk_members, Behavior,
    EvalConditions,
};
use crate::render;
use crate::types::rule::{Annotation, RuleId, RuleKind};
use crate::types::ruleset::Context;
use crate::types::{ConfigError, Evaluation};

/// Ephemeral per-object bookkeeping: the name association for the object
/// being evaluated plus a tally of how many data keys map to each declared
/// name key. The tally answers "does the object show any instance of group
/// G's members" without evaluating G.
pub(crate) struct ObjectBehavior {
    pub(crate) assoc: NameAssociation,
    pub(crate) tally: HashMap<NameKey, usize>,
}

impl ObjectBehavior {
    fn build(
        ctx: &Context,
        children: &[RuleId],
        data: &Map<String, Value>,
    ) -> Result<Self, ConfigError> {
        let mut assoc = NameAssociation::new();
        let mut visited = HashSet::new();
        for &child in children {
            walk_members(ctx, child, &mut visited, false, &mut |ctx, member_id| {
                if let RuleKind::Member { name, .. } = &ctx.node(member_id).kind {
                    assoc.add_member(name)?;
                }
                Ok(())
            })?;
        }
        let mut tally = HashMap::new();
        for key in data.keys() {
            if let Some(name_key) = assoc.key_from_json(key)? {
                *tally.entry(name_key).or_insert(0) += 1;
            }
        }
        Ok(Self { assoc, tally })
    }

    /// Number of data keys attributed to members reachable from `id`.
    fn instances_of(&self, ctx: &Context, id: RuleId) -> Result<usize, ConfigError> {
        let mut keys = HashSet::new();
        let mut visited = HashSet::new();
        super::collect_member_keys(ctx, id, &mut visited, &mut keys)?;
        Ok(keys.iter().filter_map(|k| self.tally.get(k)).sum())
    }
}

pub(crate) fn evaluate(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    behavior: Option<&mut ObjectBehavior>,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    let label = if matches!(node.kind, RuleKind::Group { .. }) {
        "object group"
    } else {
        "object"
    };
    conds.push(node.pos);
    trace!(rule = %render::rule_to_string(ctx, id), kind = label, "evaluating object rule");

    let result = evaluate_object(conds, id, origin, data, behavior, ref_annotations);
    if let Ok(evaluation) = &result {
        record(conds, evaluation, id, data, label);
    }
    conds.pop();
    result
}

fn evaluate_object(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    behavior: Option<&mut ObjectBehavior>,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    let annotations = node.annotations.clone();
    let refs = ref_annotations.as_deref();

    let Some(map) = data.as_object() else {
        return Ok(evaluate_not(
            &annotations,
            Evaluation::fail(format!(
                "{} is not an object for{}",
                render::data_snippet(data),
                render::raised_rule(ctx, id, origin),
            )),
            refs,
        ));
    };

    // An object rule with zero sub-rules accepts any object: open for
    // extension.
    let children: Vec<RuleId> = node.children().unwrap_or_default().to_vec();
    if children.is_empty() {
        return Ok(evaluate_not(&annotations, Evaluation::pass(), refs));
    }

    let mut own_behavior;
    let behavior = match behavior {
        Some(supplied) => supplied,
        None => {
            own_behavior = ObjectBehavior::build(ctx, &children, map)?;
            &mut own_behavior
        }
    };

    let is_choice = node.is_choice();
    let mut excluded: HashMap<RuleId, std::sync::Arc<HashSet<NameKey>>> = HashMap::new();
    if is_choice {
        for &child in &children {
            excluded.insert(child, conds.excluded_keys(child, &children)?);
        }
    }

    let mut retval: Option<Evaluation> = None;
    for (idx, &child_id) in children.iter().enumerate() {
        // combinator short-circuiting
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

        // cross-branch key exclusivity: a choice branch fails outright when
        // the data holds a key belonging only to sibling branches
        if let Some(excluded_keys) = excluded.get(&child_id) {
            if !excluded_keys.is_empty() {
                let mut has_excluded = false;
                for key in map.keys() {
                    if let Some(name_key) = behavior.assoc.key_from_json(key)? {
                        if excluded_keys.contains(&name_key) {
                            retval = Some(Evaluation::fail(format!(
                                "JSON name {key} excluded from rule {} in choice {}",
                                render::rule_to_string(ctx, child_id),
                                render::rule_to_string(ctx, id),
                            )));
                            has_excluded = true;
                        }
                    }
                }
                if has_excluded {
                    continue;
                }
            }
        }

        let repetition = ctx.node(child_id).repetition;

        if let Some((group_id, group_refs)) = group_or_object_mixin(ctx, child_id)? {
            // Groups are evaluated in isolation against the entire object,
            // not against key/value pairs; ingestion caps their repetition
            // at max 1.
            if repetition.max == Some(0) {
                retval = Some(if behavior.instances_of(ctx, group_id)? == 0 {
                    Evaluation::pass()
                } else {
                    Evaluation::fail(format!(
                        "object contains members of excluded group {} for{}",
                        render::rule_to_string(ctx, child_id),
                        render::raised_rule(ctx, id, origin),
                    ))
                });
            } else {
                let evaluation = evaluate_rule(
                    conds,
                    group_id,
                    origin,
                    data,
                    Some(Behavior::Object(&mut *behavior)),
                    group_refs,
                )?;
                retval = Some(if evaluation.success {
                    Evaluation::pass()
                } else if repetition.min == 0 {
                    // An optional group is accepted when absent but a
                    // partially-present one is a hard failure.
                    if behavior.instances_of(ctx, group_id)? == 0 {
                        Evaluation::pass()
                    } else {
                        Evaluation::fail(format!(
                            "object contains an incomplete instance of group {} for{}",
                            render::rule_to_string(ctx, child_id),
                            render::raised_rule(ctx, id, origin),
                        ))
                    }
                } else {
                    Evaluation::fail(format!(
                        "object does not contain group {} for{}",
                        render::rule_to_string(ctx, child_id),
                        render::raised_rule(ctx, id, origin),
                    ))
                });
            }
            continue;
        }

        // member rule, possibly reached through a target reference
        let (leaf_id, leaf_refs) = leaf_rule(ctx, child_id)?;
        let leaf = ctx.node(leaf_id);
        let RuleKind::Member { name, value } = &leaf.kind else {
            let evaluation = evaluate_rule(conds, child_id, origin, data, None, None)?;
            retval = Some(evaluation);
            continue;
        };
        let value_id = *value;
        let rule_key = NameAssociation::key_of(name);

        let mut num_passes: u64 = 0;
        let mut failed: Option<Evaluation> = None;
        for (key, member_value) in map {
            if behavior.assoc.key_from_json(key)? != Some(rule_key.clone()) {
                continue;
            }
            let evaluation = evaluate_rule(conds, value_id, origin, member_value, None, None)?;
            if evaluation.success {
                num_passes += 1;
            } else {
                // one mismatched value is a hard failure: no partial credit
                // across multiple same-key matches
                failed = Some(evaluation);
                break;
            }
        }
        trace!(
            matches = num_passes,
            min = repetition.min,
            "matching members found in object"
        );

        let folded = if let Some(failure) = failed {
            failure
        } else if num_passes == 0 && repetition.min > 0 {
            Evaluation::fail(format!(
                "object does not contain {} for{}",
                render::rule_to_string(ctx, child_id),
                render::raised_rule(ctx, id, origin),
            ))
        } else if num_passes < repetition.min {
            Evaluation::fail(format!(
                "object does not have enough {} for{}",
                render::rule_to_string(ctx, child_id),
                render::raised_rule(ctx, id, origin),
            ))
        } else if repetition.max.is_some_and(|max| num_passes > max) {
            Evaluation::fail(format!(
                "object has too many {} for{}",
                render::rule_to_string(ctx, child_id),
                render::raised_rule(ctx, id, origin),
            ))
        } else if !repetition.accepts(num_passes) {
            Evaluation::fail(format!(
                "object matches ({num_passes}) do not satisfy repetition step {} for {}",
                repetition.step,
                render::rule_to_string(ctx, child_id),
            ))
        } else {
            Evaluation::pass()
        };
        retval = Some(evaluate_not(&leaf.annotations, folded, leaf_refs.as_deref()));
    }

    let overall = retval.unwrap_or_else(Evaluation::pass);
    Ok(evaluate_not(&annotations, overall, refs))
}
