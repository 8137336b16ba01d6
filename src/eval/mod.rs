pub(crate) mod array;
pub(crate) mod group;
pub(crate) mod name_association;
pub(crate) mod object;
pub(crate) mod value;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::render;
use crate::types::report::Failure;
use crate::types::rule::{Annotation, Pos, RuleId, RuleKind};
use crate::types::ruleset::{CallbackVerdict, Context, RuleCallback};
use crate::types::{ConfigError, Evaluation, RuleNode};

use array::ArrayBehavior;
use name_association::{NameAssociation, NameKey};
use object::ObjectBehavior;

/// Per-call evaluation state: registry access, the trace stack of
/// currently-evaluating rule positions, the depth-indexed failure buckets,
/// and the per-call memo of choice-branch excluded-key sets.
///
/// Freshly allocated for every top-level `evaluate` call and discarded at
/// return.
pub(crate) struct EvalConditions<'a> {
    pub(crate) ctx: &'a Context,
    stack: Vec<Pos>,
    failures: Vec<Vec<Failure>>,
    excluded_memo: HashMap<RuleId, Arc<HashSet<NameKey>>>,
}

impl<'a> EvalConditions<'a> {
    pub(crate) fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            stack: Vec::new(),
            failures: Vec::new(),
            excluded_memo: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, pos: Pos) {
        self.stack.push(pos);
    }

    pub(crate) fn pop(&mut self) {
        self.stack.pop();
    }

    fn bucket_level(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    /// A success at this depth discards any failures recorded at this depth
    /// or deeper; only failures on the eventual failing path survive.
    pub(crate) fn report_success(&mut self) {
        let level = self.bucket_level();
        self.failures.truncate(level);
    }

    pub(crate) fn report_failure(&mut self, failure: Failure) {
        let level = self.bucket_level();
        while self.failures.len() <= level {
            self.failures.push(Vec::new());
        }
        self.failures[level].push(failure);
    }

    pub(crate) fn into_buckets(self) -> Vec<Vec<Failure>> {
        self.failures
    }

    /// Name keys reachable only through siblings of `branch`: the branch's
    /// excluded-key set. Memoized per call, keyed by the branch node.
    pub(crate) fn excluded_keys(
        &mut self,
        branch: RuleId,
        siblings: &[RuleId],
    ) -> Result<Arc<HashSet<NameKey>>, ConfigError> {
        if let Some(set) = self.excluded_memo.get(&branch) {
            return Ok(set.clone());
        }
        let ctx = self.ctx;
        let mut all_keys = HashSet::new();
        let mut visited = HashSet::new();
        for &sibling in siblings {
            collect_member_keys(ctx, sibling, &mut visited, &mut all_keys)?;
        }
        let mut branch_keys = HashSet::new();
        let mut visited = HashSet::new();
        collect_member_keys(ctx, branch, &mut visited, &mut branch_keys)?;

        let excluded: HashSet<NameKey> = all_keys.difference(&branch_keys).cloned().collect();
        let excluded = Arc::new(excluded);
        self.excluded_memo.insert(branch, excluded.clone());
        Ok(excluded)
    }
}

/// Ephemeral per-container bookkeeping, passed down when a sub-rule is a
/// nested group sharing the container's data.
pub(crate) enum Behavior<'b> {
    Object(&'b mut ObjectBehavior),
    Array(&'b mut ArrayBehavior),
}

/// Dispatch one rule node against one data value.
///
/// Routing priority: an already-supplied container Behavior continues that
/// container's evaluation; otherwise the node variant selects the evaluator.
/// A declared name with a registered callback overrides the structural
/// result afterwards.
pub(crate) fn evaluate_rule(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    behavior: Option<Behavior<'_>>,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    trace!(rule = %render::rule_to_string(ctx, id), "dispatching rule");

    let mut retval = match behavior {
        Some(Behavior::Object(b)) => object::evaluate(conds, id, origin, data, Some(b), ref_annotations)?,
        Some(Behavior::Array(b)) => array::evaluate(conds, id, origin, data, Some(b), ref_annotations)?,
        None => match &node.kind {
            RuleKind::Target { .. } => {
                let (target_id, target_annotations) = resolve_target(ctx, id)?;
                evaluate_rule(conds, target_id, target_id, data, None, Some(target_annotations))?
            }
            RuleKind::Value(_) => value::evaluate(conds, id, origin, data, ref_annotations)?,
            RuleKind::Array { .. } => array::evaluate(conds, id, origin, data, None, ref_annotations)?,
            RuleKind::Object { .. } => object::evaluate(conds, id, origin, data, None, ref_annotations)?,
            RuleKind::Group { .. } => group::evaluate(conds, id, origin, data, ref_annotations)?,
            RuleKind::Member { value, .. } => {
                let inner = evaluate_rule(conds, *value, origin, data, None, None)?;
                evaluate_not(&node.annotations, inner, ref_annotations.as_deref())
            }
        },
    };

    if let Some(name) = &node.name {
        if let Some(callback) = ctx.callbacks.get(name) {
            retval = dispatch_callback(callback.as_ref(), name, node, data, retval);
        }
    }
    Ok(retval)
}

/// Invoke a registered callback and coerce its verdict into the evaluation
/// that replaces the structural result.
fn dispatch_callback(
    callback: &(dyn RuleCallback + Send + Sync),
    name: &str,
    node: &RuleNode,
    data: &Value,
    tentative: Evaluation,
) -> Evaluation {
    let verdict = if tentative.success {
        callback.on_success(node, data)
    } else {
        callback.on_failure(node, data, &tentative)
    };
    trace!(callback = name, given = tentative.success, ?verdict, "callback override");
    match verdict {
        CallbackVerdict::Pass => Evaluation::pass(),
        CallbackVerdict::Fail => Evaluation::fail_unexplained(),
        CallbackVerdict::FailWith(reason) => Evaluation::fail(reason),
    }
}

/// `not` toggles success independently at the definition site and at the
/// reference through which the rule was reached, composed by successive
/// negation.
pub(crate) fn evaluate_not(
    annotations: &[Annotation],
    evaluation: Evaluation,
    ref_annotations: Option<&[Annotation]>,
) -> Evaluation {
    let mut is_not = false;
    if let Some(refs) = ref_annotations {
        if refs.contains(&Annotation::Not) {
            is_not = !is_not;
        }
    }
    if annotations.contains(&Annotation::Not) {
        is_not = !is_not;
    }
    if is_not {
        evaluation.invert()
    } else {
        evaluation
    }
}

/// Resolve a target node's referenced rule; the reference's own annotations
/// ride along for not-inversion.
pub(crate) fn resolve_target(
    ctx: &Context,
    id: RuleId,
) -> Result<(RuleId, Vec<Annotation>), ConfigError> {
    let node = ctx.node(id);
    let RuleKind::Target { name } = &node.kind else {
        return Ok((id, Vec::new()));
    };
    let target = ctx
        .registry
        .get(name)
        .copied()
        .ok_or_else(|| ConfigError::UnresolvedTarget {
            name: name.clone(),
            pos: node.pos,
        })?;
    trace!(name = %name, "referencing target rule");
    Ok((target, node.annotations.clone()))
}

/// Follow a target chain to a group or object mixin, if that is what it
/// leads to. Returns the resolved node plus the annotations of the first
/// reference hop. A reference cycle resolves to no mixin.
pub(crate) fn group_or_object_mixin(
    ctx: &Context,
    id: RuleId,
) -> Result<Option<(RuleId, Option<Vec<Annotation>>)>, ConfigError> {
    let mut current = id;
    let mut first_hop: Option<Vec<Annotation>> = None;
    let mut visited = HashSet::new();
    loop {
        if !visited.insert(current) {
            return Ok(None);
        }
        match &ctx.node(current).kind {
            RuleKind::Group { .. } | RuleKind::Object { .. } => {
                return Ok(Some((current, first_hop)));
            }
            RuleKind::Target { .. } => {
                let (next, annotations) = resolve_target(ctx, current)?;
                if first_hop.is_none() {
                    first_hop = Some(annotations);
                }
                current = next;
            }
            _ => return Ok(None),
        }
    }
}

/// As [`group_or_object_mixin`] but only for plain groups; array evaluation
/// splices groups but matches object rules against single elements.
pub(crate) fn group_rule(
    ctx: &Context,
    id: RuleId,
) -> Result<Option<(RuleId, Option<Vec<Annotation>>)>, ConfigError> {
    match group_or_object_mixin(ctx, id)? {
        Some((resolved, annotations))
            if matches!(ctx.node(resolved).kind, RuleKind::Group { .. }) =>
        {
            Ok(Some((resolved, annotations)))
        }
        _ => Ok(None),
    }
}

/// Follow a target chain to the referenced leaf rule, carrying the first
/// reference hop's annotations.
pub(crate) fn leaf_rule(
    ctx: &Context,
    id: RuleId,
) -> Result<(RuleId, Option<Vec<Annotation>>), ConfigError> {
    let mut current = id;
    let mut first_hop: Option<Vec<Annotation>> = None;
    let mut visited = HashSet::new();
    while matches!(ctx.node(current).kind, RuleKind::Target { .. }) {
        if !visited.insert(current) {
            break;
        }
        let (next, annotations) = resolve_target(ctx, current)?;
        if first_hop.is_none() {
            first_hop = Some(annotations);
        }
        current = next;
    }
    Ok((current, first_hop))
}

/// Walk every member rule recursively reachable from `id`, expanding groups,
/// object mixins and target references, with identity-based cycle detection.
/// Legitimate recursive named rules terminate expansion without error.
///
/// With `skip_excluded`, sub-rules with repetition max 0 (and everything
/// below them) are left out, mirroring the member set used for group
/// exclusion checks.
pub(crate) fn walk_members(
    ctx: &Context,
    id: RuleId,
    visited: &mut HashSet<RuleId>,
    skip_excluded: bool,
    f: &mut dyn FnMut(&Context, RuleId) -> Result<(), ConfigError>,
) -> Result<(), ConfigError> {
    if !visited.insert(id) {
        return Ok(());
    }
    let node = ctx.node(id);
    if skip_excluded && node.repetition.max == Some(0) {
        return Ok(());
    }
    match &node.kind {
        RuleKind::Member { .. } => f(ctx, id),
        RuleKind::Object { children, .. } | RuleKind::Group { children, .. } => {
            for &child in children {
                walk_members(ctx, child, visited, skip_excluded, f)?;
            }
            Ok(())
        }
        RuleKind::Target { .. } => {
            let (target_id, _) = resolve_target(ctx, id)?;
            walk_members(ctx, target_id, visited, skip_excluded, f)
        }
        _ => Ok(()),
    }
}

/// Collect the name keys of all non-excluded member rules reachable from `id`.
pub(crate) fn collect_member_keys(
    ctx: &Context,
    id: RuleId,
    visited: &mut HashSet<RuleId>,
    keys: &mut HashSet<NameKey>,
) -> Result<(), ConfigError> {
    walk_members(ctx, id, visited, true, &mut |ctx, member_id| {
        if let RuleKind::Member { name, .. } = &ctx.node(member_id).kind {
            keys.insert(NameAssociation::key_of(name));
        }
        Ok(())
    })
}

/// Record an evaluation into the failure tracer: successes trim deeper
/// buckets, failures land in the bucket for the current depth.
pub(crate) fn record(
    conds: &mut EvalConditions<'_>,
    evaluation: &Evaluation,
    id: RuleId,
    data: &Value,
    kind_label: &str,
) {
    if evaluation.success {
        conds.report_success();
        return;
    }
    let ctx = conds.ctx;
    let json = serde_json::to_string(data).unwrap_or_default();
    let failure = Failure::new(
        &json,
        ctx.node(id).pos,
        render::rule_def(ctx, id, kind_label),
        conds.stack.len().saturating_sub(1),
        evaluation,
    );
    conds.report_failure(failure);
}
