//! Human-readable rendering of rule definitions for reasons and failure
//! reports.

use serde_json::Value;

use crate::types::report::elide;
use crate::types::rule::{Annotation, Combinator, MemberName, Repetition, RuleId, RuleKind};
use crate::types::ruleset::Context;

/// `<type> definition << <rendered rule> >>` as recorded in failures.
pub(crate) fn rule_def(ctx: &Context, id: RuleId, kind_label: &str) -> String {
    format!("{kind_label} definition << {} >>", elide(&body(ctx, id)))
}

/// `<< <rendered rule> >>` as embedded in failure reasons.
pub(crate) fn rule_to_string(ctx: &Context, id: RuleId) -> String {
    format!("<< {} >>", body(ctx, id))
}

/// ` rule at <pos> << .. >> from rule at <pos>`, locating a failing rule and
/// the rule it was reached from.
pub(crate) fn raised_rule(ctx: &Context, id: RuleId, origin: RuleId) -> String {
    format!(
        " rule at {} {} from rule at {}",
        ctx.node(id).pos,
        rule_to_string(ctx, id),
        ctx.node(origin).pos,
    )
}

/// Elided snippet of a data value for reasons.
pub(crate) fn data_snippet(data: &Value) -> String {
    elide(&serde_json::to_string(data).unwrap_or_default())
}

fn body(ctx: &Context, id: RuleId) -> String {
    let node = ctx.node(id);
    let annotations = annotations_to_string(&node.annotations);
    let rendered = match &node.kind {
        RuleKind::Value(rule) => rule.to_string(),
        RuleKind::Member { name, value } => {
            format!("{} : {}", member_name_to_string(name), body(ctx, *value))
        }
        RuleKind::Object { combinator, children } => {
            format!("{{ {} }}", children_to_string(ctx, children, *combinator))
        }
        RuleKind::Array { combinator, children } => {
            format!("[ {} ]", children_to_string(ctx, children, *combinator))
        }
        RuleKind::Group { combinator, children } => {
            format!("( {} )", children_to_string(ctx, children, *combinator))
        }
        RuleKind::Target { name } => format!("${name}"),
    };
    match &node.name {
        Some(name) => format!("${name} = {annotations}{rendered}"),
        None => format!("{annotations}{rendered}"),
    }
}

fn children_to_string(ctx: &Context, children: &[RuleId], combinator: Combinator) -> String {
    let joiner = match combinator {
        Combinator::Sequence => " , ",
        Combinator::Choice => " | ",
    };
    children
        .iter()
        .map(|&child| {
            let mut s = body(ctx, child);
            s.push_str(&repetition_to_string(&ctx.node(child).repetition));
            s
        })
        .collect::<Vec<_>>()
        .join(joiner)
}

fn member_name_to_string(name: &MemberName) -> String {
    match name {
        MemberName::Literal(s) => format!("\"{s}\""),
        MemberName::Regex { pattern, flags } => format!("/{pattern}/{flags}"),
        MemberName::Any => "//".to_owned(),
    }
}

fn annotations_to_string(annotations: &[Annotation]) -> String {
    let mut out = String::new();
    for annotation in annotations {
        let tag = match annotation {
            Annotation::Not => "@{not}",
            Annotation::Choice => "@{choice}",
            Annotation::Root => "@{root}",
            Annotation::ExcludeMin => "@{exclude-min}",
            Annotation::ExcludeMax => "@{exclude-max}",
            Annotation::Default => "@{default}",
            Annotation::Format => "@{format}",
            Annotation::Augments => "@{augments}",
            Annotation::Unordered => "@{unordered}",
            Annotation::Tbd => "@{tbd}",
        };
        out.push_str(tag);
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out
}

fn repetition_to_string(repetition: &Repetition) -> String {
    let mut out = match (repetition.min, repetition.max) {
        (1, Some(1)) => String::new(),
        (0, Some(1)) => " ?".to_owned(),
        (0, None) => " *".to_owned(),
        (1, None) => " +".to_owned(),
        (min, Some(max)) if min == max => format!(" *{min}"),
        (min, Some(max)) => format!(" *{min}..{max}"),
        (min, None) => format!(" *{min}.."),
    };
    if repetition.step > 1 {
        out.push_str(&format!("%{}", repetition.step));
    }
    out
}
