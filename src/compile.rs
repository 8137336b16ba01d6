//! Ingestion: flattens builder expressions into a rule-node arena and
//! validates the result before any evaluation can run.

use std::collections::{HashMap, HashSet};

use crate::eval::name_association::compiled_regex;
use crate::types::expr::{ExprKind, RuleExpr};
use crate::types::rule::{Annotation, MemberName, Pos, RuleId, RuleKind, RuleNode};
use crate::types::ruleset::{Context, Decl, Root};
use crate::types::{ConfigError, ValueRule};

pub(crate) struct Ingested {
    /// Base arena (when overriding) plus all newly flattened nodes.
    pub nodes: Vec<RuleNode>,
    /// Names declared by this ingestion only.
    pub mapping: HashMap<String, RuleId>,
    /// Roots declared by this ingestion only.
    pub roots: Vec<Root>,
}

/// Flatten and validate one ruleset's declarations, optionally on top of an
/// existing [`Context`] whose names remain referenceable.
pub(crate) fn ingest(decls: &[Decl], base: Option<&Context>) -> Result<Ingested, ConfigError> {
    let mut nodes: Vec<RuleNode> = base.map(|ctx| (*ctx.nodes).clone()).unwrap_or_default();
    let mut mapping = HashMap::new();
    let mut roots = Vec::new();

    for (index, decl) in decls.iter().enumerate() {
        let line = u32::try_from(index).unwrap_or(u32::MAX).saturating_add(1);
        let mut column = 1;
        let id = flatten(&decl.expr, &mut nodes, line, &mut column);
        nodes[id.0].name = decl.name.clone();

        match &decl.name {
            Some(name) => {
                if mapping.insert(name.clone(), id).is_some() {
                    return Err(ConfigError::DuplicateRule { name: name.clone() });
                }
                if nodes[id.0].has_annotation(Annotation::Root) {
                    roots.push(Root {
                        id,
                        name: Some(name.clone()),
                    });
                }
            }
            None => roots.push(Root { id, name: None }),
        }
    }

    let mut registry: HashMap<String, RuleId> =
        base.map(|ctx| ctx.registry.clone()).unwrap_or_default();
    registry.extend(mapping.iter().map(|(name, id)| (name.clone(), *id)));

    check_targets(&nodes, &registry)?;
    check_regexes(&nodes)?;
    check_object_groups(&nodes, &registry)?;

    Ok(Ingested {
        nodes,
        mapping,
        roots,
    })
}

fn flatten(expr: &RuleExpr, nodes: &mut Vec<RuleNode>, line: u32, column: &mut u32) -> RuleId {
    let pos = expr.pos.unwrap_or(Pos {
        line,
        column: *column,
    });
    *column += 1;

    let kind = match &expr.kind {
        ExprKind::Value(rule) => RuleKind::Value(rule.clone()),
        ExprKind::Member { name, value } => {
            let value_id = flatten(value, nodes, line, column);
            RuleKind::Member {
                name: name.clone(),
                value: value_id,
            }
        }
        ExprKind::Object { combinator, children } => RuleKind::Object {
            combinator: *combinator,
            children: children
                .iter()
                .map(|child| flatten(child, nodes, line, column))
                .collect(),
        },
        ExprKind::Array { combinator, children } => RuleKind::Array {
            combinator: *combinator,
            children: children
                .iter()
                .map(|child| flatten(child, nodes, line, column))
                .collect(),
        },
        ExprKind::Group { combinator, children } => RuleKind::Group {
            combinator: *combinator,
            children: children
                .iter()
                .map(|child| flatten(child, nodes, line, column))
                .collect(),
        },
        ExprKind::Target(name) => RuleKind::Target { name: name.clone() },
    };

    let id = RuleId(nodes.len());
    nodes.push(RuleNode {
        name: None,
        annotations: expr.annotations.clone(),
        repetition: expr.repetition,
        kind,
        pos,
    });
    id
}

/// Every target reference must resolve against the combined registry; a
/// missing name is caught here, once, never during evaluation.
fn check_targets(
    nodes: &[RuleNode],
    registry: &HashMap<String, RuleId>,
) -> Result<(), ConfigError> {
    for node in nodes {
        if let RuleKind::Target { name } = &node.kind {
            if !registry.contains_key(name) {
                return Err(ConfigError::UnresolvedTarget {
                    name: name.clone(),
                    pos: node.pos,
                });
            }
        }
    }
    Ok(())
}

/// Member-name and string-value regexes must compile; compiling here also
/// warms the process-wide cache.
fn check_regexes(nodes: &[RuleNode]) -> Result<(), ConfigError> {
    for node in nodes {
        match &node.kind {
            RuleKind::Member {
                name: MemberName::Regex { pattern, flags },
                ..
            } => {
                compiled_regex(pattern, flags)?;
            }
            RuleKind::Value(ValueRule::StringRegex { pattern, flags }) => {
                compiled_regex(pattern, flags)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Object sub-groups are restricted to repetition max 0 or 1 with step 1;
/// array sub-groups are exempt. The walk follows groups, object mixins and
/// target chains with an identity-based cycle guard.
fn check_object_groups(
    nodes: &[RuleNode],
    registry: &HashMap<String, RuleId>,
) -> Result<(), ConfigError> {
    for node in nodes {
        if let RuleKind::Object { children, .. } = &node.kind {
            let mut visited = HashSet::new();
            check_group_children(nodes, registry, children, &mut visited)?;
        }
    }
    Ok(())
}

fn check_group_children(
    nodes: &[RuleNode],
    registry: &HashMap<String, RuleId>,
    children: &[RuleId],
    visited: &mut HashSet<RuleId>,
) -> Result<(), ConfigError> {
    for &child_id in children {
        let child = &nodes[child_id.0];
        let Some(resolved_id) = resolve_to_container(nodes, registry, child_id) else {
            continue;
        };
        if let RuleKind::Group { children: inner, .. } | RuleKind::Object { children: inner, .. } =
            &nodes[resolved_id.0].kind
        {
            let repetition = child.repetition;
            let max_ok = matches!(repetition.max, Some(0) | Some(1));
            if !max_ok || repetition.step > 1 {
                return Err(ConfigError::ObjectGroupRepetition { pos: child.pos });
            }
            if visited.insert(resolved_id) {
                check_group_children(nodes, registry, inner, visited)?;
            }
        }
    }
    Ok(())
}

/// Follow a target chain to a group or object node, if that is where it
/// leads; cycles and non-container leaves resolve to `None`.
fn resolve_to_container(
    nodes: &[RuleNode],
    registry: &HashMap<String, RuleId>,
    id: RuleId,
) -> Option<RuleId> {
    let mut current = id;
    let mut seen = HashSet::new();
    loop {
        if !seen.insert(current) {
            return None;
        }
        match &nodes[current.0].kind {
            RuleKind::Group { .. } | RuleKind::Object { .. } => return Some(current),
            RuleKind::Target { name } => current = *registry.get(name)?,
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::ConfigError;
    use crate::{group, member, object, target, value, RulesetBuilder, ValueRule};

    #[test]
    fn duplicate_names_rejected() {
        let result = RulesetBuilder::new()
            .rule("r", value(ValueRule::Any))
            .rule("r", value(ValueRule::Null))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateRule { name }) if name == "r"
        ));
    }

    #[test]
    fn unresolved_target_rejected() {
        let result = RulesetBuilder::new().root(target("ghost")).build();
        assert!(matches!(
            result,
            Err(ConfigError::UnresolvedTarget { name, .. }) if name == "ghost"
        ));
    }

    #[test]
    fn invalid_member_regex_rejected() {
        let result = RulesetBuilder::new()
            .root(object([crate::member_regex(
                "(oops",
                "",
                value(ValueRule::Any),
            )]))
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidRegex { .. })));
    }

    #[test]
    fn object_group_repetition_above_one_rejected() {
        let result = RulesetBuilder::new()
            .rule("g", group([member("a", value(ValueRule::Any))]))
            .root(object([target("g").exactly(2)]))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::ObjectGroupRepetition { .. })
        ));
    }

    #[test]
    fn object_group_step_rejected() {
        let result = RulesetBuilder::new()
            .rule("g", group([member("a", value(ValueRule::Any))]))
            .root(object([target("g").repeat(0, 1).step(2)]))
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::ObjectGroupRepetition { .. })
        ));
    }

    #[test]
    fn object_group_max_zero_and_one_accepted() {
        let result = RulesetBuilder::new()
            .rule("g", group([member("a", value(ValueRule::Any))]))
            .root(object([
                target("g").optional(),
                target("g").repeat(0, 0),
            ]))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn array_group_repetition_unrestricted() {
        let result = RulesetBuilder::new()
            .rule("g", group([value(ValueRule::Any)]))
            .root(crate::array([target("g").exactly(5)]))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn recursive_rule_ingests() {
        let result = RulesetBuilder::new()
            .rule(
                "tree",
                object([member("child", target("tree")).optional()]),
            )
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn positions_are_declaration_ordered() {
        let ctx = RulesetBuilder::new()
            .rule("first", value(ValueRule::Any))
            .rule("second", value(ValueRule::Any))
            .build()
            .unwrap();
        let first = ctx.node(ctx.registry["first"]);
        let second = ctx.node(ctx.registry["second"]);
        assert_eq!(first.pos.line, 1);
        assert_eq!(second.pos.line, 2);
    }

    #[test]
    fn explicit_position_survives_ingestion() {
        let ctx = RulesetBuilder::new()
            .rule("r", value(ValueRule::Any).at(40, 3))
            .build()
            .unwrap();
        let node = ctx.node(ctx.registry["r"]);
        assert_eq!(node.pos.line, 40);
        assert_eq!(node.pos.column, 3);
    }
}
