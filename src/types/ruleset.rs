use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::error::ConfigError;
use super::evaluation::Evaluation;
use super::expr::RuleExpr;
use super::report::{EvaluationReport, FailedRoot};
use super::rule::{RuleId, RuleKind, RuleNode};
use crate::compile;
use crate::eval::EvalConditions;

/// Decision returned by a [`RuleCallback`] entry point.
///
/// Replaces the structural result of the named rule it is registered for:
/// `Pass` makes the rule succeed, `Fail` makes it fail with no specific
/// reason, `FailWith` makes it fail with the given reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackVerdict {
    Pass,
    Fail,
    FailWith(String),
}

/// Externally supplied validation logic for a named rule.
///
/// After the engine computes a structural result for a rule whose declared
/// name has a registered callback, the matching entry point runs and its
/// verdict replaces the structural result. This enables checks the
/// declarative ruleset cannot express (checksums, parity, cross-field
/// arithmetic).
pub trait RuleCallback {
    /// Called when the structural evaluation succeeded.
    fn on_success(&self, _rule: &RuleNode, _data: &Value) -> CallbackVerdict {
        CallbackVerdict::Pass
    }

    /// Called when the structural evaluation failed; `tentative` is the
    /// structural result being overridden.
    fn on_failure(&self, _rule: &RuleNode, _data: &Value, _tentative: &Evaluation) -> CallbackVerdict {
        CallbackVerdict::Fail
    }
}

/// Adapter implementing [`RuleCallback`] from a single closure.
///
/// The closure receives the tentative evaluation on the failure path and
/// `None` on the success path.
pub struct CallbackFn<F>(pub F);

impl<F> RuleCallback for CallbackFn<F>
where
    F: Fn(&RuleNode, &Value, Option<&Evaluation>) -> CallbackVerdict,
{
    fn on_success(&self, rule: &RuleNode, data: &Value) -> CallbackVerdict {
        (self.0)(rule, data, None)
    }

    fn on_failure(&self, rule: &RuleNode, data: &Value, tentative: &Evaluation) -> CallbackVerdict {
        (self.0)(rule, data, Some(tentative))
    }
}

/// An evaluation entry point: a rule node plus its declared name, if any.
#[derive(Debug, Clone)]
pub(crate) struct Root {
    pub id: RuleId,
    pub name: Option<String>,
}

pub(crate) struct Decl {
    pub name: Option<String>,
    pub expr: RuleExpr,
}

/// Builder collecting rule declarations for ingestion into a [`Context`].
///
/// # Example
///
/// ```
/// use jsonrules::{member, object, target, value, RulesetBuilder, ValueRule};
///
/// let ctx = RulesetBuilder::new()
///     .rule("width", value(ValueRule::int_range(0, 1280)))
///     .root(object([member("width", target("width"))]))
///     .build()
///     .unwrap();
///
/// let eval = ctx.evaluate(&serde_json::json!({"width": 640})).unwrap();
/// assert!(eval.success);
/// ```
#[derive(Default)]
pub struct RulesetBuilder {
    decls: Vec<Decl>,
}

impl RulesetBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named rule. A rule carrying the `@{root}` annotation also
    /// becomes an evaluation entry point.
    #[must_use]
    pub fn rule(mut self, name: &str, expr: RuleExpr) -> Self {
        self.decls.push(Decl {
            name: Some(name.to_owned()),
            expr,
        });
        self
    }

    /// Declare a nameless top-level rule; nameless declarations are roots,
    /// tried in source order.
    #[must_use]
    pub fn root(mut self, expr: RuleExpr) -> Self {
        self.decls.push(Decl { name: None, expr });
        self
    }

    /// Ingest the declarations into an immutable [`Context`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on duplicate names, unresolvable target
    /// references, invalid member-name regexes, or object sub-groups with
    /// repetition max > 1 or step > 1.
    pub fn build(self) -> Result<Context, ConfigError> {
        let ingested = compile::ingest(&self.decls, None)?;
        Ok(Context {
            nodes: Arc::new(ingested.nodes),
            registry: ingested.mapping,
            roots: ingested.roots,
            callbacks: HashMap::new(),
            report_line_length: DEFAULT_REPORT_LINE_LENGTH,
        })
    }

    pub(crate) fn into_decls(self) -> Vec<Decl> {
        self.decls
    }
}

const DEFAULT_REPORT_LINE_LENGTH: usize = 80;

/// A compiled ruleset: rule-node arena, name registry, root set and
/// registered callbacks.
///
/// Durable for the life of the process and reusable across sequential
/// [`evaluate()`](Context::evaluate) calls; all mutable per-call state is
/// freshly allocated inside each call. Concurrent evaluation of one shared
/// `Context` is safe as long as registered callbacks do not share mutable
/// state across calls.
#[derive(Clone)]
pub struct Context {
    pub(crate) nodes: Arc<Vec<RuleNode>>,
    pub(crate) registry: HashMap<String, RuleId>,
    pub(crate) roots: Vec<Root>,
    pub(crate) callbacks: HashMap<String, Arc<dyn RuleCallback + Send + Sync>>,
    pub(crate) report_line_length: usize,
}

impl Context {
    /// Evaluate `data` against the declared roots, in source order; the
    /// first root to succeed short-circuits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when no root is declared or a configuration
    /// error (unresolved target, ambiguous member-name match) is hit
    /// mid-evaluation.
    pub fn evaluate(&self, data: &Value) -> Result<Evaluation, ConfigError> {
        let (evaluation, _) = self.run_roots(data, None)?;
        Ok(evaluation)
    }

    /// Evaluate `data` against the single named root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownRoot`] if `root_name` is not in the
    /// registry, plus the conditions of [`evaluate()`](Context::evaluate).
    pub fn evaluate_root(&self, data: &Value, root_name: &str) -> Result<Evaluation, ConfigError> {
        let (evaluation, _) = self.run_roots(data, Some(root_name))?;
        Ok(evaluation)
    }

    /// Evaluate with the structured failure report.
    ///
    /// The report groups failures by attempted root and nesting depth and is
    /// empty when the evaluation succeeded.
    ///
    /// # Errors
    ///
    /// As [`evaluate()`](Context::evaluate) / [`evaluate_root()`](Context::evaluate_root).
    pub fn evaluate_detailed(
        &self,
        data: &Value,
        root_name: Option<&str>,
    ) -> Result<EvaluationReport, ConfigError> {
        let (evaluation, failed_roots) = self.run_roots(data, root_name)?;
        Ok(EvaluationReport::new(
            evaluation,
            failed_roots,
            self.report_line_length,
        ))
    }

    /// Register external validation logic for the named rule. A later
    /// registration under the same name replaces the earlier one.
    pub fn register_callback(
        &mut self,
        rule_name: impl Into<String>,
        callback: impl RuleCallback + Send + Sync + 'static,
    ) {
        self.callbacks.insert(rule_name.into(), Arc::new(callback));
    }

    /// Line length used when wrapping failure-report entries.
    pub fn set_report_line_length(&mut self, length: usize) {
        self.report_line_length = length;
    }

    /// Merge `overlay` over this ruleset into a new `Context`, leaving this
    /// one untouched. Identically-named declarations are replaced by the
    /// overlay's; the overlay's roots take precedence over the existing
    /// ones. Overlay rules may reference names defined only here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as
    /// [`RulesetBuilder::build()`].
    pub fn override_with(&self, overlay: RulesetBuilder) -> Result<Context, ConfigError> {
        let ingested = compile::ingest(&overlay.into_decls(), Some(self))?;
        let mut registry = self.registry.clone();
        registry.extend(ingested.mapping);
        let mut roots = ingested.roots;
        roots.extend(self.roots.iter().cloned());
        Ok(Context {
            nodes: Arc::new(ingested.nodes),
            registry,
            roots,
            callbacks: self.callbacks.clone(),
            report_line_length: self.report_line_length,
        })
    }

    /// Merge `overlay` into this ruleset in place. Identically-named
    /// declarations are replaced by the overlay's; the overlay's roots are
    /// appended after the existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as
    /// [`RulesetBuilder::build()`]; on error this ruleset is unchanged.
    pub fn override_in_place(&mut self, overlay: RulesetBuilder) -> Result<(), ConfigError> {
        let ingested = compile::ingest(&overlay.into_decls(), Some(self))?;
        self.nodes = Arc::new(ingested.nodes);
        self.registry.extend(ingested.mapping);
        self.roots.extend(ingested.roots);
        Ok(())
    }

    /// Declared rule names, for inspection.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn node(&self, id: RuleId) -> &RuleNode {
        &self.nodes[id.0]
    }

    fn run_roots(
        &self,
        data: &Value,
        root_name: Option<&str>,
    ) -> Result<(Evaluation, Vec<FailedRoot>), ConfigError> {
        let roots: Vec<Root> = match root_name {
            Some(name) => {
                let id = self
                    .registry
                    .get(name)
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownRoot {
                        name: name.to_owned(),
                    })?;
                vec![Root {
                    id,
                    name: Some(name.to_owned()),
                }]
            }
            None => {
                if self.roots.is_empty() {
                    return Err(ConfigError::NoRoots);
                }
                self.roots.clone()
            }
        };

        let mut failed_roots = Vec::new();
        let mut last = Evaluation::fail_unexplained();
        for root in roots {
            let node = self.node(root.id);
            if matches!(node.kind, RuleKind::Member { .. }) {
                return Err(ConfigError::RootIsMember { pos: node.pos });
            }
            tracing::debug!(root = root.name.as_deref().unwrap_or("<nameless>"), "evaluating root");
            let mut conds = EvalConditions::new(self);
            let evaluation = crate::eval::evaluate_rule(&mut conds, root.id, root.id, data, None, None)?;
            if evaluation.success {
                return Ok((evaluation, Vec::new()));
            }
            failed_roots.push(FailedRoot {
                name: root.name,
                pos: node.pos,
                buckets: conds.into_buckets(),
            });
            last = evaluation;
        }
        Ok((last, failed_roots))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("rules", &self.registry.len())
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Context({} named rules, {} roots, {} nodes)",
            self.registry.len(),
            self.roots.len(),
            self.nodes.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{member, object, value, ValueRule};
    use serde_json::json;

    #[test]
    fn build_collects_named_rules_and_roots() {
        let ctx = RulesetBuilder::new()
            .rule("n", value(ValueRule::IntegerType))
            .root(object([member("a", value(ValueRule::IntegerType))]))
            .build()
            .unwrap();
        assert_eq!(ctx.rule_names(), vec!["n"]);
        assert_eq!(ctx.roots.len(), 1);
    }

    #[test]
    fn named_rule_with_root_annotation_is_a_root() {
        let ctx = RulesetBuilder::new()
            .rule("entry", object([]).root())
            .build()
            .unwrap();
        assert_eq!(ctx.roots.len(), 1);
        assert_eq!(ctx.roots[0].name.as_deref(), Some("entry"));
    }

    #[test]
    fn evaluate_without_roots_is_config_error() {
        let ctx = RulesetBuilder::new()
            .rule("n", value(ValueRule::IntegerType))
            .build()
            .unwrap();
        assert!(matches!(
            ctx.evaluate(&json!(1)),
            Err(ConfigError::NoRoots)
        ));
    }

    #[test]
    fn evaluate_root_unknown_name() {
        let ctx = RulesetBuilder::new().root(object([])).build().unwrap();
        assert!(matches!(
            ctx.evaluate_root(&json!({}), "nope"),
            Err(ConfigError::UnknownRoot { name }) if name == "nope"
        ));
    }

    #[test]
    fn member_rule_cannot_be_root() {
        let ctx = RulesetBuilder::new()
            .rule("m", member("a", value(ValueRule::Any)))
            .build()
            .unwrap();
        assert!(matches!(
            ctx.evaluate_root(&json!({}), "m"),
            Err(ConfigError::RootIsMember { .. })
        ));
    }

    #[test]
    fn first_succeeding_root_short_circuits() {
        let ctx = RulesetBuilder::new()
            .root(value(ValueRule::StringType))
            .root(value(ValueRule::IntegerType))
            .build()
            .unwrap();
        let eval = ctx.evaluate(&json!(5)).unwrap();
        assert!(eval.success);
    }

    #[test]
    fn report_empty_when_a_later_root_succeeds() {
        let ctx = RulesetBuilder::new()
            .root(value(ValueRule::StringType))
            .root(value(ValueRule::IntegerType))
            .build()
            .unwrap();
        let report = ctx.evaluate_detailed(&json!(5), None).unwrap();
        assert!(report.evaluation().success);
        assert!(report.report_lines().is_empty());
    }
}
