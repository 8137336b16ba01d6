//! Rule evaluation engine validating JSON-shaped data trees against
//! declarative rulesets.
//!
//! A ruleset describes value types, object and array shapes, repetition
//! counts, choices, negation and named reusable sub-rules. Build one with
//! [`RulesetBuilder`] and the expression vocabulary ([`value`], [`member`],
//! [`object`], [`array`], [`group`], [`target`]), then evaluate
//! [`serde_json::Value`] trees against the resulting [`Context`].
//!
//! ```
//! use jsonrules::{array, group, target, value, RulesetBuilder, ValueRule};
//!
//! let ctx = RulesetBuilder::new()
//!     .rule("ints", value(ValueRule::int_range(0, 2)))
//!     .rule(
//!         "strs",
//!         group([
//!             value(ValueRule::literal("foo")),
//!             value(ValueRule::literal("bar")),
//!         ])
//!         .choice(),
//!     )
//!     .root(array([target("ints").exactly(2), target("strs").exactly(2)]))
//!     .build()
//!     .unwrap();
//!
//! let eval = ctx.evaluate(&serde_json::json!([1, 2, "foo", "bar"])).unwrap();
//! assert!(eval.success);
//!
//! let eval = ctx.evaluate(&serde_json::json!([1, 20000, "foo", "bar"])).unwrap();
//! assert!(!eval.success);
//! ```
//!
//! Validation failures are ordinary [`Evaluation`] values with a structured,
//! position-aware failure report available through
//! [`Context::evaluate_detailed`]; configuration errors (unresolved names,
//! ambiguous member-name regexes, illegal group repetition) abort with a
//! [`ConfigError`].

mod compile;
mod eval;
mod render;
mod types;

pub use types::{
    array, group, member, member_any, member_regex, object, target, value, Annotation, CallbackFn,
    CallbackVerdict, Combinator, ConfigError, Context, Evaluation, EvaluationReport, FailedRoot,
    Failure, MemberName, Pos, Repetition, RuleCallback, RuleExpr, RuleId, RuleKind, RuleNode,
    RulesetBuilder, ValueRule,
};
