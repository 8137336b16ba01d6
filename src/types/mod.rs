pub(crate) mod error;
pub(crate) mod evaluation;
pub(crate) mod expr;
pub(crate) mod report;
pub(crate) mod rule;
pub(crate) mod ruleset;
pub(crate) mod value_rule;

pub use error::ConfigError;
pub use evaluation::Evaluation;
pub use expr::{array, group, member, member_any, member_regex, object, target, value, RuleExpr};
pub use report::{EvaluationReport, FailedRoot, Failure};
pub use rule::{Annotation, Combinator, MemberName, Pos, Repetition, RuleId, RuleKind, RuleNode};
pub use ruleset::{CallbackFn, CallbackVerdict, Context, RuleCallback, RulesetBuilder};
pub use value_rule::ValueRule;
