use std::fmt;

use super::value_rule::ValueRule;

/// Index of a rule node in a [`Context`](super::Context) arena.
///
/// The arena index is the stable node identity: cycle guards and per-call
/// memo tables key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Source position attached to a rule node.
///
/// An external parser supplies real line/column coordinates via
/// [`RuleExpr::at()`](super::RuleExpr::at); ingestion synthesizes
/// declaration-ordered positions for nodes built without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    #[must_use]
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// Tags altering a rule's evaluation semantics.
///
/// `Not`, `Choice`, `Unordered`, `ExcludeMin`, `ExcludeMax` and `Root` are
/// acted on by the engine; the rest are carried as metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    Not,
    Choice,
    Root,
    ExcludeMin,
    ExcludeMax,
    Default,
    Format,
    Augments,
    Unordered,
    Tbd,
}

/// Repetition bounds for a sub-rule: `min..=max` occurrences stepped by
/// `step`. `max == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repetition {
    pub min: u64,
    pub max: Option<u64>,
    pub step: u64,
}

impl Default for Repetition {
    fn default() -> Self {
        Self {
            min: 1,
            max: Some(1),
            step: 1,
        }
    }
}

impl Repetition {
    #[must_use]
    pub fn once() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn optional() -> Self {
        Self {
            min: 0,
            max: Some(1),
            step: 1,
        }
    }

    #[must_use]
    pub fn zero_or_more() -> Self {
        Self {
            min: 0,
            max: None,
            step: 1,
        }
    }

    #[must_use]
    pub fn one_or_more() -> Self {
        Self {
            min: 1,
            max: None,
            step: 1,
        }
    }

    #[must_use]
    pub fn exactly(n: u64) -> Self {
        Self {
            min: n,
            max: Some(n),
            step: 1,
        }
    }

    #[must_use]
    pub fn range(min: u64, max: Option<u64>) -> Self {
        Self { min, max, step: 1 }
    }

    /// Whether `count` occurrences satisfy these bounds, including step
    /// divisibility (`(count - min) % step == 0`).
    #[must_use]
    pub fn accepts(&self, count: u64) -> bool {
        if count < self.min {
            return false;
        }
        if let Some(max) = self.max {
            if count > max {
                return false;
            }
        }
        self.step <= 1 || (count - self.min) % self.step == 0
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// How a container's sub-rule list is combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Combinator {
    #[default]
    Sequence,
    Choice,
}

/// Member-name pattern of a member rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberName {
    /// Exact string equality.
    Literal(String),
    /// Regex match; `flags` is a subset of `ixs`.
    Regex { pattern: String, flags: String },
    /// Wildcard: matches any member name.
    Any,
}

/// Variant-specific payload of an ingested rule node.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    Value(ValueRule),
    Member {
        name: MemberName,
        value: RuleId,
    },
    Object {
        combinator: Combinator,
        children: Vec<RuleId>,
    },
    Array {
        combinator: Combinator,
        children: Vec<RuleId>,
    },
    Group {
        combinator: Combinator,
        children: Vec<RuleId>,
    },
    Target {
        name: String,
    },
}

/// One ingested rule definition or reference, stored in a `Context` arena.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    /// Declared rule name, if this node is a named definition.
    pub name: Option<String>,
    pub annotations: Vec<Annotation>,
    pub repetition: Repetition,
    pub kind: RuleKind,
    pub pos: Pos,
}

impl RuleNode {
    #[must_use]
    pub fn has_annotation(&self, annotation: Annotation) -> bool {
        self.annotations.contains(&annotation)
    }

    /// Whether this container's sub-rules form a choice, either by combinator
    /// or by `@choice` annotation.
    #[must_use]
    pub fn is_choice(&self) -> bool {
        let by_combinator = matches!(
            self.kind,
            RuleKind::Object {
                combinator: Combinator::Choice,
                ..
            } | RuleKind::Array {
                combinator: Combinator::Choice,
                ..
            } | RuleKind::Group {
                combinator: Combinator::Choice,
                ..
            }
        );
        by_combinator || self.has_annotation(Annotation::Choice)
    }

    /// Container children, if this node has any.
    #[must_use]
    pub fn children(&self) -> Option<&[RuleId]> {
        match &self.kind {
            RuleKind::Object { children, .. }
            | RuleKind::Array { children, .. }
            | RuleKind::Group { children, .. } => Some(children),
            _ => None,
        }
    }
}
