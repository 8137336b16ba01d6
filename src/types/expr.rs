use super::rule::{Annotation, Combinator, MemberName, Pos, Repetition};
use super::value_rule::ValueRule;

/// User-facing rule expression AST.
///
/// Built with the free functions in this module ([`value()`], [`member()`],
/// [`object()`], [`array()`], [`group()`], [`target()`]) and shaped with the
/// chainable modifiers on [`RuleExpr`]. Ingested into an arena of
/// [`RuleNode`](super::RuleNode)s by
/// [`RulesetBuilder::build()`](super::RulesetBuilder::build).
#[derive(Debug, Clone, PartialEq)]
pub struct RuleExpr {
    pub(crate) kind: ExprKind,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) repetition: Repetition,
    pub(crate) pos: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprKind {
    Value(ValueRule),
    Member {
        name: MemberName,
        value: Box<RuleExpr>,
    },
    Object {
        combinator: Combinator,
        children: Vec<RuleExpr>,
    },
    Array {
        combinator: Combinator,
        children: Vec<RuleExpr>,
    },
    Group {
        combinator: Combinator,
        children: Vec<RuleExpr>,
    },
    Target(String),
}

impl RuleExpr {
    fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            annotations: Vec::new(),
            repetition: Repetition::default(),
            pos: None,
        }
    }

    /// Repetition `0..1`.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.repetition = Repetition::optional();
        self
    }

    /// Repetition `0..INF`.
    #[must_use]
    pub fn zero_or_more(mut self) -> Self {
        self.repetition = Repetition::zero_or_more();
        self
    }

    /// Repetition `1..INF`.
    #[must_use]
    pub fn one_or_more(mut self) -> Self {
        self.repetition = Repetition::one_or_more();
        self
    }

    /// Repetition `n..n`.
    #[must_use]
    pub fn exactly(mut self, n: u64) -> Self {
        self.repetition = Repetition::exactly(n);
        self
    }

    /// Repetition `min..max`; `None` max is unbounded.
    #[must_use]
    pub fn repeat(mut self, min: u64, max: impl Into<Option<u64>>) -> Self {
        self.repetition = Repetition::range(min, max.into());
        self
    }

    /// Repetition step; match counts must satisfy `(count - min) % step == 0`.
    #[must_use]
    pub fn step(mut self, step: u64) -> Self {
        self.repetition.step = step;
        self
    }

    /// `@{not}`: invert this rule's result.
    #[must_use]
    pub fn not(mut self) -> Self {
        self.annotations.push(Annotation::Not);
        self
    }

    /// `@{choice}`: combine this container's sub-rules as alternatives.
    #[must_use]
    pub fn choice(mut self) -> Self {
        self.annotations.push(Annotation::Choice);
        if let ExprKind::Object { combinator, .. }
        | ExprKind::Array { combinator, .. }
        | ExprKind::Group { combinator, .. } = &mut self.kind
        {
            *combinator = Combinator::Choice;
        }
        self
    }

    /// `@{unordered}`: match array items by availability instead of position.
    #[must_use]
    pub fn unordered(mut self) -> Self {
        self.annotations.push(Annotation::Unordered);
        self
    }

    /// `@{exclude-min}`: make the lower range bound exclusive.
    #[must_use]
    pub fn exclude_min(mut self) -> Self {
        self.annotations.push(Annotation::ExcludeMin);
        self
    }

    /// `@{exclude-max}`: make the upper range bound exclusive.
    #[must_use]
    pub fn exclude_max(mut self) -> Self {
        self.annotations.push(Annotation::ExcludeMax);
        self
    }

    /// `@{root}`: register the named rule carrying this expression as an
    /// evaluation entry point.
    #[must_use]
    pub fn root(mut self) -> Self {
        self.annotations.push(Annotation::Root);
        self
    }

    /// Attach a source position, as an external parser would.
    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.pos = Some(Pos::new(line, column));
        self
    }
}

/// A leaf value rule.
#[must_use]
pub fn value(rule: ValueRule) -> RuleExpr {
    RuleExpr::new(ExprKind::Value(rule))
}

/// A member rule with a literal name.
#[must_use]
pub fn member(name: &str, value: RuleExpr) -> RuleExpr {
    RuleExpr::new(ExprKind::Member {
        name: MemberName::Literal(name.to_owned()),
        value: Box::new(value),
    })
}

/// A member rule whose name matches a regex. `flags` is a subset of `ixs`.
#[must_use]
pub fn member_regex(pattern: &str, flags: &str, value: RuleExpr) -> RuleExpr {
    RuleExpr::new(ExprKind::Member {
        name: MemberName::Regex {
            pattern: pattern.to_owned(),
            flags: flags.to_owned(),
        },
        value: Box::new(value),
    })
}

/// A member rule matching any member name.
#[must_use]
pub fn member_any(value: RuleExpr) -> RuleExpr {
    RuleExpr::new(ExprKind::Member {
        name: MemberName::Any,
        value: Box::new(value),
    })
}

/// An object rule; sub-rules combine in sequence unless
/// [`choice()`](RuleExpr::choice) is applied.
#[must_use]
pub fn object(children: impl IntoIterator<Item = RuleExpr>) -> RuleExpr {
    RuleExpr::new(ExprKind::Object {
        combinator: Combinator::Sequence,
        children: children.into_iter().collect(),
    })
}

/// An array rule; items match positionally unless
/// [`unordered()`](RuleExpr::unordered) is applied.
#[must_use]
pub fn array(children: impl IntoIterator<Item = RuleExpr>) -> RuleExpr {
    RuleExpr::new(ExprKind::Array {
        combinator: Combinator::Sequence,
        children: children.into_iter().collect(),
    })
}

/// A reusable group, usable standalone or mixed into an object or array.
#[must_use]
pub fn group(children: impl IntoIterator<Item = RuleExpr>) -> RuleExpr {
    RuleExpr::new(ExprKind::Group {
        combinator: Combinator::Sequence,
        children: children.into_iter().collect(),
    })
}

/// A reference to a named rule.
#[must_use]
pub fn target(name: &str) -> RuleExpr {
    RuleExpr::new(ExprKind::Target(name.to_owned()))
}
