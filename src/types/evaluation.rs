use std::fmt;

/// Result of evaluating one rule node against one data value.
///
/// Always returned, never thrown: a failed evaluation is an ordinary expected
/// outcome and does not abort sibling or alternate-root evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Evaluation {
    pub success: bool,
    pub reason: Option<String>,
}

impl Evaluation {
    pub fn pass() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }

    /// A failure with no specific reason, used when coercing a bare `false`
    /// callback verdict.
    pub fn fail_unexplained() -> Self {
        Self {
            success: false,
            reason: None,
        }
    }

    pub(crate) fn invert(mut self) -> Self {
        self.success = !self.success;
        self
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.success, &self.reason) {
            (true, _) => write!(f, "success"),
            (false, Some(reason)) => write!(f, "failure: {reason}"),
            (false, None) => write!(f, "failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_has_no_reason() {
        let e = Evaluation::pass();
        assert!(e.success);
        assert_eq!(e.reason, None);
    }

    #[test]
    fn fail_carries_reason() {
        let e = Evaluation::fail("expected << 1 >> but got << 2 >>");
        assert!(!e.success);
        assert_eq!(e.reason.as_deref(), Some("expected << 1 >> but got << 2 >>"));
    }

    #[test]
    fn invert_flips_success_only() {
        let e = Evaluation::fail("nope").invert();
        assert!(e.success);
        assert_eq!(e.reason.as_deref(), Some("nope"));

        let e = Evaluation::pass().invert();
        assert!(!e.success);
    }

    #[test]
    fn display() {
        assert_eq!(Evaluation::pass().to_string(), "success");
        assert_eq!(Evaluation::fail("bad").to_string(), "failure: bad");
        assert_eq!(Evaluation::fail_unexplained().to_string(), "failure");
    }
}
