use std::fmt;

use super::evaluation::Evaluation;
use super::rule::Pos;

/// Elide a snippet to 45 characters: longer text keeps the first 42
/// characters plus `" ..."`.
#[must_use]
pub(crate) fn elide(s: &str) -> String {
    if s.chars().count() > 45 {
        let head: String = s.chars().take(42).collect();
        format!("{head} ...")
    } else {
        s.to_owned()
    }
}

/// One recorded rule/data mismatch on the eventual failing path.
///
/// Diagnostic only; never consulted for control flow.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Elided JSON snippet of the data that failed.
    pub json: String,
    /// Source position of the failing rule.
    pub pos: Pos,
    /// Human-readable rendering of the failing rule definition.
    pub definition: String,
    /// Nesting depth at which the failure was recorded.
    pub depth: usize,
    /// Elided failure reason.
    pub reason: String,
}

impl Failure {
    pub(crate) fn new(
        json: &str,
        pos: Pos,
        definition: String,
        depth: usize,
        evaluation: &Evaluation,
    ) -> Self {
        let reason = evaluation
            .reason
            .as_deref()
            .map_or_else(|| "unknown reason".to_owned(), elide);
        Self {
            json: elide(json),
            pos,
            definition,
            depth,
            reason,
        }
    }
}

/// Failure buckets of one attempted root, grouped by nesting depth.
#[derive(Debug, Clone)]
pub struct FailedRoot {
    /// Declared root name, if any.
    pub name: Option<String>,
    /// Position of the root rule.
    pub pos: Pos,
    /// `buckets[d]` holds the failures recorded at depth `d` that survived
    /// trimming.
    pub buckets: Vec<Vec<Failure>>,
}

/// Evaluation outcome plus the structured failure report.
///
/// Returned by [`Context::evaluate_detailed()`](super::Context::evaluate_detailed).
/// The report is empty when the evaluation succeeded.
#[derive(Debug, Clone)]
#[must_use]
pub struct EvaluationReport {
    evaluation: Evaluation,
    failed_roots: Vec<FailedRoot>,
    line_length: usize,
}

impl EvaluationReport {
    pub(crate) fn new(
        evaluation: Evaluation,
        failed_roots: Vec<FailedRoot>,
        line_length: usize,
    ) -> Self {
        Self {
            evaluation,
            failed_roots,
            line_length,
        }
    }

    /// The overall evaluation, same as [`Context::evaluate()`](super::Context::evaluate).
    #[must_use]
    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    /// Failure buckets per attempted root, in attempt order.
    #[must_use]
    pub fn failed_roots(&self) -> &[FailedRoot] {
        &self.failed_roots
    }

    /// The human-readable failure report: one line per entry, grouped by
    /// attempted root and then by depth. Empty on success.
    #[must_use]
    pub fn report_lines(&self) -> Vec<String> {
        let mut report = Vec::new();
        for root in &self.failed_roots {
            match &root.name {
                Some(name) => report.push(format!("- Failures for root rule named '{name}'")),
                None => report.push(format!(
                    "- Failures for root rule at line {}",
                    root.pos.line
                )),
            }
            for (depth, failures) in root.buckets.iter().enumerate() {
                if failures.is_empty() {
                    continue;
                }
                if failures.len() > 1 {
                    report.push(format!(
                        "  - failure at rule level {depth} caused by one of the following {} reasons",
                        failures.len()
                    ));
                } else {
                    report.push(format!("  - failure at rule level {depth} caused by"));
                }
                for failure in failures {
                    let message =
                        format!("<< {} >> failed rule {}", failure.json, failure.definition);
                    let wrapped = wrap_message(&message, self.line_length.saturating_sub(5));
                    for (i, line) in wrapped.iter().enumerate() {
                        if i == 0 {
                            report.push(format!("    - {line}"));
                        } else {
                            report.push(format!("      {line}"));
                        }
                    }
                }
            }
        }
        report
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.report_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Greedy word wrap; words longer than `line_length` get a line of their own.
fn wrap_message(message: &str, line_length: usize) -> Vec<String> {
    let line_length = line_length.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in message.split_whitespace() {
        if current.is_empty() {
            current = word.to_owned();
        } else if current.chars().count() + 1 + word.chars().count() <= line_length {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(current);
            current = word.to_owned();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(depth: usize, reason: &str) -> Failure {
        Failure::new(
            "{\"a\": 1}",
            Pos::new(1, 1),
            "value definition << 0..2 >>".to_owned(),
            depth,
            &Evaluation::fail(reason),
        )
    }

    #[test]
    fn elide_short_string_unchanged() {
        assert_eq!(elide("short"), "short");
    }

    #[test]
    fn elide_long_string_truncated() {
        let long = "x".repeat(60);
        let elided = elide(&long);
        assert_eq!(elided.chars().count(), 46);
        assert!(elided.ends_with(" ..."));
    }

    #[test]
    fn failure_without_reason_is_unknown() {
        let f = Failure::new(
            "1",
            Pos::default(),
            "value definition << any >>".to_owned(),
            0,
            &Evaluation::fail_unexplained(),
        );
        assert_eq!(f.reason, "unknown reason");
    }

    #[test]
    fn report_empty_on_success() {
        let report = EvaluationReport::new(Evaluation::pass(), vec![], 80);
        assert!(report.report_lines().is_empty());
    }

    #[test]
    fn report_groups_by_root_and_depth() {
        let failed = FailedRoot {
            name: Some("entry".to_owned()),
            pos: Pos::new(1, 1),
            buckets: vec![vec![failure(0, "bad")], vec![
                failure(1, "one"),
                failure(1, "two"),
            ]],
        };
        let report = EvaluationReport::new(Evaluation::fail("bad"), vec![failed], 80);
        let lines = report.report_lines();

        assert_eq!(lines[0], "- Failures for root rule named 'entry'");
        assert_eq!(lines[1], "  - failure at rule level 0 caused by");
        assert!(lines[2].starts_with("    - << "));
        assert_eq!(
            lines[3],
            "  - failure at rule level 1 caused by one of the following 2 reasons"
        );
    }

    #[test]
    fn report_nameless_root_uses_line() {
        let failed = FailedRoot {
            name: None,
            pos: Pos::new(7, 1),
            buckets: vec![vec![failure(0, "bad")]],
        };
        let report = EvaluationReport::new(Evaluation::fail("bad"), vec![failed], 80);
        assert_eq!(
            report.report_lines()[0],
            "- Failures for root rule at line 7"
        );
    }

    #[test]
    fn long_lines_wrap_with_continuation_indent() {
        let f = Failure::new(
            &"y".repeat(44),
            Pos::default(),
            format!("value definition << {} >>", "z".repeat(40)),
            0,
            &Evaluation::fail("mismatch"),
        );
        let failed = FailedRoot {
            name: None,
            pos: Pos::default(),
            buckets: vec![vec![f]],
        };
        let report = EvaluationReport::new(Evaluation::fail("bad"), vec![failed], 40);
        let lines = report.report_lines();
        let entry_lines: Vec<&String> = lines.iter().skip(2).collect();
        assert!(entry_lines.len() > 1, "expected wrapping, got {lines:?}");
        assert!(entry_lines[0].starts_with("    - "));
        assert!(entry_lines[1].starts_with("      "));
    }
}
