use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde_json::Value;
use tracing::trace;

use super::name_association::compiled_regex;
use super::{evaluate_not, record, EvalConditions};
use crate::render;
use crate::types::rule::{Annotation, RuleId, RuleKind};
use crate::types::ruleset::Context;
use crate::types::{ConfigError, Evaluation, ValueRule};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";
const PHONE_PATTERN: &str = r"^\+?[0-9 ().\-]+$";

/// Sentinel time appended to date-only input before RFC 3339 parsing.
const SENTINEL_TIME: &str = "T23:20:50.52Z";
/// Sentinel date prepended to time-only input before RFC 3339 parsing.
const SENTINEL_DATE: &str = "1985-04-12T";

pub(crate) fn evaluate(
    conds: &mut EvalConditions<'_>,
    id: RuleId,
    origin: RuleId,
    data: &Value,
    ref_annotations: Option<Vec<Annotation>>,
) -> Result<Evaluation, ConfigError> {
    let ctx = conds.ctx;
    let node = ctx.node(id);
    conds.push(node.pos);
    trace!(rule = %render::rule_to_string(ctx, id), "evaluating value rule");

    let result = check_value(ctx, id, origin, data);
    let retval = match result {
        Ok(evaluation) => {
            let evaluation = evaluate_not(&node.annotations, evaluation, ref_annotations.as_deref());
            record(conds, &evaluation, id, data, "value");
            Ok(evaluation)
        }
        Err(err) => Err(err),
    };
    conds.pop();
    retval
}

fn check_value(
    ctx: &Context,
    id: RuleId,
    origin: RuleId,
    data: &Value,
) -> Result<Evaluation, ConfigError> {
    let node = ctx.node(id);
    let RuleKind::Value(rule) = &node.kind else {
        return Ok(Evaluation::pass());
    };
    let exclude_min = node.has_annotation(Annotation::ExcludeMin);
    let exclude_max = node.has_annotation(Annotation::ExcludeMax);

    let bad = |expected: &str| {
        Evaluation::fail(format!(
            "expected << {expected} >> but got << {} >> for{}",
            render::data_snippet(data),
            render::raised_rule(ctx, id, origin),
        ))
    };

    let evaluation = match rule {
        ValueRule::Any => Evaluation::pass(),

        ValueRule::IntegerType => match as_integer(data) {
            Some(_) => Evaluation::pass(),
            None => bad("integer"),
        },
        ValueRule::Integer(expected) => match as_integer(data) {
            Some(actual) if actual == i128::from(*expected) => Evaluation::pass(),
            _ => bad(&expected.to_string()),
        },
        ValueRule::IntegerRange { min, max } => match as_integer(data) {
            None => bad("integer"),
            Some(actual) => int_range_check(
                actual,
                min.map(i128::from),
                max.map(i128::from),
                exclude_min,
                exclude_max,
                &bad,
            ),
        },
        ValueRule::SizedInt { bits } => match as_integer(data) {
            None => bad(&format!("int{bits}")),
            Some(actual) => {
                let min = -(1i128 << (bits - 1));
                let max = (1i128 << (bits - 1)) - 1;
                int_range_check(actual, Some(min), Some(max), exclude_min, exclude_max, &bad)
            }
        },
        ValueRule::SizedUint { bits } => match as_integer(data) {
            None => bad(&format!("uint{bits}")),
            Some(actual) => {
                let max = (1i128 << bits) - 1;
                int_range_check(actual, Some(0), Some(max), exclude_min, exclude_max, &bad)
            }
        },

        ValueRule::FloatType => {
            if data.as_number().is_some_and(serde_json::Number::is_f64) {
                Evaluation::pass()
            } else {
                bad("float")
            }
        }
        ValueRule::Float(expected) => {
            if data.as_f64() == Some(*expected) {
                Evaluation::pass()
            } else {
                bad(&expected.to_string())
            }
        }
        ValueRule::FloatRange { min, max } => {
            if !data.as_number().is_some_and(serde_json::Number::is_f64) {
                bad("float")
            } else {
                let actual = data.as_f64().unwrap_or_default();
                if let Some(min) = min {
                    let ok = if exclude_min { actual > *min } else { actual >= *min };
                    if !ok {
                        return Ok(bad(&min.to_string()));
                    }
                }
                if let Some(max) = max {
                    let ok = if exclude_max { actual < *max } else { actual <= *max };
                    if !ok {
                        return Ok(bad(&max.to_string()));
                    }
                }
                Evaluation::pass()
            }
        }

        ValueRule::True => {
            if data.as_bool() == Some(true) {
                Evaluation::pass()
            } else {
                bad("true")
            }
        }
        ValueRule::False => {
            if data.as_bool() == Some(false) {
                Evaluation::pass()
            } else {
                bad("false")
            }
        }
        ValueRule::BooleanType => {
            if data.is_boolean() {
                Evaluation::pass()
            } else {
                bad("boolean")
            }
        }

        ValueRule::StringType => {
            if data.is_string() {
                Evaluation::pass()
            } else {
                bad("string")
            }
        }
        ValueRule::StringLiteral(expected) => {
            if data.as_str() == Some(expected) {
                Evaluation::pass()
            } else {
                bad(&format!("\"{expected}\""))
            }
        }
        ValueRule::StringRegex { pattern, flags } => {
            let re = compiled_regex(pattern, flags)?;
            match data.as_str() {
                Some(s) if re.is_match(s) => Evaluation::pass(),
                _ => bad(&format!("/{pattern}/")),
            }
        }

        ValueRule::Ipv4 => string_check(data, "IPv4 Address", &bad, |s| {
            s.parse::<Ipv4Addr>().is_ok()
        }),
        ValueRule::Ipv6 => string_check(data, "IPv6 Address", &bad, |s| {
            s.parse::<Ipv6Addr>().is_ok()
        }),
        ValueRule::IpAddr => string_check(data, "IP Address", &bad, |s| {
            s.parse::<IpAddr>().is_ok()
        }),

        ValueRule::Fqdn => string_check(data, "Fully Qualified Domain Name", &bad, |s| {
            domain_name_ok(s, false)
        }),
        ValueRule::Idn => string_check(data, "Internationalized Domain Name", &bad, |s| {
            domain_name_ok(s, true)
        }),

        ValueRule::Uri { scheme: Some(scheme) } => {
            string_check(data, scheme, &bad, |s| s.starts_with(scheme.as_str()))
        }
        ValueRule::Uri { scheme: None } => {
            string_check(data, "URI", &bad, |s| url::Url::parse(s).is_ok())
        }

        ValueRule::Email => {
            let re = compiled_regex(EMAIL_PATTERN, "")?;
            string_check(data, "Email Address", &bad, |s| re.is_match(s))
        }
        ValueRule::Phone => {
            let re = compiled_regex(PHONE_PATTERN, "")?;
            string_check(data, "Phone Number", &bad, |s| {
                let digits = s.chars().filter(char::is_ascii_digit).count();
                re.is_match(s) && (7..=15).contains(&digits)
            })
        }

        ValueRule::Hex => string_check(data, "Hex Data", &bad, |s| {
            encoded_ok(s, 2, false, |c| c.is_ascii_hexdigit())
        }),
        ValueRule::Base32 => string_check(data, "Base 32 Data", &bad, |s| {
            encoded_ok(s, 8, true, |c| c.is_ascii_alphabetic() || ('2'..='7').contains(&c))
        }),
        ValueRule::Base32Hex => string_check(data, "Base32hex Data", &bad, |s| {
            encoded_ok(s, 8, true, |c| {
                c.is_ascii_digit() || ('A'..='V').contains(&c) || ('a'..='v').contains(&c)
            })
        }),
        ValueRule::Base64 => string_check(data, "Base 64 Data", &bad, |s| {
            encoded_ok(s, 4, true, |c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
        }),
        ValueRule::Base64Url => string_check(data, "Base64url Data", &bad, |s| {
            encoded_ok(s, 4, true, |c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        }),

        ValueRule::DateTime => string_check(data, "Time and Date", &bad, |s| {
            chrono::DateTime::parse_from_rfc3339(s).is_ok()
        }),
        ValueRule::Date => string_check(data, "Date", &bad, |s| {
            chrono::DateTime::parse_from_rfc3339(&format!("{s}{SENTINEL_TIME}")).is_ok()
        }),
        ValueRule::Time => string_check(data, "Time", &bad, |s| {
            chrono::DateTime::parse_from_rfc3339(&format!("{SENTINEL_DATE}{s}Z")).is_ok()
        }),

        ValueRule::Null => {
            if data.is_null() {
                Evaluation::pass()
            } else {
                bad("null")
            }
        }
    };
    Ok(evaluation)
}

fn as_integer(data: &Value) -> Option<i128> {
    let number = data.as_number()?;
    if let Some(i) = number.as_i64() {
        Some(i128::from(i))
    } else {
        number.as_u64().map(i128::from)
    }
}

fn int_range_check(
    actual: i128,
    min: Option<i128>,
    max: Option<i128>,
    exclude_min: bool,
    exclude_max: bool,
    bad: &dyn Fn(&str) -> Evaluation,
) -> Evaluation {
    if let Some(min) = min {
        let ok = if exclude_min { actual > min } else { actual >= min };
        if !ok {
            return bad(&min.to_string());
        }
    }
    if let Some(max) = max {
        let ok = if exclude_max { actual < max } else { actual <= max };
        if !ok {
            return bad(&max.to_string());
        }
    }
    Evaluation::pass()
}

fn string_check(
    data: &Value,
    expected: &str,
    bad: &dyn Fn(&str) -> Evaluation,
    check: impl Fn(&str) -> bool,
) -> Evaluation {
    match data.as_str() {
        Some(s) if check(s) => Evaluation::pass(),
        _ => bad(expected),
    }
}

/// Dot-separated labels, each non-empty and not hyphen-leading or -trailing.
/// FQDN restricts label characters to ASCII letters, digits and hyphens; IDN
/// additionally admits any non-ASCII character.
fn domain_name_ok(s: &str, allow_non_ascii: bool) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| {
                c.is_ascii_alphanumeric() || c == '-' || (allow_non_ascii && !c.is_ascii())
            })
    })
}

/// Length must be a multiple of the encoding's block size, every character
/// must be in the charset, and once padding starts only padding may follow.
fn encoded_ok(s: &str, block: usize, padded: bool, charset: impl Fn(char) -> bool) -> bool {
    if s.len() % block != 0 {
        return false;
    }
    let mut pad_started = false;
    for c in s.chars() {
        if padded && c == '=' {
            pad_started = true;
        } else if pad_started || !charset(c) {
            return false;
        }
    }
    true
}
