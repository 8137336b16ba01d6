use std::fmt;

/// Leaf-level value check.
///
/// Each variant corresponds to one scalar or format test applied to a single
/// JSON value. Range bounds are inclusive by default; an `ExcludeMin` /
/// `ExcludeMax` annotation on the containing rule flips the respective bound
/// to exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRule {
    /// Accepts any value.
    Any,

    /// Any JSON integer.
    IntegerType,
    /// Exactly this integer.
    Integer(i64),
    /// Integer within `[min, max]`; either bound may be open.
    IntegerRange { min: Option<i64>, max: Option<i64> },
    /// Signed integer of width `bits`: `[-2^(bits-1), 2^(bits-1) - 1]`.
    SizedInt { bits: u32 },
    /// Unsigned integer of width `bits`: `[0, 2^bits - 1]`.
    SizedUint { bits: u32 },

    /// Any JSON float.
    FloatType,
    /// Exactly this float.
    Float(f64),
    /// Float within `[min, max]`; either bound may be open.
    FloatRange { min: Option<f64>, max: Option<f64> },

    /// Boolean literal `true`.
    True,
    /// Boolean literal `false`.
    False,
    /// Either boolean.
    BooleanType,

    /// Any JSON string.
    StringType,
    /// Exactly this string.
    StringLiteral(String),
    /// String matching this regex; `flags` is a subset of `ixs`.
    StringRegex { pattern: String, flags: String },

    Ipv4,
    Ipv6,
    /// Either address family.
    IpAddr,

    /// Fully qualified domain name (ASCII labels).
    Fqdn,
    /// Internationalized domain name (labels may carry non-ASCII).
    Idn,

    /// URI; when `scheme` is set, the value must start with that scheme.
    Uri { scheme: Option<String> },
    Email,
    Phone,

    Hex,
    Base32,
    Base32Hex,
    Base64,
    Base64Url,

    /// RFC 3339 date-time.
    DateTime,
    /// Date portion only.
    Date,
    /// Time portion only.
    Time,

    Null,
}

impl ValueRule {
    #[must_use]
    pub fn int_range(min: impl Into<Option<i64>>, max: impl Into<Option<i64>>) -> Self {
        ValueRule::IntegerRange {
            min: min.into(),
            max: max.into(),
        }
    }

    #[must_use]
    pub fn float_range(min: impl Into<Option<f64>>, max: impl Into<Option<f64>>) -> Self {
        ValueRule::FloatRange {
            min: min.into(),
            max: max.into(),
        }
    }

    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        ValueRule::StringLiteral(s.into())
    }

    #[must_use]
    pub fn pattern(pattern: impl Into<String>) -> Self {
        ValueRule::StringRegex {
            pattern: pattern.into(),
            flags: String::new(),
        }
    }

    #[must_use]
    pub fn uri_scheme(scheme: impl Into<String>) -> Self {
        ValueRule::Uri {
            scheme: Some(scheme.into()),
        }
    }
}

impl fmt::Display for ValueRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRule::Any => write!(f, "any"),
            ValueRule::IntegerType => write!(f, "integer"),
            ValueRule::Integer(i) => write!(f, "{i}"),
            ValueRule::IntegerRange { min, max } => {
                let min = min.map_or_else(|| "-INF".to_owned(), |v| v.to_string());
                let max = max.map_or_else(|| "INF".to_owned(), |v| v.to_string());
                write!(f, "{min}..{max}")
            }
            ValueRule::SizedInt { bits } => write!(f, "int{bits}"),
            ValueRule::SizedUint { bits } => write!(f, "uint{bits}"),
            ValueRule::FloatType => write!(f, "float"),
            ValueRule::Float(v) => write!(f, "{v}"),
            ValueRule::FloatRange { min, max } => {
                let min = min.map_or_else(|| "-INF".to_owned(), |v| v.to_string());
                let max = max.map_or_else(|| "INF".to_owned(), |v| v.to_string());
                write!(f, "{min}..{max}")
            }
            ValueRule::True => write!(f, "true"),
            ValueRule::False => write!(f, "false"),
            ValueRule::BooleanType => write!(f, "boolean"),
            ValueRule::StringType => write!(f, "string"),
            ValueRule::StringLiteral(s) => write!(f, "\"{s}\""),
            ValueRule::StringRegex { pattern, .. } => write!(f, "/{pattern}/"),
            ValueRule::Ipv4 => write!(f, "ipv4"),
            ValueRule::Ipv6 => write!(f, "ipv6"),
            ValueRule::IpAddr => write!(f, "ipaddr"),
            ValueRule::Fqdn => write!(f, "fqdn"),
            ValueRule::Idn => write!(f, "idn"),
            ValueRule::Uri { scheme: Some(s) } => write!(f, "uri..{s}"),
            ValueRule::Uri { scheme: None } => write!(f, "uri"),
            ValueRule::Email => write!(f, "email"),
            ValueRule::Phone => write!(f, "phone"),
            ValueRule::Hex => write!(f, "hex"),
            ValueRule::Base32 => write!(f, "base32"),
            ValueRule::Base32Hex => write!(f, "base32hex"),
            ValueRule::Base64 => write!(f, "base64"),
            ValueRule::Base64Url => write!(f, "base64url"),
            ValueRule::DateTime => write!(f, "datetime"),
            ValueRule::Date => write!(f, "date"),
            ValueRule::Time => write!(f, "time"),
            ValueRule::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_range_constructor() {
        assert_eq!(
            ValueRule::int_range(0, 2),
            ValueRule::IntegerRange {
                min: Some(0),
                max: Some(2)
            }
        );
        assert_eq!(
            ValueRule::int_range(None, 5),
            ValueRule::IntegerRange {
                min: None,
                max: Some(5)
            }
        );
    }

    #[test]
    fn display_ranges() {
        assert_eq!(ValueRule::int_range(0, 2).to_string(), "0..2");
        assert_eq!(ValueRule::int_range(None, 2).to_string(), "-INF..2");
        assert_eq!(ValueRule::int_range(3, None).to_string(), "3..INF");
    }

    #[test]
    fn display_simple_kinds() {
        assert_eq!(ValueRule::Any.to_string(), "any");
        assert_eq!(ValueRule::SizedUint { bits: 8 }.to_string(), "uint8");
        assert_eq!(ValueRule::literal("foo").to_string(), "\"foo\"");
        assert_eq!(ValueRule::pattern("fo.").to_string(), "/fo./");
        assert_eq!(ValueRule::uri_scheme("https").to_string(), "uri..https");
    }
}
