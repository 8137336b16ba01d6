use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, OnceLock};

use regex::{Regex, RegexBuilder};

use crate::types::rule::MemberName;
use crate::types::ConfigError;

/// Derived identity of a declared member-name slot.
///
/// Two member rules with the same `NameKey` declare the same slot, whether
/// they are spelled in the same place or reached through different groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum NameKey {
    Literal(String),
    /// Flags + `/` + pattern, so differing flags produce distinct slots.
    Regex(String),
    Any,
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKey::Literal(s) => write!(f, "\"{s}\""),
            NameKey::Regex(s) => write!(f, "/{s}/"),
            NameKey::Any => write!(f, "//"),
        }
    }
}

/// Per-object-evaluation matcher disambiguating JSON member names against the
/// declared literal, regex and wildcard member-name patterns.
///
/// Built once per object evaluation from every recursively-reachable member
/// rule. Lookups are memoized per instance; literal matches win outright, a
/// unique regex match is next, the wildcard catches the rest.
pub(crate) struct NameAssociation {
    literals: HashSet<String>,
    regexes: Vec<(NameKey, Regex)>,
    has_wildcard: bool,
    memo: HashMap<String, Option<NameKey>>,
}

impl NameAssociation {
    pub(crate) fn new() -> Self {
        Self {
            literals: HashSet::new(),
            regexes: Vec::new(),
            has_wildcard: false,
            memo: HashMap::new(),
        }
    }

    pub(crate) fn key_of(name: &MemberName) -> NameKey {
        match name {
            MemberName::Literal(s) => NameKey::Literal(s.clone()),
            MemberName::Regex { pattern, flags } => NameKey::Regex(format!("{flags}/{pattern}")),
            MemberName::Any => NameKey::Any,
        }
    }

    /// Register one declared member-name pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRegex`] if a regex pattern does not
    /// compile (ingestion validates patterns, so this indicates a ruleset
    /// assembled outside the builder).
    pub(crate) fn add_member(&mut self, name: &MemberName) -> Result<(), ConfigError> {
        match name {
            MemberName::Literal(s) => {
                self.literals.insert(s.clone());
            }
            MemberName::Regex { pattern, flags } => {
                let key = Self::key_of(name);
                if !self.regexes.iter().any(|(k, _)| *k == key) {
                    let re = compiled_regex(pattern, flags)?;
                    self.regexes.push((key, re));
                }
            }
            MemberName::Any => self.has_wildcard = true,
        }
        Ok(())
    }

    /// Resolve a JSON member name to its declared name key, or `None` when no
    /// declared pattern matches.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AmbiguousMemberName`] when two distinct
    /// declared regex slots both match the name.
    pub(crate) fn key_from_json(&mut self, json_name: &str) -> Result<Option<NameKey>, ConfigError> {
        if let Some(key) = self.memo.get(json_name) {
            return Ok(key.clone());
        }
        let key = self.key_lookup(json_name)?;
        self.memo.insert(json_name.to_owned(), key.clone());
        Ok(key)
    }

    fn key_lookup(&self, json_name: &str) -> Result<Option<NameKey>, ConfigError> {
        if self.literals.contains(json_name) {
            return Ok(Some(NameKey::Literal(json_name.to_owned())));
        }

        let matches: Vec<&NameKey> = self
            .regexes
            .iter()
            .filter(|(_, re)| re.is_match(json_name))
            .map(|(key, _)| key)
            .collect();
        match matches.len() {
            1 => return Ok(Some(matches[0].clone())),
            0 => {}
            _ => {
                return Err(ConfigError::AmbiguousMemberName {
                    name: json_name.to_owned(),
                    keys: matches.iter().map(ToString::to_string).collect(),
                })
            }
        }

        if self.has_wildcard {
            return Ok(Some(NameKey::Any));
        }
        Ok(None)
    }
}

static REGEX_CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();

/// Compile a member-name or string-value regex, memoized process-wide by
/// (pattern, flags). Growth is bounded by the number of distinct patterns
/// across all loaded rulesets.
///
/// Supported flags: `i` (case-insensitive), `x` (extended), `s`
/// (dot-matches-newline).
pub(crate) fn compiled_regex(pattern: &str, flags: &str) -> Result<Regex, ConfigError> {
    let cache_key = format!("{flags}/{pattern}");
    let cache = REGEX_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut table = match cache.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(re) = table.get(&cache_key) {
        return Ok(re.clone());
    }
    let re = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .ignore_whitespace(flags.contains('x'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|source| ConfigError::InvalidRegex {
            pattern: pattern.to_owned(),
            source,
        })?;
    table.insert(cache_key, re.clone());
    Ok(re)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assoc_with(names: &[MemberName]) -> NameAssociation {
        let mut assoc = NameAssociation::new();
        for name in names {
            assoc.add_member(name).unwrap();
        }
        assoc
    }

    fn lit(s: &str) -> MemberName {
        MemberName::Literal(s.to_owned())
    }

    fn re(pattern: &str) -> MemberName {
        MemberName::Regex {
            pattern: pattern.to_owned(),
            flags: String::new(),
        }
    }

    #[test]
    fn literal_beats_regex_and_wildcard() {
        let mut assoc = assoc_with(&[lit("foo"), re("fo."), MemberName::Any]);
        assert_eq!(
            assoc.key_from_json("foo").unwrap(),
            Some(NameKey::Literal("foo".to_owned()))
        );
    }

    #[test]
    fn unique_regex_match_wins_over_wildcard() {
        let mut assoc = assoc_with(&[lit("foo"), re("fo."), MemberName::Any]);
        assert_eq!(
            assoc.key_from_json("foe").unwrap(),
            Some(NameKey::Regex("/fo.".to_owned()))
        );
    }

    #[test]
    fn wildcard_catches_everything_else() {
        let mut assoc = assoc_with(&[lit("foo"), re("fo."), MemberName::Any]);
        assert_eq!(assoc.key_from_json("bar").unwrap(), Some(NameKey::Any));
    }

    #[test]
    fn no_match_without_wildcard() {
        let mut assoc = assoc_with(&[lit("foo"), re("fo.")]);
        assert_eq!(assoc.key_from_json("bar").unwrap(), None);
    }

    #[test]
    fn two_regex_matches_are_ambiguous() {
        let mut assoc = assoc_with(&[re("fo."), re("f.e")]);
        let err = assoc.key_from_json("foe").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AmbiguousMemberName { name, .. } if name == "foe"
        ));
    }

    #[test]
    fn duplicate_slot_regexes_are_not_ambiguous() {
        // Same pattern+flags = same declared slot, registered once.
        let mut assoc = assoc_with(&[re("fo."), re("fo.")]);
        assert_eq!(
            assoc.key_from_json("foe").unwrap(),
            Some(NameKey::Regex("/fo.".to_owned()))
        );
    }

    #[test]
    fn memo_returns_same_result() {
        let mut assoc = assoc_with(&[re("fo."), MemberName::Any]);
        let first = assoc.key_from_json("foe").unwrap();
        let second = assoc.key_from_json("foe").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn case_insensitive_flag() {
        let mut assoc = assoc_with(&[MemberName::Regex {
            pattern: "^foo$".to_owned(),
            flags: "i".to_owned(),
        }]);
        assert_eq!(
            assoc.key_from_json("FOO").unwrap(),
            Some(NameKey::Regex("i/^foo$".to_owned()))
        );
    }

    #[test]
    fn flags_distinguish_name_keys() {
        assert_ne!(
            NameAssociation::key_of(&MemberName::Regex {
                pattern: "a".to_owned(),
                flags: "i".to_owned()
            }),
            NameAssociation::key_of(&re("a"))
        );
    }

    #[test]
    fn compiled_regex_rejects_bad_pattern() {
        let err = compiled_regex("(unclosed", "").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn compiled_regex_is_cached() {
        let a = compiled_regex("cache_me_[0-9]+", "").unwrap();
        let b = compiled_regex("cache_me_[0-9]+", "").unwrap();
        assert_eq!(a.as_str(), b.as_str());
    }
}
