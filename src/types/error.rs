use thiserror::Error;

use super::rule::Pos;

/// Unrecoverable configuration errors.
///
/// These surface problems in the ruleset itself, at ingestion or while an
/// `evaluate` call is in flight. They are never retried and are distinct from
/// ordinary data-validation failures, which are returned as non-aborting
/// [`Evaluation`](super::Evaluation) values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate rule name '{name}'")]
    DuplicateRule { name: String },

    #[error("target rule '{name}' not found in registry (at {pos})")]
    UnresolvedTarget { name: String, pos: Pos },

    #[error("JSON name '{name}' matches multiple name keys: {}", keys.join(", "))]
    AmbiguousMemberName { name: String, keys: Vec<String> },

    #[error("group in object at {pos} must have repetition max of 0 or 1 and step of 1")]
    ObjectGroupRepetition { pos: Pos },

    #[error("invalid regex /{pattern}/")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("root rules cannot be member rules (at {pos})")]
    RootIsMember { pos: Pos },

    #[error("no root rule defined; specify a root rule name")]
    NoRoots,

    #[error("no rule by the name of '{name}' for a root rule has been found")]
    UnknownRoot { name: String },
}
