//! Placement constraints on offer attributes.
//!
//! A node carries a map of attribute name to constraint. When an offer is
//! evaluated, the offer's value for that attribute (`hostname` is the
//! offer's host) is checked against the constraint and against the values
//! already claimed by every node with a live task.
//!
//! Syntax:
//! - `like:<regex>` value must match
//! - `unlike:<regex>` value must not match
//! - `unique` no other running node may have the same value
//! - `cluster` every node shares the value of the first one placed
//! - `cluster:<value>` value must equal `<value>`

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("unsupported constraint '{0}'")]
    Unsupported(String),

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A full-match regular expression that remembers its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, ConstraintError> {
        let regex =
            Regex::new(&format!("^(?:{source})$")).map_err(|e| ConstraintError::InvalidPattern {
                pattern: source.to_string(),
                source: e,
            })?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Constraint {
    Like(Pattern),
    Unlike(Pattern),
    Unique,
    Cluster(Option<String>),
}

impl Constraint {
    /// Checks `value` against the values already claimed by other nodes.
    pub fn matches(&self, value: &str, others: &[String]) -> bool {
        match self {
            Self::Like(pattern) => pattern.is_match(value),
            Self::Unlike(pattern) => !pattern.is_match(value),
            Self::Unique => !others.iter().any(|other| other == value),
            Self::Cluster(Some(expected)) => expected == value,
            Self::Cluster(None) => others.first().is_none_or(|first| first == value),
        }
    }
}

impl FromStr for Constraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("like", pattern)) => Ok(Self::Like(Pattern::new(pattern)?)),
            Some(("unlike", pattern)) => Ok(Self::Unlike(Pattern::new(pattern)?)),
            Some(("cluster", value)) if !value.is_empty() => {
                Ok(Self::Cluster(Some(value.to_string())))
            }
            None if s == "unique" => Ok(Self::Unique),
            None if s == "cluster" => Ok(Self::Cluster(None)),
            _ => Err(ConstraintError::Unsupported(s.to_string())),
        }
    }
}

impl TryFrom<String> for Constraint {
    type Error = ConstraintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Constraint> for String {
    fn from(constraint: Constraint) -> Self {
        constraint.to_string()
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Like(pattern) => write!(f, "like:{}", pattern.as_str()),
            Self::Unlike(pattern) => write!(f, "unlike:{}", pattern.as_str()),
            Self::Unique => write!(f, "unique"),
            Self::Cluster(None) => write!(f, "cluster"),
            Self::Cluster(Some(value)) => write!(f, "cluster:{value}"),
        }
    }
}
