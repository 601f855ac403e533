//! Label selectors.
//!
//! Supports the usual label selector grammar: comma-separated requirements of
//! the forms `key`, `!key`, `key=value`, `key==value`, `key!=value`,
//! `key in (a,b)` and `key notin (a,b)`. An empty selector matches everything.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing a label selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// A requirement between two commas was empty.
    #[error("empty requirement in {0:?}")]
    EmptyRequirement(String),

    /// A label key is not a valid label name.
    #[error("invalid label key {0:?}")]
    InvalidKey(String),

    /// A label value contains characters labels cannot carry.
    #[error("invalid label value {0:?}")]
    InvalidValue(String),

    /// Parentheses of a set requirement do not balance.
    #[error("unbalanced parentheses in {0:?}")]
    Unbalanced(String),

    /// The operator of a set requirement is neither `in` nor `notin`.
    #[error("unknown operator {0:?}")]
    UnknownOperator(String),
}

/// A single predicate over one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// The label is present.
    Exists(String),
    /// The label is absent.
    DoesNotExist(String),
    /// The label is present and equal to the value.
    Equals(String, String),
    /// The label is absent or differs from the value.
    NotEquals(String, String),
    /// The label is present with one of the values.
    In(String, Vec<String>),
    /// The label is absent or carries none of the values.
    NotIn(String, Vec<String>),
}

impl Requirement {
    /// Evaluate the requirement against a label set.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Exists(k) => labels.contains_key(k),
            Self::DoesNotExist(k) => !labels.contains_key(k),
            Self::Equals(k, v) => labels.get(k) == Some(v),
            Self::NotEquals(k, v) => labels.get(k) != Some(v),
            Self::In(k, vs) => labels.get(k).is_some_and(|have| vs.contains(have)),
            Self::NotIn(k, vs) => labels.get(k).map_or(true, |have| !vs.contains(have)),
        }
    }

    fn parse(raw: &str) -> Result<Self, SelectorError> {
        let req = raw.trim();
        if req.is_empty() {
            return Err(SelectorError::EmptyRequirement(raw.to_string()));
        }

        if let Some(open) = req.find('(') {
            if !req.ends_with(')') {
                return Err(SelectorError::Unbalanced(req.to_string()));
            }
            let mut head = req[..open].split_whitespace();
            let (Some(key), Some(op), None) = (head.next(), head.next(), head.next()) else {
                return Err(SelectorError::UnknownOperator(req[..open].trim().to_string()));
            };
            let key = valid_key(key)?;
            let values = req[open + 1..req.len() - 1]
                .split(',')
                .map(|v| valid_value(v.trim()))
                .collect::<Result<Vec<_>, _>>()?;
            return match op {
                "in" => Ok(Self::In(key, values)),
                "notin" => Ok(Self::NotIn(key, values)),
                other => Err(SelectorError::UnknownOperator(other.to_string())),
            };
        }

        if let Some(key) = req.strip_prefix('!') {
            return Ok(Self::DoesNotExist(valid_key(key.trim())?));
        }
        if let Some((key, value)) = req.split_once("!=") {
            return Ok(Self::NotEquals(valid_key(key.trim())?, valid_value(value.trim())?));
        }
        if let Some((key, value)) = req.split_once("==") {
            return Ok(Self::Equals(valid_key(key.trim())?, valid_value(value.trim())?));
        }
        if let Some((key, value)) = req.split_once('=') {
            return Ok(Self::Equals(valid_key(key.trim())?, valid_value(value.trim())?));
        }
        Ok(Self::Exists(valid_key(req)?))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists(k) => write!(f, "{k}"),
            Self::DoesNotExist(k) => write!(f, "!{k}"),
            Self::Equals(k, v) => write!(f, "{k}={v}"),
            Self::NotEquals(k, v) => write!(f, "{k}!={v}"),
            Self::In(k, vs) => write!(f, "{k} in ({})", vs.join(",")),
            Self::NotIn(k, vs) => write!(f, "{k} notin ({})", vs.join(",")),
        }
    }
}

/// A conjunction of label requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// A selector that matches every object.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// A selector requiring every given label to be present with the given value.
    #[must_use]
    pub fn from_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            requirements: labels
                .into_iter()
                .map(|(k, v)| Requirement::Equals(k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a selector string.
    ///
    /// # Errors
    ///
    /// Returns a `SelectorError` describing the first invalid requirement.
    pub fn parse(s: &str) -> Result<Self, SelectorError> {
        if s.trim().is_empty() {
            return Ok(Self::everything());
        }
        let requirements = split_top_level(s)?
            .into_iter()
            .map(Requirement::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }

    /// Add a requirement.
    #[must_use]
    pub fn and(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Returns true if the selector has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// The requirements of the selector.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Evaluate the selector against a label set.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
    }
}

fn split_top_level(s: &str) -> Result<Vec<&str>, SelectorError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::Unbalanced(s.to_string()))?;
            }
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::Unbalanced(s.to_string()));
    }
    parts.push(&s[start..]);
    Ok(parts)
}

fn valid_key(key: &str) -> Result<String, SelectorError> {
    let ok = !key.is_empty()
        && key.len() <= 316
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if ok {
        Ok(key.to_string())
    } else {
        Err(SelectorError::InvalidKey(key.to_string()))
    }
}

fn valid_value(value: &str) -> Result<String, SelectorError> {
    let ok = value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(value.to_string())
    } else {
        Err(SelectorError::InvalidValue(value.to_string()))
    }
}
