//! Label selector evaluation
//!
//! Converts a `LabelSelector` into a list of requirements and evaluates it
//! against a node's labels. An absent selector selects nothing while an
//! empty one selects everything.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{CoreError, Result};

/// A single parsed selector requirement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn from_expression(expr: &LabelSelectorRequirement) -> Result<Self> {
        if expr.key.is_empty() {
            return Err(CoreError::InvalidSelector(
                "requirement key must not be empty".to_string(),
            ));
        }
        let key = expr.key.clone();
        let values: BTreeSet<String> = expr.values.iter().flatten().cloned().collect();

        match expr.operator.as_str() {
            "In" | "NotIn" if values.is_empty() => Err(CoreError::InvalidSelector(format!(
                "operator {} on key {:?} requires at least one value",
                expr.operator, key
            ))),
            "In" => Ok(Requirement::In(key, values)),
            "NotIn" => Ok(Requirement::NotIn(key, values)),
            "Exists" | "DoesNotExist" if !values.is_empty() => {
                Err(CoreError::InvalidSelector(format!(
                    "operator {} on key {:?} must not have values",
                    expr.operator, key
                )))
            }
            "Exists" => Ok(Requirement::Exists(key)),
            "DoesNotExist" => Ok(Requirement::DoesNotExist(key)),
            op => Err(CoreError::InvalidSelector(format!(
                "unknown operator {:?} on key {:?}",
                op, key
            ))),
        }
    }

    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(key, value) => labels.get(key) == Some(value),
            Requirement::In(key, values) => labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn(key, values) => !labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::DoesNotExist(key) => !labels.contains_key(key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &BTreeSet<String>| values.iter().cloned().collect::<Vec<_>>().join(",");
        match self {
            Requirement::Equals(key, value) => write!(f, "{}={}", key, value),
            Requirement::In(key, values) => write!(f, "{} in ({})", key, join(values)),
            Requirement::NotIn(key, values) => write!(f, "{} notin ({})", key, join(values)),
            Requirement::Exists(key) => write!(f, "{}", key),
            Requirement::DoesNotExist(key) => write!(f, "!{}", key),
        }
    }
}

/// A parsed node selector
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// Selects no labels at all
    Nothing,
    /// Selects labels satisfying every requirement; no requirements selects everything
    Requirements(Vec<Requirement>),
}

impl Selector {
    /// Parse an optional `LabelSelector`. `None` yields [`Selector::Nothing`].
    pub fn parse(selector: Option<&LabelSelector>) -> Result<Self> {
        let Some(selector) = selector else {
            return Ok(Selector::Nothing);
        };

        let mut requirements = Vec::new();
        for (key, value) in selector.match_labels.iter().flatten() {
            if key.is_empty() {
                return Err(CoreError::InvalidSelector(
                    "matchLabels key must not be empty".to_string(),
                ));
            }
            requirements.push(Requirement::Equals(key.clone(), value.clone()));
        }
        for expr in selector.match_expressions.iter().flatten() {
            requirements.push(Requirement::from_expression(expr)?);
        }

        Ok(Selector::Requirements(requirements))
    }

    /// Whether the given label set satisfies this selector
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Selector::Nothing => false,
            Selector::Requirements(reqs) => reqs.iter().all(|r| r.matches(labels)),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Nothing => write!(f, "<none>"),
            Selector::Requirements(reqs) => {
                let parts: Vec<String> = reqs.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}
