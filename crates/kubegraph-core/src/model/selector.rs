//! Label selectors and label matching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operator of a set-based selector requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// One `matchExpressions` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

impl SelectorRequirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.map_or(false, |v| self.values.contains(v)),
            SelectorOperator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

/// Equality plus set-based label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    /// Selector with equality terms only (the shape used by services).
    pub fn from_labels(labels: BTreeMap<String, String>) -> Self {
        Self {
            match_labels: labels,
            match_expressions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    /// An empty selector matches nothing; a topology edge to every object in
    /// the namespace would carry no information.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        if self.is_empty() {
            return false;
        }
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self.match_expressions.iter().all(|req| req.matches(labels))
    }

    /// Parse a `{matchLabels, matchExpressions}` object.
    ///
    /// Requirements with unknown operators are reported through the returned
    /// list of problems and left out of the selector.
    pub fn from_json(value: &serde_json::Value) -> (Self, Vec<String>) {
        let mut problems = Vec::new();
        let match_labels = string_map(value.get("matchLabels"));

        let mut match_expressions = Vec::new();
        if let Some(exprs) = value.get("matchExpressions").and_then(|v| v.as_array()) {
            for expr in exprs {
                let key = expr.get("key").and_then(|k| k.as_str());
                let op = expr.get("operator").and_then(|o| o.as_str());
                let operator = match op {
                    Some("In") => SelectorOperator::In,
                    Some("NotIn") => SelectorOperator::NotIn,
                    Some("Exists") => SelectorOperator::Exists,
                    Some("DoesNotExist") => SelectorOperator::DoesNotExist,
                    other => {
                        problems.push(format!("unsupported selector operator {:?}", other));
                        continue;
                    }
                };
                let Some(key) = key else {
                    problems.push("selector requirement without key".to_string());
                    continue;
                };
                let values = expr
                    .get("values")
                    .and_then(|v| v.as_array())
                    .map(|vals| {
                        vals.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                match_expressions.push(SelectorRequirement {
                    key: key.to_string(),
                    operator,
                    values,
                });
            }
        }

        (
            Self {
                match_labels,
                match_expressions,
            },
            problems,
        )
    }
}

/// Read a JSON object of string values into a sorted map, skipping non-strings.
pub(crate) fn string_map(value: Option<&serde_json::Value>) -> BTreeMap<String, String> {
    value
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_nothing() {
        assert!(!LabelSelector::default().matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn test_match_labels() {
        let sel = LabelSelector::from_labels(labels(&[("app", "web")]));
        assert!(sel.matches(&labels(&[("app", "web"), ("tier", "fe")])));
        assert!(!sel.matches(&labels(&[("app", "api")])));
    }

    #[test]
    fn test_match_expressions() {
        let (sel, problems) = LabelSelector::from_json(&json!({
            "matchLabels": {"app": "web"},
            "matchExpressions": [
                {"key": "tier", "operator": "In", "values": ["fe", "edge"]},
                {"key": "canary", "operator": "DoesNotExist"},
                {"key": "x", "operator": "Bogus"}
            ]
        }));
        assert_eq!(problems.len(), 1);
        assert!(sel.matches(&labels(&[("app", "web"), ("tier", "edge")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("tier", "be")])));
        assert!(!sel.matches(&labels(&[("app", "web"), ("tier", "fe"), ("canary", "1")])));
    }
}
