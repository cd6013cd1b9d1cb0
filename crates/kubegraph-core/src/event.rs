//! Watch events and their on-disk encodings.
//!
//! Recorded watch streams are JSON lines:
//!
//! ```text
//! {"type":"event","kind":"pod","action":"add","object":{...}}
//! {"type":"sync","kind":"pod"}
//! ```
//!
//! Multi-document YAML manifests can also be loaded; every object becomes an
//! `add` event and every kind is then marked as synced.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::ResourceKind;

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Update,
    Delete,
}

/// One observed change to one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: ResourceKind,
    pub action: Action,
    pub object: Value,
}

impl WatchEvent {
    pub fn new(kind: ResourceKind, action: Action, object: Value) -> Self {
        Self {
            kind,
            action,
            object,
        }
    }

    pub fn add(kind: ResourceKind, object: Value) -> Self {
        Self::new(kind, Action::Add, object)
    }

    pub fn update(kind: ResourceKind, object: Value) -> Self {
        Self::new(kind, Action::Update, object)
    }

    pub fn delete(kind: ResourceKind, object: Value) -> Self {
        Self::new(kind, Action::Delete, object)
    }
}

/// A line of a recorded watch stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WatchRecord {
    Event(WatchEvent),
    /// Initial listing of `kind` is complete.
    Sync { kind: ResourceKind },
}

impl WatchRecord {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Event(event) => event.kind,
            Self::Sync { kind } => *kind,
        }
    }
}

/// Errors reading recorded events or manifests.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML manifest error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Parse a JSON-lines stream. Blank lines and `#` comments are skipped.
pub fn parse_records(text: &str) -> Result<Vec<WatchRecord>, EventError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| EventError::Json { line: i + 1, source })
        })
        .collect()
}

/// Serialize records as JSON lines.
pub fn write_records(records: &[WatchRecord]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Turn multi-document YAML into `add` events followed by a sync marker
/// for every kind.
///
/// `List` documents are flattened. Documents of kinds the engine does not
/// model are skipped.
pub fn manifest_records(yaml: &str) -> Result<Vec<WatchRecord>, EventError> {
    let mut records = Vec::new();

    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(document)?;
        collect_objects(value, &mut records);
    }

    records.extend(ResourceKind::ALL.iter().map(|&kind| WatchRecord::Sync { kind }));
    Ok(records)
}

fn collect_objects(value: Value, records: &mut Vec<WatchRecord>) {
    let Some(kind) = value.get("kind").and_then(|k| k.as_str()).map(str::to_string) else {
        if !value.is_null() {
            tracing::debug!("Skipping manifest document without kind");
        }
        return;
    };

    if kind.ends_with("List") {
        if let Value::Object(mut map) = value {
            if let Some(Value::Array(items)) = map.remove("items") {
                for item in items {
                    collect_objects(item, records);
                }
            }
        }
        return;
    }

    match kind.parse::<ResourceKind>() {
        Ok(kind) => records.push(WatchRecord::Event(WatchEvent::add(kind, value))),
        Err(_) => tracing::debug!(kind = %kind, "Skipping manifest object of unmodeled kind"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_records() {
        let text = r#"
# recorded stream
{"type":"event","kind":"Pod","action":"add","object":{"metadata":{"name":"p"}}}
{"type":"sync","kind":"pods"}
"#;
        let records = parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind(), ResourceKind::Pod);
        assert_eq!(records[1], WatchRecord::Sync { kind: ResourceKind::Pod });
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_records("{\"type\":\"sync\",\"kind\":\"pod\"}\nnot json").unwrap_err();
        assert!(matches!(err, EventError::Json { line: 2, .. }));
    }

    #[test]
    fn test_records_survive_serialization() {
        let records = vec![
            WatchRecord::Event(WatchEvent::delete(ResourceKind::Service, json!({"metadata": {"name": "s"}}))),
            WatchRecord::Sync { kind: ResourceKind::Service },
        ];
        let text = write_records(&records).unwrap();
        assert_eq!(parse_records(&text).unwrap(), records);
    }

    #[test]
    fn test_manifest_records() {
        let yaml = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: shop
---
apiVersion: v1
kind: List
items:
  - apiVersion: v1
    kind: ConfigMap
    metadata: {name: cfg, namespace: shop}
  - apiVersion: example.com/v1
    kind: Widget
    metadata: {name: w}
"#;
        let records = manifest_records(yaml).unwrap();
        let events: Vec<_> = records
            .iter()
            .filter_map(|r| match r {
                WatchRecord::Event(e) => Some(e.kind),
                WatchRecord::Sync { .. } => None,
            })
            .collect();
        assert_eq!(events, vec![ResourceKind::Namespace, ResourceKind::ConfigMap]);
        assert_eq!(records.len(), 2 + ResourceKind::ALL.len());
    }
}
