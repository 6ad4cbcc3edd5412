//! Typed views over the raw records served by the platform.
//!
//! Bodies are fetched as raw `serde_json::Value`s (so they can be archived
//! verbatim) and viewed through these types when transformed.

use std::collections::HashMap;

use hibou_shared::{Agent, CurationStatus, Grounding, HibouError, Result};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{trace, warn};

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// An assembled statement (one JSONL line of a model's statement dump).
#[derive(Debug, Clone, Deserialize)]
pub struct Statement {
    /// Statement type (`Activation`, `Complex`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Hash identifying the statement across the platform.
    #[serde(deserialize_with = "hash_string")]
    pub matches_hash: String,

    #[serde(default = "default_belief")]
    pub belief: f64,

    #[serde(default)]
    pub evidence: Vec<StatementEvidence>,

    /// Every other key: the agent roles (`subj`, `obj`, `members`, ...) and metadata.
    #[serde(flatten)]
    pub roles: Map<String, Value>,
}

fn default_belief() -> f64 {
    1.0
}

impl Statement {
    /// Whether `role` is present and non-null.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.get(role).is_some_and(|v| !v.is_null())
    }

    /// The single agent filling `role`.
    pub fn agent(&self, role: &str) -> Option<Agent> {
        self.roles.get(role).and_then(agent_from_value)
    }

    /// The agents filling a list-valued `role` (`members`, `obj_from`, `obj_to`).
    pub fn agents(&self, role: &str) -> Option<Vec<Agent>> {
        let list = self.roles.get(role)?.as_array()?;
        Some(list.iter().filter_map(agent_from_value).collect())
    }
}

/// One piece of evidence attached to a statement.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementEvidence {
    #[serde(deserialize_with = "hash_string")]
    pub source_hash: String,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub text_refs: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawAgent {
    name: String,
    #[serde(default)]
    db_refs: Map<String, Value>,
}

fn agent_from_value(value: &Value) -> Option<Agent> {
    let raw = RawAgent::deserialize(value).ok()?;
    let db_refs = raw
        .db_refs
        .iter()
        .filter_map(|(namespace, id)| {
            let id = match id {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(Grounding::new(namespace.clone(), id))
        })
        .collect();

    Some(Agent {
        name: raw.name,
        db_refs,
    })
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// One explanatory path of a model against a test statement.
#[derive(Debug, Clone, Deserialize)]
pub struct PathRecord {
    /// Hash of the test statement this path explains.
    #[serde(deserialize_with = "hash_string")]
    pub test: String,

    #[serde(default)]
    pub graph_type: String,

    #[serde(default)]
    pub edges: Vec<PathStep>,

    /// Agent names along the path.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// A step of a path, referencing the statements that support it.
#[derive(Debug, Clone, Deserialize)]
pub struct PathStep {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, deserialize_with = "hash_list")]
    pub hashes: Vec<String>,
}

impl PathRecord {
    /// Statement hashes referenced by the `statements` steps, in path order.
    pub fn statement_hashes(&self) -> impl Iterator<Item = &str> {
        self.edges
            .iter()
            .filter(|step| step.kind == "statements")
            .flat_map(|step| step.hashes.iter().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// Curation
// ---------------------------------------------------------------------------

/// Curation verdicts for a model's statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curation {
    statuses: HashMap<String, CurationStatus>,
}

impl Curation {
    /// Build from the `{label: [statement hash, ...]}` document.
    ///
    /// Unknown labels are ignored. A hash listed under several labels keeps the last one.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| HibouError::parse("curation document is not an object"))?;

        let mut statuses = HashMap::new();
        for (label, hashes) in object {
            let Some(status) = CurationStatus::from_label(label) else {
                trace!(%label, "ignoring unknown curation label");
                continue;
            };
            let Some(hashes) = hashes.as_array() else {
                continue;
            };
            for hash in hashes.iter().filter_map(value_to_hash) {
                statuses.insert(hash, status);
            }
        }

        Ok(Self { statuses })
    }

    /// Status of a statement; anything never curated is `Uncurated`.
    pub fn status_of(&self, statement_id: &str) -> CurationStatus {
        self.statuses
            .get(statement_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// View raw values as typed records, dropping (and logging) the ones that do not fit.
pub fn parse_records<T: DeserializeOwned>(values: &[Value], what: &str) -> Vec<T> {
    let mut skipped = 0usize;
    let records: Vec<T> = values
        .iter()
        .filter_map(|value| match T::deserialize(value) {
            Ok(record) => Some(record),
            Err(e) => {
                skipped += 1;
                trace!(what, error = %e, "skipping malformed record");
                None
            }
        })
        .collect();

    if skipped > 0 {
        warn!(what, skipped, kept = records.len(), "skipped malformed records");
    }
    records
}

/// Hashes are served as strings or integers depending on the endpoint.
fn value_to_hash(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn hash_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_hash(&value).ok_or_else(|| de::Error::custom(format!("expected a hash, found {value}")))
}

fn hash_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.iter().filter_map(value_to_hash).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statement_roles_and_agents() {
        let value = json!({
            "type": "Conversion",
            "matches_hash": -42,
            "subj": {"name": "PKM", "db_refs": {"HGNC": "9021"}},
            "obj_from": [{"name": "PEP", "db_refs": {"CHEBI": "CHEBI:18021"}}],
            "obj_to": [{"name": "pyruvate", "db_refs": {}}],
            "evidence": [{"source_hash": 7}]
        });
        let stmt = Statement::deserialize(&value).unwrap();
        assert_eq!(stmt.matches_hash, "-42");
        assert_eq!(stmt.belief, 1.0);
        assert!(stmt.has_role("subj"));
        assert!(!stmt.has_role("obj"));
        assert_eq!(stmt.agent("subj").unwrap().db_refs, vec![Grounding::new("HGNC", "9021")]);
        assert_eq!(stmt.agents("obj_from").unwrap()[0].name, "PEP");
        assert_eq!(stmt.evidence[0].source_hash, "7");
    }

    #[test]
    fn null_role_counts_as_missing() {
        let value = json!({"type": "Activation", "matches_hash": "1", "subj": null, "obj": {"name": "ERK"}});
        let stmt = Statement::deserialize(&value).unwrap();
        assert!(!stmt.has_role("subj"));
        assert!(stmt.has_role("obj"));
    }

    #[test]
    fn path_statement_hashes_only_from_statement_steps() {
        let value = json!({
            "test": 9001,
            "graph_type": "signed_graph",
            "edges": [
                {"type": "statements", "hashes": ["101", 102]},
                {"type": "other", "hashes": ["103"]}
            ],
            "nodes": ["MEK", "ERK"]
        });
        let path = PathRecord::deserialize(&value).unwrap();
        assert_eq!(path.test, "9001");
        assert_eq!(path.statement_hashes().collect::<Vec<_>>(), vec!["101", "102"]);
    }

    #[test]
    fn curation_maps_labels() {
        let curation = Curation::from_value(&json!({
            "correct": ["101"],
            "incorrect": [102],
            "bogus": ["103"]
        }))
        .unwrap();
        assert_eq!(curation.status_of("101"), CurationStatus::Correct);
        assert_eq!(curation.status_of("102"), CurationStatus::Incorrect);
        assert_eq!(curation.status_of("103"), CurationStatus::Uncurated);
        assert_eq!(curation.len(), 2);
    }

    #[test]
    fn curation_rejects_non_object() {
        assert!(Curation::from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn parse_records_drops_malformed() {
        let values = vec![
            json!({"type": "Activation", "matches_hash": "1"}),
            json!({"matches_hash": "2"}),
        ];
        let stmts: Vec<Statement> = parse_records(&values, "statements");
        assert_eq!(stmts.len(), 1);
    }
}
