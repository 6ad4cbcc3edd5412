//! Core domain types for the Hibou pipeline.
//!
//! Records in this module are what ends up in the distributed JSONL objects.
//! Field order matches the object preambles in [`crate::preamble`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Groundings
// ---------------------------------------------------------------------------

/// A reference from a graph node to an entry in an external database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grounding {
    /// Database / vocabulary tag (e.g. `HGNC`, `CHEBI`).
    pub namespace: String,
    /// Identifier within the namespace.
    pub id: String,
}

impl Grounding {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// A candidate is usable only when it carries a non-blank identifier.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// `NAMESPACE:ID`, the form ontology node IDs use.
    pub fn curie(&self) -> String {
        format!("{}:{}", self.namespace, self.id)
    }
}

impl fmt::Display for Grounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

// ---------------------------------------------------------------------------
// Model requests
// ---------------------------------------------------------------------------

/// Which models a run should process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRequest {
    /// Every model in the catalog.
    All,
    /// An explicit list, in request order, without duplicates.
    Explicit(Vec<String>),
}

impl ModelRequest {
    /// The literal token selecting the whole catalog.
    pub const WILDCARD: &'static str = "all";

    /// Parse `"all"` or a whitespace-separated list of model identifiers.
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == Self::WILDCARD {
            Self::All
        } else {
            Self::Explicit(parse_id_list(raw))
        }
    }
}

impl FromStr for ModelRequest {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ModelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(Self::WILDCARD),
            Self::Explicit(ids) => f.write_str(&ids.join(" ")),
        }
    }
}

/// Split a whitespace-separated list, keeping the first occurrence of each item.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in raw.split_whitespace() {
        if !out.iter().any(|t| t == token) {
            out.push(token.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A knowledge model tracked by the upstream platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Global ID of this model.
    pub id: u32,
    /// Platform identifier, used in every upstream request.
    pub id_emmaa: String,
    /// Human-readable name.
    pub name: Option<String>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Platform identifiers of the test corpora this model is evaluated against.
    #[serde(default)]
    pub tests: Vec<String>,
    /// Global IDs of those test corpora.
    #[serde(default)]
    pub test_ids: Vec<u32>,
    /// UTC time (ISO 8601) at which the catalog was fetched.
    pub snapshot_time: String,
    /// Whether the run's exclusion list names this model.
    #[serde(default)]
    pub excluded: bool,
}

/// A test corpus that models are evaluated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntry {
    pub id: u32,
    pub id_emmaa: String,
    pub name: Option<String>,
    #[serde(default)]
    pub model_ids: Vec<u32>,
    pub snapshot_time: String,
}

/// A (model, test) pair whose explanatory paths live in the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSource {
    pub id_emmaa_model: String,
    pub id_emmaa_test: String,
}

// ---------------------------------------------------------------------------
// Graph records
// ---------------------------------------------------------------------------

/// A statement participant as it appears on an edge before node IDs exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Agent {
    pub name: String,
    pub db_refs: Vec<Grounding>,
}

/// Curation verdict attached to an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CurationStatus {
    Incorrect,
    Correct,
    Partial,
    #[default]
    Uncurated,
}

impl CurationStatus {
    /// Numeric code written to the edge records.
    pub fn code(self) -> u8 {
        match self {
            Self::Incorrect => 0,
            Self::Correct => 1,
            Self::Partial => 2,
            Self::Uncurated => 3,
        }
    }

    /// Map a curation bucket name (`correct`, `incorrect`, ...) to a status.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "incorrect" => Some(Self::Incorrect),
            "correct" => Some(Self::Correct),
            "partial" => Some(Self::Partial),
            "uncurated" => Some(Self::Uncurated),
            _ => None,
        }
    }
}

impl Serialize for CurationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A directed edge derived from one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: u32,
    pub model_id: u32,
    pub statement_id: String,
    pub statement_type: String,
    pub belief: f64,
    pub evidence_ids: Vec<u32>,
    pub doc_ids: Vec<u32>,
    pub source_node_id: u32,
    pub target_node_id: u32,
    pub tested: bool,
    pub test_path_ids: Vec<u32>,
    pub curated: CurationStatus,
    pub directed: bool,
    pub polarity: Option<bool>,
    #[serde(skip)]
    pub source: Agent,
    #[serde(skip)]
    pub target: Agent,
}

/// A unique piece of textual evidence supporting one or more statements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub id: u32,
    pub model_id: u32,
    pub text: Option<String>,
    pub text_refs: Option<serde_json::Map<String, serde_json::Value>>,
    pub source_hash: String,
    pub statement_ids: Vec<String>,
    pub edge_ids: Vec<u32>,
    pub doc_ids: Vec<u32>,
}

/// External reference of a document (`pmid`, `doi`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// A unique document referenced by evidences.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Doc {
    pub id: u32,
    pub model_id: u32,
    pub evidence_ids: Vec<u32>,
    pub edge_ids: Vec<u32>,
    pub identifier: Vec<DocIdentifier>,
}

/// A graph node (statement agent), keyed by name within a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: u32,
    pub model_id: u32,
    pub name: String,
    pub grounded_db: bool,
    /// Candidate groundings, highest priority first once normalized.
    pub db_ids: Vec<Grounding>,
    /// The single preferred grounding, if any candidate was valid.
    pub grounding: Option<Grounding>,
    pub edge_ids_source: Vec<u32>,
    pub edge_ids_target: Vec<u32>,
    pub out_degree: usize,
    pub in_degree: usize,
}

/// Ontology attributes of a model node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAtts {
    pub node_id: u32,
    pub db_ref_priority: Option<String>,
    pub grounded_group: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub group_ids: Vec<u32>,
    pub group_refs: Vec<String>,
    pub node_group_level: usize,
}

/// An ontology category that model nodes are grouped under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: u32,
    pub id_onto: String,
    pub name: String,
    pub level: usize,
    pub parent_id: Option<u32>,
    pub children_ids: Vec<u32>,
    pub model_id: u32,
    pub node_ids_all: Vec<u32>,
    pub node_ids_direct: Vec<u32>,
}

/// An explanatory path of a model against one test statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelPath {
    pub id: u32,
    pub model_id: u32,
    pub test_id: u32,
    pub test_statement_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub edge_ids: Vec<u32>,
    pub node_ids: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grounding_validity() {
        assert!(Grounding::new("HGNC", "1097").is_valid());
        assert!(!Grounding::new("HGNC", "").is_valid());
        assert!(!Grounding::new("HGNC", "   ").is_valid());
        assert_eq!(Grounding::new("CHEBI", "CHEBI:15377").curie(), "CHEBI:CHEBI:15377");
    }

    #[test]
    fn model_request_parsing() {
        assert_eq!(ModelRequest::parse("all"), ModelRequest::All);
        assert_eq!(ModelRequest::parse("  all "), ModelRequest::All);
        assert_eq!(
            ModelRequest::parse("aml covid19 aml"),
            ModelRequest::Explicit(vec!["aml".into(), "covid19".into()])
        );
        assert_eq!(ModelRequest::parse(""), ModelRequest::Explicit(vec![]));
        assert_eq!(ModelRequest::parse("aml covid19").to_string(), "aml covid19");
    }

    #[test]
    fn curation_status_serializes_as_code() {
        assert_eq!(serde_json::to_string(&CurationStatus::Partial).unwrap(), "2");
        assert_eq!(CurationStatus::from_label("correct"), Some(CurationStatus::Correct));
        assert_eq!(CurationStatus::from_label("bogus"), None);
        assert_eq!(CurationStatus::default().code(), 3);
    }

    #[test]
    fn renamed_fields_serialize_as_type() {
        let atts = NodeAtts {
            node_id: 7,
            db_ref_priority: None,
            grounded_group: false,
            kind: "not-grounded".into(),
            group_ids: vec![],
            group_refs: vec!["not-grounded".into()],
            node_group_level: 1,
        };
        let json = serde_json::to_value(&atts).unwrap();
        assert_eq!(json["type"], "not-grounded");
        assert!(json.get("kind").is_none());
    }
}
