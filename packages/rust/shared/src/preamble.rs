//! Distributed object types and the preamble line written ahead of their records.

use serde_json::{Map, Value};

/// Kinds of JSONL objects the pipeline distributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Models,
    Tests,
    Paths,
    Edges,
    Evidences,
    Docs,
    Nodes,
    NodeAtts,
    Groups,
}

impl ObjectType {
    /// Object types written once per model.
    pub const PER_MODEL: [Self; 7] = [
        Self::Nodes,
        Self::Edges,
        Self::Evidences,
        Self::Docs,
        Self::Paths,
        Self::NodeAtts,
        Self::Groups,
    ];

    /// Stem used for the object name (`nodeAtts`, `edges`, ...).
    pub fn stem(self) -> &'static str {
        match self {
            Self::Models => "models",
            Self::Tests => "tests",
            Self::Paths => "paths",
            Self::Edges => "edges",
            Self::Evidences => "evidences",
            Self::Docs => "docs",
            Self::Nodes => "nodes",
            Self::NodeAtts => "nodeAtts",
            Self::Groups => "groups",
        }
    }

    /// Object file name, e.g. `nodes.jsonl`.
    pub fn file_name(self) -> String {
        format!("{}.jsonl", self.stem())
    }

    /// Field descriptions, in record field order.
    pub fn fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Models => &[
                ("id", "<int> ID of this model"),
                ("id_emmaa", "<str> EMMAA ID of this model, necessary for making requests on the EMMAA API"),
                ("name", "<str> Human-readable name of this model"),
                ("description", "<str> Human-readable description of this model"),
                ("tests", "<list of strs> EMMAA IDs of the tests against which this model has been tested"),
                ("test_ids", "<list of ints> IDs of the tests against which this model has been tested by EMMAA"),
                ("snapshot_time", "<str> Date and UTC time (ISO 8601 format) at which the model data is requested on the EMMAA API"),
                ("excluded", "<bool> whether this model was excluded from processing in this run"),
            ],
            Self::Tests => &[
                ("id", "<int> ID of this test (corpus)"),
                ("id_emmaa", "<str> EMMAA ID of this test, necessary for making requests on the EMMAA API"),
                ("name", "<str> Human-readable name of this test"),
                ("model_ids", "<list of ints> IDs of the models that have been tested against this test by EMMAA"),
                ("snapshot_time", "<str> Date and UTC time (ISO 8601 format) at which the test data is requested on the EMMAA API"),
            ],
            Self::Paths => &[
                ("id", "<int> ID of this (test or explanatory) path"),
                ("model_id", "<int> ID of the associated model"),
                ("test_id", "<int> ID of the associated test (corpus)"),
                ("test_statement_id", "<str> EMMAA ID of the test statement that this path explains"),
                ("type", "<str> type of this path (`unsigned_graph`, `signed_graph`, `pybel`, etc.)"),
                ("edge_ids", "<list of ints> IDs of the edges in this path"),
                ("node_ids", "<list of ints> IDs of the nodes in this path"),
            ],
            Self::Edges => &[
                ("id", "<int> ID of this edge"),
                ("model_id", "<int> ID of the associated model"),
                ("statement_id", "<str> EMMAA ID or `matches_hash` of the INDRA statement from which this edge is derived"),
                ("statement_type", "<str> type of the source statement"),
                ("belief", "<float> belief score of the source statement"),
                ("evidence_ids", "<list of ints> IDs of the evidences that support the source statement"),
                ("doc_ids", "<list of ints> IDs of the docs that support the source statement"),
                ("source_node_id", "<int> ID of the source node"),
                ("target_node_id", "<int> ID of the target node"),
                ("tested", "<bool> test status of the source statement according to `paths`"),
                ("test_path_ids", "<list of ints> IDs of (test/explanatory) paths that reference this edge"),
                ("curated", "<int> curation status of the source statement (0 incorrect, 1 correct, 2 partial, 3 uncurated)"),
                ("directed", "<bool> whether this edge is directed or not"),
                ("polarity", "<bool> prescribed polarity of this edge (`true` = positive, `false` = negative, `null` = undefined)"),
            ],
            Self::Evidences => &[
                ("id", "<int> ID of this evidence"),
                ("model_id", "<int> ID of the associated model"),
                ("text", "<str> plain text of this evidence"),
                ("text_refs", "<dict> external references of the document this evidence is quoted from"),
                ("source_hash", "<str> INDRA source hash of this evidence"),
                ("statement_ids", "<list of strs> IDs of the statements this evidence supports"),
                ("edge_ids", "<list of ints> IDs of the edges this evidence supports"),
                ("doc_ids", "<list of ints> IDs of the docs this evidence is quoted from"),
            ],
            Self::Docs => &[
                ("id", "<int> ID of this doc"),
                ("model_id", "<int> ID of the associated model"),
                ("evidence_ids", "<list of ints> IDs of the evidences that reference this doc"),
                ("edge_ids", "<list of ints> IDs of the edges that reference this doc"),
                ("identifier", "<list of dicts> external doc IDs (dict keys = `type`, `id`)"),
            ],
            Self::Nodes => &[
                ("id", "<int> ID of this node"),
                ("model_id", "<int> ID of the associated model"),
                ("name", "<str> human-readable name of this node"),
                ("grounded_db", "<bool> whether this node is grounded to any database"),
                ("db_ids", "<list of dicts> database groundings (`namespace`, `id`), sorted by priority in descending order"),
                ("grounding", "<dict> the preferred database grounding of this node, or `null`"),
                ("edge_ids_source", "<list of ints> IDs of the edges to which this node is the source"),
                ("edge_ids_target", "<list of ints> IDs of the edges to which this node is the target"),
                ("out_degree", "<int> out-degree of this node (length of `edge_ids_source`)"),
                ("in_degree", "<int> in-degree of this node (length of `edge_ids_target`)"),
            ],
            Self::NodeAtts => &[
                ("node_id", "<int> ID of the node"),
                ("db_ref_priority", "<str> preferred grounding of the node (`namespace:id`)"),
                ("grounded_group", "<bool> whether this node is grounded to the given ontology"),
                ("type", "<str> ID of the ancestor ontological group of this node"),
                ("group_ids", "<list of ints> IDs of the ontological groups of the node (order = ancestor-to-parent)"),
                ("group_refs", "<list of strs> ontology IDs of the ontological groups of the node (order = ancestor-to-parent)"),
                ("node_group_level", "<int> length of the shortest path from the parent ontological group of the node to the ancestor group, plus one"),
            ],
            Self::Groups => &[
                ("id", "<int> ID of this group"),
                ("id_onto", "<str> ID of this group within the given ontology (format = `namespace:id`)"),
                ("name", "<str> human-readable name of this group"),
                ("level", "<int> length of the shortest path from this group to the ancestor group"),
                ("parent_id", "<int> ID of the group that is the immediate parent of this group"),
                ("children_ids", "<list of ints> IDs of the groups that are the immediate children of this group"),
                ("model_id", "<int> ID of the associated model"),
                ("node_ids_all", "<list of ints> IDs of the model nodes grounded to this group and all its children"),
                ("node_ids_direct", "<list of ints> IDs of the model nodes directly grounded to this group"),
            ],
        }
    }

    /// The preamble object: field name to description, in field order.
    pub fn preamble(self) -> Map<String, Value> {
        self.fields()
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Doc, DocIdentifier};

    #[test]
    fn preamble_keeps_field_order() {
        let keys: Vec<String> = ObjectType::Docs.preamble().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["id", "model_id", "evidence_ids", "edge_ids", "identifier"]
        );
    }

    #[test]
    fn record_fields_match_preamble() {
        let doc = Doc {
            id: 1,
            model_id: 0,
            evidence_ids: vec![],
            edge_ids: vec![],
            identifier: vec![DocIdentifier {
                kind: "pmid".into(),
                id: "123".into(),
            }],
        };
        let value = serde_json::to_value(&doc).unwrap();
        let record_keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        let preamble = ObjectType::Docs.preamble();
        let preamble_keys: Vec<&String> = preamble.keys().collect();
        assert_eq!(record_keys, preamble_keys);
    }

    #[test]
    fn node_atts_file_name() {
        assert_eq!(ObjectType::NodeAtts.file_name(), "nodeAtts.jsonl");
    }
}
