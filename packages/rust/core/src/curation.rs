//! Curation verdicts on edges.

use hibou_emmaa::Curation;
use hibou_shared::{CurationStatus, Edge};
use tracing::debug;

/// Set each edge's curation status from its statement. Without a curation
/// document every edge is uncurated.
///
/// Returns the number of curated edges.
pub fn apply_curation(edges: &mut [Edge], curation: Option<&Curation>) -> usize {
    let mut curated = 0;
    for edge in edges.iter_mut() {
        edge.curated = curation.map_or(CurationStatus::Uncurated, |c| c.status_of(&edge.statement_id));
        if edge.curated != CurationStatus::Uncurated {
            curated += 1;
        }
    }
    debug!(
        edges = edges.len(),
        verdicts = curation.map_or(0, Curation::len),
        curated,
        "applied curation"
    );
    curated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::transform_statements;
    use hibou_emmaa::{Statement, decode_jsonl, parse_records};
    use serde_json::Value;

    fn fixture_edges() -> Vec<Edge> {
        let body = std::fs::read("../../../fixtures/emmaa/statements.jsonl").unwrap();
        let values: Vec<Value> = decode_jsonl(&body).unwrap();
        let statements: Vec<Statement> = parse_records(&values, "statements");
        transform_statements(0, &statements).edges
    }

    #[test]
    fn fixture_curation_codes() {
        let body = std::fs::read("../../../fixtures/emmaa/curation.json").unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        let curation = Curation::from_value(&value).unwrap();

        let mut edges = fixture_edges();
        assert_eq!(apply_curation(&mut edges, Some(&curation)), 2);

        let codes: Vec<u8> = edges.iter().map(|e| e.curated.code()).collect();
        assert_eq!(codes, vec![1, 0, 3, 3, 3, 3, 3]);
    }

    #[test]
    fn missing_curation_leaves_edges_uncurated() {
        let mut edges = fixture_edges();
        edges[0].curated = CurationStatus::Correct;
        assert_eq!(apply_curation(&mut edges, None), 0);
        assert!(edges.iter().all(|e| e.curated == CurationStatus::Uncurated));
    }
}
