//! Explanatory paths: map path records onto a model's edges and nodes.

use hibou_emmaa::PathRecord;
use hibou_shared::{Edge, IdNamespace, ModelPath};
use tracing::{debug, trace};

use crate::statements::ModelGraph;

/// The path records of one model against one test corpus.
#[derive(Debug, Clone)]
pub struct PathBatch {
    /// Global ID of the test corpus.
    pub test_id: u32,
    pub records: Vec<PathRecord>,
}

/// Turn path records into `ModelPath`s, numbering them across all batches.
///
/// A statement hash maps to every edge derived from that statement. Hashes and
/// node names the model does not know are skipped.
pub fn reduce_paths(model_id: u32, graph: &ModelGraph, batches: &[PathBatch]) -> Vec<ModelPath> {
    let statement_edges = graph.statement_edges();
    let node_ids = graph.node_ids();

    let mut paths = Vec::new();
    for batch in batches {
        for record in &batch.records {
            let mut edge_ids: Vec<u32> = Vec::new();
            for hash in record.statement_hashes() {
                match statement_edges.get(hash) {
                    Some(ids) => {
                        for id in ids {
                            if !edge_ids.contains(id) {
                                edge_ids.push(*id);
                            }
                        }
                    }
                    None => trace!(%hash, "path statement not in model"),
                }
            }

            let node_ids = record
                .nodes
                .iter()
                .filter_map(|name| node_ids.get(name.as_str()).copied())
                .collect();

            paths.push(ModelPath {
                id: IdNamespace::Paths.global(paths.len()),
                model_id,
                test_id: batch.test_id,
                test_statement_id: record.test.clone(),
                kind: record.graph_type.clone(),
                edge_ids,
                node_ids,
            });
        }
    }

    debug!(paths = paths.len(), "reduced paths");
    paths
}

/// Flag the edges that lie on a path and record which paths test them.
///
/// Returns the number of tested edges.
pub fn mark_tested_edges(edges: &mut [Edge], paths: &[ModelPath]) -> usize {
    for path in paths {
        for edge_id in &path.edge_ids {
            let Some((_, local)) = IdNamespace::split(*edge_id) else {
                continue;
            };
            if let Some(edge) = edges.get_mut(local as usize) {
                edge.tested = true;
                if !edge.test_path_ids.contains(&path.id) {
                    edge.test_path_ids.push(path.id);
                }
            }
        }
    }
    edges.iter().filter(|e| e.tested).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statements::transform_statements;
    use hibou_emmaa::{Statement, decode_jsonl, parse_records};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn read_jsonl(name: &str) -> Vec<Value> {
        let body = std::fs::read(format!("../../../fixtures/emmaa/{name}")).unwrap();
        decode_jsonl(&body).unwrap()
    }

    fn fixture_graph() -> ModelGraph {
        let statements: Vec<Statement> = parse_records(&read_jsonl("statements.jsonl"), "statements");
        transform_statements(0, &statements)
    }

    fn fixture_batch() -> PathBatch {
        PathBatch {
            test_id: IdNamespace::Tests.global(0),
            records: parse_records(&read_jsonl("paths.jsonl"), "paths"),
        }
    }

    #[test]
    fn fixture_paths_map_to_edges_and_nodes() {
        let graph = fixture_graph();
        let paths = reduce_paths(0, &graph, &[fixture_batch()]);

        assert_eq!(paths.len(), 2);
        let first = &paths[0];
        assert_eq!(first.id, IdNamespace::Paths.global(0));
        assert_eq!(first.test_statement_id, "9001");
        assert_eq!(first.kind, "signed_graph");
        assert_eq!(first.edge_ids, vec![graph.edges[0].id]);
        assert_eq!(first.node_ids, vec![graph.nodes[0].id, graph.nodes[4].id]);

        // 999 is unknown, UNKNOWN is not a node
        let second = &paths[1];
        assert_eq!(second.test_statement_id, "9002");
        assert_eq!(second.edge_ids, vec![graph.edges[2].id]);
        assert_eq!(second.node_ids.len(), 2);
    }

    #[test]
    fn complex_hash_maps_to_every_edge() {
        let graph = fixture_graph();
        let record: PathRecord = serde_json::from_value(serde_json::json!({
            "test": "1",
            "graph_type": "unsigned_graph",
            "edges": [{"type": "statements", "hashes": ["105"]}],
            "nodes": []
        }))
        .unwrap();
        let batch = PathBatch { test_id: 0, records: vec![record] };

        let paths = reduce_paths(0, &graph, &[batch]);
        assert_eq!(paths[0].edge_ids, vec![graph.edges[5].id, graph.edges[6].id]);
    }

    #[test]
    fn tested_edges_record_their_paths() {
        let mut graph = fixture_graph();
        let paths = reduce_paths(0, &graph, &[fixture_batch()]);

        assert_eq!(mark_tested_edges(&mut graph.edges, &paths), 2);
        assert!(graph.edges[0].tested);
        assert_eq!(graph.edges[0].test_path_ids, vec![paths[0].id]);
        assert_eq!(graph.edges[2].test_path_ids, vec![paths[1].id]);
        assert!(!graph.edges[1].tested);
    }

    #[test]
    fn no_batches_no_paths() {
        let graph = fixture_graph();
        assert!(reduce_paths(0, &graph, &[]).is_empty());
    }
}
