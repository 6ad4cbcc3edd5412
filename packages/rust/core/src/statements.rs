//! Statement transform: assembled statements → nodes, edges, evidences, docs.

use std::collections::HashMap;

use hibou_emmaa::Statement;
use hibou_shared::{
    Agent, CurationStatus, Doc, DocIdentifier, Edge, Evidence, Grounding, IdNamespace, Node,
};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Grounding namespaces that carry raw text, not database references.
const TEXT_NAMESPACES: [&str; 2] = ["TEXT", "TEXT_NORM"];

/// Statement types whose subject/object edge is positive.
const POSITIVE_TYPES: [&str; 2] = ["Activation", "IncreaseAmount"];

/// Two-agent role pairs, tried in order after `subj`/`obj`.
const UNSIGNED_PAIRS: [(&str, &str); 3] = [("enz", "sub"), ("gef", "ras"), ("gap", "ras")];

/// Graph objects derived from one model's statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub evidences: Vec<Evidence>,
    pub docs: Vec<Doc>,
    /// Statements that matched a known role shape.
    pub statements_used: usize,
}

impl ModelGraph {
    /// Edge IDs per statement ID.
    pub fn statement_edges(&self) -> HashMap<&str, Vec<u32>> {
        let mut map: HashMap<&str, Vec<u32>> = HashMap::new();
        for edge in &self.edges {
            map.entry(edge.statement_id.as_str()).or_default().push(edge.id);
        }
        map
    }

    /// Node ID per node name.
    pub fn node_ids(&self) -> HashMap<&str, u32> {
        self.nodes.iter().map(|n| (n.name.as_str(), n.id)).collect()
    }
}

// ---------------------------------------------------------------------------
// Edge shapes
// ---------------------------------------------------------------------------

/// Source, target and polarity of each edge a statement yields.
///
/// `None` means the statement has no recognized role shape.
fn edge_shapes(stmt: &Statement) -> Option<Vec<(Agent, Agent, Option<bool>)>> {
    if stmt.has_role("subj") && stmt.has_role("obj") {
        let polarity = POSITIVE_TYPES.contains(&stmt.kind.as_str());
        let pair = stmt.agent("subj").zip(stmt.agent("obj"));
        return Some(pair.map(|(s, t)| (s, t, Some(polarity))).into_iter().collect());
    }

    for (src, tgt) in UNSIGNED_PAIRS {
        if stmt.has_role(src) && stmt.has_role(tgt) {
            let pair = stmt.agent(src).zip(stmt.agent(tgt));
            return Some(pair.map(|(s, t)| (s, t, None)).into_iter().collect());
        }
    }

    if stmt.has_role("subj") && stmt.has_role("obj_from") && stmt.has_role("obj_to") {
        let Some(subj) = stmt.agent("subj") else {
            return Some(Vec::new());
        };
        let mut shapes = Vec::with_capacity(2);
        for (role, polarity) in [("obj_from", false), ("obj_to", true)] {
            if let Some(target) = stmt.agents(role).and_then(|a| a.into_iter().next()) {
                shapes.push((subj.clone(), target, Some(polarity)));
            }
        }
        return Some(shapes);
    }

    if stmt.has_role("members") {
        let members = stmt.agents("members").unwrap_or_default();
        let mut shapes = Vec::new();
        for (i, source) in members.iter().enumerate() {
            for (j, target) in members.iter().enumerate() {
                if i != j {
                    shapes.push((source.clone(), target.clone(), None));
                }
            }
        }
        return Some(shapes);
    }

    None
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EvidenceAcc {
    text: Option<String>,
    text_refs: Option<Map<String, Value>>,
    statement_ids: Vec<String>,
}

#[derive(Default)]
struct NodeAcc {
    db_refs: Vec<Grounding>,
    sources: Vec<u32>,
    targets: Vec<u32>,
}

/// Transform a model's statements into graph objects with global IDs.
#[instrument(skip_all, fields(model_id = model_id, statements = statements.len()))]
pub fn transform_statements(model_id: u32, statements: &[Statement]) -> ModelGraph {
    // Edges
    let mut edges: Vec<Edge> = Vec::new();
    let mut used: Vec<&Statement> = Vec::new();

    for stmt in statements {
        let Some(shapes) = edge_shapes(stmt) else {
            debug!(statement = %stmt.matches_hash, kind = %stmt.kind, "no edge shape, skipping");
            continue;
        };
        used.push(stmt);

        for (source, target, polarity) in shapes {
            edges.push(Edge {
                id: IdNamespace::Edges.global(edges.len()),
                model_id,
                statement_id: stmt.matches_hash.clone(),
                statement_type: stmt.kind.clone(),
                belief: stmt.belief,
                evidence_ids: Vec::new(),
                doc_ids: Vec::new(),
                source_node_id: 0,
                target_node_id: 0,
                tested: false,
                test_path_ids: Vec::new(),
                curated: CurationStatus::Uncurated,
                directed: true,
                polarity,
                source,
                target,
            });
        }
    }

    let mut statement_edges: HashMap<String, Vec<u32>> = HashMap::new();
    for edge in &edges {
        statement_edges
            .entry(edge.statement_id.clone())
            .or_default()
            .push(edge.id);
    }
    let edge_index = |id: u32| IdNamespace::split(id).map(|(_, local)| local as usize);

    // Evidences, unique by source hash: first-seen order, last-seen payload
    let mut evidence_order: Vec<String> = Vec::new();
    let mut evidence_acc: HashMap<String, EvidenceAcc> = HashMap::new();
    for stmt in &used {
        for ev in &stmt.evidence {
            let acc = evidence_acc.entry(ev.source_hash.clone()).or_insert_with(|| {
                evidence_order.push(ev.source_hash.clone());
                EvidenceAcc::default()
            });
            acc.text = ev.text.clone();
            acc.text_refs = ev.text_refs.clone();
            if !acc.statement_ids.contains(&stmt.matches_hash) {
                acc.statement_ids.push(stmt.matches_hash.clone());
            }
        }
    }

    let mut evidences: Vec<Evidence> = evidence_order
        .iter()
        .enumerate()
        .filter_map(|(i, hash)| {
            let acc = evidence_acc.remove(hash)?;
            let edge_ids = acc
                .statement_ids
                .iter()
                .filter_map(|s| statement_edges.get(s))
                .flatten()
                .copied()
                .collect();
            Some(Evidence {
                id: IdNamespace::Evidences.global(i),
                model_id,
                text: acc.text,
                text_refs: acc.text_refs,
                source_hash: hash.clone(),
                statement_ids: acc.statement_ids,
                edge_ids,
                doc_ids: Vec::new(),
            })
        })
        .collect();

    for ev in &evidences {
        for edge_id in &ev.edge_ids {
            if let Some(edge) = edge_index(*edge_id).and_then(|i| edges.get_mut(i)) {
                edge.evidence_ids.push(ev.id);
            }
        }
    }

    // Docs, unique by their external references
    let mut docs: Vec<Doc> = Vec::new();
    let mut doc_keys: HashMap<String, usize> = HashMap::new();
    for ev in &mut evidences {
        let Some(refs) = ev.text_refs.as_ref().filter(|r| !r.is_empty()) else {
            continue;
        };
        let key = serde_json::to_string(refs).unwrap_or_default();
        let index = *doc_keys.entry(key).or_insert_with(|| {
            docs.push(Doc {
                id: IdNamespace::Docs.global(docs.len()),
                model_id,
                evidence_ids: Vec::new(),
                edge_ids: Vec::new(),
                identifier: doc_identifiers(refs),
            });
            docs.len() - 1
        });

        let doc = &mut docs[index];
        doc.evidence_ids.push(ev.id);
        for edge_id in &ev.edge_ids {
            if !doc.edge_ids.contains(edge_id) {
                doc.edge_ids.push(*edge_id);
            }
        }
        ev.doc_ids.push(doc.id);
    }

    for doc in &docs {
        for edge_id in &doc.edge_ids {
            if let Some(edge) = edge_index(*edge_id).and_then(|i| edges.get_mut(i)) {
                edge.doc_ids.push(doc.id);
            }
        }
    }

    // Nodes, keyed by agent name: sources in edge order, then new targets
    let mut names: Vec<String> = Vec::new();
    for name in edges
        .iter()
        .map(|e| &e.source.name)
        .chain(edges.iter().map(|e| &e.target.name))
    {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    let mut node_acc: HashMap<&str, NodeAcc> = HashMap::new();
    for edge in &edges {
        let source = node_acc.entry(edge.source.name.as_str()).or_default();
        source.db_refs = edge.source.db_refs.clone();
        source.sources.push(edge.id);

        let target = node_acc.entry(edge.target.name.as_str()).or_default();
        target.db_refs = edge.target.db_refs.clone();
        target.targets.push(edge.id);
    }

    let nodes: Vec<Node> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let acc = node_acc.remove(name.as_str()).unwrap_or_default();
            let db_ids: Vec<Grounding> = acc
                .db_refs
                .into_iter()
                .filter(|g| !TEXT_NAMESPACES.contains(&g.namespace.as_str()))
                .collect();
            Node {
                id: IdNamespace::Nodes.global(i),
                model_id,
                name: name.clone(),
                grounded_db: !db_ids.is_empty(),
                db_ids,
                grounding: None,
                out_degree: acc.sources.len(),
                in_degree: acc.targets.len(),
                edge_ids_source: acc.sources,
                edge_ids_target: acc.targets,
            }
        })
        .collect();

    let node_ids: HashMap<&str, u32> = nodes.iter().map(|n| (n.name.as_str(), n.id)).collect();
    for edge in &mut edges {
        edge.source_node_id = node_ids.get(edge.source.name.as_str()).copied().unwrap_or_default();
        edge.target_node_id = node_ids.get(edge.target.name.as_str()).copied().unwrap_or_default();
    }

    debug!(
        statements = statements.len(),
        used = used.len(),
        edges = edges.len(),
        nodes = nodes.len(),
        evidences = evidences.len(),
        docs = docs.len(),
        "transformed statements"
    );

    ModelGraph {
        statements_used: used.len(),
        nodes,
        edges,
        evidences,
        docs,
    }
}

/// `{"PMID": "1"}` → `[{"type": "pmid", "id": "1"}]`.
fn doc_identifiers(refs: &Map<String, Value>) -> Vec<DocIdentifier> {
    refs.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(kind, id)| DocIdentifier {
            kind: kind.to_lowercase(),
            id: match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
        .collect()
}
