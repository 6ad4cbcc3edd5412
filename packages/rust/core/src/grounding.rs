//! Grounding normalization: pick one preferred database reference per node.
//!
//! A [`NamespaceRanking`] is built once per run from the configured priority
//! list and then consulted for every node of every model.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use hibou_shared::{Grounding, Node};
use serde::Serialize;
use tracing::trace;

/// Namespace → rank lookup. Lower rank means higher priority.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRanking {
    ranks: HashMap<String, usize>,
    order: Vec<String>,
}

impl NamespaceRanking {
    /// Rank of any namespace missing from the priority list.
    pub const UNRANKED: usize = usize::MAX;

    /// Build from a priority list, highest priority first. Repeated entries keep their first rank.
    pub fn new<I, S>(priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranking = Self::default();
        for namespace in priority {
            let namespace = namespace.into();
            if !ranking.ranks.contains_key(&namespace) {
                ranking.ranks.insert(namespace.clone(), ranking.order.len());
                ranking.order.push(namespace);
            }
        }
        ranking
    }

    pub fn rank(&self, namespace: &str) -> usize {
        self.ranks.get(namespace).copied().unwrap_or(Self::UNRANKED)
    }

    /// The configured namespaces, highest priority first.
    pub fn priority(&self) -> &[String] {
        &self.order
    }

    /// Select the preferred candidate, or `None` when no candidate is valid.
    ///
    /// Lowest rank wins. Within a ranked namespace the smallest identifier wins;
    /// unranked candidates fall back to their position in `candidates`.
    pub fn resolve(&self, candidates: &[Grounding]) -> Option<Grounding> {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_usable(c))
            .min_by(|a, b| self.compare(a, b))
            .map(|(_, c)| c.clone())
    }

    /// Order candidates by preference and drop the invalid ones.
    ///
    /// The first element of the result is what [`resolve`](Self::resolve) returns.
    pub fn sort(&self, candidates: &[Grounding]) -> Vec<Grounding> {
        let mut indexed: Vec<(usize, &Grounding)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| self.is_usable(c))
            .collect();
        indexed.sort_by(|a, b| self.compare(a, b));
        indexed.into_iter().map(|(_, c)| c.clone()).collect()
    }

    fn is_usable(&self, candidate: &Grounding) -> bool {
        if candidate.is_valid() {
            true
        } else {
            trace!(namespace = %candidate.namespace, "dropping candidate with empty identifier");
            false
        }
    }

    fn compare(&self, (pos_a, a): &(usize, &Grounding), (pos_b, b): &(usize, &Grounding)) -> Ordering {
        let rank_a = self.rank(&a.namespace);
        let rank_b = self.rank(&b.namespace);

        rank_a.cmp(&rank_b).then_with(|| {
            if rank_a == Self::UNRANKED {
                pos_a.cmp(pos_b)
            } else {
                a.id.cmp(&b.id).then_with(|| pos_a.cmp(pos_b))
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Namespace report
// ---------------------------------------------------------------------------

/// Every namespace relevant to a model, in reporting order:
/// the priority list, then model namespaces outside it, then ontology-only namespaces.
pub fn ordered_namespaces<'a>(
    priority: &[String],
    model_namespaces: impl IntoIterator<Item = &'a str>,
    ontology_namespaces: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let listed: BTreeSet<&str> = priority.iter().map(String::as_str).collect();
    let model: BTreeSet<&str> = model_namespaces
        .into_iter()
        .filter(|ns| !listed.contains(ns))
        .collect();
    let ontology: BTreeSet<&str> = ontology_namespaces
        .into_iter()
        .filter(|ns| !listed.contains(ns) && !model.contains(ns))
        .collect();

    priority
        .iter()
        .cloned()
        .chain(model.into_iter().map(String::from))
        .chain(ontology.into_iter().map(String::from))
        .collect()
}

/// How often a namespace is used by model groundings and ontology node IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceUsage {
    pub namespace: String,
    pub model: usize,
    pub ontology: usize,
}

/// Count namespace usage for the reporting table.
pub fn namespace_usage(
    ordered: &[String],
    nodes: &[Node],
    ontology_counts: &BTreeMap<String, usize>,
) -> Vec<NamespaceUsage> {
    let mut model_counts: HashMap<&str, usize> = HashMap::new();
    for grounding in nodes.iter().flat_map(|n| &n.db_ids) {
        *model_counts.entry(grounding.namespace.as_str()).or_default() += 1;
    }

    ordered
        .iter()
        .map(|ns| NamespaceUsage {
            namespace: ns.clone(),
            model: model_counts.get(ns.as_str()).copied().unwrap_or(0),
            ontology: ontology_counts.get(ns).copied().unwrap_or(0),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Node normalization
// ---------------------------------------------------------------------------

/// Resolved grounding of one node, as written to `groundings.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGrounding {
    pub node_id: u32,
    pub name: String,
    pub grounding: Option<Grounding>,
}

/// Per-model grounding document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundingReport {
    pub model: String,
    pub namespaces: Vec<String>,
    pub nodes: Vec<NodeGrounding>,
}

/// Sort every node's `db_ids` by preference and record its resolved grounding.
///
/// Invalid candidates are dropped, so `grounded_db` is recomputed from what remains.
/// Returns the number of nodes that resolved to a grounding.
pub fn normalize_nodes(ranking: &NamespaceRanking, nodes: &mut [Node]) -> usize {
    let mut resolved = 0;
    for node in nodes.iter_mut() {
        node.db_ids = ranking.sort(&node.db_ids);
        node.grounding = node.db_ids.first().cloned();
        node.grounded_db = node.grounding.is_some();
        if node.grounding.is_some() {
            resolved += 1;
        }
    }
    resolved
}

/// Build the `groundings.json` document of a model.
pub fn grounding_report(model: &str, namespaces: Vec<String>, nodes: &[Node]) -> GroundingReport {
    GroundingReport {
        model: model.to_string(),
        namespaces,
        nodes: nodes
            .iter()
            .map(|n| NodeGrounding {
                node_id: n.id,
                name: n.name.clone(),
                grounding: n.grounding.clone(),
            })
            .collect(),
    }
}
