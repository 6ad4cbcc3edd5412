//! Ontology graph: ground model nodes to ontology categories and derive groups.
//!
//! The ontology is a directed `child -> parent` graph (node-link JSON). Each
//! grounded model node gets a lineage, the shortest path from the root of its
//! weakly connected component down to the node's own category. Lineages are
//! then folded into [`Group`]s.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::LazyLock;

use hibou_shared::{Group, HibouError, IdNamespace, Node, NodeAtts, Result};
use regex::Regex;
use rustworkx_core::connectivity::connected_components;
use rustworkx_core::dictmap::{DictMap, InitWithHasher};
use rustworkx_core::petgraph::Direction;
use rustworkx_core::petgraph::graph::{DiGraph, NodeIndex};
use rustworkx_core::shortest_path::dijkstra;
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};

/// Group ref of model nodes without an ontology category.
pub const NOT_GROUNDED: &str = "not-grounded";

/// Link type that names equivalent entries, not a hierarchy.
const XREF: &str = "xref";

/// Namespace prefix of an ontology node ID.
static NAMESPACE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+):").expect("valid regex")
});

/// Node payload.
#[derive(Debug, Clone)]
pub struct OntologyNode {
    pub id: String,
    pub name: Option<String>,
}

/// A weakly connected component of the ontology.
#[derive(Debug, Clone)]
struct Component {
    size: usize,
    /// Nodes without parents, sorted by ID.
    roots: Vec<NodeIndex>,
}

/// Parsed ontology with precomputed components.
#[derive(Debug, Clone)]
pub struct Ontology {
    graph: DiGraph<OntologyNode, String>,
    index: HashMap<String, NodeIndex>,
    components: Vec<Component>,
    component_of: HashMap<NodeIndex, usize>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Ontology {
    /// Parse a node-link document (`{"directed", "nodes", "links"}`).
    ///
    /// `xref` links are dropped. Links naming unknown nodes add those nodes.
    #[instrument(skip_all)]
    pub fn from_node_link(doc: &Value) -> Result<Self> {
        let object = doc
            .as_object()
            .filter(|o| ["nodes", "links", "directed"].iter().all(|k| o.contains_key(*k)))
            .ok_or_else(|| HibouError::parse("ontology is not a node-link graph document"))?;

        let nodes = object
            .get("nodes")
            .and_then(Value::as_array)
            .ok_or_else(|| HibouError::parse("ontology `nodes` is not a list"))?;
        let links = object
            .get("links")
            .and_then(Value::as_array)
            .ok_or_else(|| HibouError::parse("ontology `links` is not a list"))?;

        let mut ontology = Self {
            graph: DiGraph::new(),
            index: HashMap::with_capacity(nodes.len()),
            components: Vec::new(),
            component_of: HashMap::new(),
        };

        let mut skipped = 0usize;
        for node in nodes {
            let Some(id) = node.get("id").and_then(value_to_id) else {
                skipped += 1;
                continue;
            };
            let name = node.get("name").and_then(Value::as_str).map(String::from);
            ontology.add_node(id, name);
        }

        let mut xrefs = 0usize;
        for link in links {
            let kind = link.get("type").and_then(Value::as_str).unwrap_or_default();
            if kind == XREF {
                xrefs += 1;
                continue;
            }
            let (Some(source), Some(target)) = (
                link.get("source").and_then(value_to_id),
                link.get("target").and_then(value_to_id),
            ) else {
                skipped += 1;
                continue;
            };
            let source = ontology.add_node(source, None);
            let target = ontology.add_node(target, None);
            ontology.graph.add_edge(source, target, kind.to_string());
        }

        if skipped > 0 {
            warn!(skipped, "skipped malformed ontology entries");
        }

        ontology.index_components();
        info!(
            nodes = ontology.node_count(),
            links = ontology.link_count(),
            xrefs_dropped = xrefs,
            components = ontology.component_count(),
            nontrivial = ontology.nontrivial_components(),
            "parsed ontology"
        );

        Ok(ontology)
    }

    /// Add a node, or return the existing one. The first name seen is kept.
    fn add_node(&mut self, id: String, name: Option<String>) -> NodeIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(OntologyNode { id: id.clone(), name });
        self.index.insert(id, idx);
        idx
    }

    fn index_components(&mut self) {
        let mut components: Vec<Vec<NodeIndex>> = connected_components(&self.graph)
            .into_iter()
            .map(|members| {
                let mut members: Vec<NodeIndex> = members.into_iter().collect();
                members.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
                members
            })
            .collect();
        // Largest first; members are sorted, so ties order on their smallest ID
        components.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| self.graph[a[0]].id.cmp(&self.graph[b[0]].id))
        });

        let mut component_of = HashMap::with_capacity(self.graph.node_count());
        let mut indexed = Vec::with_capacity(components.len());
        for (i, members) in components.iter().enumerate() {
            for member in members {
                component_of.insert(*member, i);
            }
            indexed.push(Component {
                size: members.len(),
                roots: members.iter().copied().filter(|n| self.is_root(*n)).collect(),
            });
        }

        self.component_of = component_of;
        self.components = indexed;
    }

    fn is_root(&self, node: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .next()
            .is_none()
    }
}

/// Node IDs are strings, occasionally served as numbers.
fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Ontology {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Components with more than one node.
    pub fn nontrivial_components(&self) -> usize {
        self.components.iter().filter(|c| c.size > 1).count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Display name of a node, if it has a non-empty one.
    pub fn name(&self, id: &str) -> Option<&str> {
        let idx = self.index.get(id)?;
        self.graph[*idx].name.as_deref().filter(|n| !n.is_empty())
    }

    /// Node count per ID namespace (`FPLX:MEK` counts toward `FPLX`).
    pub fn namespace_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for node in self.graph.node_weights() {
            if let Some(caps) = NAMESPACE_PREFIX.captures(&node.id) {
                *counts.entry(caps[1].to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Shortest path from the root of `id`'s component down to `id`.
    ///
    /// A node that is a root, or reaches no root, is its own lineage.
    /// Returns `None` for IDs outside the ontology.
    pub fn lineage(&self, id: &str) -> Option<Vec<String>> {
        let start = *self.index.get(id)?;
        let own = || Some(vec![id.to_string()]);

        let Some(component) = self.component_of.get(&start).and_then(|c| self.components.get(*c)) else {
            return own();
        };
        if component.size <= 1 || component.roots.contains(&start) {
            return own();
        }

        let mut paths: DictMap<NodeIndex, Vec<NodeIndex>> = DictMap::with_capacity(component.size);
        let distances: DictMap<NodeIndex, usize> = dijkstra(
            &self.graph,
            start,
            None,
            |_| Ok::<usize, Infallible>(1),
            Some(&mut paths),
        )
        .unwrap_or_else(|never: Infallible| match never {});

        // Roots are sorted, so the first root at minimal distance wins
        let mut best: Option<(usize, NodeIndex)> = None;
        for root in &component.roots {
            if let Some(&distance) = distances.get(root) {
                if best.is_none_or(|(d, _)| distance < d) {
                    best = Some((distance, *root));
                }
            }
        }

        let Some((_, root)) = best else {
            trace!(%id, "no root reachable");
            return own();
        };

        let path = paths.get(&root)?;
        Some(
            path.iter()
                .rev()
                .map(|idx| self.graph[*idx].id.clone())
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Model grounding
// ---------------------------------------------------------------------------

/// Initial node attributes: whether each node's resolved grounding is an ontology category.
///
/// Nodes that are not are placed in the `not-grounded` group at level 1.
pub fn ground_nodes(nodes: &[Node], ontology: &Ontology) -> Vec<NodeAtts> {
    nodes
        .iter()
        .map(|node| {
            let db_ref_priority = node.grounding.as_ref().map(|g| g.curie());
            let grounded_group = db_ref_priority
                .as_deref()
                .is_some_and(|r| ontology.contains(r));

            let (group_refs, node_group_level) = if grounded_group {
                (Vec::new(), 0)
            } else {
                (vec![NOT_GROUNDED.to_string()], 1)
            };

            NodeAtts {
                node_id: node.id,
                db_ref_priority,
                grounded_group,
                kind: String::new(),
                group_ids: Vec::new(),
                group_refs,
                node_group_level,
            }
        })
        .collect()
}

/// Fill in the lineage (`group_refs`), level and type of every node.
pub fn compute_ancestry(atts: &mut [NodeAtts], ontology: &Ontology) {
    for att in atts.iter_mut().filter(|a| a.grounded_group) {
        let Some(reference) = att.db_ref_priority.clone() else {
            continue;
        };
        let lineage = ontology
            .lineage(&reference)
            .unwrap_or_else(|| vec![reference]);
        att.node_group_level = lineage.len();
        att.group_refs = lineage;
    }

    let mut lineages: Vec<Vec<String>> = atts
        .iter_mut()
        .map(|a| std::mem::take(&mut a.group_refs))
        .collect();
    harmonize_lineages(&mut lineages);

    for (att, lineage) in atts.iter_mut().zip(lineages) {
        att.kind = lineage.first().cloned().unwrap_or_default();
        att.group_refs = lineage;
    }

    debug!(
        nodes = atts.len(),
        grounded = atts.iter().filter(|a| a.grounded_group).count(),
        "computed ancestry"
    );
}

/// Make every category share one lineage above it: at each depth, a category's
/// ancestors are taken from the first lineage that contains it at that depth.
fn harmonize_lineages(lineages: &mut [Vec<String>]) {
    let depth = lineages.iter().map(Vec::len).max().unwrap_or(0);
    for i in 1..depth {
        let mut prefixes: HashMap<String, Vec<String>> = HashMap::new();
        for lineage in lineages.iter() {
            if let Some(reference) = lineage.get(i) {
                prefixes
                    .entry(reference.clone())
                    .or_insert_with(|| lineage[..i].to_vec());
            }
        }

        for lineage in lineages.iter_mut() {
            if let Some(prefix) = lineage.get(i).and_then(|r| prefixes.get(r)) {
                lineage.splice(..i, prefix.iter().cloned());
            }
        }
    }
}

/// Derive one group per distinct category in the lineages, and set each node's `group_ids`.
///
/// Groups are ordered by membership (largest first, then by ref).
#[instrument(skip_all, fields(model_id = model_id, nodes = atts.len()))]
pub fn generate_groups(model_id: u32, atts: &mut [NodeAtts], ontology: &Ontology) -> Vec<Group> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut levels: HashMap<&str, usize> = HashMap::new();
    for lineage in atts.iter().map(|a| &a.group_refs) {
        for (depth, reference) in lineage.iter().enumerate() {
            *counts.entry(reference.as_str()).or_insert(0) += 1;
            let level = levels.entry(reference.as_str()).or_insert(depth);
            *level = (*level).min(depth);
        }
    }

    let mut order: Vec<(&str, usize)> = counts.into_iter().collect();
    order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let ids: HashMap<&str, u32> = order
        .iter()
        .enumerate()
        .map(|(i, (reference, _))| (*reference, IdNamespace::Groups.global(i)))
        .collect();

    let mut groups: Vec<Group> = order
        .iter()
        .map(|(reference, _)| {
            let parent_id = atts
                .iter()
                .map(|a| &a.group_refs)
                .find_map(|lineage| {
                    let pos = lineage.iter().position(|r| r == reference)?;
                    Some(pos.checked_sub(1).map(|p| lineage[p].as_str()))
                })
                .flatten()
                .and_then(|parent| ids.get(parent).copied());

            let node_ids_all = atts
                .iter()
                .filter(|a| a.group_refs.iter().any(|r| r == reference))
                .map(|a| a.node_id)
                .collect();
            let node_ids_direct = atts
                .iter()
                .filter(|a| a.group_refs.last().is_some_and(|r| r == reference))
                .map(|a| a.node_id)
                .collect();

            Group {
                id: ids.get(reference).copied().unwrap_or_default(),
                id_onto: reference.to_string(),
                name: ontology.name(reference).unwrap_or(reference).to_string(),
                level: levels.get(reference).copied().unwrap_or_default(),
                parent_id,
                children_ids: Vec::new(),
                model_id,
                node_ids_all,
                node_ids_direct,
            }
        })
        .collect();

    let parents: Vec<(u32, u32)> = groups
        .iter()
        .filter_map(|g| g.parent_id.map(|p| (p, g.id)))
        .collect();
    for (parent, child) in parents {
        if let Some((_, local)) = IdNamespace::split(parent) {
            if let Some(group) = groups.get_mut(local as usize) {
                group.children_ids.push(child);
            }
        }
    }

    let group_ids: Vec<Vec<u32>> = atts
        .iter()
        .map(|a| {
            a.group_refs
                .iter()
                .filter_map(|r| ids.get(r.as_str()).copied())
                .collect()
        })
        .collect();
    for (att, ids) in atts.iter_mut().zip(group_ids) {
        att.group_ids = ids;
    }

    debug!(
        groups = groups.len(),
        max_level = groups.iter().map(|g| g.level).max().unwrap_or(0),
        "generated groups"
    );
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::{NamespaceRanking, normalize_nodes};
    use crate::statements::transform_statements;
    use hibou_emmaa::{Statement, decode_jsonl, parse_records};
    use hibou_shared::{PipelineSettings, parse_id_list};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fixture_ontology() -> Ontology {
        let body = std::fs::read("../../../fixtures/emmaa/ontology.json").unwrap();
        let doc: Value = serde_json::from_slice(&body).unwrap();
        Ontology::from_node_link(&doc).unwrap()
    }

    fn fixture_nodes() -> Vec<Node> {
        let body = std::fs::read("../../../fixtures/emmaa/statements.jsonl").unwrap();
        let values: Vec<Value> = decode_jsonl(&body).unwrap();
        let statements: Vec<Statement> = parse_records(&values, "statements");
        let mut nodes = transform_statements(0, &statements).nodes;
        let ranking = NamespaceRanking::new(parse_id_list(&PipelineSettings::default().namespaces_priority));
        normalize_nodes(&ranking, &mut nodes);
        nodes
    }

    fn fixture_atts(ontology: &Ontology) -> Vec<NodeAtts> {
        let mut atts = ground_nodes(&fixture_nodes(), ontology);
        compute_ancestry(&mut atts, ontology);
        atts
    }

    #[test]
    fn parse_drops_xrefs() {
        let ontology = fixture_ontology();
        assert_eq!(ontology.node_count(), 10);
        assert_eq!(ontology.link_count(), 5);
        // kinases, the chebi pair, three singletons
        assert_eq!(ontology.component_count(), 5);
        assert_eq!(ontology.nontrivial_components(), 2);
        assert_eq!(ontology.name("CHEBI:CHEBI:0001"), None);
        assert_eq!(ontology.name("FPLX:KINASE"), Some("Kinase"));
    }

    #[test]
    fn rejects_non_node_link_documents() {
        let err = Ontology::from_node_link(&json!({"nodes": [], "links": []})).unwrap_err();
        assert!(err.to_string().contains("node-link"));
        assert!(Ontology::from_node_link(&json!([1, 2])).is_err());
    }

    #[test]
    fn links_to_unknown_nodes_add_them() {
        let doc = json!({
            "directed": true,
            "nodes": [{"id": "GO:1"}],
            "links": [{"source": "GO:1", "target": "GO:2"}]
        });
        let ontology = Ontology::from_node_link(&doc).unwrap();
        assert!(ontology.contains("GO:2"));
        assert_eq!(ontology.lineage("GO:1"), Some(vec!["GO:2".to_string(), "GO:1".to_string()]));
    }

    #[test]
    fn namespace_counts_by_prefix() {
        let counts = fixture_ontology().namespace_counts();
        assert_eq!(counts.get("FPLX"), Some(&5));
        assert_eq!(counts.get("CHEBI"), Some(&2));
        assert_eq!(counts.get("HGNC"), Some(&2));
        assert_eq!(counts.get("UP"), Some(&1));
    }

    #[test]
    fn lineage_walks_to_root() {
        let ontology = fixture_ontology();
        assert_eq!(
            ontology.lineage("FPLX:MEK").unwrap(),
            vec!["FPLX:KINASE", "FPLX:MAP2K", "FPLX:MEK"]
        );
        assert_eq!(ontology.lineage("FPLX:KINASE").unwrap(), vec!["FPLX:KINASE"]);
        assert_eq!(ontology.lineage("HGNC:9829").unwrap(), vec!["HGNC:9829"]);
        assert_eq!(ontology.lineage("HGNC:0000"), None);
    }

    #[test]
    fn lineage_ties_pick_first_root() {
        let doc = json!({
            "directed": true,
            "nodes": [{"id": "X:leaf"}, {"id": "X:b"}, {"id": "X:a"}],
            "links": [
                {"source": "X:leaf", "target": "X:b", "type": "isa"},
                {"source": "X:leaf", "target": "X:a", "type": "isa"}
            ]
        });
        let ontology = Ontology::from_node_link(&doc).unwrap();
        assert_eq!(ontology.lineage("X:leaf").unwrap(), vec!["X:a", "X:leaf"]);
    }

    #[test]
    fn fixture_lineages() {
        let ontology = fixture_ontology();
        let atts = fixture_atts(&ontology);

        let lineages: Vec<(Vec<&str>, usize)> = atts
            .iter()
            .map(|a| (a.group_refs.iter().map(String::as_str).collect(), a.node_group_level))
            .collect();
        assert_eq!(
            lineages,
            vec![
                (vec!["FPLX:KINASE", "FPLX:MAP2K", "FPLX:MEK"], 3),
                (vec!["HGNC:3072"], 1),
                (vec![NOT_GROUNDED], 1),
                (vec!["HGNC:9829"], 1),
                (vec!["FPLX:KINASE", "FPLX:MAPK", "FPLX:ERK"], 3),
                (vec!["CHEBI:CHEBI:0001", "CHEBI:CHEBI:18021"], 2),
                (vec![NOT_GROUNDED], 1),
            ]
        );

        assert_eq!(atts[0].kind, "FPLX:KINASE");
        assert_eq!(atts[2].kind, NOT_GROUNDED);
        assert!(!atts[2].grounded_group);
        assert_eq!(atts[6].db_ref_priority.as_deref(), Some("CHEBI:CHEBI:15361"));
        assert!(!atts[6].grounded_group);
    }

    #[test]
    fn harmonize_shares_first_lineage() {
        let mut lineages = vec![
            vec!["R1".to_string(), "X".into(), "A".into()],
            vec!["R2".to_string(), "X".into(), "B".into()],
            vec!["R2".to_string()],
        ];
        harmonize_lineages(&mut lineages);
        assert_eq!(lineages[1], vec!["R1", "X", "B"]);
        assert_eq!(lineages[2], vec!["R2"]);
    }

    #[test]
    fn fixture_groups() {
        let ontology = fixture_ontology();
        let mut atts = fixture_atts(&ontology);
        let groups = generate_groups(0, &mut atts, &ontology);

        let refs: Vec<&str> = groups.iter().map(|g| g.id_onto.as_str()).collect();
        assert_eq!(
            refs,
            vec![
                "FPLX:KINASE",
                NOT_GROUNDED,
                "CHEBI:CHEBI:0001",
                "CHEBI:CHEBI:18021",
                "FPLX:ERK",
                "FPLX:MAP2K",
                "FPLX:MAPK",
                "FPLX:MEK",
                "HGNC:3072",
                "HGNC:9829",
            ]
        );

        let kinase = &groups[0];
        assert_eq!(kinase.id, IdNamespace::Groups.global(0));
        assert_eq!(kinase.name, "Kinase");
        assert_eq!(kinase.level, 0);
        assert_eq!(kinase.parent_id, None);
        assert_eq!(kinase.children_ids, vec![groups[5].id, groups[6].id]);
        assert_eq!(kinase.node_ids_all, vec![atts[0].node_id, atts[4].node_id]);
        assert!(kinase.node_ids_direct.is_empty());

        let mek = &groups[7];
        assert_eq!(mek.level, 2);
        assert_eq!(mek.parent_id, Some(groups[5].id));
        assert_eq!(mek.node_ids_direct, vec![atts[0].node_id]);

        // empty ontology name falls back to the ref
        assert_eq!(groups[2].name, "CHEBI:CHEBI:0001");
        assert_eq!(groups[1].name, NOT_GROUNDED);

        assert_eq!(atts[0].group_ids, vec![groups[0].id, groups[5].id, groups[7].id]);
        assert_eq!(atts[2].group_ids, vec![groups[1].id]);
    }

    #[test]
    fn no_nodes_no_groups() {
        let ontology = fixture_ontology();
        assert!(generate_groups(0, &mut [], &ontology).is_empty());
    }
}
