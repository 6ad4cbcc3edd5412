//! End-to-end run: catalog → selection → per-model transform → object storage.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use hibou_emmaa::{Catalog, Curation, EmmaaClient, Statement, parse_records};
use hibou_shared::{
    Group, HibouError, ModelEntry, ModelPath, NodeAtts, ObjectType, Result, RunConfig,
};
use hibou_storage::{ObjectLayout, ObjectStorage, WriteReceipt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::curation::apply_curation;
use crate::grounding::{
    GroundingReport, NamespaceRanking, NamespaceUsage, grounding_report, namespace_usage,
    normalize_nodes, ordered_namespaces,
};
use crate::ontology::{Ontology, compute_ancestry, generate_groups, ground_nodes};
use crate::paths::{PathBatch, mark_tested_edges, reduce_paths};
use crate::selector::select_models;
use crate::statements::{ModelGraph, transform_statements};

/// Counts for one processed model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub model: String,
    pub statements: usize,
    pub nodes: usize,
    pub edges: usize,
    pub evidences: usize,
    pub docs: usize,
    pub paths: usize,
    pub groups: usize,
    /// Edges with a curation verdict.
    pub curated: usize,
    /// Edges on at least one explanatory path.
    pub tested: usize,
    /// Nodes with a resolved grounding.
    pub grounded: usize,
    /// Nodes whose grounding is an ontology category.
    pub ontology_grounded: usize,
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Destination description (`endpoint/bucket`, directory, or `memory`).
    pub location: String,
    /// `{dist_path}/{dist_version}/{pipeline}`.
    pub dist_root: String,
    pub models: Vec<ModelSummary>,
    pub objects_written: usize,
    pub bytes_written: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a model is fetched and transformed.
    fn model_started(&self, model: &str, current: usize, total: usize);
    /// Called after every object write.
    fn object_written(&self, receipt: &WriteReceipt);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn model_started(&self, _model: &str, _current: usize, _total: usize) {}
    fn object_written(&self, _receipt: &WriteReceipt) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Per-model processing
// ---------------------------------------------------------------------------

/// Paths of a model against one test corpus, as fetched.
#[derive(Debug, Clone)]
pub struct PathInput {
    /// Platform identifier of the test corpus.
    pub test: String,
    /// Global ID of the test corpus.
    pub test_id: u32,
    pub records: Vec<Value>,
}

/// Raw upstream data of one model.
#[derive(Debug, Clone, Default)]
pub struct ModelInputs {
    pub statements: Vec<Value>,
    pub curation: Option<Value>,
    pub paths: Vec<PathInput>,
}

/// Everything written for one model.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub summary: ModelSummary,
    pub graph: ModelGraph,
    pub paths: Vec<ModelPath>,
    pub node_atts: Vec<NodeAtts>,
    pub groups: Vec<Group>,
    pub groundings: GroundingReport,
    pub namespace_usage: Vec<NamespaceUsage>,
}

/// Transform one model's raw data into its distributed objects.
#[instrument(skip_all, fields(model = %model.id_emmaa))]
pub fn process_model(
    model: &ModelEntry,
    inputs: &ModelInputs,
    ranking: &NamespaceRanking,
    ontology: &Ontology,
) -> ModelOutput {
    let statements: Vec<Statement> = parse_records(&inputs.statements, "statements");
    let mut graph = transform_statements(model.id, &statements);

    let curation = inputs
        .curation
        .as_ref()
        .and_then(|value| match Curation::from_value(value) {
            Ok(curation) if curation.is_empty() => {
                debug!(model = %model.id_emmaa, "curation document has no verdicts");
                None
            }
            Ok(curation) => Some(curation),
            Err(e) => {
                warn!(model = %model.id_emmaa, error = %e, "ignoring curation document");
                None
            }
        });
    let curated = apply_curation(&mut graph.edges, curation.as_ref());

    let batches: Vec<PathBatch> = inputs
        .paths
        .iter()
        .map(|input| PathBatch {
            test_id: input.test_id,
            records: parse_records(&input.records, "paths"),
        })
        .collect();
    let paths = reduce_paths(model.id, &graph, &batches);
    let tested = mark_tested_edges(&mut graph.edges, &paths);

    let grounded = normalize_nodes(ranking, &mut graph.nodes);
    let ontology_counts = ontology.namespace_counts();
    let namespaces = ordered_namespaces(
        ranking.priority(),
        graph
            .nodes
            .iter()
            .flat_map(|n| n.db_ids.iter().map(|g| g.namespace.as_str())),
        ontology_counts.keys().map(String::as_str),
    );
    let usage = namespace_usage(&namespaces, &graph.nodes, &ontology_counts);

    let mut node_atts = ground_nodes(&graph.nodes, ontology);
    compute_ancestry(&mut node_atts, ontology);
    let groups = generate_groups(model.id, &mut node_atts, ontology);
    let groundings = grounding_report(&model.id_emmaa, namespaces, &graph.nodes);

    let summary = ModelSummary {
        model: model.id_emmaa.clone(),
        statements: statements.len(),
        nodes: graph.nodes.len(),
        edges: graph.edges.len(),
        evidences: graph.evidences.len(),
        docs: graph.docs.len(),
        paths: paths.len(),
        groups: groups.len(),
        curated,
        tested,
        grounded,
        ontology_grounded: node_atts.iter().filter(|a| a.grounded_group).count(),
    };

    ModelOutput {
        summary,
        graph,
        paths,
        node_atts,
        groups,
        groundings,
        namespace_usage: usage,
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Checksums of a run's objects, written last.
#[derive(Serialize)]
struct RunManifest<'a> {
    run_id: String,
    pipeline: &'a str,
    snapshot_time: &'a str,
    ontology: &'a str,
    models: &'a [String],
    objects: &'a [WriteReceipt],
}

/// Run the full pipeline.
///
/// 1. Fetch the catalog and select models (unknown models fail the run before any write)
/// 2. Fetch the ontology
/// 3. Write `models.jsonl` and `tests.jsonl`
/// 4. Fetch, transform and write every selected model
/// 5. Write the run manifest
#[instrument(skip_all, fields(pipeline = %config.pipeline_name))]
pub async fn run_pipeline(
    config: &RunConfig,
    client: &EmmaaClient,
    storage: &ObjectStorage,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();
    let layout = ObjectLayout::new(&config.storage, &config.pipeline_name);

    info!(%run_id, destination = %storage.location(), dist_root = %layout.dist_root(), "starting pipeline");
    if config.print_opt {
        echo_config(config);
    }

    // --- Phase 1: Catalog and selection ---
    progress.phase("Fetching catalog");
    let mut catalog = client.fetch_catalog().await?;
    let selected = select_models(&config.request, &config.exclusions, &catalog.model_ids())?;
    catalog.mark_excluded(&config.exclusions);
    info!(selected = selected.len(), models = ?selected, "models selected");
    if config.print_opt {
        echo_catalog(&catalog);
    }

    // --- Phase 2: Ontology ---
    progress.phase("Fetching ontology");
    let ontology_doc = client.fetch_ontology().await?;
    let ontology = Ontology::from_node_link(&ontology_doc)?;
    let ranking = NamespaceRanking::new(config.namespaces_priority.iter().cloned());

    let mut writer = ObjectWriter::new(storage, progress);

    // --- Phase 3: Catalog objects ---
    progress.phase("Writing catalog");
    writer
        .jsonl(&layout.catalog_object(ObjectType::Models), Some(ObjectType::Models), &catalog.models)
        .await?;
    writer
        .jsonl(&layout.catalog_object(ObjectType::Tests), Some(ObjectType::Tests), &catalog.tests)
        .await?;

    let date = catalog.snapshot_date().to_string();
    if config.archive_raw {
        writer
            .json(&layout.raw_ontology(client.ontology_name()), &ontology_doc)
            .await?;
    }

    // --- Phase 4: Models ---
    let mut summaries = Vec::with_capacity(selected.len());
    let mut archived_tests: HashSet<String> = HashSet::new();
    let total = selected.len();

    for (i, id_emmaa) in selected.iter().enumerate() {
        let Some(model) = catalog.model(id_emmaa) else {
            continue;
        };
        progress.model_started(id_emmaa, i + 1, total);

        let inputs = fetch_model_inputs(client, &catalog, model).await?;

        if config.archive_raw {
            writer
                .jsonl(&layout.raw_model_statements(id_emmaa, &date), None, &inputs.statements)
                .await?;
            if let Some(curation) = &inputs.curation {
                writer.json(&layout.raw_curation(id_emmaa, &date), curation).await?;
            }
            for input in &inputs.paths {
                writer
                    .jsonl(&layout.raw_paths(id_emmaa, &input.test, &date), None, &input.records)
                    .await?;
                if archived_tests.insert(input.test.clone()) {
                    let statements = client.fetch_test_statements(&input.test).await?;
                    writer
                        .jsonl(&layout.raw_test_statements(&input.test, &date), None, &statements)
                        .await?;
                }
            }
        }

        let output = process_model(model, &inputs, &ranking, &ontology);
        if config.print_opt {
            echo_namespaces(id_emmaa, &output.namespace_usage);
        }
        write_model(&mut writer, &layout, id_emmaa, &output).await?;

        info!(
            model = %id_emmaa,
            nodes = output.summary.nodes,
            edges = output.summary.edges,
            groups = output.summary.groups,
            tested = output.summary.tested,
            "model written"
        );
        summaries.push(output.summary);
    }

    // --- Phase 5: Manifest ---
    progress.phase("Writing manifest");
    let manifest = RunManifest {
        run_id: run_id.to_string(),
        pipeline: &config.pipeline_name,
        snapshot_time: &catalog.snapshot_time,
        ontology: client.ontology_name(),
        models: &selected,
        objects: &writer.receipts,
    };
    let manifest_body = serde_json::to_value(&manifest)
        .map_err(|e| HibouError::parse(format!("manifest: {e}")))?;
    writer.json(&layout.manifest(), &manifest_body).await?;

    let summary = RunSummary {
        run_id,
        location: storage.location().to_string(),
        dist_root: layout.dist_root().to_string(),
        models: summaries,
        objects_written: writer.receipts.len(),
        bytes_written: writer.receipts.iter().map(|r| r.size_bytes).sum(),
        elapsed: start.elapsed(),
    };

    progress.done(&summary);

    info!(
        %run_id,
        models = summary.models.len(),
        objects = summary.objects_written,
        bytes = summary.bytes_written,
        elapsed_ms = summary.elapsed.as_millis(),
        "pipeline complete"
    );

    Ok(summary)
}

/// Fetch statements, curation and every (model, test) path set of a model.
async fn fetch_model_inputs(
    client: &EmmaaClient,
    catalog: &Catalog,
    model: &ModelEntry,
) -> Result<ModelInputs> {
    let statements = client.fetch_model_statements(&model.id_emmaa).await?;
    let curation = client.fetch_curation(&model.id_emmaa).await?;

    let mut paths = Vec::new();
    for source in catalog.paths_for(&model.id_emmaa) {
        let Some(test) = catalog.test(&source.id_emmaa_test) else {
            continue;
        };
        let records = client.fetch_paths(&model.id_emmaa, &test.id_emmaa).await?;
        paths.push(PathInput {
            test: test.id_emmaa.clone(),
            test_id: test.id,
            records,
        });
    }

    debug!(
        model = %model.id_emmaa,
        statements = statements.len(),
        curated = curation.is_some(),
        path_sets = paths.len(),
        "fetched model inputs"
    );

    Ok(ModelInputs {
        statements,
        curation,
        paths,
    })
}

async fn write_model(
    writer: &mut ObjectWriter<'_>,
    layout: &ObjectLayout,
    model: &str,
    output: &ModelOutput,
) -> Result<()> {
    let graph = &output.graph;
    for object_type in ObjectType::PER_MODEL {
        let path = layout.model_object(model, object_type);
        let typed = Some(object_type);
        match object_type {
            ObjectType::Nodes => writer.jsonl(&path, typed, &graph.nodes).await?,
            ObjectType::Edges => writer.jsonl(&path, typed, &graph.edges).await?,
            ObjectType::Evidences => writer.jsonl(&path, typed, &graph.evidences).await?,
            ObjectType::Docs => writer.jsonl(&path, typed, &graph.docs).await?,
            ObjectType::Paths => writer.jsonl(&path, typed, &output.paths).await?,
            ObjectType::NodeAtts => writer.jsonl(&path, typed, &output.node_atts).await?,
            ObjectType::Groups => writer.jsonl(&path, typed, &output.groups).await?,
            ObjectType::Models | ObjectType::Tests => {}
        }
    }
    writer.json(&layout.groundings(model), &output.groundings).await
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Writes objects and keeps their receipts.
struct ObjectWriter<'a> {
    storage: &'a ObjectStorage,
    progress: &'a dyn ProgressReporter,
    receipts: Vec<WriteReceipt>,
}

impl<'a> ObjectWriter<'a> {
    fn new(storage: &'a ObjectStorage, progress: &'a dyn ProgressReporter) -> Self {
        Self {
            storage,
            progress,
            receipts: Vec::new(),
        }
    }

    async fn jsonl<T: Serialize>(
        &mut self,
        path: &str,
        object_type: Option<ObjectType>,
        records: &[T],
    ) -> Result<()> {
        let receipt = self.storage.put_jsonl(path, object_type, records).await?;
        self.record(receipt);
        Ok(())
    }

    async fn json<T: Serialize + ?Sized>(&mut self, path: &str, value: &T) -> Result<()> {
        let receipt = self.storage.put_json(path, value).await?;
        self.record(receipt);
        Ok(())
    }

    fn record(&mut self, receipt: WriteReceipt) {
        self.progress.object_written(&receipt);
        self.receipts.push(receipt);
    }
}

// ---------------------------------------------------------------------------
// Verbose reporting
// ---------------------------------------------------------------------------

fn echo_config(config: &RunConfig) {
    info!(
        todo = %config.request,
        exclude = %config.exclusions.join(" "),
        namespaces = %config.namespaces_priority.join(" "),
        api = %config.emmaa.api_url,
        bucket_url = %config.emmaa.s3_url,
        ontology = %config.emmaa.ontology,
        endpoint = %config.storage.endpoint,
        bucket = %config.storage.bucket,
        dist_version = %config.storage.dist_version,
        archive_raw = config.archive_raw,
        "run configuration"
    );
}

fn echo_catalog(catalog: &Catalog) {
    for model in &catalog.models {
        info!(
            id = model.id,
            model = %model.id_emmaa,
            name = model.name.as_deref().unwrap_or("-"),
            tests = model.tests.len(),
            excluded = model.excluded,
            "catalog model"
        );
    }
    for test in &catalog.tests {
        info!(id = test.id, test = %test.id_emmaa, models = test.model_ids.len(), "catalog test");
    }
}

fn echo_namespaces(model: &str, usage: &[NamespaceUsage]) {
    for row in usage {
        info!(
            %model,
            namespace = %row.namespace,
            model_count = row.model,
            ontology_count = row.ontology,
            "namespace"
        );
    }
}
