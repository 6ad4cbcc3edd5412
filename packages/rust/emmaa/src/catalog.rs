//! Model/test catalog assembled from the platform API.

use std::collections::BTreeSet;

use chrono::Utc;
use hibou_shared::{IdNamespace, ModelEntry, PathSource, Result, TestEntry};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::EmmaaClient;

// ---------------------------------------------------------------------------
// API responses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ModelListing {
    models: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    human_readable_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TestCorpora {
    #[serde(default)]
    test_corpora: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TestInfo {
    #[serde(default)]
    name: Option<String>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Every model and test corpus known to the platform at snapshot time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub models: Vec<ModelEntry>,
    pub tests: Vec<TestEntry>,
    /// One entry per (model, test) pair.
    pub paths: Vec<PathSource>,
    pub snapshot_time: String,
}

/// Per-model metadata gathered before IDs are assigned.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModelMeta {
    pub id_emmaa: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub tests: Vec<String>,
}

impl Catalog {
    /// Assign IDs and cross-reference models with their test corpora.
    ///
    /// Tests are the sorted union of every model's corpora.
    pub(crate) fn assemble(models: Vec<ModelMeta>, snapshot_time: String) -> Self {
        let test_names: BTreeSet<&str> = models
            .iter()
            .flat_map(|m| m.tests.iter().map(String::as_str))
            .collect();

        let mut tests: Vec<TestEntry> = test_names
            .into_iter()
            .enumerate()
            .map(|(i, name)| TestEntry {
                id: IdNamespace::Tests.global(i),
                id_emmaa: name.to_string(),
                name: None,
                model_ids: Vec::new(),
                snapshot_time: snapshot_time.clone(),
            })
            .collect();

        let mut entries = Vec::with_capacity(models.len());
        let mut paths = Vec::new();

        for (i, meta) in models.into_iter().enumerate() {
            let id = IdNamespace::Models.global(i);
            let test_ids = meta
                .tests
                .iter()
                .filter_map(|t| tests.iter().find(|test| &test.id_emmaa == t).map(|test| test.id))
                .collect();

            for test in tests.iter_mut().filter(|t| meta.tests.contains(&t.id_emmaa)) {
                test.model_ids.push(id);
            }

            paths.extend(meta.tests.iter().map(|t| PathSource {
                id_emmaa_model: meta.id_emmaa.clone(),
                id_emmaa_test: t.clone(),
            }));

            entries.push(ModelEntry {
                id,
                id_emmaa: meta.id_emmaa,
                name: meta.name,
                description: meta.description,
                tests: meta.tests,
                test_ids,
                snapshot_time: snapshot_time.clone(),
                excluded: false,
            });
        }

        Self {
            models: entries,
            tests,
            paths,
            snapshot_time,
        }
    }

    /// Platform identifiers of every model, in catalog order.
    pub fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|m| m.id_emmaa.clone()).collect()
    }

    pub fn model(&self, id_emmaa: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id_emmaa == id_emmaa)
    }

    pub fn test(&self, id_emmaa: &str) -> Option<&TestEntry> {
        self.tests.iter().find(|t| t.id_emmaa == id_emmaa)
    }

    /// The (model, test) pairs of one model.
    pub fn paths_for<'a>(&'a self, id_emmaa_model: &'a str) -> impl Iterator<Item = &'a PathSource> {
        self.paths
            .iter()
            .filter(move |p| p.id_emmaa_model == id_emmaa_model)
    }

    /// Flag the models named in `exclusions`.
    pub fn mark_excluded(&mut self, exclusions: &[String]) {
        for model in &mut self.models {
            model.excluded = exclusions.contains(&model.id_emmaa);
        }
    }

    /// The date part of the snapshot time (`YYYY-MM-DD`).
    pub fn snapshot_date(&self) -> &str {
        self.snapshot_time
            .split_once('T')
            .map_or(self.snapshot_time.as_str(), |(date, _)| date)
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

impl EmmaaClient {
    /// Fetch the model list, per-model metadata and test corpora.
    ///
    /// Only the model list is required; per-model and per-test metadata
    /// failures are logged and leave the fields empty.
    #[instrument(skip_all, fields(api = %self.api_url))]
    pub async fn fetch_catalog(&self) -> Result<Catalog> {
        let snapshot_time = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();

        let listing: ModelListing = self.get_api_json("models").await?;
        info!(models = listing.models.len(), "fetched model list");

        let mut metas = Vec::with_capacity(listing.models.len());
        for id_emmaa in listing.models {
            let mut meta = ModelMeta {
                id_emmaa,
                ..Default::default()
            };

            match self
                .get_api_json::<ModelInfo>(&format!("model_info/{}", meta.id_emmaa))
                .await
            {
                Ok(info) => {
                    meta.name = info.human_readable_name;
                    meta.description = info.description;
                }
                Err(e) => warn!(model = %meta.id_emmaa, error = %e, "model info unavailable"),
            }

            match self
                .get_api_json::<TestCorpora>(&format!("test_corpora/{}", meta.id_emmaa))
                .await
            {
                Ok(corpora) => meta.tests = corpora.test_corpora,
                Err(e) => warn!(model = %meta.id_emmaa, error = %e, "test corpora unavailable"),
            }

            debug!(model = %meta.id_emmaa, tests = meta.tests.len(), "model metadata");
            metas.push(meta);
        }

        let mut catalog = Catalog::assemble(metas, snapshot_time);

        for test in &mut catalog.tests {
            match self
                .get_api_json::<TestInfo>(&format!("tests_info/{}", test.id_emmaa))
                .await
            {
                Ok(info) => test.name = info.name,
                Err(e) => warn!(test = %test.id_emmaa, error = %e, "test info unavailable"),
            }
        }

        info!(
            models = catalog.models.len(),
            tests = catalog.tests.len(),
            pairs = catalog.paths.len(),
            "catalog assembled"
        );

        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hibou_shared::EmmaaConfig;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn meta(id: &str, tests: &[&str]) -> ModelMeta {
        ModelMeta {
            id_emmaa: id.into(),
            tests: tests.iter().map(|t| (*t).to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn assemble_cross_references_tests() {
        let catalog = Catalog::assemble(
            vec![
                meta("covid19", &["covid19_curated_tests", "large_corpus_tests"]),
                meta("aml", &["large_corpus_tests"]),
            ],
            "2026-10-15T08:00:00".into(),
        );

        let test_ids: Vec<&str> = catalog.tests.iter().map(|t| t.id_emmaa.as_str()).collect();
        assert_eq!(test_ids, vec!["covid19_curated_tests", "large_corpus_tests"]);

        let large = catalog.test("large_corpus_tests").unwrap();
        assert_eq!(large.id, IdNamespace::Tests.global(1));
        assert_eq!(large.model_ids, vec![IdNamespace::Models.global(0), IdNamespace::Models.global(1)]);

        let aml = catalog.model("aml").unwrap();
        assert_eq!(aml.id, IdNamespace::Models.global(1));
        assert_eq!(aml.test_ids, vec![IdNamespace::Tests.global(1)]);

        assert_eq!(catalog.paths.len(), 3);
        assert_eq!(catalog.paths_for("covid19").count(), 2);
        assert_eq!(catalog.snapshot_date(), "2026-10-15");
    }

    #[test]
    fn mark_excluded_flags_models() {
        let mut catalog = Catalog::assemble(vec![meta("a", &[]), meta("b", &[])], "t".into());
        catalog.mark_excluded(&["b".into(), "zzz".into()]);
        assert!(!catalog.model("a").unwrap().excluded);
        assert!(catalog.model("b").unwrap().excluded);
    }

    fn client_for(server: &MockServer) -> EmmaaClient {
        let config = EmmaaConfig {
            api_url: server.uri(),
            s3_url: server.uri(),
            retry_delay_ms: 10,
            ..Default::default()
        };
        EmmaaClient::new(&config).unwrap()
    }

    async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_catalog_with_mock_server() {
        let server = MockServer::start().await;

        mount_json(&server, "/models", serde_json::json!({"models": ["toy", "aml"]})).await;
        mount_json(
            &server,
            "/model_info/toy",
            serde_json::json!({"human_readable_name": "Toy model", "description": "A tiny model"}),
        )
        .await;
        mount_json(&server, "/test_corpora/toy", serde_json::json!({"test_corpora": ["simple_tests"]})).await;
        mount_json(&server, "/tests_info/simple_tests", serde_json::json!({"name": "Simple tests"})).await;

        // aml metadata is missing entirely
        Mock::given(method("GET"))
            .and(path("/model_info/aml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let catalog = client.fetch_catalog().await.unwrap();

        assert_eq!(catalog.model_ids(), vec!["toy", "aml"]);
        let toy = catalog.model("toy").unwrap();
        assert_eq!(toy.name.as_deref(), Some("Toy model"));
        assert_eq!(toy.tests, vec!["simple_tests"]);

        let aml = catalog.model("aml").unwrap();
        assert_eq!(aml.name, None);
        assert!(aml.tests.is_empty());

        assert_eq!(catalog.tests.len(), 1);
        assert_eq!(catalog.tests[0].name.as_deref(), Some("Simple tests"));
        assert_eq!(catalog.tests[0].model_ids, vec![toy.id]);
    }

    #[tokio::test]
    async fn fetch_catalog_fails_without_model_list() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_catalog().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn fetch_catalog_retries_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_json(&server, "/models", serde_json::json!({"models": []})).await;

        let client = client_for(&server);
        let catalog = client.fetch_catalog().await.unwrap();
        assert!(catalog.models.is_empty());
        assert!(catalog.tests.is_empty());
    }
}
