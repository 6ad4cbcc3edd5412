//! HTTP client for the EMMAA knowledge platform.
//!
//! Two origins are involved: the REST API (catalog, curation) and the public
//! bucket (assembled statements, test corpora, explanatory paths, ontology
//! exports). Bodies are returned as raw JSON so callers can both archive and
//! transform them.

mod catalog;
mod decode;
mod records;

use std::time::Duration;

use hibou_shared::{EmmaaConfig, HibouError, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

pub use catalog::Catalog;
pub use decode::{decode_json, decode_json_gz, decode_jsonl};
pub use records::{Curation, PathRecord, PathStep, Statement, StatementEvidence, parse_records};

/// User-Agent string for platform requests.
const USER_AGENT: &str = concat!("Hibou/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// EmmaaClient
// ---------------------------------------------------------------------------

/// Client for the platform API and its public bucket.
#[derive(Debug, Clone)]
pub struct EmmaaClient {
    http: Client,
    api_url: String,
    bucket_url: String,
    ontology: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl EmmaaClient {
    /// Build a client from the `[emmaa]` config section.
    pub fn new(config: &EmmaaConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HibouError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bucket_url: config.s3_url.trim_end_matches('/').to_string(),
            ontology: config.ontology.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Name of the ontology export this client fetches.
    pub fn ontology_name(&self) -> &str {
        &self.ontology
    }

    // -----------------------------------------------------------------------
    // Bucket objects
    // -----------------------------------------------------------------------

    /// Assembled statements of a model (`assembled/{m}/latest_statements_{m}.jsonl`).
    #[instrument(skip(self))]
    pub async fn fetch_model_statements(&self, model: &str) -> Result<Vec<Value>> {
        let url = self.bucket(&format!("assembled/{model}/latest_statements_{model}.jsonl"));
        self.fetch_jsonl(&url).await
    }

    /// Statements of a test corpus (`tests/{t}.jsonl`).
    #[instrument(skip(self))]
    pub async fn fetch_test_statements(&self, test: &str) -> Result<Vec<Value>> {
        let url = self.bucket(&format!("tests/{test}.jsonl"));
        self.fetch_jsonl(&url).await
    }

    /// Explanatory paths of a model against a test corpus.
    #[instrument(skip(self))]
    pub async fn fetch_paths(&self, model: &str, test: &str) -> Result<Vec<Value>> {
        let url = self.bucket(&format!("paths/{model}/{test}_latest_paths.jsonl"));
        self.fetch_jsonl(&url).await
    }

    /// The configured ontology export, decompressed. A missing ontology is an error.
    #[instrument(skip(self), fields(ontology = %self.ontology))]
    pub async fn fetch_ontology(&self) -> Result<Value> {
        let url = self.bucket(&format!("integration/ontology/{}.json.gz", self.ontology));
        let body = self
            .get(&url)
            .await?
            .ok_or_else(|| HibouError::Network(format!("{url}: ontology not found")))?;

        let ontology = decode_json_gz(&body)?;
        info!(bytes = body.len(), "fetched ontology");
        Ok(ontology)
    }

    // -----------------------------------------------------------------------
    // API documents
    // -----------------------------------------------------------------------

    /// Curation document of a model (`curated_statements/{m}`).
    ///
    /// Returns `None` when the document is missing or undecodable.
    #[instrument(skip(self))]
    pub async fn fetch_curation(&self, model: &str) -> Result<Option<Value>> {
        let url = self.api(&format!("curated_statements/{model}"));
        let Some(body) = self.get(&url).await? else {
            warn!(%url, "no curation document");
            return Ok(None);
        };

        match decode_json(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(%url, error = %e, "undecodable curation document");
                Ok(None)
            }
        }
    }

    /// GET an API document and decode it. Missing documents are errors.
    pub(crate) async fn get_api_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.api(path);
        let body = self
            .get(&url)
            .await?
            .ok_or_else(|| HibouError::Network(format!("{url}: not found")))?;
        decode_json(&body)
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn api(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    fn bucket(&self, path: &str) -> String {
        format!("{}/{path}", self.bucket_url)
    }

    /// Missing or undecodable JSONL bodies decode as an empty list.
    async fn fetch_jsonl(&self, url: &str) -> Result<Vec<Value>> {
        let Some(body) = self.get(url).await? else {
            warn!(%url, "object not found, using empty list");
            return Ok(Vec::new());
        };

        match decode_jsonl(&body) {
            Ok(values) => {
                debug!(%url, records = values.len(), "decoded JSONL");
                Ok(values)
            }
            Err(e) => {
                warn!(%url, error = %e, "undecodable JSONL, using empty list");
                Ok(Vec::new())
            }
        }
    }

    /// GET with the configured retry policy. `Ok(None)` means the object does not exist.
    async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let mut attempt = 0;
        loop {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(%url, attempt, error = %e, "request failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| HibouError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        // Public buckets answer 403 for keys that do not exist.
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            debug!(%url, %status, "object missing");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(HibouError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HibouError::Network(format!("{url}: failed to read body: {e}")))?;

        Ok(Some(body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/emmaa/{name}"))
            .unwrap_or_else(|e| panic!("read fixture {name}: {e}"))
    }

    fn client_for(server: &MockServer) -> EmmaaClient {
        let config = EmmaaConfig {
            api_url: format!("{}/", server.uri()),
            s3_url: server.uri(),
            ontology: "toy_ontology".into(),
            retry_delay_ms: 10,
            ..Default::default()
        };
        EmmaaClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn fetch_model_statements_from_bucket() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/assembled/toy/latest_statements_toy.jsonl"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("statements.jsonl")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let statements = client.fetch_model_statements("toy").await.unwrap();
        assert_eq!(statements.len(), 6);

        let typed: Vec<Statement> = parse_records(&statements, "statements");
        assert_eq!(typed[0].kind, "Activation");
    }

    #[tokio::test]
    async fn missing_statements_decode_as_empty() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let statements = client.fetch_model_statements("nope").await.unwrap();
        assert!(statements.is_empty());
    }

    #[tokio::test]
    async fn garbage_paths_decode_as_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/paths/toy/simple_tests_latest_paths.jsonl"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<Error>NoSuchKey</Error>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.fetch_paths("toy", "simple_tests").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_curation_from_api() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/curated_statements/toy"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("curation.json")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/curated_statements/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let curation = client.fetch_curation("toy").await.unwrap().unwrap();
        assert!(curation.get("correct").is_some());

        assert!(client.fetch_curation("broken").await.unwrap().is_none());
        assert!(client.fetch_curation("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fetch_ontology_decompresses() {
        let server = MockServer::start().await;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(fixture("ontology.json").as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        Mock::given(method("GET"))
            .and(path("/integration/ontology/toy_ontology.json.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gz))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let ontology = client.fetch_ontology().await.unwrap();
        assert_eq!(ontology["directed"], true);
        assert!(ontology["nodes"].as_array().is_some_and(|n| !n.is_empty()));
    }

    #[tokio::test]
    async fn missing_ontology_is_an_error() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let err = client.fetch_ontology().await.unwrap_err();
        assert!(err.to_string().contains("ontology not found"));
    }
}
