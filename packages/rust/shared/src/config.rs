//! Application configuration for Hibou.
//!
//! User config lives at `~/.hibou/hibou.toml`.
//! CLI flags override config file values, which override defaults.
//! The merged [`RunConfig`] is built once per run and never mutated.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HibouError, Result};
use crate::types::{ModelRequest, parse_id_list};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hibou.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hibou";

// ---------------------------------------------------------------------------
// Config structs (matching hibou.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which models to process.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Upstream knowledge platform.
    #[serde(default)]
    pub emmaa: EmmaaConfig,

    /// Object storage destination.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pipeline-wide settings.
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// `[models]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// `"all"` or space-separated model identifiers.
    #[serde(default = "default_todo")]
    pub todo: String,

    /// Space-separated model identifiers to skip.
    #[serde(default = "default_exclude")]
    pub exclude: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            todo: default_todo(),
            exclude: default_exclude(),
        }
    }
}

fn default_todo() -> String {
    "covid19".into()
}
fn default_exclude() -> String {
    "food_insecurity".into()
}

/// `[emmaa]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmmaaConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the public bucket holding statements, paths and ontologies.
    #[serde(default = "default_bucket_url")]
    pub s3_url: String,

    /// Ontology export name (without `.json.gz`).
    #[serde(default = "default_ontology")]
    pub ontology: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for every upstream GET.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retries.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for EmmaaConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            s3_url: default_bucket_url(),
            ontology: default_ontology(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_api_url() -> String {
    "https://emmaa.indra.bio".into()
}
fn default_bucket_url() -> String {
    "https://emmaa.s3.amazonaws.com".into()
}
fn default_ontology() -> String {
    "bio_ontology_v1.10_export_v1".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    1
}
fn default_retry_delay_ms() -> u64 {
    500
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// S3-compatible endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Destination bucket.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Region passed to the S3 signer.
    #[serde(default = "default_region")]
    pub region: String,

    /// Prefix for archived raw upstream data.
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Prefix for distributed pipeline output.
    #[serde(default = "default_dist_path")]
    pub dist_path: String,

    /// Version tag inserted after `dist_path`.
    #[serde(default = "default_dist_version")]
    pub dist_version: String,

    /// Name of the env var holding the access key ID (never store the key itself).
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,

    /// Name of the env var holding the secret access key.
    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            bucket: default_bucket(),
            region: default_region(),
            data_path: default_data_path(),
            dist_path: default_dist_path(),
            dist_version: default_dist_version(),
            access_key_env: default_access_key_env(),
            secret_key_env: default_secret_key_env(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:9000".into()
}
fn default_bucket() -> String {
    "aske".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_data_path() -> String {
    "research/BIO/data".into()
}
fn default_dist_path() -> String {
    "research/BIO/dist".into()
}
fn default_dist_version() -> String {
    "v4.0".into()
}
fn default_access_key_env() -> String {
    "HIBOU_S3_ACCESS_KEY_ID".into()
}
fn default_secret_key_env() -> String {
    "HIBOU_S3_SECRET_ACCESS_KEY".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Pipeline name, the last segment of the distribution prefix.
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    /// Space-separated namespaces, highest priority first.
    #[serde(default = "default_namespaces_priority")]
    pub namespaces_priority: String,

    /// Echo configuration and report every step.
    #[serde(default)]
    pub print_opt: bool,

    /// Also archive raw upstream statements, curation and ontology.
    #[serde(default)]
    pub archive_raw: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            namespaces_priority: default_namespaces_priority(),
            print_opt: false,
            archive_raw: false,
        }
    }
}

fn default_pipeline_name() -> String {
    "hibou".into()
}
fn default_namespaces_priority() -> String {
    "FPLX UPPRO HGNC UP CHEBI GO MESH MIRBASE DOID HP EFO".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// CLI-level overrides applied on top of the file config.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub todo_models: Option<String>,
    pub exclude_models: Option<String>,
    pub namespaces_priority: Option<String>,
    pub ontology: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub dist_version: Option<String>,
    pub print_opt: bool,
    pub archive_raw: bool,
}

/// Immutable per-run configuration, passed by reference to every stage.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Models requested for this run.
    pub request: ModelRequest,
    /// Models to skip.
    pub exclusions: Vec<String>,
    /// Namespaces, highest priority first.
    pub namespaces_priority: Vec<String>,
    /// Upstream platform settings.
    pub emmaa: EmmaaConfig,
    /// Storage destination settings.
    pub storage: StorageConfig,
    /// Pipeline name.
    pub pipeline_name: String,
    /// Echo configuration and report every step.
    pub print_opt: bool,
    /// Archive raw upstream data.
    pub archive_raw: bool,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            request: ModelRequest::parse(&config.models.todo),
            exclusions: parse_id_list(&config.models.exclude),
            namespaces_priority: parse_id_list(&config.pipeline.namespaces_priority),
            emmaa: config.emmaa.clone(),
            storage: config.storage.clone(),
            pipeline_name: config.pipeline.name.clone(),
            print_opt: config.pipeline.print_opt,
            archive_raw: config.pipeline.archive_raw,
        }
    }
}

impl RunConfig {
    /// Merge file config and CLI overrides, then validate the result.
    pub fn build(config: &AppConfig, overrides: &RunOverrides) -> Result<Self> {
        let mut run = Self::from(config);

        if let Some(todo) = &overrides.todo_models {
            run.request = ModelRequest::parse(todo);
        }
        if let Some(exclude) = &overrides.exclude_models {
            run.exclusions = parse_id_list(exclude);
        }
        if let Some(priority) = &overrides.namespaces_priority {
            run.namespaces_priority = parse_id_list(priority);
        }
        if let Some(ontology) = &overrides.ontology {
            run.emmaa.ontology = ontology.clone();
        }
        if let Some(endpoint) = &overrides.endpoint {
            run.storage.endpoint = endpoint.clone();
        }
        if let Some(bucket) = &overrides.bucket {
            run.storage.bucket = bucket.clone();
        }
        if let Some(version) = &overrides.dist_version {
            run.storage.dist_version = version.clone();
        }
        run.print_opt |= overrides.print_opt;
        run.archive_raw |= overrides.archive_raw;

        run.validate()?;
        Ok(run)
    }

    /// Check values that would otherwise fail deep inside the run.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("emmaa.api_url", &self.emmaa.api_url),
            ("emmaa.s3_url", &self.emmaa.s3_url),
            ("storage.endpoint", &self.storage.endpoint),
        ] {
            Url::parse(value)
                .map_err(|e| HibouError::config(format!("{field} '{value}' is not a URL: {e}")))?;
        }

        if matches!(&self.request, ModelRequest::Explicit(ids) if ids.is_empty()) {
            return Err(HibouError::config(
                "no models requested: set models.todo to \"all\" or a list of model IDs",
            ));
        }

        for (field, value) in [
            ("emmaa.ontology", &self.emmaa.ontology),
            ("storage.dist_version", &self.storage.dist_version),
            ("pipeline.name", &self.pipeline_name),
        ] {
            if value.trim().is_empty() {
                return Err(HibouError::config(format!("{field} must not be empty")));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hibou/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HibouError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hibou/hibou.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HibouError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HibouError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HibouError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| HibouError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HibouError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the storage credentials from the env vars named in the config.
pub fn storage_credentials(storage: &StorageConfig) -> Result<(String, String)> {
    let read = |var_name: &str| match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(HibouError::config(format!(
            "storage credentials not found. Set the {var_name} environment variable."
        ))),
    };

    Ok((read(&storage.access_key_env)?, read(&storage.secret_key_env)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("namespaces_priority"));
        assert!(toml_str.contains("HIBOU_S3_ACCESS_KEY_ID"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.models.todo, "covid19");
        assert_eq!(parsed.storage.dist_version, "v4.0");
        assert_eq!(parsed.emmaa.max_retries, 1);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[models]
todo = "all"
exclude = "food_insecurity covid19"

[pipeline]
print_opt = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let run = RunConfig::from(&config);
        assert_eq!(run.request, ModelRequest::All);
        assert_eq!(run.exclusions, vec!["food_insecurity", "covid19"]);
        assert!(run.print_opt);
        assert_eq!(run.namespaces_priority.first().map(String::as_str), Some("FPLX"));
        assert_eq!(run.namespaces_priority.len(), 11);
        assert_eq!(run.storage.bucket, "aske");
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = RunOverrides {
            todo_models: Some("aml".into()),
            exclude_models: Some(String::new()),
            namespaces_priority: Some("HGNC UP".into()),
            dist_version: Some("v5.0".into()),
            print_opt: true,
            ..Default::default()
        };
        let run = RunConfig::build(&AppConfig::default(), &overrides).expect("build");
        assert_eq!(run.request, ModelRequest::Explicit(vec!["aml".into()]));
        assert!(run.exclusions.is_empty());
        assert_eq!(run.namespaces_priority, vec!["HGNC", "UP"]);
        assert_eq!(run.storage.dist_version, "v5.0");
        assert!(run.print_opt);
        assert!(!run.archive_raw);
    }

    #[test]
    fn empty_request_is_rejected() {
        let overrides = RunOverrides {
            todo_models: Some("   ".into()),
            ..Default::default()
        };
        let err = RunConfig::build(&AppConfig::default(), &overrides).unwrap_err();
        assert!(err.to_string().contains("no models requested"));
    }

    #[test]
    fn bad_api_url_is_rejected() {
        let mut config = AppConfig::default();
        config.emmaa.api_url = "not a url".into();
        let err = RunConfig::build(&config, &RunOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("emmaa.api_url"));
    }

    #[test]
    fn bad_storage_endpoint_is_rejected() {
        let overrides = RunOverrides {
            endpoint: Some("//minio 9000".into()),
            ..Default::default()
        };
        let err = RunConfig::build(&AppConfig::default(), &overrides).unwrap_err();
        assert!(err.to_string().contains("storage.endpoint"));
    }

    #[test]
    fn missing_credentials_are_reported() {
        let storage = StorageConfig {
            // Unique names so the test never sees real credentials
            access_key_env: "HIBOU_TEST_NONEXISTENT_KEY_12345".into(),
            secret_key_env: "HIBOU_TEST_NONEXISTENT_SECRET_12345".into(),
            ..Default::default()
        };
        let err = storage_credentials(&storage).unwrap_err();
        assert!(err.to_string().contains("HIBOU_TEST_NONEXISTENT_KEY_12345"));
    }
}
