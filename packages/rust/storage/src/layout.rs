//! Object key layout in the destination bucket.
//!
//! ```text
//! {dist_path}/{dist_version}/{pipeline}/models.jsonl
//! {dist_path}/{dist_version}/{pipeline}/{model}/nodes.jsonl
//! {data_path}/models/{model}/{date}/latest_statements.jsonl
//! {data_path}/ontologies/{ontology}.json
//! ```

use hibou_shared::{ObjectType, StorageConfig};

/// Computes object keys for distributed and archived data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
    dist_root: String,
    data_root: String,
}

impl ObjectLayout {
    pub fn new(storage: &StorageConfig, pipeline_name: &str) -> Self {
        Self {
            dist_root: join(&[&storage.dist_path, &storage.dist_version, pipeline_name]),
            data_root: join(&[&storage.data_path]),
        }
    }

    /// `{dist_path}/{dist_version}/{pipeline}`.
    pub fn dist_root(&self) -> &str {
        &self.dist_root
    }

    /// Run-level objects (`models.jsonl`, `tests.jsonl`).
    pub fn catalog_object(&self, object_type: ObjectType) -> String {
        join(&[&self.dist_root, &object_type.file_name()])
    }

    /// Per-model objects (`nodes.jsonl`, `edges.jsonl`, ...).
    pub fn model_object(&self, model: &str, object_type: ObjectType) -> String {
        join(&[&self.dist_root, model, &object_type.file_name()])
    }

    /// Per-model resolved groundings.
    pub fn groundings(&self, model: &str) -> String {
        join(&[&self.dist_root, model, "groundings.json"])
    }

    /// Checksums of everything written by a run.
    pub fn manifest(&self) -> String {
        join(&[&self.dist_root, "manifest.json"])
    }

    pub fn raw_model_statements(&self, model: &str, date: &str) -> String {
        join(&[&self.data_root, "models", model, date, "latest_statements.jsonl"])
    }

    pub fn raw_curation(&self, model: &str, date: &str) -> String {
        join(&[&self.data_root, "models", model, date, "curation.json"])
    }

    pub fn raw_paths(&self, model: &str, test: &str, date: &str) -> String {
        join(&[
            &self.data_root,
            "models",
            model,
            date,
            &format!("{test}_latest_paths.jsonl"),
        ])
    }

    pub fn raw_test_statements(&self, test: &str, date: &str) -> String {
        join(&[&self.data_root, "tests", test, date, "latest_statements.jsonl"])
    }

    pub fn raw_ontology(&self, ontology: &str) -> String {
        join(&[&self.data_root, "ontologies", &format!("{ontology}.json")])
    }
}

/// Join segments with `/`, ignoring stray slashes and empty segments.
fn join(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let layout = ObjectLayout::new(&StorageConfig::default(), "hibou");
        assert_eq!(layout.dist_root(), "research/BIO/dist/v4.0/hibou");
        assert_eq!(
            layout.catalog_object(ObjectType::Models),
            "research/BIO/dist/v4.0/hibou/models.jsonl"
        );
        assert_eq!(
            layout.model_object("covid19", ObjectType::NodeAtts),
            "research/BIO/dist/v4.0/hibou/covid19/nodeAtts.jsonl"
        );
        assert_eq!(
            layout.raw_paths("covid19", "covid19_curated_tests", "2026-10-15"),
            "research/BIO/data/models/covid19/2026-10-15/covid19_curated_tests_latest_paths.jsonl"
        );
        assert_eq!(
            layout.raw_ontology("bio_ontology_v1.10_export_v1"),
            "research/BIO/data/ontologies/bio_ontology_v1.10_export_v1.json"
        );
    }

    #[test]
    fn stray_slashes_are_ignored() {
        let storage = StorageConfig {
            dist_path: "/dist/".into(),
            dist_version: "v5/".into(),
            ..Default::default()
        };
        let layout = ObjectLayout::new(&storage, "hibou");
        assert_eq!(layout.groundings("toy"), "dist/v5/hibou/toy/groundings.json");
    }
}
