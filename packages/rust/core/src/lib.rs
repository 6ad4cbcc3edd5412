//! Core pipeline logic for Hibou.
//!
//! This crate turns the platform's raw model data into the distributed graph
//! objects: model selection, statement transform, curation, paths, grounding
//! normalization, ontology grouping, and the end-to-end `run_pipeline`.

pub mod curation;
pub mod grounding;
pub mod ontology;
pub mod paths;
pub mod pipeline;
pub mod selector;
pub mod statements;

pub use grounding::{NamespaceRanking, ordered_namespaces};
pub use ontology::Ontology;
pub use pipeline::{
    ModelInputs, ModelOutput, ModelSummary, ProgressReporter, RunSummary, SilentProgress,
    process_model, run_pipeline,
};
pub use selector::select_models;
