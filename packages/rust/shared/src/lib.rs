//! Shared types, error model, and configuration for Hibou.
//!
//! This crate is the foundation depended on by all other Hibou crates.
//! It provides:
//! - [`HibouError`], the unified error type
//! - Domain records ([`ModelEntry`], [`Edge`], [`Node`], [`Group`], ...)
//! - Global ID namespaces ([`IdNamespace`]) and object preambles ([`ObjectType`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod ids;
pub mod preamble;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EmmaaConfig, ModelsConfig, PipelineSettings, RunConfig, RunOverrides,
    StorageConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    storage_credentials,
};
pub use error::{HibouError, Result};
pub use ids::IdNamespace;
pub use preamble::ObjectType;
pub use types::{
    Agent, CurationStatus, Doc, DocIdentifier, Edge, Evidence, Group, Grounding, ModelEntry,
    ModelPath, ModelRequest, Node, NodeAtts, PathSource, TestEntry, parse_id_list,
};
