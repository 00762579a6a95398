//! Shared error taxonomy for the data model and document schema.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("parameter path collision: {0}")]
    PathCollision(String),
    #[error("unknown parameter path: {0}")]
    UnknownPath(String),
    #[error("unknown parameter (module, id): ({0}, {1})")]
    UnknownModuleId(String, u32),
    #[error("parameter {0} is not a string-valued parameter")]
    NotStringValued(String),
    #[error("parameter {0} is not a numeric-valued parameter")]
    NotNumericValued(String),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error reading {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("JSON error in {path}: {source}")]
    Json { path: String, #[source] source: serde_json::Error },
    #[error("preset document failed schema validation: {0}")]
    SchemaInvalid(String),
    #[error("malformed bank/preset identifier: {0}")]
    MalformedPresetId(String),
}
