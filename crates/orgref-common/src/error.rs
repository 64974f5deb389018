//! Error types for orgref

use thiserror::Error;

/// Result type alias for orgref operations
pub type Result<T> = std::result::Result<T, OrgRefError>;

/// Main error type for orgref
#[derive(Error, Debug)]
pub enum OrgRefError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required file not found: {0}")]
    FileNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
