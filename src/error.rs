//! Error types for the Tabletalk service.

use thiserror::Error;

/// Main error type for Tabletalk operations.
#[derive(Error, Debug)]
pub enum TabletalkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("{0} is required")]
    MissingField(String),
}

/// Data-backend errors (Supabase REST surface).
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Language-model errors (OpenAI API).
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Pipeline-stage errors, one variant per failure class.
///
/// The orchestrator maps each variant onto a fixed user-facing message;
/// the inner string is the diagnostic detail surfaced in the `error`
/// field of the response, never shown as the main answer.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Database connection failed: {0}")]
    Connectivity(String),

    #[error("Schema discovery failed: {0}")]
    Schema(String),

    #[error("Query interpretation failed: {0}")]
    Interpretation(String),

    #[error("Unsafe SQL rejected: {0}")]
    UnsafeSql(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Unsupported SQL: {0}")]
    UnsupportedSql(String),
}

/// Result type alias for Tabletalk operations.
pub type Result<T> = std::result::Result<T, TabletalkError>;
