//! Configuration loading and per-request credential resolution.
//!
//! Credentials are resolved once per request (request body values win
//! over the config file, which wins over the environment) and passed
//! through the pipeline as a plain value. Nothing here is a global.

mod settings;

pub use settings::{
    Config, Credentials, LimitsConfig, OpenAiConfig, ServerConfig, SupabaseConfig,
    DEFAULT_QUERY_LIMIT, MAX_MESSAGE_LENGTH,
};
