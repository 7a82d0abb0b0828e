//! Language model trait definitions.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for chat completion models.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One complete response for a system/user prompt pair.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> crate::error::Result<String>;

    /// Stream a response as text chunks over a channel.
    ///
    /// Returns once the request is accepted; chunks, or a mid-stream
    /// error, arrive on the receiver. Dropping the receiver cancels
    /// the upstream request.
    async fn complete_stream(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> crate::error::Result<mpsc::UnboundedReceiver<crate::error::Result<String>>>;
}
