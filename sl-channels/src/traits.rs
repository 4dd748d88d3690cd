use anyhow::Result;
use async_trait::async_trait;

/// Outbound reply capability.
///
/// The webhook handler depends on this seam instead of a concrete Graph
/// API client so tests can substitute an in-memory recorder.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Send a text message to a platform user.
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
}
