pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::error::ChatError;

/// Reply used when the backend answers but produces no usable text
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't generate a response. Please try again.";

/// One stateless request per turn to a text-generation backend
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a reply for `user_text` under `system_prompt`.
    ///
    /// Transport errors, timeouts, non-success statuses and malformed bodies
    /// all come back as `ChatError::RequestFailed`.
    async fn complete(&self, system_prompt: &str, user_text: &str) -> Result<String, ChatError>;

    fn name(&self) -> &str;
}

/// Single text block sent to the backend. No history is included.
pub fn build_prompt(system_prompt: &str, user_text: &str) -> String {
    format!("{}\n\nUser: {}", system_prompt, user_text)
}
