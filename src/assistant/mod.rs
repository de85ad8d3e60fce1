//! Assistant completion client.
//!
//! DESIGN
//! ======
//! One request, one reply: `POST {message, system_prompt}` → `{response}`.
//! No streaming and no retry. Every failure comes back as an
//! `AssistantError` value; the session controller turns it into the fixed
//! fallback reply.

pub mod http;

#[cfg(test)]
#[path = "assistant_test.rs"]
mod tests;

pub use http::HttpAssistant;

/// System prompt sent with every question. The service is expected to
/// answer in the language and script the user wrote in.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant who understands Kannada, Kanglish (Kannada written in English script), and English. If the user writes in Kannada or Kanglish, you MUST reply in the same language they used. If they write in Kannada script, reply in Kannada script. If they write in Kanglish, reply in Kanglish. If they write in English, reply in English. Always be helpful and friendly.";

/// Reply shown in place of the assistant's answer when the call fails.
pub const FALLBACK_REPLY: &str = "Sorry, something went wrong. Please try again.";

/// Errors produced by assistant calls.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// The HTTP request could not be completed.
    #[error("assistant request failed: {0}")]
    Request(String),

    /// The endpoint returned a non-success HTTP status.
    #[error("assistant response error: status {status}")]
    Response { status: u16, body: String },

    /// The response body was not `{response: string}`.
    #[error("assistant response parse failed: {0}")]
    Parse(String),

    /// No reply within the configured bound.
    #[error("assistant timed out after {0}s")]
    Timeout(u64),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for AssistantError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_ASSISTANT_REQUEST",
            Self::Response { .. } => "E_ASSISTANT_RESPONSE",
            Self::Parse(_) => "E_ASSISTANT_PARSE",
            Self::Timeout(_) => "E_ASSISTANT_TIMEOUT",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Timeout(_) | Self::Response { status: 429 | 500..=599, .. })
    }
}

/// Provider-neutral async trait for one-shot questions. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Assistant: Send + Sync {
    async fn ask(&self, user_text: &str, system_prompt: &str) -> Result<String, AssistantError>;
}
