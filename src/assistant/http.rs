//! `reqwest` implementation of [`Assistant`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Assistant, AssistantError};
use crate::config::Timeouts;

#[derive(Serialize)]
struct AskRequest<'a> {
    message: &'a str,
    system_prompt: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    response: String,
}

pub struct HttpAssistant {
    http: reqwest::Client,
    url: String,
}

impl HttpAssistant {
    /// Build a client posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(url: impl Into<String>, timeouts: Timeouts) -> Result<Self, AssistantError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| AssistantError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, url: url.into() })
    }
}

pub(crate) fn parse_ask_response(body: &str) -> Result<String, AssistantError> {
    serde_json::from_str::<AskResponse>(body)
        .map(|r| r.response)
        .map_err(|e| AssistantError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl Assistant for HttpAssistant {
    async fn ask(&self, user_text: &str, system_prompt: &str) -> Result<String, AssistantError> {
        info!(prompt_len = user_text.len(), "assistant: asking");
        let response = self
            .http
            .post(&self.url)
            .json(&AskRequest { message: user_text, system_prompt })
            .send()
            .await
            .map_err(|e| AssistantError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AssistantError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            warn!(status, "assistant: non-success response");
            return Err(AssistantError::Response { status, body: text });
        }
        parse_ask_response(&text)
    }
}
