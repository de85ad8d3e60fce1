//! HTTP-backed chat store.
//!
//! DESIGN
//! ======
//! Each trait operation is an independent request against the conversation
//! API, authenticated with `Authorization: Bearer <token>`:
//!
//! - `GET    /chats`               list summaries
//! - `POST   /chats`               create `{title}`
//! - `GET    /chats/{id}`          one summary
//! - `PATCH  /chats/{id}`          rename `{title}`
//! - `DELETE /chats/{id}`          delete (404 counts as done)
//! - `GET    /chats/{id}/messages` message sequence
//! - `POST   /chats/{id}/messages` append `{role, content}`
//!
//! Ids are opaque and sent as single percent-encoded path segments.
//! Messages are never embedded in list responses; `get` fetches them.
//! A 401/403 is surfaced as `Unauthorized` so the caller can drop the
//! session; this store does not try to refresh credentials.

#[cfg(test)]
#[path = "remote_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ChatStore, StoreError};
use crate::auth::TokenSource;
use crate::chat::{Chat, ChatSummary, Message};
use crate::config::Timeouts;

#[derive(Serialize)]
struct TitleBody<'a> {
    title: &'a str,
}

pub struct RemoteChatStore {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl RemoteChatStore {
    /// Build a store talking to `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client fails to build.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenSource>, timeouts: Timeouts) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| StoreError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidBaseUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| StoreError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url, tokens })
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, StoreError> {
        let token = self.tokens.token().ok_or(StoreError::Unauthenticated)?;
        let url = self.endpoint(segments)?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

const CHATS: &str = "chats";
const MESSAGES: &str = "messages";

/// Map a response status onto the store error taxonomy.
fn check_status(status: StatusCode, id: Option<&str>) -> Result<(), StoreError> {
    if status.is_success() {
        return Ok(());
    }
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(StoreError::not_found(id)),
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            Err(StoreError::Unauthorized { status: status.as_u16() })
        }
        _ => Err(StoreError::Transport(format!("status {}", status.as_u16()))),
    }
}

async fn send(request: RequestBuilder, id: Option<&str>) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;
    if let Err(e) = check_status(response.status(), id) {
        warn!(status = response.status().as_u16(), error = %e, "remote store: request failed");
        return Err(e);
    }
    Ok(response)
}

/// Newest first when every entry carries `created_at`; server order otherwise.
fn order_newest_first(chats: &mut [ChatSummary]) {
    if chats.iter().all(|c| c.created_at.is_some()) {
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

#[async_trait::async_trait]
impl ChatStore for RemoteChatStore {
    fn is_authenticated(&self) -> bool {
        self.tokens.token().is_some()
    }

    async fn list(&self) -> Result<Vec<ChatSummary>, StoreError> {
        let request = match self.request(Method::GET, &[CHATS]) {
            Ok(request) => request,
            Err(StoreError::Unauthenticated) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut chats: Vec<ChatSummary> = Self::json(send(request, None).await?).await?;
        order_newest_first(&mut chats);
        Ok(chats)
    }

    async fn create(&self, title: &str) -> Result<Chat, StoreError> {
        let request = self.request(Method::POST, &[CHATS])?.json(&TitleBody { title });
        let summary: ChatSummary = Self::json(send(request, None).await?).await?;
        debug!(chat_id = %summary.id, "remote store: chat created");
        Ok(Chat::from(summary))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let request = self.request(Method::DELETE, &[CHATS, id])?;
        match send(request, Some(id)).await {
            Ok(_) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get(&self, id: &str) -> Result<Chat, StoreError> {
        let request = self.request(Method::GET, &[CHATS, id])?;
        let summary: ChatSummary = Self::json(send(request, Some(id)).await?).await?;

        let request = self.request(Method::GET, &[CHATS, id, MESSAGES])?;
        let messages: Vec<Message> = Self::json(send(request, Some(id)).await?).await?;

        let mut chat = Chat::from(summary);
        chat.messages = messages;
        Ok(chat)
    }

    async fn append_message(&self, id: &str, message: &Message) -> Result<(), StoreError> {
        let request = self.request(Method::POST, &[CHATS, id, MESSAGES])?.json(message);
        send(request, Some(id)).await?;
        Ok(())
    }

    async fn update_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
        let request = self
            .request(Method::PATCH, &[CHATS, id])?
            .json(&TitleBody { title });
        send(request, Some(id)).await?;
        Ok(())
    }
}
