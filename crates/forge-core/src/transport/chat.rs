//! Streamed chat completions
//!
//! Posts the conversation to the backend and decodes the SSE response body
//! chunk by chunk. The whole stream is bounded by the model's deadline.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::rest::{check_status, BackendClient};
use crate::config::TimeoutPolicy;
use crate::error::PipelineError;
use crate::pipeline::{ChatTranscript, EventSink, SessionKind, Transport};
use crate::stream::{ChatEvent, SseDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a chat stream request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

pub struct ChatTransport {
    client: BackendClient,
    policy: TimeoutPolicy,
}

impl ChatTransport {
    pub fn new(client: BackendClient, policy: TimeoutPolicy) -> Self {
        Self { client, policy }
    }
}

#[async_trait]
impl Transport for ChatTransport {
    type Request = ChatRequest;
    type Artifact = ChatTranscript;

    fn kind(&self) -> SessionKind {
        SessionKind::Chat
    }

    fn deadline(&self, request: &ChatRequest) -> Option<Duration> {
        Some(self.policy.deadline_for(&request.model))
    }

    async fn run(
        &self,
        request: ChatRequest,
        sink: EventSink<ChatEvent>,
    ) -> Result<(), PipelineError> {
        let url = self.client.endpoint("api/chat/stream")?;
        info!(
            session = %sink.session(),
            model = %request.model,
            messages = request.messages.len(),
            "Opening chat stream"
        );

        let response = self
            .client
            .http()
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| self.client.request_error(e))?;
        let response = check_status(response).await?;

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.client.request_error(e))?;
            for event in decoder.feed(&chunk) {
                sink.emit(event)?;
            }
            if decoder.is_finished() {
                debug!(session = %sink.session(), "Done frame received");
                return Ok(());
            }
        }

        if let Some(event) = decoder.finish() {
            sink.emit(event)?;
        }
        Ok(())
    }
}
