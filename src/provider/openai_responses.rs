//! OpenAI Responses API client.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, trace};

use crate::error::OchatError;
use crate::types::StreamEvent;

use super::http::{bearer_headers, shared_client, status_to_error};
use super::sse::{SseDecoder, SseFrame};
use super::{EventStream, ModelService, TurnRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct ResponsesService {
    api_key: String,
    base_url: String,
}

impl ResponsesService {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request_body(&self, request: &TurnRequest) -> serde_json::Value {
        let mut body = json!({
            "model": request.model,
            "input": request.input,
            "store": request.store,
            "stream": true,
        });
        if let Some(instructions) = &request.instructions {
            body["instructions"] = json!(instructions);
        }
        if let Some(previous) = &request.previous_turn_id {
            body["previous_response_id"] = json!(previous);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }
        body
    }
}

impl std::fmt::Debug for ResponsesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponsesService")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelService for ResponsesService {
    fn name(&self) -> &str {
        "openai-responses"
    }

    async fn create_turn(&self, request: &TurnRequest) -> Result<EventStream, OchatError> {
        let body = self.build_request_body(request);
        let url = format!("{}/responses", self.base_url);

        debug!(
            model = %request.model,
            continuation = request.input.is_continuation(),
            previous = ?request.previous_turn_id,
            tools = request.tools.len(),
            "creating turn"
        );

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            futures::pin_mut!(byte_stream);

            'body: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(OchatError::Network(e));
                        break;
                    }
                };

                for frame in decoder.push(&chunk) {
                    match frame {
                        SseFrame::Done => break 'body,
                        SseFrame::Data { data, .. } => {
                            trace!(data = %data, "responses SSE event");
                            yield StreamEvent::parse(&data).map_err(OchatError::from);
                        }
                    }
                }
            }

            if let Some(SseFrame::Data { data, .. }) = decoder.finish() {
                yield StreamEvent::parse(&data).map_err(OchatError::from);
            }
        };

        Ok(Box::pin(stream))
    }
}
