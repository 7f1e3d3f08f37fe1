use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, trace};

use strandex_core::{
    CompletionRequest, CompletionResponse, Error, FinishReason, Provider, TokenStream, Usage,
};

use crate::loader::LlamaServerProcess;

/// Backend speaking the llama.cpp server `/completion` protocol.
pub struct LlamaServerProvider {
    client: Client,
    base_url: String,
    /// Server spawned for this provider; killed when the provider is dropped.
    process: Option<LlamaServerProcess>,
}

impl LlamaServerProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        // HTTP/1.1 and no compression so streamed events arrive as produced.
        let client = Client::builder()
            .http1_only()
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            process: None,
        }
    }

    pub(crate) fn with_process(mut self, process: LlamaServerProcess) -> Self {
        self.process = Some(process);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether this provider owns the server process it talks to.
    pub fn owns_server(&self) -> bool {
        self.process.is_some()
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> LlamaCompletionRequest {
        LlamaCompletionRequest {
            prompt: request.prompt.clone(),
            n_predict: request.params.max_tokens,
            temperature: request.params.temperature,
            stop: request.params.stop.clone().unwrap_or_default(),
            stream,
            cache_prompt: true,
        }
    }

    fn parse_response(&self, response: LlamaCompletionResponse) -> CompletionResponse {
        let finish_reason = if response.stopped_limit {
            FinishReason::Length
        } else {
            FinishReason::Stop
        };

        CompletionResponse {
            text: response.content.trim().to_string(),
            usage: Usage::new(response.tokens_evaluated, response.tokens_predicted),
            finish_reason,
        }
    }

    async fn post(&self, body: &LlamaCompletionRequest) -> Result<reqwest::Response, Error> {
        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &error_text));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for LlamaServerProvider {
    fn name(&self) -> &str {
        "llama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let body = self.build_request(&request, false);
        debug!(
            prompt_len = body.prompt.len(),
            n_predict = body.n_predict,
            "llama.cpp completion request"
        );

        let response = self.post(&body).await?;
        let api_response: LlamaCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::serialization(e.to_string()))?;

        Ok(self.parse_response(api_response))
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, Error> {
        let body = self.build_request(&request, true);
        debug!(
            prompt_len = body.prompt.len(),
            n_predict = body.n_predict,
            "llama.cpp stream request"
        );

        let response = self.post(&body).await?;
        let (tx, rx) = mpsc::channel::<Result<String, Error>>(100);

        tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();
            let mut response = response;

            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx.send(Err(Error::stream(e.to_string()))).await;
                        return;
                    }
                };

                // Events are decoded whole; a chunk may end inside a character.
                buffer.extend_from_slice(&chunk);
                if !forward_events(&tx, drain_events(&mut buffer)).await {
                    return;
                }
            }

            // A final event without the trailing blank line.
            if !buffer.iter().all(u8::is_ascii_whitespace) {
                buffer.extend_from_slice(b"\n\n");
                forward_events(&tx, drain_events(&mut buffer)).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as TokenStream)
    }
}

#[derive(Debug, Clone, Serialize)]
struct LlamaCompletionRequest {
    prompt: String,
    n_predict: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    stream: bool,
    cache_prompt: bool,
}

#[derive(Debug, Deserialize)]
struct LlamaCompletionResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tokens_predicted: u32,
    #[serde(default)]
    tokens_evaluated: u32,
    #[serde(default)]
    stopped_limit: bool,
}

#[derive(Debug, Deserialize)]
struct LlamaStreamChunk {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
}

#[derive(Debug, PartialEq)]
enum StreamEvent {
    Token(String),
    Done,
}

/// Send parsed events to the consumer. Returns `false` once the stream is
/// over: done, failed, or no longer read.
async fn forward_events(
    tx: &mpsc::Sender<Result<String, Error>>,
    events: Result<Vec<String>, Error>,
) -> bool {
    let events = match events {
        Ok(events) => events,
        Err(e) => {
            error!(error = %e, "Malformed llama.cpp event stream");
            let _ = tx.send(Err(e)).await;
            return false;
        }
    };

    for data in events {
        trace!(bytes = data.len(), "SSE event");
        match parse_stream_event(&data) {
            Ok(StreamEvent::Token(content)) => {
                // Receiver gone: the consumer stopped pulling.
                if tx.send(Ok(content)).await.is_err() {
                    return false;
                }
            }
            Ok(StreamEvent::Done) => return false,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return false;
            }
        }
    }
    true
}

/// Remove every complete `data:` event from `buffer`, leaving a partial
/// trailing event in place. Only complete events are decoded as UTF-8.
fn drain_events(buffer: &mut Vec<u8>) -> Result<Vec<String>, Error> {
    let mut events = Vec::new();
    while let Some(event_end) = buffer.windows(2).position(|w| w == b"\n\n") {
        let raw: Vec<u8> = buffer.drain(..event_end + 2).collect();
        let event = String::from_utf8(raw)
            .map_err(|e| Error::stream(format!("Invalid UTF-8 in event stream: {}", e)))?;
        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                events.push(data.trim_start().to_string());
            }
        }
    }
    Ok(events)
}

fn parse_stream_event(data: &str) -> Result<StreamEvent, Error> {
    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let value: serde_json::Value = serde_json::from_str(data)?;
    if let Some(err) = value.get("error") {
        return Err(Error::backend(error_message(err)));
    }

    let chunk: LlamaStreamChunk = serde_json::from_value(value)?;
    // The final event may still carry trailing text.
    if chunk.stop && chunk.content.is_empty() {
        return Ok(StreamEvent::Done);
    }
    Ok(StreamEvent::Token(chunk.content))
}

fn error_message(err: &serde_json::Value) -> String {
    err.get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

fn parse_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").map(error_message))
        .unwrap_or_else(|| body.to_string());
    Error::backend(format!("llama-server returned {}: {}", status, message))
}
