//! Streaming transport: POST the history to `/chat/completions` and decode the
//! server-sent event stream into [`Delta`]s until `[DONE]` or end of body.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use eventsource_stream::Eventsource;
use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tokio::sync::Semaphore;

use crate::config::{ApiKey, Startup};
use crate::messages::{ChatChunk, ChatRequest, Delta, Message};

/// Incremental deltas of one reply. `None` from the stream is end-of-stream.
pub type DeltaStream = BoxStream<'static, Result<Delta, ClientError>>;

const DONE_MARKER: &str = "[DONE]";

/// Transport failure. Every variant ends the turn it occurred in.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("event stream error: {0}")]
    Sse(String),
    #[error("malformed chunk: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Something that can stream a reply for a full conversation history.
///
/// The session never talks to HTTP directly; the binaries hand it an
/// [`HttpTransport`] and tests hand it a [`ScriptedTransport`].
pub trait ChatTransport: Send + Sync + 'static {
    fn stream_chat(&self, history: Vec<Message>) -> DeltaStream;
}

/// The real DeepSeek transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: ApiKey,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        }
    }

    pub fn from_startup(startup: &Startup) -> Self {
        let api = &startup.config.api;
        Self::new(api.base_url(), api.model(), startup.api_key.clone())
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatTransport for HttpTransport {
    fn stream_chat(&self, history: Vec<Message>) -> DeltaStream {
        let http = self.http.clone();
        let url = self.endpoint();
        let model = self.model.clone();
        let api_key = self.api_key.clone();

        let open = async move {
            tracing::debug!(%url, %model, messages = history.len(), "opening chat stream");
            let response = http
                .post(&url)
                .bearer_auth(api_key.expose())
                .json(&ChatRequest::new(&model, &history))
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok(decode_event_stream(response.bytes_stream()))
        };

        stream::once(open).try_flatten().boxed()
    }
}

/// Decode a raw SSE body into deltas. Stops at the `[DONE]` marker.
pub fn decode_event_stream<S, B, E>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    body.eventsource()
        .map_err(|e| ClientError::Sse(e.to_string()))
        .try_take_while(|event| future::ready(Ok(event.data.trim() != DONE_MARKER)))
        .try_filter_map(|event| future::ready(parse_event_data(&event.data)))
        .boxed()
}

fn parse_event_data(data: &str) -> Result<Option<Delta>, ClientError> {
    if data.trim().is_empty() {
        return Ok(None);
    }
    let chunk: ChatChunk = serde_json::from_str(data)?;
    Ok(Some(chunk.into_delta()))
}

/// In-process transport that replays a fixed script.
///
/// Optionally gated: nothing is yielded until [`ScriptedTransport::release`]
/// hands out a permit, which lets a caller observe the in-flight state.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Vec<Delta>,
    failure: Option<String>,
    gate: Option<Arc<Semaphore>>,
    opened: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Delta>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// After the script, end the stream with a transport error.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Hold every stream until [`release`](Self::release) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let one held stream proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    /// How many streams have been opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// The history sent with each opened stream, in order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ChatTransport for ScriptedTransport {
    fn stream_chat(&self, history: Vec<Message>) -> DeltaStream {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(history);

        let mut items: Vec<Result<Delta, ClientError>> =
            self.script.iter().cloned().map(Ok).collect();
        if let Some(message) = &self.failure {
            items.push(Err(ClientError::Sse(message.clone())));
        }
        let replay = stream::iter(items);

        match self.gate.clone() {
            None => replay.boxed(),
            Some(gate) => stream::once(async move {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            })
            .filter_map(|()| future::ready(None::<Result<Delta, ClientError>>))
            .chain(replay)
            .boxed(),
        }
    }
}
