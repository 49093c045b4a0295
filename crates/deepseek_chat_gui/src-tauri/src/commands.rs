//! Tauri commands and the view that mirrors chat state into the webview.
//! The Tauri `#[command]` wrappers delegate to testable plain functions.

use std::sync::{Arc, Mutex, PoisonError};

use deepseek_chat_client::{ChatHandle, ChatView, LineStyle, SubmitStatus, Transcript};
use serde::{Deserialize, Serialize};
use tauri::{Emitter, State};

pub const TRANSCRIPT_EVENT: &str = "transcript-changed";
pub const INPUT_EVENT: &str = "input-state-changed";

// ── Payloads sent to the frontend ───────────────────────────────────────

/// A run of transcript text sharing one style.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub text: String,
    pub style: String,
}

/// Whole transcript, pre-split into styled segments so the frontend never
/// has to deal with byte offsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TranscriptPayload {
    pub segments: Vec<Segment>,
    pub revision: u64,
}

fn style_name(style: LineStyle) -> &'static str {
    match style {
        LineStyle::Plain => "plain",
        LineStyle::Thinking => "thinking",
        LineStyle::Response => "response",
    }
}

impl From<&Transcript> for TranscriptPayload {
    fn from(transcript: &Transcript) -> Self {
        let text = transcript.text();
        let mut segments = Vec::new();
        let mut push = |slice: &str, style: LineStyle| {
            if !slice.is_empty() {
                segments.push(Segment {
                    text: slice.to_owned(),
                    style: style_name(style).to_owned(),
                });
            }
        };

        let mut cursor = 0;
        for span in transcript.spans() {
            push(&text[cursor..span.start], LineStyle::Plain);
            push(&text[span.start..span.end], span.style);
            cursor = span.end;
        }
        push(&text[cursor..], LineStyle::Plain);

        Self {
            segments,
            revision: transcript.revision(),
        }
    }
}

/// Whether the input field and send button are usable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct InputState {
    pub enabled: bool,
}

/// Result of a submission returned to the frontend.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmitReply {
    pub status: SubmitStatus,
    /// True when the input field should be cleared.
    pub accepted: bool,
}

// ── View: loop task → webview ───────────────────────────────────────────

/// Where view updates are delivered. The app handle in production.
pub trait EventSink: Send + Sync + 'static {
    fn transcript(&self, payload: &TranscriptPayload);
    fn input(&self, state: InputState);
}

impl EventSink for tauri::AppHandle {
    fn transcript(&self, payload: &TranscriptPayload) {
        if let Err(e) = self.emit(TRANSCRIPT_EVENT, payload) {
            tracing::warn!("failed to emit {}: {}", TRANSCRIPT_EVENT, e);
        }
    }

    fn input(&self, state: InputState) {
        if let Err(e) = self.emit(INPUT_EVENT, state) {
            tracing::warn!("failed to emit {}: {}", INPUT_EVENT, e);
        }
    }
}

#[derive(Debug, Default)]
struct Latest {
    transcript: TranscriptPayload,
    input: Option<InputState>,
}

/// Last published state, readable from command handlers.
#[derive(Debug, Clone, Default)]
pub struct Mirror(Arc<Mutex<Latest>>);

impl Mirror {
    pub fn transcript(&self) -> TranscriptPayload {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transcript
            .clone()
    }

    pub fn input(&self) -> InputState {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .input
            .unwrap_or(InputState { enabled: false })
    }
}

/// [`ChatView`] that records the latest state and forwards it to a sink.
pub struct WebviewView<S> {
    sink: S,
    mirror: Mirror,
}

impl<S: EventSink> WebviewView<S> {
    pub fn new(sink: S, mirror: Mirror) -> Self {
        Self { sink, mirror }
    }
}

impl<S: EventSink> ChatView for WebviewView<S> {
    fn transcript_changed(&mut self, transcript: &Transcript) {
        let payload = TranscriptPayload::from(transcript);
        self.mirror
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transcript = payload.clone();
        self.sink.transcript(&payload);
    }

    fn input_enabled(&mut self, enabled: bool) {
        let state = InputState { enabled };
        self.mirror
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .input = Some(state);
        self.sink.input(state);
    }
}

/// Managed state: the way into the chat loop plus its mirrored output.
pub struct ChatState {
    pub handle: ChatHandle,
    pub mirror: Mirror,
}

// ── Testable backend functions ──────────────────────────────────────────

/// Submit one message. Blank and busy submissions are reported, not errors.
pub async fn do_submit(state: &ChatState, text: &str) -> Result<SubmitReply, String> {
    let status = state
        .handle
        .submit(text)
        .await
        .map_err(|e| e.to_string())?;
    Ok(SubmitReply {
        status,
        accepted: status == SubmitStatus::Started,
    })
}

pub fn do_transcript_snapshot(state: &ChatState) -> TranscriptPayload {
    state.mirror.transcript()
}

pub fn do_input_state(state: &ChatState) -> InputState {
    state.mirror.input()
}

// ── Tauri command wrappers ──────────────────────────────────────────────

#[tauri::command]
pub async fn submit_message(
    state: State<'_, ChatState>,
    text: String,
) -> Result<SubmitReply, String> {
    do_submit(&state, &text).await
}

#[tauri::command]
pub fn transcript_snapshot(state: State<'_, ChatState>) -> TranscriptPayload {
    do_transcript_snapshot(&state)
}

#[tauri::command]
pub fn input_state(state: State<'_, ChatState>) -> InputState {
    do_input_state(&state)
}
