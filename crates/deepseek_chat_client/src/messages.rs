//! Conversation history types and the chat-completions JSON exchanged with the API.

use serde::{Deserialize, Serialize};

/// Who authored a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation history. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Client → API: streaming chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

impl<'a> ChatRequest<'a> {
    pub fn new(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages,
            stream: true,
        }
    }
}

/// API → client: one `data:` payload of the event stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatChunk {
    /// Only the first choice is used; a chunk without choices is an empty delta.
    pub fn into_delta(self) -> Delta {
        match self.choices.into_iter().next() {
            Some(choice) => Delta {
                reasoning: choice.delta.reasoning_content,
                answer: choice.delta.content,
            },
            None => Delta::default(),
        }
    }
}

/// One incremental update from the transport. Either side may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub reasoning: Option<String>,
    pub answer: Option<String>,
}

impl Delta {
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            answer: None,
        }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            reasoning: None,
            answer: Some(text.into()),
        }
    }

    /// Split into per-channel fragments, reasoning first. Empty text is dropped.
    pub fn into_fragments(self) -> impl Iterator<Item = Fragment> {
        let reasoning = self
            .reasoning
            .filter(|s| !s.is_empty())
            .map(Fragment::Reasoning);
        let answer = self.answer.filter(|s| !s.is_empty()).map(Fragment::Answer);
        reasoning.into_iter().chain(answer)
    }
}

/// A piece of text tagged with the channel it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Reasoning(String),
    Answer(String),
}
