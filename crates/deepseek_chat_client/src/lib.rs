//! DeepSeek chat client library (config, streaming transport, transcript
//! renderer, conversation session and the loop tying them together).
//! Used by the desktop GUI and the terminal binary.

pub mod client;
pub mod config;
pub mod driver;
pub mod logging;
pub mod messages;
pub mod session;
pub mod terminal;
pub mod transcript;

pub use client::{ChatTransport, ClientError, DeltaStream, HttpTransport, ScriptedTransport};
pub use config::{
    default_config_path, load_startup, ApiKey, ApiSection, Config, ConfigError, CredentialError,
    Startup, StartupError, UiSection,
};
pub use driver::{ChatHandle, ChatLoop, ChatView, LoopClosed, SubmitStatus, UiEvent};
pub use messages::{Delta, Fragment, Message, Role};
pub use session::{Session, SessionState, SubmitOutcome, TurnId, TurnRequest};
pub use transcript::{LineStyle, RenderRegion, StyledSpan, Transcript};
