//! The loop that owns session and transcript state, and the worker it spawns per turn.
//!
//! All mutation happens inside [`ChatLoop::run`]. Front ends talk to it
//! through a [`ChatHandle`]; the per-turn worker only ever sends
//! [`UiEvent`]s back over the same channel.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::client::ChatTransport;
use crate::messages::Fragment;
use crate::session::{Session, SubmitOutcome, TurnId, TurnRequest};
use crate::transcript::Transcript;

/// Receives every visible change. Called only from the loop task.
pub trait ChatView: Send + 'static {
    fn transcript_changed(&mut self, transcript: &Transcript);
    fn input_enabled(&mut self, enabled: bool);
}

/// Result of a submission as reported back to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    Started,
    Empty,
    Busy,
}

impl From<&SubmitOutcome> for SubmitStatus {
    fn from(outcome: &SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Started(_) => SubmitStatus::Started,
            SubmitOutcome::Empty => SubmitStatus::Empty,
            SubmitOutcome::Busy => SubmitStatus::Busy,
        }
    }
}

#[derive(Debug)]
pub enum UiEvent {
    Submit {
        text: String,
        reply: Option<oneshot::Sender<SubmitStatus>>,
    },
    Fragment {
        turn: TurnId,
        fragment: Fragment,
    },
    Completed {
        turn: TurnId,
    },
    Failed {
        turn: TurnId,
        error: String,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("chat loop is no longer running")]
pub struct LoopClosed;

/// Cloneable entry point into a running [`ChatLoop`].
#[derive(Debug, Clone)]
pub struct ChatHandle {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChatHandle {
    pub async fn submit(&self, text: impl Into<String>) -> Result<SubmitStatus, LoopClosed> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(UiEvent::Submit {
                text: text.into(),
                reply: Some(reply),
            })
            .map_err(|_| LoopClosed)?;
        rx.await.map_err(|_| LoopClosed)
    }

    /// Stop the loop; an outstanding turn is allowed to finish first.
    pub fn shutdown(&self) {
        let _ = self.tx.send(UiEvent::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct ChatLoop<V> {
    session: Session,
    transcript: Transcript,
    transport: Arc<dyn ChatTransport>,
    view: V,
    tx: mpsc::UnboundedSender<UiEvent>,
    rx: mpsc::UnboundedReceiver<UiEvent>,
    closing: bool,
}

impl<V: ChatView> ChatLoop<V> {
    pub fn new(transport: Arc<dyn ChatTransport>, view: V) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session: Session::new(),
            transcript: Transcript::new(),
            transport,
            view,
            tx,
            rx,
            closing: false,
        }
    }

    pub fn handle(&self) -> ChatHandle {
        ChatHandle {
            tx: self.tx.clone(),
        }
    }

    /// Process events until shut down; returns the session for inspection.
    pub async fn run(mut self) -> Session {
        self.view.input_enabled(true);
        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        tracing::debug!(turns = self.session.history().len() / 2, "chat loop stopped");
        self.session
    }

    /// Returns `false` once the loop should stop.
    fn handle_event(&mut self, event: UiEvent) -> bool {
        let revision = self.transcript.revision();
        match event {
            UiEvent::Submit { text, reply } => {
                let outcome = self.session.submit(&text, &mut self.transcript);
                let status = SubmitStatus::from(&outcome);
                self.publish(revision);
                if let SubmitOutcome::Started(request) = outcome {
                    self.view.input_enabled(false);
                    self.spawn_worker(request);
                }
                if let Some(reply) = reply {
                    let _ = reply.send(status);
                }
                true
            }
            UiEvent::Fragment { turn, fragment } => {
                self.session.apply_fragment(turn, fragment, &mut self.transcript);
                self.publish(revision);
                true
            }
            UiEvent::Completed { turn } => {
                let finished = self.session.complete(turn);
                self.turn_finished(finished, revision)
            }
            UiEvent::Failed { turn, error } => {
                let finished = self.session.fail(turn, &error, &mut self.transcript);
                self.turn_finished(finished, revision)
            }
            UiEvent::Shutdown => {
                self.closing = true;
                !self.session.is_idle()
            }
        }
    }

    fn turn_finished(&mut self, finished: bool, revision: u64) -> bool {
        if !finished {
            return true;
        }
        self.publish(revision);
        self.view.input_enabled(true);
        !self.closing
    }

    fn publish(&mut self, since: u64) {
        if self.transcript.revision() != since {
            self.view.transcript_changed(&self.transcript);
        }
    }

    fn spawn_worker(&self, request: TurnRequest) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        let TurnRequest { turn, history } = request;

        tokio::spawn(async move {
            let mut stream = transport.stream_chat(history);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(delta) => {
                        for fragment in delta.into_fragments() {
                            tracing::trace!(%turn, ?fragment, "fragment");
                            if tx.send(UiEvent::Fragment { turn, fragment }).is_err() {
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        let _ = tx.send(UiEvent::Failed {
                            turn,
                            error: error.to_string(),
                        });
                        return;
                    }
                }
            }
            let _ = tx.send(UiEvent::Completed { turn });
        });
    }
}
