//! Conversation state machine: one outstanding turn at a time.
//!
//! The session decides *what* goes into the transcript and history; it never
//! performs I/O. Starting a turn yields a [`TurnRequest`] that the caller is
//! expected to hand to a transport, feeding the results back through
//! [`Session::apply_fragment`], [`Session::complete`] or [`Session::fail`].

use std::fmt;

use serde::Serialize;

use crate::messages::{Fragment, Message};
use crate::transcript::{LineStyle, RenderRegion, Transcript};

pub const USER_LABEL: &str = "You";
pub const MODEL_LABEL: &str = "DeepSeek";
pub const SYSTEM_LABEL: &str = "System";
pub const THINKING_PLACEHOLDER: &str = "thinking…";
pub const BUSY_NOTICE: &str =
    "Please wait for the current reply to finish before sending another message.";

/// Identifies one turn so events from an older turn can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TurnId(u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingStream { turn: TurnId },
}

/// Everything a worker needs to run one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub turn: TurnId,
    pub history: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started(TurnRequest),
    /// Blank input; nothing happened.
    Empty,
    /// A turn is already outstanding; a notice was shown.
    Busy,
}

#[derive(Debug, Default)]
struct LiveTurn {
    reasoning: String,
    answer: String,
    reasoning_region: RenderRegion,
    answer_region: Option<RenderRegion>,
}

#[derive(Debug)]
pub struct Session {
    history: Vec<Message>,
    state: SessionState,
    live: LiveTurn,
    next_turn: u64,
    failed_turns: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            state: SessionState::Idle,
            live: LiveTurn::default(),
            next_turn: 1,
            failed_turns: 0,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SessionState::Idle
    }

    /// Turns that ended in a transport failure.
    pub fn failed_turns(&self) -> usize {
        self.failed_turns
    }

    /// Reasoning text received so far in the current (or last) turn.
    pub fn reasoning(&self) -> &str {
        &self.live.reasoning
    }

    /// Answer text received so far in the current (or last) turn.
    pub fn answer(&self) -> &str {
        &self.live.answer
    }

    pub fn submit(&mut self, text: &str, transcript: &mut Transcript) -> SubmitOutcome {
        if let SessionState::AwaitingStream { turn } = self.state {
            tracing::debug!(%turn, "submission rejected while a reply is streaming");
            transcript.append_line(SYSTEM_LABEL, BUSY_NOTICE);
            return SubmitOutcome::Busy;
        }
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Empty;
        }

        let turn = TurnId(self.next_turn);
        self.next_turn += 1;

        self.history.push(Message::user(text));
        transcript.append_line(USER_LABEL, text);
        self.live = LiveTurn {
            reasoning_region: transcript.append_live_line(
                MODEL_LABEL,
                THINKING_PLACEHOLDER,
                LineStyle::Thinking,
            ),
            ..LiveTurn::default()
        };
        self.state = SessionState::AwaitingStream { turn };
        tracing::info!(%turn, messages = self.history.len(), "turn started");

        SubmitOutcome::Started(TurnRequest {
            turn,
            history: self.history.clone(),
        })
    }

    pub fn apply_fragment(
        &mut self,
        turn: TurnId,
        fragment: Fragment,
        transcript: &mut Transcript,
    ) {
        if !self.is_current(turn) {
            tracing::warn!(%turn, "dropping fragment for a turn that is not in flight");
            return;
        }
        let live = &mut self.live;
        match fragment {
            Fragment::Reasoning(text) => {
                live.reasoning.push_str(&text);
                if live.answer_region.is_some() {
                    // The answer has started; the reasoning line stays as it was.
                    tracing::debug!(%turn, "late reasoning fragment not rendered");
                    return;
                }
                live.reasoning_region = transcript.replace_live(
                    live.reasoning_region,
                    MODEL_LABEL,
                    &live.reasoning,
                    LineStyle::Thinking,
                );
            }
            Fragment::Answer(text) => {
                live.answer.push_str(&text);
                let region = match live.answer_region {
                    None => {
                        transcript.append_live_line(MODEL_LABEL, &live.answer, LineStyle::Response)
                    }
                    Some(region) => transcript.replace_live(
                        region,
                        MODEL_LABEL,
                        &live.answer,
                        LineStyle::Response,
                    ),
                };
                live.answer_region = Some(region);
            }
        }
    }

    /// The stream ended normally; commit the answer (possibly empty).
    pub fn complete(&mut self, turn: TurnId) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        self.finish(turn);
        true
    }

    /// The stream broke; commit whatever answer arrived and show the error.
    pub fn fail(&mut self, turn: TurnId, error: &str, transcript: &mut Transcript) -> bool {
        if !self.is_current(turn) {
            return false;
        }
        tracing::error!(%turn, %error, "reply stream failed");
        transcript.append_line(SYSTEM_LABEL, &format!("Request failed: {error}"));
        self.failed_turns += 1;
        self.finish(turn);
        true
    }

    fn finish(&mut self, turn: TurnId) {
        self.history.push(Message::assistant(self.live.answer.clone()));
        self.state = SessionState::Idle;
        tracing::info!(%turn, answer_len = self.live.answer.len(), "turn finished");
    }

    fn is_current(&self, turn: TurnId) -> bool {
        self.state == SessionState::AwaitingStream { turn }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Role;

    fn started(outcome: SubmitOutcome) -> TurnRequest {
        match outcome {
            SubmitOutcome::Started(request) => request,
            other => panic!("expected a started turn, got {other:?}"),
        }
    }

    #[test]
    fn hello_scenario() {
        let mut session = Session::new();
        let mut t = Transcript::new();

        let req = started(session.submit("hello", &mut t));
        assert_eq!(req.history, vec![Message::user("hello")]);
        assert_eq!(t.text(), "You: hello\nDeepSeek: thinking…\n");
        assert!(!session.is_idle());

        session.apply_fragment(req.turn, Fragment::Reasoning("Let me think".into()), &mut t);
        assert_eq!(t.text(), "You: hello\nDeepSeek: Let me think\n");

        session.apply_fragment(req.turn, Fragment::Answer("Hi".into()), &mut t);
        assert_eq!(t.text(), "You: hello\nDeepSeek: Let me think\nDeepSeek: Hi\n");

        session.apply_fragment(req.turn, Fragment::Answer(" there".into()), &mut t);
        assert_eq!(
            t.text(),
            "You: hello\nDeepSeek: Let me think\nDeepSeek: Hi there\n"
        );

        assert!(session.complete(req.turn));
        assert!(session.is_idle());
        assert_eq!(
            session.history(),
            &[Message::user("hello"), Message::assistant("Hi there")]
        );
    }

    #[test]
    fn blank_input_changes_nothing() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        assert_eq!(session.submit("   \t", &mut t), SubmitOutcome::Empty);
        assert_eq!(session.submit("", &mut t), SubmitOutcome::Empty);
        assert!(session.history().is_empty());
        assert!(t.is_empty());
        assert!(session.is_idle());
    }

    #[test]
    fn input_is_trimmed() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let req = started(session.submit("  hi  \n", &mut t));
        assert_eq!(req.history, vec![Message::user("hi")]);
        assert!(t.text().starts_with("You: hi\n"));
    }

    #[test]
    fn busy_submission_adds_notice_only() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let a = started(session.submit("a", &mut t));

        assert_eq!(session.submit("b", &mut t), SubmitOutcome::Busy);
        // Blank input while busy still gets the notice.
        assert_eq!(session.submit("", &mut t), SubmitOutcome::Busy);
        assert_eq!(session.history(), &[Message::user("a")]);
        assert_eq!(
            t.lines().filter(|l| l.starts_with("System: ")).count(),
            2
        );

        session.apply_fragment(a.turn, Fragment::Answer("A".into()), &mut t);
        session.complete(a.turn);

        let b = started(session.submit("b", &mut t));
        assert_ne!(a.turn, b.turn);
        assert_eq!(
            b.history,
            vec![Message::user("a"), Message::assistant("A"), Message::user("b")]
        );
    }

    #[test]
    fn answer_line_lands_after_busy_notice() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let req = started(session.submit("a", &mut t));
        session.apply_fragment(req.turn, Fragment::Reasoning("r".into()), &mut t);
        session.submit("b", &mut t);
        session.apply_fragment(req.turn, Fragment::Answer("x".into()), &mut t);
        session.apply_fragment(req.turn, Fragment::Answer("y".into()), &mut t);
        assert_eq!(
            t.text(),
            format!("You: a\nDeepSeek: r\nSystem: {BUSY_NOTICE}\nDeepSeek: xy\n")
        );
    }

    #[test]
    fn reasoning_freezes_once_answer_starts() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let req = started(session.submit("q", &mut t));
        session.apply_fragment(req.turn, Fragment::Reasoning("r1".into()), &mut t);
        session.apply_fragment(req.turn, Fragment::Answer("a1".into()), &mut t);
        session.apply_fragment(req.turn, Fragment::Reasoning("r2".into()), &mut t);
        assert_eq!(t.text(), "You: q\nDeepSeek: r1\nDeepSeek: a1\n");
        assert_eq!(session.reasoning(), "r1r2");
        assert_eq!(session.answer(), "a1");
    }

    #[test]
    fn completion_without_answer_commits_empty_reply() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let req = started(session.submit("q", &mut t));
        assert!(session.complete(req.turn));
        assert_eq!(session.history()[1], Message::assistant(""));
        assert_eq!(t.text(), "You: q\nDeepSeek: thinking…\n");
    }

    #[test]
    fn failure_commits_partial_answer_and_reports() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let req = started(session.submit("q", &mut t));
        session.apply_fragment(req.turn, Fragment::Answer("half".into()), &mut t);
        assert!(session.fail(req.turn, "connection reset", &mut t));

        assert!(session.is_idle());
        assert_eq!(session.failed_turns(), 1);
        let last = session.history().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "half");
        assert!(t.text().ends_with("System: Request failed: connection reset\n"));
    }

    #[test]
    fn stale_turn_events_are_ignored() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let first = started(session.submit("one", &mut t));
        session.complete(first.turn);
        let second = started(session.submit("two", &mut t));

        let before = t.text().to_owned();
        session.apply_fragment(first.turn, Fragment::Answer("late".into()), &mut t);
        assert!(!session.complete(first.turn));
        assert!(!session.fail(first.turn, "late", &mut t));
        assert_eq!(t.text(), before);
        assert_eq!(session.state(), SessionState::AwaitingStream { turn: second.turn });
    }

    #[test]
    fn history_is_append_only_across_turns() {
        let mut session = Session::new();
        let mut t = Transcript::new();
        let mut snapshots = Vec::new();
        for (q, a) in [("1", "one"), ("2", "two"), ("3", "three")] {
            let req = started(session.submit(q, &mut t));
            session.apply_fragment(req.turn, Fragment::Answer(a.into()), &mut t);
            session.complete(req.turn);
            snapshots.push(session.history().to_vec());
        }
        for pair in snapshots.windows(2) {
            assert_eq!(&pair[1][..pair[0].len()], &pair[0][..]);
            assert_eq!(pair[1].len(), pair[0].len() + 2);
        }
    }
}
