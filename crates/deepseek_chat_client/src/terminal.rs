//! Line-terminal front end: shows the transcript by writing only what changed.

use std::io::Write;

use tokio::sync::watch;

use crate::driver::ChatView;
use crate::transcript::Transcript;

const CLEAR_LINE: &str = "\r\x1b[2K";

/// Tracks what has been written to the terminal and computes the bytes
/// needed to bring it in line with a new transcript.
///
/// The transcript's trailing newline is held back while a reply streams so
/// the live line can keep growing on the same row.
#[derive(Debug, Default)]
pub struct ScreenDiff {
    shown: String,
    ansi: bool,
}

impl ScreenDiff {
    /// With `ansi` off, a rewritten line is printed again on a fresh row
    /// instead of being erased in place.
    pub fn new(ansi: bool) -> Self {
        Self {
            shown: String::new(),
            ansi,
        }
    }

    pub fn shown(&self) -> &str {
        &self.shown
    }

    pub fn update(&mut self, text: &str) -> String {
        let target = text.strip_suffix('\n').unwrap_or(text);
        let common = common_prefix_len(&self.shown, target);
        let mut out = String::new();

        if common == self.shown.len() {
            out.push_str(&target[common..]);
        } else {
            let line_start = target[..common].rfind('\n').map_or(0, |i| i + 1);
            let last_line_only = !self.shown[line_start..].contains('\n');
            if self.ansi && last_line_only {
                out.push_str(CLEAR_LINE);
            } else {
                out.push('\n');
            }
            out.push_str(&target[line_start..]);
        }

        self.shown = target.to_owned();
        out
    }

    /// Write the held-back newline so the cursor sits on an empty row.
    pub fn settle(&mut self) -> &'static str {
        if self.shown.is_empty() || self.shown.ends_with('\n') {
            ""
        } else {
            self.shown.push('\n');
            "\n"
        }
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}

/// [`ChatView`] over any writer. Input availability is published on a
/// watch channel so the reader only takes a line when the session can use it.
pub struct TerminalView<W> {
    out: W,
    screen: ScreenDiff,
    input: watch::Sender<bool>,
}

impl<W: Write + Send + 'static> TerminalView<W> {
    pub fn new(out: W, ansi: bool, input: watch::Sender<bool>) -> Self {
        Self {
            out,
            screen: ScreenDiff::new(ansi),
            input,
        }
    }

    fn write(&mut self, bytes: &str) {
        if bytes.is_empty() {
            return;
        }
        if let Err(e) = self
            .out
            .write_all(bytes.as_bytes())
            .and_then(|()| self.out.flush())
        {
            tracing::warn!("failed to write transcript: {}", e);
        }
    }
}

impl<W: Write + Send + 'static> ChatView for TerminalView<W> {
    fn transcript_changed(&mut self, transcript: &Transcript) {
        let bytes = self.screen.update(transcript.text());
        self.write(&bytes);
    }

    fn input_enabled(&mut self, enabled: bool) {
        if enabled {
            let bytes = self.screen.settle();
            self.write(bytes);
        }
        self.input.send_replace(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_writes_only_the_suffix() {
        let mut s = ScreenDiff::new(true);
        assert_eq!(s.update("You: hi\nDeepSeek: H\n"), "You: hi\nDeepSeek: H");
        assert_eq!(s.update("You: hi\nDeepSeek: Hel\n"), "el");
        assert_eq!(s.update("You: hi\nDeepSeek: Hello\n"), "lo");
        assert_eq!(s.shown(), "You: hi\nDeepSeek: Hello");
    }

    #[test]
    fn placeholder_is_rewritten_in_place() {
        let mut s = ScreenDiff::new(true);
        s.update("You: hi\nDeepSeek: thinking…\n");
        assert_eq!(
            s.update("You: hi\nDeepSeek: Let me\n"),
            format!("{CLEAR_LINE}DeepSeek: Let me")
        );
    }

    #[test]
    fn without_ansi_rewrites_go_to_a_new_row() {
        let mut s = ScreenDiff::new(false);
        s.update("DeepSeek: thinking…\n");
        assert_eq!(s.update("DeepSeek: Let me\n"), "\nDeepSeek: Let me");
    }

    #[test]
    fn earlier_line_change_reprints_from_that_line() {
        let mut s = ScreenDiff::new(true);
        s.update("A: 1\nSystem: wait\n");
        assert_eq!(s.update("A: 12\nSystem: wait\n"), "\nA: 12\nSystem: wait");
    }

    #[test]
    fn settle_emits_the_held_newline_once() {
        let mut s = ScreenDiff::new(true);
        assert_eq!(s.settle(), "");
        s.update("You: a\nDeepSeek: b\n");
        assert_eq!(s.settle(), "\n");
        assert_eq!(s.shown(), "You: a\nDeepSeek: b\n");
        assert_eq!(s.settle(), "");
        assert_eq!(s.update("You: a\nDeepSeek: b\nYou: c\n"), "You: c");
    }

    #[test]
    fn multibyte_prefix_is_split_on_char_boundary() {
        let mut s = ScreenDiff::new(true);
        s.update("x: é\n");
        assert_eq!(s.update("x: è\n"), format!("{CLEAR_LINE}x: è"));
    }

    #[test]
    fn view_publishes_input_state() {
        let (tx, rx) = watch::channel(false);
        let mut view = TerminalView::new(Vec::new(), false, tx);
        let mut t = Transcript::new();
        t.append_line("You", "q");
        view.transcript_changed(&t);
        view.input_enabled(true);
        assert!(*rx.borrow());
        assert_eq!(view.out, b"You: q\n");
    }
}
