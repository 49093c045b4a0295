//! Append-only transcript with replace-in-place "live" lines.
//!
//! Every line is rendered as `"<label>: <text>\n"`. Live lines are addressed
//! by a [`RenderRegion`], a plain pair of byte offsets handed back to the
//! caller; the transcript keeps no pointer into caller state and the caller
//! keeps none into ours.

use serde::Serialize;

/// Byte span currently occupied by a live line. Zero width when the line is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderRegion {
    pub start: usize,
    pub end: usize,
}

impl RenderRegion {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Presentation hint for a span of text. Front ends decide what it looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Plain,
    Thinking,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StyledSpan {
    pub start: usize,
    pub end: usize,
    pub style: LineStyle,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    text: String,
    spans: Vec<StyledSpan>,
    revision: u64,
}

fn format_line(label: &str, text: &str) -> String {
    format!("{label}: {text}\n")
}

fn format_live_line(label: &str, text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format_line(label, text)
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Non-plain spans, ordered by start offset.
    pub fn spans(&self) -> &[StyledSpan] {
        &self.spans
    }

    /// Bumped on every mutation; front ends redraw and scroll to the bottom when it moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append a permanent line.
    pub fn append_line(&mut self, label: &str, text: &str) {
        self.text.push_str(&format_line(label, text));
        self.revision += 1;
    }

    /// Append a line that can later be replaced through the returned region.
    pub fn append_live_line(&mut self, label: &str, text: &str, style: LineStyle) -> RenderRegion {
        let end = self.text.len();
        self.replace_live(RenderRegion { start: end, end }, label, text, style)
    }

    /// Swap the text at `region` for a freshly formatted line at the same start.
    ///
    /// Everything after the region shifts by the size difference, so later
    /// permanent lines keep their content and order.
    pub fn replace_live(
        &mut self,
        region: RenderRegion,
        label: &str,
        text: &str,
        style: LineStyle,
    ) -> RenderRegion {
        let region = self.checked(region);
        let line = format_live_line(label, text);

        self.text.replace_range(region.start..region.end, &line);

        let inserted = line.len();
        let removed = region.len();
        if removed > 0 {
            self.spans.retain(|s| !(s.start >= region.start && s.end <= region.end));
        }
        for span in self.spans.iter_mut().filter(|s| s.start >= region.end) {
            span.start = span.start - removed + inserted;
            span.end = span.end - removed + inserted;
        }

        let fresh = RenderRegion {
            start: region.start,
            end: region.start + inserted,
        };
        if inserted > 0 && style != LineStyle::Plain {
            let at = self.spans.partition_point(|s| s.start < fresh.start);
            self.spans.insert(
                at,
                StyledSpan {
                    start: fresh.start,
                    end: fresh.end,
                    style,
                },
            );
        }
        self.revision += 1;
        fresh
    }

    fn checked(&self, region: RenderRegion) -> RenderRegion {
        let valid = region.start <= region.end
            && region.end <= self.text.len()
            && self.text.is_char_boundary(region.start)
            && self.text.is_char_boundary(region.end);
        if valid {
            region
        } else {
            tracing::warn!(
                ?region,
                len = self.text.len(),
                "stale render region, appending instead"
            );
            let end = self.text.len();
            RenderRegion { start: end, end }
        }
    }
}
