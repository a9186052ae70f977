use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{Fetch, FetchError, RequestTracker, Ticket};
use crate::api::{ApiError, TranscriptLine, TranscriptOutput};
use crate::links;
use crate::timefmt;

/// How long a deep-link target stays highlighted after the scroll settles.
pub const HIGHLIGHT_WINDOW: Duration = Duration::from_secs(2);

pub const NOT_FOUND_HEADING: &str = "404 Not Found";
pub const ERROR_HEADING: &str = "Error fetching transcripts";

#[derive(Debug, Clone)]
pub struct TranscriptRequest {
    pub ticket: Ticket,
    pub id: String,
}

/// Scroll the list so `index` sits at the top of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingScroll {
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineHighlight {
    index: usize,
    until: Instant,
}

/// Full transcript of one stream with a local filter and deep-link handling.
///
/// Deep links resolve in two phases: [`TranscriptView::navigate`] records the
/// target and, once lines are present, turns it into a [`PendingScroll`]. The
/// renderer applies the scroll and reports back through
/// [`TranscriptView::scroll_settled`], which starts the timed highlight. Any
/// new navigation replaces whatever the previous one left behind.
#[derive(Debug)]
pub struct TranscriptView {
    id: String,
    state: Fetch<TranscriptOutput>,
    tracker: RequestTracker,
    filter: String,
    visible: Vec<usize>,
    target: Option<String>,
    pending_scroll: Option<PendingScroll>,
    highlight: Option<LineHighlight>,
}

impl TranscriptView {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Fetch::Idle,
            tracker: RequestTracker::default(),
            filter: String::new(),
            visible: Vec::new(),
            target: None,
            pending_scroll: None,
            highlight: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Issue the single fetch for this transcript.
    pub fn mount(&mut self) -> Option<TranscriptRequest> {
        if self.id.trim().is_empty() {
            self.state = Fetch::Failed(FetchError::from(ApiError::MissingId("Transcript")));
            return None;
        }
        self.state = Fetch::Loading;
        self.visible.clear();
        Some(TranscriptRequest {
            ticket: self.tracker.issue(),
            id: self.id.clone(),
        })
    }

    pub fn complete(&mut self, ticket: Ticket, outcome: Result<TranscriptOutput, ApiError>) -> bool {
        if !self.tracker.accept(ticket) {
            return false;
        }
        match outcome {
            Ok(transcript) => {
                info!(id = %self.id, lines = transcript.transcript_lines.len(), "transcript loaded");
                self.state = Fetch::Ready(transcript);
                self.refilter();
                self.resolve_target();
            }
            Err(err) => {
                warn!(id = %self.id, error = %err, "transcript failed");
                self.state = Fetch::Failed(FetchError::from(&err));
            }
        }
        true
    }

    pub fn abandon(&mut self) {
        self.tracker.abandon();
        if self.state.is_loading() {
            self.state = Fetch::Idle;
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    #[must_use]
    pub fn transcript(&self) -> Option<&TranscriptOutput> {
        self.state.ready()
    }

    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        self.state.error()
    }

    /// Heading for the failure screen.
    #[must_use]
    pub fn error_heading(&self) -> Option<&'static str> {
        self.error().map(|err| {
            if err.is_not_found() {
                NOT_FOUND_HEADING
            } else {
                ERROR_HEADING
            }
        })
    }

    /// Title line and `date - type - streamer` line.
    #[must_use]
    pub fn header(&self) -> Option<(String, String)> {
        let transcript = self.transcript()?;
        let date =
            timefmt::display_date(&transcript.date).unwrap_or_else(|| transcript.date.clone());
        Some((
            transcript.stream_title.clone(),
            format!(
                "{date} - {} - {}",
                transcript.stream_type, transcript.streamer
            ),
        ))
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Replace the filter text and recompute the visible lines.
    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.refilter();
    }

    fn lines(&self) -> &[TranscriptLine] {
        self.transcript()
            .map(|transcript| transcript.transcript_lines.as_slice())
            .unwrap_or_default()
    }

    fn refilter(&mut self) {
        let needle = self.filter.to_lowercase();
        self.visible = self
            .lines()
            .iter()
            .enumerate()
            .filter(|(_, line)| needle.is_empty() || line.text.to_lowercase().contains(&needle))
            .map(|(idx, _)| idx)
            .collect();
        // Visible indices moved; an old highlight would point at the wrong row.
        self.highlight = None;
    }

    #[must_use]
    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Lines passing the filter, in source order.
    pub fn visible_lines(&self) -> impl Iterator<Item = &TranscriptLine> {
        let lines = self.lines();
        self.visible.iter().filter_map(move |&idx| lines.get(idx))
    }

    #[must_use]
    pub fn visible_line(&self, index: usize) -> Option<&TranscriptLine> {
        self.visible
            .get(index)
            .and_then(|&idx| self.lines().get(idx))
    }

    /// Start a navigation to the line starting at `at` (`hh:mm:ss`).
    ///
    /// `None` only cancels what an earlier navigation left pending.
    pub fn navigate(&mut self, at: Option<&str>) {
        self.pending_scroll = None;
        self.highlight = None;
        self.target = at.map(str::to_string);
        self.resolve_target();
    }

    /// Same as [`TranscriptView::navigate`] for a raw `#T…` fragment. Malformed
    /// fragments cancel prior navigation and are otherwise ignored.
    pub fn navigate_fragment(&mut self, fragment: &str) {
        let decoded = links::decode_fragment(fragment);
        if decoded.is_none() {
            debug!(fragment, "ignoring malformed deep link");
        }
        self.navigate(decoded.as_deref());
    }

    fn resolve_target(&mut self) {
        if self.transcript().is_none() {
            return;
        }
        let Some(target) = self.target.take() else {
            return;
        };
        let Some(index) = self.lines().iter().position(|line| line.start == target) else {
            debug!(%target, "deep link target not in transcript");
            return;
        };
        if !self.filter.is_empty() {
            self.set_filter(String::new());
        }
        debug!(%target, index, "deep link resolved");
        self.pending_scroll = Some(PendingScroll { index });
    }

    #[must_use]
    pub fn pending_scroll(&self) -> Option<PendingScroll> {
        self.pending_scroll
    }

    /// Second phase: the list now shows the target. Starts the highlight window.
    pub fn scroll_settled(&mut self, now: Instant) {
        let Some(scroll) = self.pending_scroll.take() else {
            return;
        };
        if scroll.index < self.visible.len() {
            self.highlight = Some(LineHighlight {
                index: scroll.index,
                until: now + HIGHLIGHT_WINDOW,
            });
        }
    }

    /// Expire the highlight once its window has passed.
    pub fn tick(&mut self, now: Instant) {
        if self.highlight.is_some_and(|highlight| now >= highlight.until) {
            self.highlight = None;
        }
    }

    /// Visible index currently flashed by a deep link.
    #[must_use]
    pub fn highlighted(&self) -> Option<usize> {
        self.highlight.map(|highlight| highlight.index)
    }
}
