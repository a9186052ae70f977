use std::collections::HashSet;

use tracing::{info, warn};

use super::{Fetch, FetchError, NO_DATA_MESSAGE, RequestTracker, Ticket};
use crate::api::{ApiError, QueryParams, TranscriptSearch, TranscriptSearchOutput};
use crate::links::{LineLinks, LinkBuilder};
use crate::route::Route;
use crate::store::QueryState;
use crate::timefmt;

pub const LIMITED_NOTICE: &str =
    "Note: results may be limited. Open the full transcript to see every match.";

/// Everything needed to run one search off the UI thread.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub ticket: Ticket,
    pub params: QueryParams,
}

/// A context line picked for the line-action dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineAction {
    pub stream_id: String,
    pub timestamp: String,
    pub line: String,
    pub links: LineLinks,
}

impl LineAction {
    #[must_use]
    pub fn new(
        links: &LinkBuilder,
        stream_id: &str,
        stream_type: &str,
        timestamp: &str,
        line: &str,
    ) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            timestamp: timestamp.to_string(),
            line: line.to_string(),
            links: links.line_links(stream_id, stream_type, timestamp),
        }
    }

    /// Route for "jump to line".
    #[must_use]
    pub fn jump_route(&self) -> Route {
        Route::Transcript {
            id: self.stream_id.clone(),
            at: Some(self.timestamp.clone()),
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchView {
    state: Fetch<Vec<TranscriptSearch>>,
    submitted_term: String,
    searched: bool,
    expanded: HashSet<String>,
    tracker: RequestTracker,
}

impl SearchView {
    /// Start a search from the current filters.
    ///
    /// Returns `None` while a search is already running so the trigger behaves
    /// as disabled.
    pub fn begin(&mut self, query: &QueryState) -> Option<SearchRequest> {
        if self.tracker.is_loading() {
            return None;
        }
        let params = query.snapshot();
        self.state = Fetch::Loading;
        self.searched = true;
        self.expanded.clear();
        self.submitted_term = query.search_text.clone();
        Some(SearchRequest {
            ticket: self.tracker.issue(),
            params,
        })
    }

    /// Apply a finished search. Returns `false` when the response was stale.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<TranscriptSearchOutput, ApiError>,
    ) -> bool {
        if !self.tracker.accept(ticket) {
            return false;
        }
        self.state = match outcome {
            Ok(output) => {
                info!(streams = output.result.len(), "search finished");
                Fetch::Ready(output.result)
            }
            Err(err) => {
                warn!(error = %err, "search failed");
                Fetch::Failed(FetchError::from(&err))
            }
        };
        true
    }

    /// Forget any outstanding request, e.g. when leaving the screen.
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
    pub fn results(&self) -> &[TranscriptSearch] {
        self.state.ready().map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        self.state.error()
    }

    /// The term the visible results were fetched with, used for highlighting.
    #[must_use]
    pub fn submitted_term(&self) -> &str {
        &self.submitted_term
    }

    /// Informational line for the result area, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        match &self.state {
            Fetch::Ready(results) if results.is_empty() && self.searched => {
                Some(NO_DATA_MESSAGE.to_string())
            }
            Fetch::Ready(results) => Some(format!("Found {} streams", results.len())),
            _ => None,
        }
    }

    pub fn toggle_expanded(&mut self, id: &str) {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
        }
    }

    #[must_use]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }
}

/// Whether the server may have cut the result's context lines short.
#[must_use]
pub fn is_limited(result: &TranscriptSearch, context_limit: usize) -> bool {
    result.contexts.len() == context_limit
}

/// `Jan 5, 2024 · streamer · type · title · N found` pieces for a result row.
#[must_use]
pub fn header_fields(result: &TranscriptSearch) -> [String; 5] {
    [
        timefmt::display_date(&result.date).unwrap_or_default(),
        result.streamer.clone(),
        result.stream_type.clone(),
        result.title.clone(),
        format!("{} found", result.contexts.len()),
    ]
}
