use time::Date;
use tracing::{debug, info, warn};

use super::{Fetch, FetchError, NO_DATA_MESSAGE, RequestTracker, Ticket};
use crate::api::{ApiError, GraphDataPoint, GraphOutput, QueryParams};
use crate::store::QueryState;
use crate::timefmt;

/// Rejected before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Search text cannot be empty. Please enter a search term.")]
pub struct EmptySearchText;

/// Summary over the raw per-day counts of one successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub total: u64,
    pub max: u64,
}

impl GraphStats {
    /// `None` for an empty series.
    #[must_use]
    pub fn from_points(points: &[GraphDataPoint]) -> Option<Self> {
        let max = points.iter().map(|point| point.y).max()?;
        Some(Self {
            total: points.iter().map(|point| point.y).sum(),
            max,
        })
    }
}

/// Running prefix sum over `values` in their existing order.
#[must_use]
pub fn cumulative(values: impl IntoIterator<Item = u64>) -> Vec<u64> {
    values
        .into_iter()
        .scan(0_u64, |sum, value| {
            *sum = sum.saturating_add(value);
            Some(*sum)
        })
        .collect()
}

/// Fetched points plus the statistics computed when they arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphData {
    pub points: Vec<GraphDataPoint>,
    pub stats: Option<GraphStats>,
}

impl GraphData {
    #[must_use]
    pub fn new(points: Vec<GraphDataPoint>) -> Self {
        let stats = GraphStats::from_points(&points);
        Self { points, stats }
    }

    /// Dated series for plotting. Points whose `x` is not a date are skipped.
    #[must_use]
    pub fn series(&self, cumulative_mode: bool) -> Vec<(Date, u64)> {
        let values: Vec<u64> = if cumulative_mode {
            cumulative(self.points.iter().map(|point| point.y))
        } else {
            self.points.iter().map(|point| point.y).collect()
        };
        self.points
            .iter()
            .zip(values)
            .filter_map(|(point, y)| match timefmt::parse_date(&point.x) {
                Some(date) => Some((date, y)),
                None => {
                    debug!(x = %point.x, "skipping graph point without a date");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GraphRequest {
    pub ticket: Ticket,
    pub params: QueryParams,
}

/// Multi-stream hit graph.
#[derive(Debug, Default)]
pub struct GraphView {
    state: Fetch<GraphData>,
    cumulative: bool,
    tracker: RequestTracker,
}

impl GraphView {
    /// Start a graph fetch from the current filters.
    ///
    /// `Ok(None)` means a fetch is already running.
    ///
    /// # Errors
    ///
    /// Returns [`EmptySearchText`] for blank search text; the view then shows the
    /// validation message and no request is made.
    pub fn begin(&mut self, query: &QueryState) -> Result<Option<GraphRequest>, EmptySearchText> {
        if self.tracker.is_loading() {
            return Ok(None);
        }
        if let Err(err) = validate(&query.search_text) {
            self.state = Fetch::Failed(FetchError {
                status: None,
                message: err.to_string(),
            });
            return Err(err);
        }
        self.state = Fetch::Loading;
        Ok(Some(GraphRequest {
            ticket: self.tracker.issue(),
            params: query.snapshot(),
        }))
    }

    pub fn complete(&mut self, ticket: Ticket, outcome: Result<GraphOutput, ApiError>) -> bool {
        if !self.tracker.accept(ticket) {
            return false;
        }
        self.state = match outcome {
            Ok(output) => {
                info!(points = output.result.len(), "graph finished");
                Fetch::Ready(GraphData::new(output.result))
            }
            Err(err) => {
                warn!(error = %err, "graph failed");
                Fetch::Failed(FetchError::from(&err))
            }
        };
        true
    }

    pub fn abandon(&mut self) {
        self.tracker.abandon();
        if self.state.is_loading() {
            self.state = Fetch::Idle;
        }
    }

    /// Flip between daily counts and running totals. Never re-fetches.
    pub fn toggle_cumulative(&mut self) {
        self.cumulative = !self.cumulative;
    }

    pub fn set_cumulative(&mut self, cumulative: bool) {
        self.cumulative = cumulative;
    }

    #[must_use]
    pub fn is_cumulative(&self) -> bool {
        self.cumulative
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    #[must_use]
    pub fn data(&self) -> Option<&GraphData> {
        self.state.ready()
    }

    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        self.state.error()
    }

    #[must_use]
    pub fn series(&self) -> Vec<(Date, u64)> {
        self.data()
            .map(|data| data.series(self.cumulative))
            .unwrap_or_default()
    }

    /// `(label, value)` statistic rows; the per-day max is hidden for running totals.
    #[must_use]
    pub fn stat_rows(&self) -> Vec<(&'static str, u64)> {
        let Some(stats) = self.data().and_then(|data| data.stats) else {
            return Vec::new();
        };
        let mut rows = vec![("Total Hits", stats.total)];
        if !self.cumulative {
            rows.push(("Max Hits (in one day)", stats.max));
        }
        rows
    }

    #[must_use]
    pub fn notice(&self) -> Option<&'static str> {
        match self.data() {
            Some(data) if data.points.is_empty() => Some(NO_DATA_MESSAGE),
            _ => None,
        }
    }

    #[must_use]
    pub fn series_label(&self) -> &'static str {
        if self.cumulative {
            "Cumulative Count"
        } else {
            "Count"
        }
    }
}

/// # Errors
///
/// Returns [`EmptySearchText`] when `search_text` is empty or whitespace.
pub fn validate(search_text: &str) -> Result<(), EmptySearchText> {
    if search_text.trim().is_empty() {
        Err(EmptySearchText)
    } else {
        Ok(())
    }
}
