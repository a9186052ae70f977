use tracing::{info, warn};

use super::graph::{GraphStats, cumulative};
use super::{Fetch, FetchError, NO_DATA_MESSAGE, RequestTracker, Ticket};
use crate::api::{ApiError, GraphDataPoint, GraphOutput, QueryParams, StreamMetadata};
use crate::store::QueryState;
use crate::timefmt;

#[derive(Debug, Clone)]
pub struct MetadataRequest {
    pub ticket: Ticket,
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct StreamGraphRequest {
    pub ticket: Ticket,
    pub id: String,
    pub params: QueryParams,
}

/// Hits over time within a single stream. Metadata and graph fetches are
/// tracked separately so either can fail without blocking the other.
#[derive(Debug)]
pub struct StreamGraphView {
    id: String,
    metadata: Fetch<StreamMetadata>,
    metadata_tracker: RequestTracker,
    graph: Fetch<Vec<GraphDataPoint>>,
    stats: Option<GraphStats>,
    graph_tracker: RequestTracker,
}

impl StreamGraphView {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: Fetch::Idle,
            metadata_tracker: RequestTracker::default(),
            graph: Fetch::Idle,
            stats: None,
            graph_tracker: RequestTracker::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Metadata fetch issued once when the screen opens.
    pub fn mount(&mut self) -> Option<MetadataRequest> {
        if self.id.trim().is_empty() {
            self.metadata = Fetch::Failed(FetchError {
                status: None,
                message: "No stream ID was given.".to_string(),
            });
            return None;
        }
        self.metadata = Fetch::Loading;
        Some(MetadataRequest {
            ticket: self.metadata_tracker.issue(),
            id: self.id.clone(),
        })
    }

    pub fn complete_metadata(
        &mut self,
        ticket: Ticket,
        outcome: Result<StreamMetadata, ApiError>,
    ) -> bool {
        if !self.metadata_tracker.accept(ticket) {
            return false;
        }
        self.metadata = match outcome {
            Ok(meta) => Fetch::Ready(meta),
            Err(err) => {
                warn!(id = %self.id, error = %err, "stream metadata failed");
                Fetch::Failed(FetchError {
                    status: err.status(),
                    message: format!("Failed to fetch stream metadata: {err}"),
                })
            }
        };
        true
    }

    /// Start a graph fetch using only the search text and whole-word flag.
    pub fn begin(&mut self, query: &QueryState) -> Option<StreamGraphRequest> {
        if self.graph_tracker.is_loading() {
            return None;
        }
        if self.id.trim().is_empty() {
            self.graph = Fetch::Failed(FetchError {
                status: None,
                message: "No stream ID was given.".to_string(),
            });
            return None;
        }
        let snapshot = query.snapshot();
        self.graph = Fetch::Loading;
        self.stats = None;
        Some(StreamGraphRequest {
            ticket: self.graph_tracker.issue(),
            id: self.id.clone(),
            params: QueryParams {
                search_text: snapshot.search_text,
                match_whole_word: snapshot.match_whole_word,
                ..QueryParams::default()
            },
        })
    }

    pub fn complete(&mut self, ticket: Ticket, outcome: Result<GraphOutput, ApiError>) -> bool {
        if !self.graph_tracker.accept(ticket) {
            return false;
        }
        self.graph = match outcome {
            Ok(output) => {
                info!(id = %self.id, points = output.result.len(), "stream graph finished");
                self.stats = GraphStats::from_points(&output.result);
                Fetch::Ready(output.result)
            }
            Err(err) => {
                warn!(id = %self.id, error = %err, "stream graph failed");
                Fetch::Failed(FetchError::from(&err))
            }
        };
        true
    }

    pub fn abandon(&mut self) {
        self.metadata_tracker.abandon();
        self.graph_tracker.abandon();
        if self.graph.is_loading() {
            self.graph = Fetch::Idle;
        }
        if self.metadata.is_loading() {
            self.metadata = Fetch::Idle;
        }
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.ready()
    }

    #[must_use]
    pub fn metadata_error(&self) -> Option<&FetchError> {
        self.metadata.error()
    }

    #[must_use]
    pub fn graph_error(&self) -> Option<&FetchError> {
        self.graph.error()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.graph.is_loading()
    }

    #[must_use]
    pub fn stats(&self) -> Option<GraphStats> {
        self.stats
    }

    #[must_use]
    pub fn points(&self) -> &[GraphDataPoint] {
        self.graph.ready().map(Vec::as_slice).unwrap_or_default()
    }

    /// `(seconds into the stream, running total)` pairs.
    #[must_use]
    pub fn series(&self) -> Vec<(u64, u64)> {
        let points = self.points();
        let xs = points.iter().map(|point| timefmt::time_to_seconds(&point.x));
        let ys = cumulative(points.iter().map(|point| point.y));
        xs.zip(ys).collect()
    }

    #[must_use]
    pub fn title(&self) -> String {
        match self.metadata() {
            Some(meta) => format!("Graph: {}", meta.stream_title),
            None => "Graph Transcript".to_string(),
        }
    }

    #[must_use]
    pub fn notice(&self) -> Option<&'static str> {
        match self.graph.ready() {
            Some(points) if points.is_empty() => Some(NO_DATA_MESSAGE),
            _ => None,
        }
    }
}
