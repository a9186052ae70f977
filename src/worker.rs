//! Runs API requests off the UI thread and hands results back over a channel.
//!
//! The terminal loop drains [`Worker::drain`] once per frame and routes each
//! [`Completed`] message to the view that issued the ticket; the view decides
//! whether the answer is still wanted.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, warn};

use crate::api::{
    ApiClient, ApiError, GraphOutput, MembershipInfo, StreamMetadata, TranscriptOutput,
    TranscriptSearchOutput,
};
use crate::views::Ticket;
use crate::views::graph::GraphRequest;
use crate::views::search::SearchRequest;
use crate::views::stream_graph::{MetadataRequest, StreamGraphRequest};
use crate::views::transcript::TranscriptRequest;

/// One request to run.
#[derive(Debug, Clone)]
pub enum Job {
    Search(SearchRequest),
    Graph(GraphRequest),
    StreamGraph(StreamGraphRequest),
    StreamMetadata(MetadataRequest),
    Transcript(TranscriptRequest),
    VerifyMembership { ticket: Ticket, key: String },
}

impl Job {
    fn label(&self) -> &'static str {
        match self {
            Job::Search(_) => "search",
            Job::Graph(_) => "graph",
            Job::StreamGraph(_) => "stream-graph",
            Job::StreamMetadata(_) => "stream-metadata",
            Job::Transcript(_) => "transcript",
            Job::VerifyMembership { .. } => "verify-membership",
        }
    }

    /// The completion this job reports when it never got to run.
    fn fail(self, error: ApiError) -> Completed {
        match self {
            Job::Search(request) => Completed::Search {
                ticket: request.ticket,
                outcome: Err(error),
            },
            Job::Graph(request) => Completed::Graph {
                ticket: request.ticket,
                outcome: Err(error),
            },
            Job::StreamGraph(request) => Completed::StreamGraph {
                id: request.id,
                ticket: request.ticket,
                outcome: Err(error),
            },
            Job::StreamMetadata(request) => Completed::StreamMetadata {
                id: request.id,
                ticket: request.ticket,
                outcome: Err(error),
            },
            Job::Transcript(request) => Completed::Transcript {
                id: request.id,
                ticket: request.ticket,
                outcome: Err(error),
            },
            Job::VerifyMembership { ticket, key } => Completed::VerifyMembership {
                ticket,
                key,
                outcome: Err(error),
            },
        }
    }
}

/// Result of a [`Job`], tagged with the ticket it was issued under.
#[derive(Debug)]
pub enum Completed {
    Search {
        ticket: Ticket,
        outcome: Result<TranscriptSearchOutput, ApiError>,
    },
    Graph {
        ticket: Ticket,
        outcome: Result<GraphOutput, ApiError>,
    },
    StreamGraph {
        id: String,
        ticket: Ticket,
        outcome: Result<GraphOutput, ApiError>,
    },
    StreamMetadata {
        id: String,
        ticket: Ticket,
        outcome: Result<StreamMetadata, ApiError>,
    },
    Transcript {
        id: String,
        ticket: Ticket,
        outcome: Result<TranscriptOutput, ApiError>,
    },
    VerifyMembership {
        ticket: Ticket,
        key: String,
        outcome: Result<MembershipInfo, ApiError>,
    },
}

/// Run `job` on the current thread.
#[must_use]
pub fn execute(client: &ApiClient, job: Job) -> Completed {
    match job {
        Job::Search(request) => Completed::Search {
            ticket: request.ticket,
            outcome: client.search_transcripts(&request.params),
        },
        Job::Graph(request) => Completed::Graph {
            ticket: request.ticket,
            outcome: client.get_graph(&request.params),
        },
        Job::StreamGraph(request) => Completed::StreamGraph {
            outcome: client.get_graph_by_id(&request.id, &request.params),
            id: request.id,
            ticket: request.ticket,
        },
        Job::StreamMetadata(request) => Completed::StreamMetadata {
            outcome: client.get_stream_metadata(&request.id),
            id: request.id,
            ticket: request.ticket,
        },
        Job::Transcript(request) => Completed::Transcript {
            outcome: client.get_transcript(&request.id),
            id: request.id,
            ticket: request.ticket,
        },
        Job::VerifyMembership { ticket, key } => Completed::VerifyMembership {
            outcome: client.verify_membership_key(&key),
            ticket,
            key,
        },
    }
}

/// Spawns one short-lived thread per job.
#[derive(Debug)]
pub struct Worker {
    client: ApiClient,
    tx: Sender<Completed>,
    rx: Receiver<Completed>,
}

impl Worker {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { client, tx, rx }
    }

    /// Run `job` on a fresh thread. If the thread cannot be started the job
    /// still completes, with a transport error, so its view leaves Loading.
    pub fn submit(&self, job: Job) {
        let label = job.label();
        let fallback = job.clone();
        let client = self.client.clone();
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("atx-{label}"))
            .spawn(move || {
                let completed = execute(&client, job);
                if tx.send(completed).is_err() {
                    debug!(job = label, "receiver gone; dropping result");
                }
            });
        if let Err(err) = spawned {
            warn!(job = label, error = %err, "failed to spawn request thread");
            self.reject(fallback, &err);
        }
    }

    fn reject(&self, job: Job, err: &std::io::Error) {
        let error = ApiError::Transport(format!("could not start request: {err}"));
        if self.tx.send(job.fail(error)).is_err() {
            debug!("receiver gone; dropping rejection");
        }
    }

    /// Everything that finished since the last call, without blocking.
    pub fn drain(&self) -> Vec<Completed> {
        let mut done = Vec::new();
        while let Ok(completed) = self.rx.try_recv() {
            done.push(completed);
        }
        done
    }

    /// Block until one result arrives. Used by tests.
    pub fn recv(&self) -> Option<Completed> {
        self.rx.recv().ok()
    }
}
