use std::sync::{Arc, Mutex};

use itertools::Itertools;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

mod error;
pub mod model;
mod transport;

pub use error::ApiError;
pub use model::{
    GraphDataPoint, GraphOutput, MembershipInfo, SearchContext, StreamMetadata, TranscriptLine,
    TranscriptOutput, TranscriptSearch, TranscriptSearchOutput,
};
pub use transport::{HttpResponse, Transport, UreqTransport};

use model::ErrorBody;

pub const MEMBERSHIP_HEADER: &str = "X-Membership-Key";
const ACCEPT_JSON: (&str, &str) = ("Accept", "application/json");

/// A single query-string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Text(String),
    Flag(bool),
    /// Sent as one `key=value` pair per element.
    List(Vec<String>),
}

/// Filters accepted by the search and graph endpoints.
///
/// Absent fields are `None` and never reach the query string. Field order is the
/// order keys are emitted in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub search_text: Option<String>,
    pub stream_title: Option<String>,
    pub streamer: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub stream_type: Vec<String>,
    pub match_whole_word: Option<bool>,
}

impl QueryParams {
    /// Declared-order `(key, value)` entries using the API's camelCase names.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, Option<QueryValue>)> {
        vec![
            ("searchText", self.search_text.clone().map(QueryValue::Text)),
            ("streamTitle", self.stream_title.clone().map(QueryValue::Text)),
            ("streamer", self.streamer.clone().map(QueryValue::Text)),
            ("fromDate", self.from_date.clone().map(QueryValue::Text)),
            ("toDate", self.to_date.clone().map(QueryValue::Text)),
            ("streamType", Some(QueryValue::List(self.stream_type.clone()))),
            ("matchWholeWord", self.match_whole_word.map(QueryValue::Flag)),
        ]
    }

    /// The reduced set used by the single-stream graph endpoint.
    #[must_use]
    pub fn stream_graph_entries(&self) -> Vec<(&'static str, Option<QueryValue>)> {
        vec![
            ("searchText", self.search_text.clone().map(QueryValue::Text)),
            ("matchWholeWord", self.match_whole_word.map(QueryValue::Flag)),
        ]
    }
}

/// Build `?k=v&...` from ordered entries, skipping absent values. Returns an empty
/// string when nothing remains.
#[must_use]
pub fn build_query(entries: &[(&str, Option<QueryValue>)]) -> String {
    let query = entries
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|value| (*key, value)))
        .flat_map(|(key, value)| match value {
            QueryValue::Text(text) => vec![encode_pair(key, text)],
            QueryValue::Flag(flag) => vec![encode_pair(key, &flag.to_string())],
            QueryValue::List(items) => items.iter().map(|item| encode_pair(key, item)).collect(),
        })
        .join("&");

    if query.is_empty() {
        String::new()
    } else {
        format!("?{query}")
    }
}

fn encode_pair(key: &str, value: &str) -> String {
    format!(
        "{}={}",
        urlencoding::encode(key),
        urlencoding::encode(value)
    )
}

/// Read-only client for the archived transcript API.
///
/// Cheap to clone; clones share the membership key so a key change is seen by
/// requests issued afterwards from any clone.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    membership_key: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_membership_key", &self.membership_key().is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            membership_key: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the key injected into subsequent requests. Blank keys clear it.
    pub fn set_membership_key(&self, key: Option<&str>) {
        let key = key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToString::to_string);
        if let Ok(mut slot) = self.membership_key.lock() {
            *slot = key;
        }
    }

    #[must_use]
    pub fn membership_key(&self) -> Option<String> {
        self.membership_key.lock().ok().and_then(|slot| slot.clone())
    }

    /// GET `path` and decode its JSON body. `Ok(None)` means HTTP 204.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] for non-2xx statuses, [`ApiError::Transport`] when
    /// no response arrives, and [`ApiError::Decode`] for malformed bodies.
    pub fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let key = self.membership_key();
        let mut headers = vec![ACCEPT_JSON];
        if let Some(key) = key.as_deref() {
            headers.push((MEMBERSHIP_HEADER, key));
        }

        let response = self.transport.get(&url, &headers).inspect_err(|err| {
            warn!(path, error = %err, "api request failed before a response");
        })?;
        debug!(path, status = response.status, "api response");

        if !response.is_success() {
            let err = http_error(&response);
            warn!(path, status = response.status, error = %err, "api request failed");
            return Err(err);
        }

        if response.status == 204 {
            return Ok(None);
        }

        serde_json::from_str(&response.body)
            .map(Some)
            .map_err(|source| ApiError::Decode {
                path: path.to_string(),
                source,
            })
    }

    fn fetch_required<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch_json(path)?.ok_or_else(|| ApiError::NoContent {
            path: path.to_string(),
        })
    }

    /// `GET /transcript/{id}`
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::MissingId`] before any request when `id` is blank.
    pub fn get_transcript(&self, id: &str) -> Result<TranscriptOutput, ApiError> {
        let id = require_id(id, "Transcript")?;
        self.fetch_required(&format!("/transcript/{}", urlencoding::encode(id)))
    }

    /// `GET /transcripts?{filters}`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::fetch_json`].
    pub fn search_transcripts(
        &self,
        params: &QueryParams,
    ) -> Result<TranscriptSearchOutput, ApiError> {
        let query = build_query(&params.entries());
        Ok(self
            .fetch_json(&format!("/transcripts{query}"))?
            .unwrap_or_default())
    }

    /// `GET /graph?{filters}`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::fetch_json`].
    pub fn get_graph(&self, params: &QueryParams) -> Result<GraphOutput, ApiError> {
        let query = build_query(&params.entries());
        Ok(self
            .fetch_json(&format!("/graph{query}"))?
            .unwrap_or_default())
    }

    /// `GET /graph/{id}?searchText=&matchWholeWord=`; other filters are ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::MissingId`] before any request when `id` is blank.
    pub fn get_graph_by_id(&self, id: &str, params: &QueryParams) -> Result<GraphOutput, ApiError> {
        let id = require_id(id, "Graph")?;
        let query = build_query(&params.stream_graph_entries());
        Ok(self
            .fetch_json(&format!("/graph/{}{query}", urlencoding::encode(id)))?
            .unwrap_or_default())
    }

    /// `GET /stream/{id}`
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::MissingId`] before any request when `id` is blank.
    pub fn get_stream_metadata(&self, id: &str) -> Result<StreamMetadata, ApiError> {
        let id = require_id(id, "Stream")?;
        self.fetch_required(&format!("/stream/{}", urlencoding::encode(id)))
    }

    /// `GET /membership/verify` carrying only `key`, independent of the held key.
    ///
    /// # Errors
    ///
    /// HTTP 401 maps to [`ApiError::InvalidMembershipKey`]; any other non-2xx maps to
    /// [`ApiError::VerificationFailed`].
    pub fn verify_membership_key(&self, key: &str) -> Result<MembershipInfo, ApiError> {
        let path = "/membership/verify";
        let url = format!("{}{path}", self.base_url);
        let headers = [ACCEPT_JSON, (MEMBERSHIP_HEADER, key)];
        let response = self.transport.get(&url, &headers)?;
        debug!(path, status = response.status, "membership verification response");

        if !response.is_success() {
            if response.status == 401 {
                return Err(ApiError::InvalidMembershipKey);
            }
            return Err(ApiError::VerificationFailed {
                status: response.status,
                status_text: response.status_text,
            });
        }

        serde_json::from_str(&response.body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

fn require_id<'a>(id: &'a str, what: &'static str) -> Result<&'a str, ApiError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(ApiError::MissingId(what))
    } else {
        Ok(trimmed)
    }
}

fn http_error(response: &HttpResponse) -> ApiError {
    let fallback = format!(
        "HTTP error {}: {}",
        response.status, response.status_text
    );
    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.error)
        .filter(|message| !message.is_empty())
        .unwrap_or(fallback);
    ApiError::Http {
        status: response.status,
        message,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockTransport;
    use super::*;

    fn client(transport: &Arc<MockTransport>) -> ApiClient {
        ApiClient::new("http://api.test/base/", transport.clone())
    }

    #[test]
    fn build_query_skips_absent_and_repeats_lists() {
        let params = QueryParams {
            search_text: Some("hello world".to_string()),
            stream_type: vec!["Video".to_string(), "Twitch".to_string()],
            match_whole_word: Some(false),
            ..QueryParams::default()
        };
        assert_eq!(
            build_query(&params.entries()),
            "?searchText=hello%20world&streamType=Video&streamType=Twitch&matchWholeWord=false"
        );
    }

    #[test]
    fn build_query_is_empty_without_values() {
        assert_eq!(build_query(&QueryParams::default().entries()), "");
    }

    #[test]
    fn stream_graph_entries_drop_unrelated_filters() {
        let params = QueryParams {
            search_text: Some("cat".to_string()),
            streamer: Some("someone".to_string()),
            stream_type: vec!["Video".to_string()],
            match_whole_word: Some(true),
            ..QueryParams::default()
        };
        assert_eq!(
            build_query(&params.stream_graph_entries()),
            "?searchText=cat&matchWholeWord=true"
        );
    }

    #[test]
    fn fetch_sends_accept_and_membership_headers() -> Result<(), ApiError> {
        let transport = Arc::new(MockTransport::with(vec![
            (200, "OK", r#"{"result":[]}"#),
            (200, "OK", r#"{"result":[]}"#),
        ]));
        let api = client(&transport);
        api.search_transcripts(&QueryParams::default())?;
        api.set_membership_key(Some(" secret "));
        api.search_transcripts(&QueryParams::default())?;

        assert_eq!(transport.urls()[0], "http://api.test/base/transcripts");
        assert_eq!(
            transport.header(0, "Accept").as_deref(),
            Some("application/json")
        );
        assert_eq!(transport.header(0, MEMBERSHIP_HEADER), None);
        assert_eq!(
            transport.header(1, MEMBERSHIP_HEADER).as_deref(),
            Some("secret")
        );
        Ok(())
    }

    #[test]
    fn blank_membership_key_is_not_sent() -> Result<(), ApiError> {
        let transport = Arc::new(MockTransport::with(vec![(200, "OK", "{}")]));
        let api = client(&transport);
        api.set_membership_key(Some("   "));
        api.get_graph(&QueryParams::default())?;
        assert_eq!(transport.header(0, MEMBERSHIP_HEADER), None);
        Ok(())
    }

    #[test]
    fn http_errors_prefer_server_message() {
        let transport = Arc::new(MockTransport::with(vec![(
            500,
            "Internal Server Error",
            r#"{"error":"database offline"}"#,
        )]));
        let err = client(&transport)
            .search_transcripts(&QueryParams::default())
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "database offline");
    }

    #[test]
    fn http_errors_fall_back_to_status_line() {
        let transport = Arc::new(MockTransport::with(vec![
            (404, "Not Found", "<html>nope</html>"),
            (502, "Bad Gateway", r#"{"error":""}"#),
        ]));
        let api = client(&transport);
        let err = api.get_transcript("abc").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "HTTP error 404: Not Found");

        let err = api.get_graph(&QueryParams::default()).unwrap_err();
        assert_eq!(err.to_string(), "HTTP error 502: Bad Gateway");
    }

    #[test]
    fn no_content_is_distinct_from_empty_object() -> Result<(), ApiError> {
        let transport = Arc::new(MockTransport::with(vec![
            (204, "No Content", ""),
            (200, "OK", "{}"),
            (204, "No Content", ""),
        ]));
        let api = client(&transport);
        let none: Option<serde_json::Value> = api.fetch_json("/anything")?;
        assert!(none.is_none());
        let some: Option<serde_json::Value> = api.fetch_json("/anything")?;
        assert_eq!(some, Some(serde_json::json!({})));
        let err = api.get_stream_metadata("abc").unwrap_err();
        assert!(matches!(err, ApiError::NoContent { .. }));
        Ok(())
    }

    #[test]
    fn missing_ids_fail_without_network() {
        let transport = Arc::new(MockTransport::default());
        let api = client(&transport);
        assert_eq!(
            api.get_transcript(" ").unwrap_err().to_string(),
            "Transcript ID is required"
        );
        assert_eq!(
            api.get_graph_by_id("", &QueryParams::default())
                .unwrap_err()
                .to_string(),
            "Graph ID is required"
        );
        assert!(transport.urls().is_empty());
    }

    #[test]
    fn graph_by_id_uses_path_and_reduced_query() -> Result<(), ApiError> {
        let transport = Arc::new(MockTransport::with(vec![(
            200,
            "OK",
            r#"{"result":[{"x":"00:10:00","y":2}]}"#,
        )]));
        let params = QueryParams {
            search_text: Some("cat".to_string()),
            streamer: Some("ignored".to_string()),
            match_whole_word: Some(false),
            ..QueryParams::default()
        };
        let output = client(&transport).get_graph_by_id("V1", &params)?;
        assert_eq!(output.result.len(), 1);
        assert_eq!(
            transport.urls(),
            vec!["http://api.test/base/graph/V1?searchText=cat&matchWholeWord=false"]
        );
        Ok(())
    }

    #[test]
    fn verify_maps_unauthorized_and_other_failures() {
        let transport = Arc::new(MockTransport::with(vec![
            (401, "Unauthorized", r#"{"error":"bad key"}"#),
            (503, "Service Unavailable", ""),
            (
                200,
                "OK",
                r#"{"channel":"Dokibird","expiresAt":"2030-01-01T00:00:00Z"}"#,
            ),
        ]));
        let api = client(&transport);
        api.set_membership_key(Some("held"));

        let err = api.verify_membership_key("candidate").unwrap_err();
        assert!(matches!(err, ApiError::InvalidMembershipKey));
        assert_eq!(err.to_string(), "Invalid membership key");
        assert_eq!(
            transport.header(0, MEMBERSHIP_HEADER).as_deref(),
            Some("candidate")
        );

        let err = api.verify_membership_key("candidate").unwrap_err();
        assert_eq!(err.to_string(), "Verification failed: Service Unavailable");

        let info = api.verify_membership_key("candidate").unwrap();
        assert_eq!(info.channel, "Dokibird");
        assert_eq!(
            transport.urls()[2],
            "http://api.test/base/membership/verify"
        );
    }

    #[test]
    fn transport_failures_have_no_status() {
        let transport = Arc::new(MockTransport::failing("connection refused"));
        let err = client(&transport)
            .get_graph(&QueryParams::default())
            .unwrap_err();
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("connection refused"));
    }
}
