use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// One line of a full transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// `hh:mm:ss` offset from the start of the stream.
    pub start: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptOutput {
    pub streamer: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub stream_type: String,
    pub stream_title: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transcript_lines: Vec<TranscriptLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub streamer: String,
    pub date: String,
    pub stream_type: String,
    pub stream_title: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// A matching line inside a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContext {
    pub start_time: String,
    pub line: String,
}

/// Per-stream search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSearch {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub streamer: String,
    pub date: String,
    pub stream_type: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<SearchContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSearchOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Vec<TranscriptSearch>,
}

/// `x` is `YYYY-MM-DD` for the multi-stream graph and `hh:mm:ss` for a single stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDataPoint {
    pub x: String,
    pub y: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub result: Vec<GraphDataPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipInfo {
    pub channel: String,
    /// ISO-8601 timestamp.
    pub expires_at: String,
}

impl MembershipInfo {
    /// Evaluated at call time, never cached.
    #[must_use]
    pub fn is_expired(&self, now: time::OffsetDateTime) -> bool {
        crate::timefmt::is_expired(&self.expires_at, now)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        serde_json::Value::Number(value) => Ok(value.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number identifier, found {other}"
        ))),
    }
}
