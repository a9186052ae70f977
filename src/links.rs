//! URLs derived from a stream id, its type and a `hh:mm:ss` timestamp.

use crate::route::Route;
use crate::timefmt::{self, Timestamp};

pub const DEFAULT_TWITCH_BASE: &str = "https://www.twitch.tv";
pub const DEFAULT_YOUTUBE_BASE: &str = "https://www.youtube.com";

/// The stream type whose media lives on Twitch; everything else is YouTube.
pub const TWITCH_STREAM_TYPE: &str = "Twitch";
pub const MEMBERS_STREAM_TYPE: &str = "Members";

/// Personal-use notice shown alongside members-only content.
pub const MEMBERS_NOTICE: &str =
    "This is members content and should only be used for personal use, never shared.";

/// External and internal URLs for one line of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLinks {
    pub external: String,
    pub internal: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    twitch_base: String,
    youtube_base: String,
}

impl Default for LinkBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TWITCH_BASE, DEFAULT_YOUTUBE_BASE)
    }
}

impl LinkBuilder {
    #[must_use]
    pub fn new(twitch_base: &str, youtube_base: &str) -> Self {
        Self {
            twitch_base: twitch_base.trim_end_matches('/').to_string(),
            youtube_base: youtube_base.trim_end_matches('/').to_string(),
        }
    }

    /// Media URL positioned at `timestamp`.
    ///
    /// Twitch takes `t=1h2m3s`; YouTube takes total seconds.
    #[must_use]
    pub fn external_url(&self, id: &str, stream_type: &str, timestamp: &str) -> String {
        if is_twitch(stream_type) {
            format!(
                "{}/videos/{id}?t={}",
                self.twitch_base,
                twitch_offset(timestamp)
            )
        } else {
            format!(
                "{}/watch?v={id}&t={}s",
                self.youtube_base,
                timefmt::time_to_seconds(timestamp)
            )
        }
    }

    /// Media URL for the whole stream, without an offset.
    #[must_use]
    pub fn stream_url(&self, id: &str, stream_type: &str) -> String {
        if is_twitch(stream_type) {
            format!("{}/videos/{id}", self.twitch_base)
        } else {
            format!("{}/watch?v={id}", self.youtube_base)
        }
    }

    #[must_use]
    pub fn line_links(&self, id: &str, stream_type: &str, timestamp: &str) -> LineLinks {
        LineLinks {
            external: self.external_url(id, stream_type, timestamp),
            internal: internal_url(id, timestamp),
        }
    }
}

#[must_use]
pub fn is_twitch(stream_type: &str) -> bool {
    stream_type == TWITCH_STREAM_TYPE
}

#[must_use]
pub fn is_members(stream_type: &str) -> bool {
    stream_type == MEMBERS_STREAM_TYPE
}

fn twitch_offset(timestamp: &str) -> String {
    if let Some(ts) = Timestamp::parse(timestamp) {
        return format!("{}h{}m{}s", ts.hours, ts.minutes, ts.seconds);
    }
    let mut parts = timestamp.split(':');
    let hours = parts.next().unwrap_or_default();
    let minutes = parts.next().unwrap_or_default();
    let seconds = parts.next().unwrap_or_default();
    format!("{hours}h{minutes}m{seconds}s")
}

/// `/transcript/{id}#T{hh-mm-ss}`, with the id percent-encoded.
#[must_use]
pub fn internal_url(id: &str, timestamp: &str) -> String {
    Route::Transcript {
        id: id.to_string(),
        at: Some(timestamp.to_string()),
    }
    .to_string()
}

/// `01:02:03` becomes `T01-02-03`.
#[must_use]
pub fn encode_fragment(timestamp: &str) -> String {
    format!("T{}", timestamp.replace(':', "-"))
}

/// Decode `#T01-02-03` (leading `#` optional) into `01:02:03`.
///
/// Anything that is not three numeric components yields `None`.
#[must_use]
pub fn decode_fragment(fragment: &str) -> Option<String> {
    let encoded = fragment.strip_prefix('#').unwrap_or(fragment);
    let encoded = encoded.strip_prefix('T')?;
    let decoded = encoded.replace('-', ":");
    Timestamp::parse(&decoded)?;
    Some(decoded)
}
