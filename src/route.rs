use std::fmt;
use std::str::FromStr;

use crate::links;

/// In-app navigation target, written the same way as the web client's paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Search,
    Graph,
    StreamGraph {
        id: String,
    },
    /// `at` holds a decoded `hh:mm:ss` deep-link target. A malformed fragment
    /// parses as `None` rather than failing.
    Transcript {
        id: String,
        at: Option<String>,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown route `{0}`")]
    Unknown(String),
    #[error("route `{0}` is missing an id")]
    MissingId(String),
}

impl Route {
    /// Parse a path such as `/transcript/abc#T00-01-02`.
    ///
    /// Absolute URLs are accepted; their scheme, host and query are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for paths outside the routing surface.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let trimmed = raw.trim();
        let without_origin = strip_origin(trimmed);
        let (path, fragment) = match without_origin.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (without_origin, None),
        };
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let decode_id = |segment: &str| {
            urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |id| id.into_owned())
        };

        match segments.as_slice() {
            [] => Ok(Route::Home),
            ["search"] => Ok(Route::Search),
            ["graph"] => Ok(Route::Graph),
            ["graph", id] => Ok(Route::StreamGraph { id: decode_id(id) }),
            ["transcript", id] => Ok(Route::Transcript {
                id: decode_id(id),
                at: fragment.and_then(links::decode_fragment),
            }),
            ["transcript"] => Err(RouteError::MissingId(trimmed.to_string())),
            _ => Err(RouteError::Unknown(trimmed.to_string())),
        }
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::Search => "Search",
            Route::Graph => "Graph",
            Route::StreamGraph { .. } => "Stream graph",
            Route::Transcript { .. } => "Transcript",
        }
    }
}

fn strip_origin(raw: &str) -> &str {
    let Some((_, rest)) = raw.split_once("://") else {
        return raw;
    };
    rest.find('/').map_or("/", |idx| &rest[idx..])
}

impl FromStr for Route {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::parse(s)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => f.write_str("/"),
            Route::Search => f.write_str("/search"),
            Route::Graph => f.write_str("/graph"),
            Route::StreamGraph { id } => write!(f, "/graph/{}", urlencoding::encode(id)),
            Route::Transcript { id, at: None } => {
                write!(f, "/transcript/{}", urlencoding::encode(id))
            }
            Route::Transcript { id, at: Some(at) } => write!(
                f,
                "/transcript/{}#{}",
                urlencoding::encode(id),
                links::encode_fragment(at)
            ),
        }
    }
}
