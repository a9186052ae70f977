use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use itertools::Itertools;
use schemars::{JsonSchema, Schema, generate::SchemaGenerator, json_schema};
use serde::Deserialize;
use serde::de::{self, Deserializer};
use shellexpand::full;
use std::borrow::Cow;
use std::path::PathBuf;
use toml::Value;

use crate::highlight::HighlightMode;
use crate::links::{DEFAULT_TWITCH_BASE, DEFAULT_YOUTUBE_BASE};

pub const DEFAULT_BASE_URL: &str = "https://transcript.example.net/api";
pub const DEFAULT_CONTEXT_LIMIT: usize = 50;
pub const DEFAULT_MAINTENANCE_TITLE: &str =
    "Archived Transcript is currently down for maintenance.";

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub highlight: HighlightConfig,
    pub links: LinksConfig,
    pub filters: FilterConfig,
    pub maintenance: MaintenanceConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Server-side cap on context lines per search result.
    pub context_limit: usize,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct HighlightConfig {
    pub mode: HighlightMode,
}

#[derive(Debug, Clone)]
pub struct LinksConfig {
    pub twitch_base: String,
    pub youtube_base: String,
}

/// Choices offered by the interactive filter form.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub streamers: Vec<String>,
    pub stream_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub settings_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ConfigDiagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                context_limit: DEFAULT_CONTEXT_LIMIT,
                user_agent: None,
            },
            highlight: HighlightConfig {
                mode: HighlightMode::Pattern,
            },
            links: RawLinks::default().into_links(),
            filters: RawFilters::default().into_filters(),
            maintenance: MaintenanceConfig {
                enabled: false,
                message: None,
            },
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration [`Value`] into a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error when the input TOML cannot be decoded into the strongly
    /// typed configuration.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawConfig = value
            .clone()
            .try_into()
            .map_err(|err: toml::de::Error| eyre!("failed to decode configuration: {err}"))?;
        raw.into_config()
    }

    /// JSON schema describing the accepted configuration file.
    #[must_use]
    pub fn json_schema() -> Schema {
        schemars::schema_for!(RawConfig)
    }

    #[must_use]
    pub fn lint(&self) -> Vec<ConfigDiagnostic> {
        let mut diags = Vec::new();

        if !is_http_url(&self.api.base_url) {
            diags.push(ConfigDiagnostic {
                level: DiagnosticLevel::Error,
                message: format!(
                    "api.base_url '{}' must start with http:// or https://",
                    self.api.base_url
                ),
            });
        }

        if self.api.context_limit == 0 {
            diags.push(ConfigDiagnostic {
                level: DiagnosticLevel::Warning,
                message: "api.context_limit is 0; truncated results will never be flagged"
                    .to_string(),
            });
        }

        for (key, value) in [
            ("links.twitch_base", &self.links.twitch_base),
            ("links.youtube_base", &self.links.youtube_base),
        ] {
            if !is_http_url(value) {
                diags.push(ConfigDiagnostic {
                    level: DiagnosticLevel::Warning,
                    message: format!("{key} '{value}' does not look like an http(s) URL"),
                });
            }
        }

        for (key, values) in [
            ("filters.streamers", &self.filters.streamers),
            ("filters.stream_types", &self.filters.stream_types),
        ] {
            diags.extend(values.iter().duplicates().map(|value| ConfigDiagnostic {
                level: DiagnosticLevel::Warning,
                message: format!("{key} lists '{value}' more than once"),
            }));
        }

        if self.maintenance.enabled && self.maintenance.message.is_none() {
            diags.push(ConfigDiagnostic {
                level: DiagnosticLevel::Warning,
                message: "maintenance is enabled without a message".to_string(),
            });
        }

        diags
    }
}

fn is_http_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

#[derive(Debug, Deserialize, Default, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    #[serde(default)]
    api: RawApi,
    #[serde(default)]
    highlight: RawHighlight,
    #[serde(default)]
    links: RawLinks,
    #[serde(default)]
    filters: RawFilters,
    #[serde(default)]
    maintenance: RawMaintenance,
    #[serde(default)]
    store: RawStore,
}

impl RawConfig {
    fn into_config(self) -> Result<Config> {
        Ok(Config {
            api: self.api.into_api()?,
            highlight: HighlightConfig {
                mode: self.highlight.mode.into_mode(),
            },
            links: self.links.into_links(),
            filters: self.filters.into_filters(),
            maintenance: self.maintenance.into_maintenance(),
            store: self.store.into_store()?,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawApi {
    #[serde(default = "RawApi::default_base_url")]
    #[schemars(description = "Base URL of the transcript API, without a trailing slash.")]
    base_url: String,
    #[serde(default = "RawApi::default_context_limit")]
    #[schemars(
        description = "Maximum context lines the server returns per stream; reaching it marks results as possibly truncated."
    )]
    context_limit: usize,
    #[serde(default)]
    user_agent: Option<String>,
}

impl Default for RawApi {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            context_limit: Self::default_context_limit(),
            user_agent: None,
        }
    }
}

impl RawApi {
    fn default_base_url() -> String {
        DEFAULT_BASE_URL.to_string()
    }

    fn default_context_limit() -> usize {
        DEFAULT_CONTEXT_LIMIT
    }

    fn into_api(self) -> Result<ApiConfig> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(eyre!("api.base_url must not be empty"));
        }
        Ok(ApiConfig {
            base_url,
            context_limit: self.context_limit,
            user_agent: self
                .user_agent
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RawHighlightMode {
    #[default]
    Pattern,
    Literal,
}

impl RawHighlightMode {
    fn into_mode(self) -> HighlightMode {
        match self {
            RawHighlightMode::Pattern => HighlightMode::Pattern,
            RawHighlightMode::Literal => HighlightMode::Literal,
        }
    }

    fn parse_token(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "" | "pattern" | "regex" => Some(Self::Pattern),
            "literal" | "plain" => Some(Self::Literal),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for RawHighlightMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.trim();
        RawHighlightMode::parse_token(trimmed)
            .ok_or_else(|| de::Error::unknown_variant(trimmed, &["pattern", "literal"]))
    }
}

impl JsonSchema for RawHighlightMode {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("RawHighlightMode")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "string",
            "enum": ["pattern", "literal"],
            "default": "pattern",
            "description": "How search terms are matched when highlighting. 'pattern' treats the term as a regular expression; 'literal' escapes it."
        })
    }
}

#[derive(Debug, Deserialize, Default, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawHighlight {
    #[serde(default)]
    mode: RawHighlightMode,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawLinks {
    #[serde(default = "RawLinks::default_twitch")]
    twitch_base: String,
    #[serde(default = "RawLinks::default_youtube")]
    youtube_base: String,
}

impl Default for RawLinks {
    fn default() -> Self {
        Self {
            twitch_base: Self::default_twitch(),
            youtube_base: Self::default_youtube(),
        }
    }
}

impl RawLinks {
    fn default_twitch() -> String {
        DEFAULT_TWITCH_BASE.to_string()
    }

    fn default_youtube() -> String {
        DEFAULT_YOUTUBE_BASE.to_string()
    }

    fn into_links(self) -> LinksConfig {
        LinksConfig {
            twitch_base: self.twitch_base.trim().trim_end_matches('/').to_string(),
            youtube_base: self.youtube_base.trim().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawFilters {
    #[serde(default = "RawFilters::default_streamers")]
    streamers: Vec<String>,
    #[serde(default = "RawFilters::default_stream_types")]
    stream_types: Vec<String>,
}

impl Default for RawFilters {
    fn default() -> Self {
        Self {
            streamers: Self::default_streamers(),
            stream_types: Self::default_stream_types(),
        }
    }
}

impl RawFilters {
    fn default_streamers() -> Vec<String> {
        ["Dokibird", "MintFantome"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn default_stream_types() -> Vec<String> {
        ["Video", "Stream", "Twitch", "TwitchVod", "External", "Members"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn into_filters(self) -> FilterConfig {
        let clean = |values: Vec<String>| {
            values
                .into_iter()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect()
        };
        FilterConfig {
            streamers: clean(self.streamers),
            stream_types: clean(self.stream_types),
        }
    }
}

#[derive(Debug, Deserialize, Default, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawMaintenance {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    #[schemars(description = "Shown beneath the maintenance notice. May span several lines.")]
    message: Option<String>,
}

impl RawMaintenance {
    fn into_maintenance(self) -> MaintenanceConfig {
        MaintenanceConfig {
            enabled: self.enabled,
            message: self
                .message
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize, Default, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawStore {
    #[serde(default)]
    #[schemars(
        description = "Override for the persisted settings file. `~` and environment variables are expanded."
    )]
    settings_file: Option<String>,
}

impl RawStore {
    fn into_store(self) -> Result<StoreConfig> {
        let settings_file = match self.settings_file {
            Some(raw) if !raw.trim().is_empty() => Some(expand_path(raw.trim())?),
            _ => None,
        };
        Ok(StoreConfig { settings_file })
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = full(raw)
        .with_context(|| format!("failed to expand path '{raw}': environment variable missing"))?;
    Ok(PathBuf::from(expanded.into_owned()))
}
