//! Query filters shared by the search and graph screens, plus the persisted UI
//! settings.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::{MembershipInfo, QueryParams};

pub const SETTINGS_FILE_NAME: &str = "live-transcript-settings.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write settings to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize settings")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid {field} `{value}` (expected one of: {expected})")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: String,
    },
}

macro_rules! settings_enum {
    ($name:ident, $field:literal, $default:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(StoreError::InvalidValue {
                        field: $field,
                        value: s.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|value| value.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                }
            }
        }
    };
}

settings_enum!(Theme, "theme", System, {
    Light => "light",
    System => "system",
    Dark => "dark",
});

settings_enum!(Density, "density", Standard, {
    Compact => "compact",
    Standard => "standard",
    Comfortable => "comfortable",
});

impl Theme {
    /// Whether the dark palette applies. `System` reads a `COLORFGBG` value such as
    /// `15;0`, whose last field is the background colour index.
    #[must_use]
    pub fn is_dark(self, colorfgbg: Option<&str>) -> bool {
        match self {
            Theme::Light => false,
            Theme::Dark => true,
            Theme::System => colorfgbg
                .and_then(|value| value.rsplit(';').next())
                .and_then(|bg| bg.trim().parse::<u8>().ok())
                .is_none_or(|bg| !(bg == 7 || bg >= 9)),
        }
    }
}

impl Density {
    /// Blank rows inserted between list entries.
    #[must_use]
    pub fn spacing(self) -> u16 {
        match self {
            Density::Compact | Density::Standard => 0,
            Density::Comfortable => 1,
        }
    }

    /// Whether each row carries a secondary detail line.
    #[must_use]
    pub fn shows_details(self) -> bool {
        !matches!(self, Density::Compact)
    }
}

/// The persisted subset of UI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub density: Density,
    pub sidebar_open: bool,
    pub membership_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            density: Density::default(),
            sidebar_open: true,
            membership_key: String::new(),
        }
    }
}

/// Current search / graph filters. Session-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    pub search_text: String,
    pub stream_title: String,
    pub streamer: String,
    pub from_date: String,
    pub to_date: String,
    pub stream_type: Vec<String>,
    pub match_whole_word: bool,
}

impl QueryState {
    /// Request parameters for the current filters. Empty text fields are omitted.
    #[must_use]
    pub fn snapshot(&self) -> QueryParams {
        let present = |value: &str| (!value.is_empty()).then(|| value.to_string());
        QueryParams {
            search_text: present(&self.search_text),
            stream_title: present(&self.stream_title),
            streamer: present(&self.streamer),
            from_date: present(&self.from_date),
            to_date: present(&self.to_date),
            stream_type: self.stream_type.clone(),
            match_whole_word: Some(self.match_whole_word),
        }
    }

    /// Add `tag` when absent, remove it when present.
    pub fn toggle_stream_type(&mut self, tag: &str) {
        if let Some(idx) = self.stream_type.iter().position(|t| t == tag) {
            self.stream_type.remove(idx);
        } else {
            self.stream_type.push(tag.to_string());
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Owned state container handed to every screen by reference.
///
/// Query fields are plain data; every settings mutation goes through a setter
/// that persists the [`Settings`] subset immediately.
#[derive(Debug, Default)]
pub struct Store {
    pub query: QueryState,
    settings: Settings,
    membership_info: Option<MembershipInfo>,
    path: Option<PathBuf>,
}

impl Store {
    /// An unpersisted store, used by tests and one-shot commands.
    #[must_use]
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Load settings from `path`. Missing or unreadable files give defaults.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = read_settings(&path);
        Self {
            query: QueryState::default(),
            settings,
            membership_info: None,
            path: Some(path),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn membership_key(&self) -> Option<&str> {
        Some(self.settings.membership_key.as_str()).filter(|key| !key.is_empty())
    }

    #[must_use]
    pub fn membership_info(&self) -> Option<&MembershipInfo> {
        self.membership_info.as_ref()
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] when the settings file cannot be written.
    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StoreError> {
        self.settings.theme = theme;
        self.persist()
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] when the settings file cannot be written.
    pub fn set_density(&mut self, density: Density) -> Result<(), StoreError> {
        self.settings.density = density;
        self.persist()
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] when the settings file cannot be written.
    pub fn set_sidebar_open(&mut self, open: bool) -> Result<(), StoreError> {
        self.settings.sidebar_open = open;
        self.persist()
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] when the settings file cannot be written.
    pub fn set_membership_key(&mut self, key: &str) -> Result<(), StoreError> {
        self.settings.membership_key = key.trim().to_string();
        self.persist()
    }

    /// Session-only; never written to disk.
    pub fn set_membership_info(&mut self, info: Option<MembershipInfo>) {
        self.membership_info = info;
    }

    /// Store a verified key together with its info.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the settings file cannot be written.
    pub fn accept_membership(&mut self, key: &str, info: MembershipInfo) -> Result<(), StoreError> {
        self.membership_info = Some(info);
        self.set_membership_key(key)
    }

    /// Remove both the key and its info.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the settings file cannot be written.
    pub fn clear_membership(&mut self) -> Result<(), StoreError> {
        self.membership_info = None;
        self.set_membership_key("")
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.settings)?;
        write_atomic(path, json.as_bytes()).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "persisted settings");
        Ok(())
    }
}

fn read_settings(path: &Path) -> Settings {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Settings::default(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read settings; using defaults");
            return Settings::default();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "ignoring corrupt settings file");
        Settings::default()
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_omits_empty_fields() {
        let mut query = QueryState {
            search_text: "cat".to_string(),
            ..QueryState::default()
        };
        query.toggle_stream_type("Video");
        query.toggle_stream_type("Twitch");
        query.toggle_stream_type("Video");
        let params = query.snapshot();
        assert_eq!(params.search_text.as_deref(), Some("cat"));
        assert_eq!(params.streamer, None);
        assert_eq!(params.from_date, None);
        assert_eq!(params.stream_type, vec!["Twitch".to_string()]);
        assert_eq!(params.match_whole_word, Some(false));
    }

    #[test]
    fn every_mutation_persists_and_reloads() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);
        let mut store = Store::load(&path);
        assert_eq!(store.settings(), &Settings::default());

        store.set_theme(Theme::Dark)?;
        store.set_density(Density::Compact)?;
        store.set_sidebar_open(false)?;
        store.set_membership_key("  abc  ")?;
        store.query.search_text = "not persisted".to_string();

        let reloaded = Store::load(&path);
        assert_eq!(reloaded.settings().theme, Theme::Dark);
        assert_eq!(reloaded.settings().density, Density::Compact);
        assert!(!reloaded.settings().sidebar_open);
        assert_eq!(reloaded.membership_key(), Some("abc"));
        assert!(reloaded.query.search_text.is_empty());

        let raw = fs::read_to_string(&path)?;
        assert!(raw.contains("\"sidebarOpen\": false"));
        Ok(())
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "{not json")?;
        assert_eq!(Store::load(&path).settings(), &Settings::default());

        fs::write(&path, r#"{"theme":"light"}"#)?;
        let store = Store::load(&path);
        assert_eq!(store.settings().theme, Theme::Light);
        assert!(store.settings().sidebar_open);
        Ok(())
    }

    #[test]
    fn membership_info_is_session_only() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join(SETTINGS_FILE_NAME);
        let mut store = Store::load(&path);
        store.accept_membership(
            "key",
            MembershipInfo {
                channel: "chan".to_string(),
                expires_at: "2030-01-01T00:00:00Z".to_string(),
            },
        )?;
        assert!(store.membership_info().is_some());
        let reloaded = Store::load(&path);
        assert_eq!(reloaded.membership_key(), Some("key"));
        assert!(reloaded.membership_info().is_none());

        store.clear_membership()?;
        assert_eq!(Store::load(&path).membership_key(), None);
        Ok(())
    }

    #[test]
    fn enums_parse_and_reject() {
        assert_eq!("DARK".parse::<Theme>().ok(), Some(Theme::Dark));
        assert_eq!("comfortable".parse::<Density>().ok(), Some(Density::Comfortable));
        let err = "loud".parse::<Theme>().unwrap_err();
        assert!(err.to_string().contains("light, system, dark"));
    }

    #[test]
    fn system_theme_follows_colorfgbg() {
        assert!(Theme::System.is_dark(None));
        assert!(Theme::System.is_dark(Some("15;0")));
        assert!(!Theme::System.is_dark(Some("0;15")));
        assert!(!Theme::System.is_dark(Some("0;default;7")));
        assert!(!Theme::Light.is_dark(Some("15;0")));
    }
}
