//! Helpers shared by unit and integration tests.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, PoisonError};

use crate::api::{ApiError, HttpResponse, Transport};
use crate::config::{CONFIG_DIR_ENV, DATA_DIR_ENV};

/// Serializes tests that touch process-wide environment variables.
pub static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Scoped environment variable; the previous value comes back on drop.
///
/// Hold [`ENV_LOCK`] for as long as any instance is alive.
#[derive(Debug)]
pub struct EnvOverride {
    key: String,
    original: Option<OsString>,
}

impl EnvOverride {
    #[must_use]
    pub fn set_var(key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        let key = key.into();
        let original = std::env::var_os(&key);
        // SAFETY: callers hold ENV_LOCK.
        unsafe {
            std::env::set_var(&key, value);
        }
        Self { key, original }
    }

    #[must_use]
    pub fn set_path(key: impl Into<String>, path: &Path) -> Self {
        Self::set_var(key, path.as_os_str())
    }

    #[must_use]
    pub fn remove(key: impl Into<String>) -> Self {
        let key = key.into();
        let original = std::env::var_os(&key);
        // SAFETY: callers hold ENV_LOCK.
        unsafe {
            std::env::remove_var(&key);
        }
        Self { key, original }
    }
}

impl Drop for EnvOverride {
    fn drop(&mut self) {
        // SAFETY: callers hold ENV_LOCK.
        unsafe {
            match &self.original {
                Some(value) => std::env::set_var(&self.key, value),
                None => std::env::remove_var(&self.key),
            }
        }
    }
}

/// Config and data directories under one temp root, exported through
/// `ATX_CONFIG_DIR` / `ATX_DATA_DIR` while the sandbox lives. The root is
/// removed on drop.
#[derive(Debug)]
pub struct Sandbox {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    _env: [EnvOverride; 2],
}

impl Sandbox {
    /// # Errors
    ///
    /// Returns an error when the directories cannot be created.
    pub fn new() -> std::io::Result<Self> {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let root = std::env::temp_dir().join(format!(
            "atx-sandbox-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        std::fs::create_dir_all(&config_dir)?;
        std::fs::create_dir_all(&data_dir)?;
        let env = [
            EnvOverride::set_path(CONFIG_DIR_ENV, &config_dir),
            EnvOverride::set_path(DATA_DIR_ENV, &data_dir),
        ];
        Ok(Self {
            root,
            config_dir,
            data_dir,
            _env: env,
        })
    }

    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn write_config(&self, contents: &str) -> std::io::Result<()> {
        std::fs::write(self.config_dir.join("config.toml"), contents)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Answers requests whose URL contains a registered fragment; anything else
/// gets a 404 with a JSON error body. Every URL is recorded.
#[derive(Debug, Default)]
pub struct StubTransport {
    routes: Vec<(String, HttpResponse)>,
    failures: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<String>>,
}

impl StubTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to URLs containing `fragment`. Earlier routes win.
    #[must_use]
    pub fn route(mut self, fragment: &str, status: u16, body: &str) -> Self {
        self.routes.push((
            fragment.to_string(),
            HttpResponse {
                status,
                status_text: status_text(status).to_string(),
                body: body.to_string(),
            },
        ));
        self
    }

    /// Fail the next request at the connection level.
    #[must_use]
    pub fn fail_next(self, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(message.to_string());
        self
    }

    #[must_use]
    pub fn seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for StubTransport {
    fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        if let Some(message) = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Err(ApiError::Transport(message));
        }
        let found = self
            .routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone());
        Ok(found.unwrap_or_else(|| HttpResponse {
            status: 404,
            status_text: status_text(404).to_string(),
            body: r#"{"error":"Not found"}"#.to_string(),
        }))
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// Render a filesystem path so it can be embedded inside a TOML basic string.
#[must_use]
pub fn toml_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}
