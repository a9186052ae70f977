use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::{Context, eyre};
use directories::ProjectDirs;
use toml::Value;
use tracing::debug;

mod merge;
pub mod model;

pub use model::{Config, ConfigDiagnostic, DiagnosticLevel};

use crate::store::SETTINGS_FILE_NAME;

const MAIN_CONFIG: &str = "config.toml";
const DROPIN_DIR: &str = "conf.d";
const APP_NAME: &str = "atx";

pub const CONFIG_DIR_ENV: &str = "ATX_CONFIG_DIR";
pub const DATA_DIR_ENV: &str = "ATX_DATA_DIR";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub merged: Value,
    pub directories: AppDirectories,
    pub sources: Vec<ConfigSource>,
    pub diagnostics: Vec<ConfigDiagnostic>,
}

impl LoadedConfig {
    /// Where the persisted settings live: `[store] settings_file` when set,
    /// otherwise inside the data directory.
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config
            .store
            .settings_file
            .clone()
            .unwrap_or_else(|| self.directories.data_dir.join(SETTINGS_FILE_NAME))
    }
}

#[derive(Debug, Clone)]
pub struct AppDirectories {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppDirectories {
    /// Create the configuration and data directories if they are missing.
    ///
    /// # Errors
    ///
    /// Returns an error when any directory cannot be created or is otherwise
    /// inaccessible.
    pub fn ensure_all(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create directory {}", dir.display()))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceKind {
    Main,
    DropIn,
}

impl ConfigSourceKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ConfigSourceKind::Main => "main",
            ConfigSourceKind::DropIn => "drop-in",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: PathBuf,
}

/// Load and merge configuration files into a [`LoadedConfig`].
///
/// A missing configuration directory is not an error; every key has a default.
///
/// # Errors
///
/// Returns an error if any configuration file cannot be read, parsed, or merged
/// according to the schema.
pub fn load(dir_override: Option<&Path>) -> Result<LoadedConfig> {
    let dirs = resolve_directories(dir_override)?;
    dirs.ensure_all()?;

    let sources = gather_sources(&dirs.config_dir)?;
    let mut merged_table = toml::map::Map::new();

    for source in &sources {
        let contents = fs::read_to_string(&source.path)
            .with_context(|| format!("failed to read {}", source.path.display()))?;
        let value: Value = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", source.path.display()))?;
        let table = value.as_table().cloned().ok_or_else(|| {
            eyre!(
                "{} must contain a TOML table at the top level",
                source.path.display()
            )
        })?;
        merge::merge_tables(&mut merged_table, table, Some(&source.path))?;
        debug!(path = %source.path.display(), kind = source.kind.label(), "merged config source");
    }

    let merged_value = Value::Table(merged_table);
    let config = Config::from_value(&merged_value)?;
    let diagnostics = config.lint();

    Ok(LoadedConfig {
        config,
        merged: merged_value,
        directories: dirs,
        sources,
        diagnostics,
    })
}

fn resolve_directories(dir_override: Option<&Path>) -> Result<AppDirectories> {
    let project_dirs = ProjectDirs::from("", "", APP_NAME);
    let fallback = |pick: fn(&ProjectDirs) -> &Path| {
        project_dirs
            .as_ref()
            .map(|dirs| pick(dirs).to_path_buf())
            .ok_or_else(|| eyre!("unable to resolve platform directories for {APP_NAME}"))
    };

    let config_dir = match dir_override
        .map(PathBuf::from)
        .or_else(|| env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))
    {
        Some(dir) => dir,
        None => fallback(ProjectDirs::config_dir)?,
    };

    let data_dir = match env::var_os(DATA_DIR_ENV).map(PathBuf::from) {
        Some(dir) => dir,
        None => fallback(ProjectDirs::data_dir)?,
    };

    Ok(AppDirectories {
        config_dir,
        data_dir,
    })
}

fn gather_sources(root: &Path) -> Result<Vec<ConfigSource>> {
    let mut sources = Vec::new();

    if root.is_file() {
        sources.push(ConfigSource {
            kind: ConfigSourceKind::Main,
            path: root.to_path_buf(),
        });
        return Ok(sources);
    }

    if !root.exists() {
        return Ok(vec![]);
    }

    let main = root.join(MAIN_CONFIG);
    if main.is_file() {
        sources.push(ConfigSource {
            kind: ConfigSourceKind::Main,
            path: main,
        });
    }

    let conf_d = root.join(DROPIN_DIR);
    if conf_d.is_dir() {
        sources.extend(
            read_toml_files(&conf_d)?
                .into_iter()
                .map(|path| ConfigSource {
                    kind: ConfigSourceKind::DropIn,
                    path,
                }),
        );
    }

    Ok(sources)
}

/// `*.toml` files directly inside `dir`, sorted by path.
fn read_toml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
