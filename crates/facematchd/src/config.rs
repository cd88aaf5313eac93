use facematch_core::DEFAULT_TOLERANCE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "/etc/facematch/facematchd.toml";
const DEFAULT_EMBEDDING_DIM: usize = 128;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

impl BusKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "session" => Some(Self::Session),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Optional settings read from the TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    pub tolerance: Option<f64>,
    pub embedding_dim: Option<usize>,
    pub embedder_command: Option<Vec<String>>,
    pub bus: Option<BusKind>,
}

impl FileConfig {
    /// Read `path`; a missing file yields the empty config.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Daemon configuration: config file, then `FACEMATCH_*` environment overrides.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Default maximum distance for a positive match.
    pub tolerance: f64,
    /// Required embedding length; `None` disables the check.
    pub embedding_dim: Option<usize>,
    /// External embedder program and its arguments.
    pub embedder_command: Option<Vec<String>>,
    pub bus: BusKind,
}

impl Config {
    /// Load from `FACEMATCH_CONFIG` (or the default path) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("FACEMATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = FileConfig::read(&path)?;
        Ok(Self::from_sources(file, |key| std::env::var(key).ok()))
    }

    /// Merge file settings with variables from `env`, falling back to defaults.
    pub fn from_sources(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = env("FACEMATCH_DB_PATH")
            .map(PathBuf::from)
            .or(file.db_path)
            .unwrap_or_else(|| default_data_dir(&env).join("identities.db"));

        let tolerance = parse_env(&env, "FACEMATCH_TOLERANCE")
            .filter(|&t| usable_tolerance("FACEMATCH_TOLERANCE", t))
            .or(file.tolerance.filter(|&t| usable_tolerance("tolerance", t)))
            .unwrap_or(DEFAULT_TOLERANCE);

        let embedding_dim = parse_env(&env, "FACEMATCH_EMBEDDING_DIM")
            .or(file.embedding_dim)
            .unwrap_or(DEFAULT_EMBEDDING_DIM);

        let embedder_command = env("FACEMATCH_EMBEDDER_CMD")
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .or(file.embedder_command)
            .filter(|argv| !argv.is_empty());

        let bus = env("FACEMATCH_BUS")
            .and_then(|v| BusKind::parse(&v))
            .or(file.bus)
            .unwrap_or_default();

        Self {
            db_path,
            tolerance,
            embedding_dim: (embedding_dim > 0).then_some(embedding_dim),
            embedder_command,
            bus,
        }
    }
}

fn default_data_dir(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    env("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facematch")
}

/// A tolerance must be a finite positive distance.
fn usable_tolerance(key: &str, value: f64) -> bool {
    let ok = value.is_finite() && value > 0.0;
    if !ok {
        tracing::warn!(key, value, "ignoring tolerance that must be a finite positive number");
    }
    ok
}

fn parse_env<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
