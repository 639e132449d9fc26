//! Settings, layered from an optional file under `PERIODIC_*` environment
//! variables, and the logging setup that reads them.
//!
//! ```toml
//! [database]
//! path = "periodic.db"
//!
//! [export]
//! workers = 2
//! queue_capacity = 512
//!
//! [log]
//! filter = "periodic_query=debug"
//! ```

use ::config::{Config, Environment, File};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::persist::PersistenceMode;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub export: ExportSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file; the metadata graph lives in memory when absent.
    pub path: Option<String>,
}

impl DatabaseSettings {
    pub fn mode(&self) -> PersistenceMode {
        match &self.path {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 1024,
            max_attempts: 3,
            poll_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { filter: "periodic_query=info".to_string() }
    }
}

impl Settings {
    /// Reads `path` (any format the `config` crate knows) if given, then lets
    /// variables such as `PERIODIC_EXPORT__WORKERS=4` override it.
    pub fn load(path: Option<&str>) -> Result<Settings> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("PERIODIC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured
/// filter; a second call is a no-op.
pub fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
