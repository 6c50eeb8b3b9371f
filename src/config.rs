use std::env;

use log::warn;

/// Default number of records committed per restore transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_LOCATOR: &str = "kv.redb";
pub const DEFAULT_PORT: &str = "8000";
pub const DEFAULT_NAMESPACE: &str = "files";

/// Tunables for [`crate::AdminService`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminConfig {
    /// Largest encoded value accepted by `set`/`set_binary`. `None` leaves the
    /// limit to the engine.
    pub max_value_size: Option<usize>,
    /// Records per commit during restore. A restore no larger than this is atomic.
    pub batch_size: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            max_value_size: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl AdminConfig {
    /// Reads `KVADMIN_MAX_VALUE_SIZE` and `KVADMIN_BATCH_SIZE`, keeping defaults
    /// for unset or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = parse_var("KVADMIN_MAX_VALUE_SIZE") {
            config.max_value_size = Some(size);
        }
        if let Some(size) = parse_var("KVADMIN_BATCH_SIZE") {
            if size == 0 {
                warn!("KVADMIN_BATCH_SIZE must be positive, using {}", DEFAULT_BATCH_SIZE);
            } else {
                config.batch_size = size;
            }
        }
        config
    }
}

/// Settings for the file server daemon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub locator: String,
    pub port: String,
    pub namespace: String,
}

impl ServerConfig {
    /// Resolves each setting from the explicit argument, then the environment, then the default.
    pub fn resolve(locator: Option<String>, port: Option<String>, namespace: Option<String>) -> Self {
        Self {
            locator: locator
                .or_else(|| env::var("KVADMIN_STORE").ok())
                .unwrap_or_else(|| DEFAULT_LOCATOR.to_string()),
            port: port
                .or_else(|| env::var("KVADMIN_PORT").ok())
                .unwrap_or_else(|| DEFAULT_PORT.to_string()),
            namespace: namespace
                .or_else(|| env::var("KVADMIN_NAMESPACE").ok())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        }
    }
}

fn parse_var(name: &str) -> Option<usize> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}
