use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};

use crate::engine::{MemEngine, RedbEngine};
use crate::{Error, KvEngine, Result};

/// Where a store lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    /// A fresh in-process store, discarded when the handle is dropped.
    Memory,
    /// A redb database file, created when missing.
    Path(PathBuf),
}

impl Locator {
    pub const MEMORY: &'static str = ":memory:";
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Err(Error::Initialization("empty store locator".to_string())),
            Self::MEMORY => Ok(Locator::Memory),
            path => Ok(Locator::Path(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Memory => f.write_str(Self::MEMORY),
            Locator::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Owns the connection to one engine instance.
///
/// A handle is either opened at construction with [`StoreHandle::open`] or
/// created empty with [`StoreHandle::new`] and initialized later. Only the
/// first successful initialization takes effect.
#[derive(Clone, Default)]
pub struct StoreHandle {
    engine: Option<Arc<dyn KvEngine>>,
    locator: Option<Locator>,
}

impl StoreHandle {
    /// An unopened handle. Every operation fails with [`Error::NotInitialized`] until
    /// [`StoreHandle::initialize`] succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or creates) the store at `locator`.
    pub async fn open(locator: &Locator) -> Result<Self> {
        let mut handle = Self::new();
        handle.initialize(locator).await?;
        Ok(handle)
    }

    /// Wraps an already constructed engine.
    pub fn from_engine(engine: Arc<dyn KvEngine>) -> Self {
        Self {
            engine: Some(engine),
            locator: None,
        }
    }

    /// Opens the engine if the handle has none yet. Later calls keep the
    /// existing engine and only log a warning.
    pub async fn initialize(&mut self, locator: &Locator) -> Result<()> {
        if self.engine.is_some() {
            warn!("Store already initialized; ignoring open of {}", locator);
            return Ok(());
        }

        let engine: Arc<dyn KvEngine> = match locator {
            Locator::Memory => Arc::new(MemEngine::new()),
            Locator::Path(path) => Arc::new(RedbEngine::open(path).await?),
        };
        info!("Opened store {}", locator);
        self.engine = Some(engine);
        self.locator = Some(locator.clone());
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// The locator this handle was opened from, if it was opened by locator.
    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    /// Returns the engine, or [`Error::NotInitialized`] if the handle was never opened.
    pub fn ensure_ready(&self) -> Result<&Arc<dyn KvEngine>> {
        self.engine.as_ref().ok_or(Error::NotInitialized)
    }
}
