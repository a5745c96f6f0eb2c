//! # Environment Module
//!
//! Application-wide state shared by every context: run modes, the configuration
//! store, the capability registry and the optional session manager.
//!
//! ## Configuration File
//!
//! [`AppConfig`] is loaded from YAML:
//!
//! ```yaml
//! mode:
//!   development: false
//!   production: true
//! store:
//!   greeting: hello
//!   features: a,b,c
//! session:
//!   cookie_name: app_session
//!   gc_lifetime_secs: 600
//! ```
//!
//! Every section is optional. Without a `session` section no session manager is
//! installed and the `start` capability returns `null`.

use crate::extension::{builtin, Capability, Extensions};
use crate::runtime_config::RuntimeConfig;
use crate::session::{SessionConfig, SessionError, SessionManager};
use anyhow::Context as _;
use http::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Run-mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modes {
    pub development: bool,
    pub production: bool,
    pub testing: bool,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            development: true,
            production: false,
            testing: false,
        }
    }
}

impl Modes {
    /// Set a flag by name
    pub fn set_mode(&mut self, name: &str, value: bool) -> Result<(), EnvError> {
        match name {
            "development" => self.development = value,
            "production" => self.production = value,
            "testing" => self.testing = value,
            other => {
                return Err(EnvError::UnknownMode {
                    name: other.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// A configured value, flagged when it is a built-in default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreItem {
    pub value: String,
    pub is_default: bool,
}

impl StoreItem {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_default: false,
        }
    }

    #[must_use]
    pub fn default_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            is_default: true,
        }
    }

    /// `true`, `1`, `yes` and `on` (any case) are true
    #[must_use]
    pub fn as_bool(&self) -> bool {
        matches!(
            self.value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        )
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.value.trim().parse().ok()
    }

    /// Comma separated list, entries trimmed, empty entries skipped
    #[must_use]
    pub fn as_list(&self) -> Vec<&str> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Key → value configuration store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    items: BTreeMap<String, StoreItem>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, item: StoreItem) {
        self.items.insert(key.into(), item);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StoreItem> {
        self.items.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Copy in entries from `other` that are neither present here nor defaults
    pub fn merge(&mut self, other: &Store) {
        for (key, item) in &other.items {
            if item.is_default || self.items.contains_key(key) {
                continue;
            }
            self.items.insert(key.clone(), item.clone());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }
}

/// Application configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Modes,
    pub store: BTreeMap<String, String>,
    pub session: Option<SessionConfig>,
}

impl AppConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse application config")
    }

    /// Load and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }
}

/// Hook recording a finished request and its final status
pub type PostProcess = Arc<dyn Fn(&Request<Vec<u8>>, StatusCode) + Send + Sync>;

/// Errors building or changing the environment
#[derive(Debug)]
pub enum EnvError {
    /// The mode name is not one of development, production or testing
    UnknownMode { name: String },
    /// The session manager could not be created
    Session(SessionError),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::UnknownMode { name } => write!(
                f,
                "unknown mode '{name}' (expected development, production or testing)"
            ),
            EnvError::Session(err) => write!(f, "session setup failed: {err}"),
        }
    }
}

impl std::error::Error for EnvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnvError::Session(err) => Some(err),
            EnvError::UnknownMode { .. } => None,
        }
    }
}

impl From<SessionError> for EnvError {
    fn from(err: SessionError) -> Self {
        EnvError::Session(err)
    }
}

/// State shared by every context for the lifetime of the application.
pub struct Env {
    pub modes: Modes,
    pub store: Store,
    pub runtime: RuntimeConfig,
    extensions: Extensions,
    session: Option<Arc<SessionManager>>,
    post_process: Option<PostProcess>,
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("modes", &self.modes)
            .field("store", &self.store)
            .field("runtime", &self.runtime)
            .field("extensions", &self.extensions.names())
            .field("session", &self.session.is_some())
            .field("post_process", &self.post_process.is_some())
            .finish()
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    /// Development mode, empty store, built-in capabilities, no sessions.
    /// Runtime settings come from `BRRTR_*` environment variables.
    #[must_use]
    pub fn new() -> Self {
        let mut extensions = Extensions::new();
        builtin::register(&mut extensions);
        Self {
            modes: Modes::default(),
            store: Store::new(),
            runtime: RuntimeConfig::from_env(),
            extensions,
            session: None,
            post_process: None,
        }
    }

    /// Build from a loaded configuration document
    pub fn from_config(config: AppConfig) -> Result<Self, EnvError> {
        let mut env = Self::new();
        env.modes = config.mode;
        for (key, value) in config.store {
            env.store.set(key, StoreItem::new(value));
        }
        if let Some(session) = config.session {
            env.session = Some(Arc::new(SessionManager::in_memory(session)?));
        }
        Ok(env)
    }

    /// Register (or replace) a capability
    pub fn add_extension(&mut self, name: impl Into<String>, capability: Capability) -> &mut Self {
        self.extensions.add(name, capability);
        self
    }

    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn set_session_manager(&mut self, manager: Arc<SessionManager>) -> &mut Self {
        self.session = Some(manager);
        self
    }

    #[must_use]
    pub fn session_manager(&self) -> Option<&Arc<SessionManager>> {
        self.session.as_ref()
    }

    /// Install the hook run when a context is cancelled for the first time
    pub fn on_post_process<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Request<Vec<u8>>, StatusCode) + Send + Sync + 'static,
    {
        self.post_process = Some(Arc::new(hook));
        self
    }

    pub(crate) fn post_process(&self) -> Option<&PostProcess> {
        self.post_process.as_ref()
    }
}
