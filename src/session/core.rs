use crate::response::ResponseWriter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Data for one session, addressed by its id.
pub trait SessionStore: Send + Sync {
    /// Store `value` under `key`
    fn set(&self, key: &str, value: Value) -> Result<(), SessionError>;
    /// Value under `key`
    fn get(&self, key: &str) -> Option<Value>;
    /// Remove `key`
    fn delete(&self, key: &str) -> Result<(), SessionError>;
    /// Id of this session
    fn session_id(&self) -> &str;
    /// Persist and let go of the session at the end of a request
    fn release(&self, response: &ResponseWriter);
    /// Remove every key
    fn flush(&self) -> Result<(), SessionError>;
}

/// Storage backend holding every session.
pub trait SessionProvider: Send + Sync {
    /// Called once when the manager is created
    fn init(&self, max_lifetime: Duration, config: &SessionConfig) -> Result<(), SessionError>;
    /// Session for `sid`, created empty if it does not exist
    fn read(&self, sid: &str) -> Result<Arc<dyn SessionStore>, SessionError>;
    fn exists(&self, sid: &str) -> bool;
    /// Move the data of `old_sid` to `sid`
    fn regenerate(&self, old_sid: &str, sid: &str) -> Result<Arc<dyn SessionStore>, SessionError>;
    fn destroy(&self, sid: &str) -> Result<(), SessionError>;
    /// Number of live sessions
    fn count(&self) -> usize;
    /// Drop sessions idle longer than the max lifetime
    fn gc(&self);
}

/// Session manager settings, the `session` section of the application config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub enable_set_cookie: bool,
    /// Seconds between garbage collection passes
    pub gc_lifetime_secs: u64,
    /// Idle seconds before a session is collected (0: same as `gc_lifetime_secs`)
    pub max_lifetime_secs: u64,
    pub secure: bool,
    /// `Max-Age` of the session cookie; omitted when unset
    pub cookie_lifetime_secs: Option<u64>,
    pub domain: Option<String>,
    /// Random bytes in a generated session id (hex encoded, so twice as many chars)
    pub session_id_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "brrtcore_session".to_string(),
            enable_set_cookie: true,
            gc_lifetime_secs: 3600,
            max_lifetime_secs: 0,
            secure: false,
            cookie_lifetime_secs: None,
            domain: None,
            session_id_length: 16,
        }
    }
}

/// Session failures
#[derive(Debug)]
pub enum SessionError {
    /// The session cookie could not be decoded or encoded
    InvalidCookie {
        value: String,
        reason: String,
    },
    /// The provider could not complete the operation
    Provider(anyhow::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidCookie { value, reason } => {
                write!(f, "invalid session cookie '{value}': {reason}")
            }
            SessionError::Provider(err) => write!(f, "session provider error: {err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Provider(err) => Some(err.as_ref()),
            SessionError::InvalidCookie { .. } => None,
        }
    }
}
