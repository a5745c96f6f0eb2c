use super::cookie::{expired_cookie, request_cookie, session_cookie};
use super::{MemoryProvider, SessionConfig, SessionError, SessionProvider, SessionStore};
use crate::response::ResponseWriter;
use http::header::{HeaderValue, SET_COOKIE};
use http::Request;
use may::coroutine::JoinHandle;
use sha2::{Digest, Sha256};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Starts, regenerates and destroys sessions keyed off the session cookie.
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    config: SessionConfig,
    sequence: AtomicU64,
}

impl SessionManager {
    /// Create a manager over `provider`, normalising the config first.
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        mut config: SessionConfig,
    ) -> Result<Self, SessionError> {
        if config.max_lifetime_secs == 0 {
            config.max_lifetime_secs = config.gc_lifetime_secs;
        }
        if config.session_id_length == 0 {
            config.session_id_length = SessionConfig::default().session_id_length;
        }
        provider.init(Duration::from_secs(config.max_lifetime_secs), &config)?;
        info!(
            cookie_name = %config.cookie_name,
            max_lifetime_secs = config.max_lifetime_secs,
            "Session manager initialised"
        );
        Ok(Self {
            provider,
            config,
            sequence: AtomicU64::new(0),
        })
    }

    /// Manager backed by a [`MemoryProvider`]
    pub fn in_memory(config: SessionConfig) -> Result<Self, SessionError> {
        Self::new(Arc::new(MemoryProvider::new()), config)
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Session for this request.
    ///
    /// Reuses the session named by the request cookie when the provider knows it;
    /// otherwise creates a new one and stages its cookie on `response`.
    pub fn start<B>(
        &self,
        request: &Request<B>,
        response: &ResponseWriter,
    ) -> Result<Arc<dyn SessionStore>, SessionError> {
        let cookie = request_cookie(request.headers(), &self.config.cookie_name)
            .filter(|value| !value.is_empty());

        if let Some(raw) = cookie {
            let sid = urlencoding::decode(raw).map_err(|e| SessionError::InvalidCookie {
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
            if self.provider.exists(&sid) {
                debug!(session_id = %sid, "Existing session resumed");
                return self.provider.read(&sid);
            }
        }

        let sid = self.generate_id();
        let session = self.provider.read(&sid)?;
        self.stage_cookie(response, &session_cookie(&self.config, &sid))?;
        debug!(session_id = %sid, "New session started");
        Ok(session)
    }

    /// Destroy the session named by the request cookie and expire the cookie.
    pub fn destroy<B>(
        &self,
        request: &Request<B>,
        response: &ResponseWriter,
    ) -> Result<(), SessionError> {
        let Some(raw) = request_cookie(request.headers(), &self.config.cookie_name)
            .filter(|value| !value.is_empty())
        else {
            return Ok(());
        };
        let sid = urlencoding::decode(raw).map_err(|e| SessionError::InvalidCookie {
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
        self.provider.destroy(&sid)?;
        self.stage_cookie(response, &expired_cookie(&self.config))
    }

    /// Issue a new id for the request's session, keeping its data.
    pub fn regenerate_id<B>(
        &self,
        request: &Request<B>,
        response: &ResponseWriter,
    ) -> Result<Arc<dyn SessionStore>, SessionError> {
        let sid = self.generate_id();
        let session = match request_cookie(request.headers(), &self.config.cookie_name)
            .filter(|value| !value.is_empty())
        {
            Some(raw) => {
                let old = urlencoding::decode(raw).map_err(|e| SessionError::InvalidCookie {
                    value: raw.to_string(),
                    reason: e.to_string(),
                })?;
                self.provider.regenerate(&old, &sid)?
            }
            None => self.provider.read(&sid)?,
        };
        self.stage_cookie(response, &session_cookie(&self.config, &sid))?;
        Ok(session)
    }

    /// Session by id
    pub fn session(&self, sid: &str) -> Result<Arc<dyn SessionStore>, SessionError> {
        self.provider.read(sid)
    }

    /// Number of live sessions
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.provider.count()
    }

    /// Run one garbage collection pass
    pub fn gc(&self) {
        self.provider.gc();
    }

    /// Collect garbage every `gc_lifetime_secs` on a coroutine until the manager drops.
    #[allow(unsafe_code)]
    pub fn spawn_gc(self: &Arc<Self>, stack_size: usize) -> io::Result<JoinHandle<()>> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let interval = Duration::from_secs(self.config.gc_lifetime_secs.max(1));
        // SAFETY: may::coroutine::Builder::spawn() is unsafe because of the runtime's
        // requirements on coroutine bodies. The closure owns only a Weak handle and
        // never blocks an OS thread.
        unsafe {
            may::coroutine::Builder::new()
                .name("session-gc".to_string())
                .stack_size(stack_size)
                .spawn(move || loop {
                    may::coroutine::sleep(interval);
                    let Some(manager) = manager.upgrade() else {
                        debug!("Session manager dropped - gc coroutine exiting");
                        break;
                    };
                    manager.gc();
                })
        }
    }

    fn stage_cookie(&self, response: &ResponseWriter, cookie: &str) -> Result<(), SessionError> {
        if !self.config.enable_set_cookie {
            return Ok(());
        }
        let value = HeaderValue::from_str(cookie).map_err(|e| SessionError::InvalidCookie {
            value: cookie.to_string(),
            reason: e.to_string(),
        })?;
        response.append_header(SET_COOKIE, value);
        Ok(())
    }

    /// Hex id of `session_id_length` bytes, drawn from SHA-256 over fresh ULIDs.
    fn generate_id(&self) -> String {
        let wanted = self.config.session_id_length;
        let mut sid = String::with_capacity(wanted * 2);
        let mut produced = 0;
        while produced < wanted {
            let mut hasher = Sha256::new();
            hasher.update(ulid::Ulid::new().to_bytes());
            hasher.update(self.sequence.fetch_add(1, Ordering::Relaxed).to_le_bytes());
            let digest = hasher.finalize();
            for byte in digest.iter().take(wanted - produced) {
                sid.push(char::from(HEX[usize::from(byte >> 4)]));
                sid.push(char::from(HEX[usize::from(byte & 0x0f)]));
                produced += 1;
            }
        }
        sid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_hex_and_sized() {
        let manager = SessionManager::in_memory(SessionConfig {
            session_id_length: 40,
            ..SessionConfig::default()
        })
        .unwrap();
        let a = manager.generate_id();
        let b = manager.generate_id();
        assert_eq!(a.len(), 80);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_config_normalised() {
        let manager = SessionManager::in_memory(SessionConfig {
            gc_lifetime_secs: 120,
            max_lifetime_secs: 0,
            session_id_length: 0,
            ..SessionConfig::default()
        })
        .unwrap();
        assert_eq!(manager.config().max_lifetime_secs, 120);
        assert_eq!(manager.config().session_id_length, 16);
    }
}
