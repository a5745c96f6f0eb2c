use super::{SessionConfig, SessionError, SessionProvider, SessionStore};
use crate::response::ResponseWriter;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// A session held by [`MemoryProvider`]
#[derive(Debug)]
pub struct MemorySession {
    id: String,
    data: Mutex<HashMap<String, Value>>,
    last_access: Mutex<Instant>,
}

impl MemorySession {
    fn new(id: &str, data: HashMap<String, Value>) -> Self {
        Self {
            id: id.to_string(),
            data: Mutex::new(data),
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn data(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self
            .last_access
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the session was last used
    #[must_use]
    pub fn idle(&self) -> Duration {
        self.last_access
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

impl SessionStore for MemorySession {
    fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.touch();
        self.data().insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.touch();
        self.data().get(key).cloned()
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.touch();
        self.data().remove(key);
        Ok(())
    }

    fn session_id(&self) -> &str {
        &self.id
    }

    fn release(&self, _response: &ResponseWriter) {
        self.touch();
    }

    fn flush(&self) -> Result<(), SessionError> {
        self.data().clear();
        Ok(())
    }
}

/// In-process [`SessionProvider`].
#[derive(Debug, Default)]
pub struct MemoryProvider {
    sessions: DashMap<String, Arc<MemorySession>>,
    max_lifetime_ms: AtomicU64,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn max_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_lifetime_ms.load(Ordering::Relaxed))
    }
}

impl SessionProvider for MemoryProvider {
    fn init(&self, max_lifetime: Duration, _config: &SessionConfig) -> Result<(), SessionError> {
        let ms = u64::try_from(max_lifetime.as_millis()).unwrap_or(u64::MAX);
        self.max_lifetime_ms.store(ms, Ordering::Relaxed);
        Ok(())
    }

    fn read(&self, sid: &str) -> Result<Arc<dyn SessionStore>, SessionError> {
        let session = self
            .sessions
            .entry(sid.to_string())
            .or_insert_with(|| Arc::new(MemorySession::new(sid, HashMap::new())))
            .value()
            .clone();
        session.touch();
        Ok(session)
    }

    fn exists(&self, sid: &str) -> bool {
        self.sessions.contains_key(sid)
    }

    fn regenerate(&self, old_sid: &str, sid: &str) -> Result<Arc<dyn SessionStore>, SessionError> {
        let Some((_, old)) = self.sessions.remove(old_sid) else {
            return self.read(sid);
        };
        let data = std::mem::take(&mut *old.data());
        let session = Arc::new(MemorySession::new(sid, data));
        self.sessions.insert(sid.to_string(), Arc::clone(&session));
        Ok(session)
    }

    fn destroy(&self, sid: &str) -> Result<(), SessionError> {
        self.sessions.remove(sid);
        Ok(())
    }

    fn count(&self) -> usize {
        self.sessions.len()
    }

    fn gc(&self) {
        let max = self.max_lifetime();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.idle() <= max);
        debug!(
            evicted = before.saturating_sub(self.sessions.len()),
            remaining = self.sessions.len(),
            "Session gc pass"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_creates_and_reuses() {
        let provider = MemoryProvider::new();
        let a = provider.read("s1").unwrap();
        a.set("user", json!("ada")).unwrap();
        assert!(provider.exists("s1"));
        let again = provider.read("s1").unwrap();
        assert_eq!(again.get("user"), Some(json!("ada")));
        assert_eq!(provider.count(), 1);
    }

    #[test]
    fn test_regenerate_moves_data() {
        let provider = MemoryProvider::new();
        provider.read("old").unwrap().set("k", json!(1)).unwrap();
        let fresh = provider.regenerate("old", "new").unwrap();
        assert_eq!(fresh.session_id(), "new");
        assert_eq!(fresh.get("k"), Some(json!(1)));
        assert!(!provider.exists("old"));
    }

    #[test]
    fn test_gc_evicts_idle_sessions() {
        let provider = MemoryProvider::new();
        provider
            .init(Duration::from_millis(0), &SessionConfig::default())
            .unwrap();
        provider.read("s1").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        provider.gc();
        assert_eq!(provider.count(), 0);
    }

    #[test]
    fn test_flush_and_delete() {
        let provider = MemoryProvider::new();
        let s = provider.read("s").unwrap();
        s.set("a", json!(1)).unwrap();
        s.set("b", json!(2)).unwrap();
        s.delete("a").unwrap();
        assert_eq!(s.get("a"), None);
        s.flush().unwrap();
        assert_eq!(s.get("b"), None);
    }
}
