use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Per-request key → value bag.
///
/// Clones share storage, which is how a replica sees the values its parent set.
#[derive(Clone, Debug, Default)]
pub struct DataBag {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl DataBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Store `value`, returning the previous value under `key`
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `other` is backed by the same storage
    #[must_use]
    pub fn shares_storage(&self, other: &DataBag) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_values() {
        let bag = DataBag::new();
        let shared = bag.clone();
        bag.set("user", json!({"id": 7}));
        assert_eq!(shared.get("user"), Some(json!({"id": 7})));
        assert!(bag.shares_storage(&shared));
        assert!(!bag.shares_storage(&DataBag::new()));
    }

    #[test]
    fn test_set_returns_previous() {
        let bag = DataBag::new();
        assert_eq!(bag.set("k", json!(1)), None);
        assert_eq!(bag.set("k", json!(2)), Some(json!(1)));
        assert_eq!(bag.remove("k"), Some(json!(2)));
        assert!(bag.is_empty());
    }
}
