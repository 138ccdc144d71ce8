use super::{validate_key, KeyValueStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory store. Clones share the same entries, which lets a test drop an
/// engine and build a new one over the "same disk".
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("memory store poisoned: {}", e)))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_key(key)?;
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let mut a = MemoryStore::new();
        let b = a.clone();
        a.set("touchcontroller_config", "enabled = true").unwrap();
        assert_eq!(
            b.get("touchcontroller_config").unwrap().as_deref(),
            Some("enabled = true")
        );
        assert_eq!(b.len(), 1);
    }
}
