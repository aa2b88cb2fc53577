use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::PersistenceError;

/// Key-value persistence that survives restarts (localStorage in the browser).
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

pub fn save_json<T: Serialize>(
    storage: &dyn KeyValueStorage,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_string(value).map_err(|e| PersistenceError::Serialize(e.to_string()))?;
    storage.set(key, &json)
}

pub fn load_json<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    match storage.get(key)? {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupted(e.to_string())),
        None => Ok(None),
    }
}

/// In-process storage. Clones share the same map, which lets a test reopen a queue
/// against what a previous instance persisted.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserLocalStorage;

#[cfg(target_arch = "wasm32")]
mod browser {
    use web_sys::{window, Storage};

    use super::KeyValueStorage;
    use crate::error::PersistenceError;

    /// `window.localStorage`. Quota errors surface as `PersistenceError::Write`.
    #[derive(Clone, Copy, Default)]
    pub struct BrowserLocalStorage;

    impl BrowserLocalStorage {
        fn storage(&self) -> Result<Storage, PersistenceError> {
            window()
                .and_then(|w| w.local_storage().ok())
                .flatten()
                .ok_or(PersistenceError::Unavailable)
        }
    }

    impl KeyValueStorage for BrowserLocalStorage {
        fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            self.storage()?.get_item(key).map_err(|e| PersistenceError::Read {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
        }

        fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
            self.storage()?.set_item(key, value).map_err(|e| PersistenceError::Write {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
        }

        fn remove(&self, key: &str) -> Result<(), PersistenceError> {
            self.storage()?.remove_item(key).map_err(|e| PersistenceError::Write {
                key: key.to_string(),
                reason: format!("{:?}", e),
            })
        }
    }
}
