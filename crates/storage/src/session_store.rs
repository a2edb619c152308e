//! Volatile, session-lifetime key/value storage.
//!
//! Values live only as long as the store itself: a fresh store starts empty,
//! which is what "new browsing session" means for this application.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// String key/value storage scoped to one candidate session.
pub trait SessionStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: String);
    fn remove_item(&self, key: &str);
}

/// Process-lifetime session store.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: String) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
    }

    fn remove_item(&self, key: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
