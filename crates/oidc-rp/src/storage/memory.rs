//! In-process storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Storage;
use crate::OidcResult;

/// [`Storage`] over a map. Everything is lost when the process exits.
///
/// Only usable with popup interaction, where the page that started the
/// request is still alive when the response arrives.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> OidcResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> OidcResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> OidcResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    fn survives_reload(&self) -> bool {
        false
    }
}
