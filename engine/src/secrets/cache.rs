use crate::secrets::string::SecretString;
use crate::secrets::SecretManager;
use sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An in-memory cache of provider API keys.
///
/// Keys are resolved once through the [`SecretManager`] (environment, then OS
/// keychain) and reused for every request of the process lifetime.
#[derive(Clone)]
pub struct SecretCache {
    manager: Arc<SecretManager>,
    cache: Arc<RwLock<HashMap<String, SecretString>>>,
}

impl SecretCache {
    pub fn new(manager: Arc<SecretManager>) -> Self {
        Self {
            manager,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cache pre-filled with fixed keys, bypassing the manager for those names.
    pub fn with_values(manager: Arc<SecretManager>, values: &[(&str, &str)]) -> Self {
        let cache = Self::new(manager);
        {
            let mut map = cache.cache.write().unwrap_or_else(|e| e.into_inner());
            for (key, value) in values {
                map.insert((*key).to_string(), SecretString::new(*value));
            }
        }
        cache
    }

    /// Retrieves a secret, checking the memory cache first.
    pub fn get_secret(&self, key: &str) -> Result<SecretString, EngineError> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(secret) = cache.get(key) {
                return Ok(secret.clone());
            }
        }

        let secret = SecretString::new(self.manager.get_secret(key)?);

        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(key.to_string(), secret.clone());
        }

        Ok(secret)
    }

    /// True when the key is cached or resolvable without prompting.
    pub fn has_secret(&self, key: &str) -> bool {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if cache.contains_key(key) {
                return true;
            }
        }
        self.manager.has_secret(key)
    }

    /// Scrub secrets from provider error text
    pub fn scrub(&self, text: &str) -> String {
        self.manager.scrub(text)
    }
}
