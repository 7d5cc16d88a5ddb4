pub mod cache;
pub mod string;

pub use cache::SecretCache;
pub use string::SecretString;

use keyring::Entry;
use regex::Regex;
use sdk::errors::EngineError;
use std::sync::OnceLock;

/// SecretManager resolves provider API keys.
///
/// Lookup order for a key such as `GROQ_API_KEY`:
/// 1. the environment variable of that name
/// 2. the OS keychain entry `<service>/<key lowercased>`
///
/// Resolution never prompts. `analyst key <provider>` stores a key in the
/// keychain through [`SecretManager::prompt_and_store`].
///
/// The SecretManager also scrubs key material from text before it is logged.
pub struct SecretManager {
    service_name: String,
}

static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Patterns for the key formats of the supported providers.
fn get_secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        [
            // Groq
            r"gsk_[a-zA-Z0-9]{20,}",
            // OpenRouter and other OpenAI-style keys
            r"sk-[a-zA-Z0-9\-_]{20,}",
            // Cerebras
            r"csk-[a-zA-Z0-9]{20,}",
            // Google API keys
            r"AIza[0-9A-Za-z\-_]{35}",
            // Keys passed as a query parameter
            r"key=[0-9A-Za-z\-_]{20,}",
            r"Bearer\s+[^\s]{20,}",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

impl SecretManager {
    /// Creates a new SecretManager with the given keychain service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Resolve a key from the environment or the OS keychain.
    ///
    /// # Errors
    /// Returns `EngineError::KeyringError` when the key is in neither place.
    pub fn get_secret(&self, key: &str) -> Result<String, EngineError> {
        if let Ok(value) = std::env::var(key) {
            if !value.trim().is_empty() {
                tracing::debug!("Resolved secret '{}' from environment", key);
                return Ok(value);
            }
        }

        let entry = self.entry(key)?;
        match entry.get_password() {
            Ok(secret) => {
                tracing::debug!("Retrieved secret '{}' from keychain", key);
                Ok(secret)
            }
            Err(keyring::Error::NoEntry) => Err(EngineError::KeyringError(format!(
                "Secret '{}' is not set. Export it or run `analyst key <provider>`",
                key
            ))),
            Err(e) => Err(EngineError::KeyringError(format!(
                "Failed to retrieve secret '{}': {}",
                key, e
            ))),
        }
    }

    /// Stores a secret in the OS keychain.
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), EngineError> {
        self.entry(key)?.set_password(value).map_err(|e| {
            EngineError::KeyringError(format!("Failed to store secret '{}': {}", key, e))
        })?;

        tracing::info!("Stored secret '{}' in keychain", key);
        Ok(())
    }

    /// Deletes a secret from the OS keychain.
    pub fn delete_secret(&self, key: &str) -> Result<(), EngineError> {
        self.entry(key)?.delete_password().map_err(|e| {
            EngineError::KeyringError(format!("Failed to delete secret '{}': {}", key, e))
        })?;

        tracing::info!("Deleted secret '{}' from keychain", key);
        Ok(())
    }

    /// True when the key resolves from the environment or the keychain.
    pub fn has_secret(&self, key: &str) -> bool {
        if std::env::var(key).map(|v| !v.trim().is_empty()).unwrap_or(false) {
            return true;
        }
        match Entry::new(&self.service_name, &key.to_lowercase()) {
            Ok(entry) => entry.get_password().is_ok(),
            Err(_) => false,
        }
    }

    /// Prompt on the terminal without echo and store the value in the keychain.
    pub fn prompt_and_store(&self, key: &str) -> Result<(), EngineError> {
        let input = rpassword::prompt_password_stderr(&format!("Enter value for '{}': ", key))
            .map_err(|e| EngineError::KeyringError(format!("Failed to read input: {}", e)))?;

        let secret = input.trim();
        if secret.is_empty() {
            return Err(EngineError::KeyringError(
                "Secret cannot be empty".to_string(),
            ));
        }

        self.set_secret(key, secret)
    }

    /// Scrubs key material from text by replacing it with [REDACTED].
    ///
    /// # Examples
    /// ```
    /// use analyst_engine::secrets::SecretManager;
    ///
    /// let manager = SecretManager::new("test");
    /// let scrubbed = manager.scrub("401 for gsk_1234567890abcdefghijklmn");
    /// assert_eq!(scrubbed, "401 for [REDACTED]");
    /// ```
    pub fn scrub(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in get_secret_patterns() {
            result = pattern.replace_all(&result, "[REDACTED]").to_string();
        }
        result
    }

    fn entry(&self, key: &str) -> Result<Entry, EngineError> {
        Entry::new(&self.service_name, &key.to_lowercase()).map_err(|e| {
            EngineError::KeyringError(format!("Failed to create keyring entry: {}", e))
        })
    }
}
