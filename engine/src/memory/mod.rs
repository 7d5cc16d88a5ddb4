//! Three-tier memory
//!
//! - **Hot** ([`HotMemory`]): one global project context string, persisted to a file.
//! - **Warm** ([`WarmMemory`]): a bounded per-session message queue plus metadata.
//!   Overflow is popped synchronously and handed to the [`Archiver`].
//! - **Cold** ([`DurableStore`]): an append-only archive with keyword search.

pub mod archiver;
pub mod cold;
pub mod hot;
pub mod warm;

pub use archiver::{ArchiveMode, Archiver, Summarizer};
pub use cold::{DurableStore, SqliteFtsStore, UnavailableStore, CHAT_LOGS, CONTEXT_STORE};
pub use hot::HotMemory;
pub use warm::{WarmBackend, WarmMemory};

use serde::{Deserialize, Serialize};

/// One entry of a Warm session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Opaque speaker label ("User", "Cleaner", "Watcher", ...)
    pub role: String,
    pub content: String,
    /// RFC3339 creation time
    pub timestamp: String,
    /// Filled in by the archiver, never by the Warm tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl SessionMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            summary: None,
        }
    }

    pub fn is_user(&self) -> bool {
        is_user_role(&self.role)
    }
}

/// Two-way role classifier: "user" in any case is a human turn, anything else is an agent.
pub fn is_user_role(role: &str) -> bool {
    role.trim().eq_ignore_ascii_case("user")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_user_role() {
        assert!(is_user_role("User"));
        assert!(is_user_role(" user "));
        assert!(is_user_role("USER"));
        assert!(!is_user_role("Cleaner"));
        assert!(!is_user_role("assistant"));
        assert!(!is_user_role(""));
    }

    #[test]
    fn test_summary_is_omitted_until_archived() {
        let msg = SessionMessage::new("User", "load sales.csv");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("summary").is_none());
        assert_eq!(json["role"], "User");

        let parsed: SessionMessage = serde_json::from_value(serde_json::json!({
            "role": "Cleaner",
            "content": "done",
            "timestamp": "2025-01-01T00:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(parsed.summary, None);
    }
}
