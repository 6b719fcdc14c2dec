//! Domain types shared by the store, the remote client and the delivery pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A monitored repository, identified by its `owner/repo` pair.
///
/// Serialized with the `owner`/`repo` field names used in configuration
/// files and snapshot files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Repository owner (user or organisation).
    #[serde(rename = "owner")]
    pub namespace: String,
    /// Repository name.
    #[serde(rename = "repo")]
    pub name: String,
}

impl EntityKey {
    /// Create a key from its two parts.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Stable string usable as a storage key: `owner_repo`, with each part
    /// percent-encoded outside `[A-Za-z0-9.-]`. The `_` separator is always
    /// encoded inside a part, so distinct keys never collide and cannot
    /// escape a directory.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", encode_part(&self.namespace), encode_part(&self.name))
    }
}

fn encode_part(part: &str) -> String {
    let mut encoded = String::with_capacity(part.len());
    for byte in part.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One stargazer of a repository.
///
/// Equality and hashing consider `id` only; the handle and timestamp are
/// payload carried along for notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Stable numeric identity assigned by the upstream.
    pub id: u64,
    /// Display handle (login).
    pub login: String,
    /// When the membership was observed (the star time when the upstream
    /// reports one).
    pub observed_at: DateTime<Utc>,
}

impl Member {
    /// Create a member observed now.
    pub fn new(id: u64, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            observed_at: Utc::now(),
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Remaining call budget reported by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    /// Calls allowed per window.
    pub limit: u64,
    /// Calls left in the current window.
    pub remaining: u64,
    /// When the window resets.
    pub reset_at: DateTime<Utc>,
}
