//! Session types
//!
//! - [`Tokens`]: credentials issued by the auth API
//! - [`Profile`]: last-known user profile
//! - [`Session`]: both together, as persisted by the session store

use crate::identity::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Default tier
    #[default]
    Free,
    /// Paid, limited
    Basic,
    /// Paid, full
    Pro,
}

impl Tier {
    /// Parse a server-reported tier; anything unknown or missing is `Free`
    #[must_use]
    pub fn parse_or_free(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("basic") => Self::Basic,
            Some("pro") => Self::Pro,
            Some("free") | None => Self::Free,
            Some(other) => {
                tracing::warn!(tier = other, "unknown tier, treating as free");
                Self::Free
            }
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials issued by the auth API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
}

// Tokens never show up in logs.
impl fmt::Debug for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("id_token", &"<redacted>")
            .finish()
    }
}

/// Last-known user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Identity,
    pub email: String,
    #[serde(default)]
    pub tier: Tier,
}

impl Profile {
    /// Create a profile
    #[inline]
    #[must_use]
    pub fn new(id: Identity, email: impl Into<String>, tier: Tier) -> Self {
        Self {
            id,
            email: email.into(),
            tier,
        }
    }
}

/// Authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub tokens: Tokens,
    pub profile: Profile,
}
