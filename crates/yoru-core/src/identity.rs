//! Actor identities
//!
//! An [`Identity`] names whoever owns local data right now. Guests are
//! identified by their installation (`device-` / `ephemeral-`), signed-in users
//! by their account (`user-`). Outside the module that minted an identity only
//! the prefix classification below may be relied on.

use crate::error::IdentityParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of installation-derived guest identities
pub const DEVICE_PREFIX: &str = "device-";
/// Prefix of random, non-persistent guest identities
pub const EPHEMERAL_PREFIX: &str = "ephemeral-";
/// Prefix of server-issued account identities
pub const ACCOUNT_PREFIX: &str = "user-";

/// Current actor identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Identity {
    /// Guest bound to a machine fingerprint
    Device(String),
    /// Guest with a random identifier; disposable
    Ephemeral(String),
    /// Authenticated account
    Account(String),
}

impl Identity {
    /// Guest identity for a machine fingerprint
    #[inline]
    #[must_use]
    pub fn device(fingerprint: impl Into<String>) -> Self {
        Self::Device(fingerprint.into())
    }

    /// Fresh random guest identity
    #[must_use]
    pub fn ephemeral() -> Self {
        Self::Ephemeral(Uuid::new_v4().simple().to_string())
    }

    /// Account identity from a server-issued subject.
    ///
    /// Accepts the subject bare (`42`) or already prefixed (`user-42`).
    #[must_use]
    pub fn account(subject: impl AsRef<str>) -> Self {
        let subject = subject.as_ref();
        let body = subject.strip_prefix(ACCOUNT_PREFIX).unwrap_or(subject);
        Self::Account(body.to_string())
    }

    /// True for device and ephemeral identities
    #[inline]
    #[must_use]
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Device(_) | Self::Ephemeral(_))
    }

    /// True only for ephemeral identities
    #[inline]
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral(_))
    }

    /// True only for account identities
    #[inline]
    #[must_use]
    pub fn is_account(&self) -> bool {
        matches!(self, Self::Account(_))
    }

    #[inline]
    fn prefix(&self) -> &'static str {
        match self {
            Self::Device(_) => DEVICE_PREFIX,
            Self::Ephemeral(_) => EPHEMERAL_PREFIX,
            Self::Account(_) => ACCOUNT_PREFIX,
        }
    }

    #[inline]
    fn body(&self) -> &str {
        match self {
            Self::Device(b) | Self::Ephemeral(b) | Self::Account(b) => b,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.body())
    }
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let non_empty = |body: &str| {
            if body.is_empty() {
                Err(IdentityParseError::EmptyBody(s.to_string()))
            } else {
                Ok(body.to_string())
            }
        };

        if let Some(body) = s.strip_prefix(DEVICE_PREFIX) {
            non_empty(body).map(Self::Device)
        } else if let Some(body) = s.strip_prefix(EPHEMERAL_PREFIX) {
            non_empty(body).map(Self::Ephemeral)
        } else if let Some(body) = s.strip_prefix(ACCOUNT_PREFIX) {
            non_empty(body).map(Self::Account)
        } else {
            Err(IdentityParseError::UnknownPrefix(s.to_string()))
        }
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_each_variant() {
        assert_eq!(
            "device-abc123".parse::<Identity>().unwrap(),
            Identity::device("abc123")
        );
        assert!("ephemeral-xyz".parse::<Identity>().unwrap().is_ephemeral());
        assert!("user-42".parse::<Identity>().unwrap().is_account());
    }

    #[test]
    fn parse_rejects_unknown_and_empty() {
        assert!(matches!(
            "guest-1".parse::<Identity>(),
            Err(IdentityParseError::UnknownPrefix(_))
        ));
        assert!(matches!(
            "device-".parse::<Identity>(),
            Err(IdentityParseError::EmptyBody(_))
        ));
    }

    #[test]
    fn account_accepts_prefixed_subject() {
        assert_eq!(Identity::account("user-42"), Identity::account("42"));
        assert_eq!(Identity::account("42").to_string(), "user-42");
    }

    #[test]
    fn ephemeral_is_guest_and_unique() {
        let a = Identity::ephemeral();
        let b = Identity::ephemeral();
        assert!(a.is_guest());
        assert!(a.is_ephemeral());
        assert_ne!(a, b);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&Identity::device("abc")).unwrap();
        assert_eq!(json, "\"device-abc\"");
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Identity::device("abc"));
        assert!(serde_json::from_str::<Identity>("\"nobody\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_classification_follows_prefix(body in "[a-z0-9]{1,24}") {
            let device: Identity = format!("device-{body}").parse().unwrap();
            let ephemeral: Identity = format!("ephemeral-{body}").parse().unwrap();
            let account: Identity = format!("user-{body}").parse().unwrap();

            prop_assert!(device.is_guest() && !device.is_ephemeral());
            prop_assert!(ephemeral.is_guest() && ephemeral.is_ephemeral());
            prop_assert!(!account.is_guest() && account.is_account());
            prop_assert_eq!(account.to_string(), format!("user-{body}"));
        }
    }
}
