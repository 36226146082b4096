//! Remote auth API seam
//!
//! [`AuthApi`] is what the auth service talks to. [`HttpAuthApi`](crate::HttpAuthApi)
//! is the production implementation; tests substitute a scripted fake.

use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use yoru_core::{Identity, Tier, Tokens};

/// Successful login payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    /// Account subject, bare (`42`) or prefixed (`user-42`)
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    /// Guest records the server reassigned to this account
    #[serde(default)]
    pub data_claimed: Option<u64>,
    /// Guest identity the server claimed from
    #[serde(default)]
    pub device_id: Option<String>,
}

impl LoginData {
    #[must_use]
    pub fn tokens(&self) -> Tokens {
        Tokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            id_token: self.id_token.clone(),
        }
    }

    #[must_use]
    pub fn tier(&self) -> Tier {
        Tier::parse_or_free(self.tier.as_deref())
    }

    /// Claimed guest identity reported by the server, if it parses as a guest id
    #[must_use]
    pub fn claimed_from(&self) -> Option<Identity> {
        let raw = self.device_id.as_deref()?;
        match raw.parse::<Identity>() {
            Ok(identity) if identity.is_guest() => Some(identity),
            Ok(identity) => {
                tracing::warn!(%identity, "server reported a non-guest claim source");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "server reported an unparseable claim source");
                None
            }
        }
    }
}

/// Successful refresh payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshData {
    pub access_token: String,
    /// Omitted when the server keeps the existing refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub id_token: String,
}

impl RefreshData {
    /// New token set, keeping `previous` refresh token when none was issued
    #[must_use]
    pub fn merge_into(self, previous: &Tokens) -> Tokens {
        Tokens {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .unwrap_or_else(|| previous.refresh_token.clone()),
            id_token: self.id_token,
        }
    }
}

/// Remote auth endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn register(&self, email: &str, password: &str) -> Result<(), ApiError>;

    async fn verify(&self, email: &str, code: &str) -> Result<(), ApiError>;

    /// Sign in; `device_id` lets the server claim this guest's records
    async fn login(
        &self,
        email: &str,
        password: &str,
        device_id: &Identity,
    ) -> Result<LoginData, ApiError>;

    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshData, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_data_from_wire() {
        let data: LoginData = serde_json::from_str(
            r#"{"accessToken":"a","refreshToken":"r","idToken":"i","userId":"42",
                "tier":"pro","dataClaimed":5,"deviceId":"device-abc123"}"#,
        )
        .unwrap();
        assert_eq!(data.tier(), Tier::Pro);
        assert_eq!(data.data_claimed, Some(5));
        assert_eq!(data.claimed_from(), Some(Identity::device("abc123")));
        assert!(data.email.is_none());
    }

    #[test]
    fn claim_source_must_be_guest() {
        let mut data: LoginData = serde_json::from_str(
            r#"{"accessToken":"a","refreshToken":"r","idToken":"i","userId":"42"}"#,
        )
        .unwrap();
        assert_eq!(data.claimed_from(), None);
        data.device_id = Some("user-9".into());
        assert_eq!(data.claimed_from(), None);
        data.device_id = Some("garbage".into());
        assert_eq!(data.claimed_from(), None);
    }

    #[test]
    fn refresh_keeps_old_refresh_token() {
        let previous = Tokens {
            access_token: "a0".into(),
            refresh_token: "r0".into(),
            id_token: "i0".into(),
        };
        let fresh = RefreshData {
            access_token: "a1".into(),
            refresh_token: None,
            id_token: "i1".into(),
        }
        .merge_into(&previous);
        assert_eq!(fresh.refresh_token, "r0");
        assert_eq!(fresh.access_token, "a1");
    }
}
