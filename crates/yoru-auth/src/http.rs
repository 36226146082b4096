//! HTTP/JSON client for the remote auth API
//!
//! Every endpoint is `POST <base_url>/auth/<name>` with a JSON body and
//! answers with the envelope `{ ok, data?, error? }`. A non-`ok` envelope is a
//! rejection carrying the server's message; anything that does not decode as an
//! envelope is a transport failure.

use crate::api::{AuthApi, LoginData, RefreshData};
use crate::error::ApiError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use yoru_core::{AuthConfig, Identity};

/// Response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// Remote auth API over HTTP
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// Client for `config.base_url`, with the configured request timeout
    ///
    /// # Errors
    /// - `ApiError::Transport` if the HTTP client cannot be built
    pub fn new(config: &AuthConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Use a preconfigured client
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call<B, T>(&self, endpoint: &str, body: &B, bearer: Option<&str>) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/auth/{endpoint}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::debug!(endpoint, error = %e, "auth request failed to send");
            ApiError::Transport(e.to_string())
        })?;
        let status = response.status();

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            tracing::debug!(endpoint, %status, error = %e, "auth response is not an envelope");
            ApiError::Transport(format!("unexpected response ({status})"))
        })?;

        if envelope.ok {
            Ok(envelope.data)
        } else {
            let message = envelope
                .error
                .unwrap_or_else(|| format!("request failed ({status})"));
            tracing::debug!(endpoint, %status, %message, "auth request rejected");
            Err(ApiError::Rejected(message))
        }
    }

    async fn call_for<B, T>(&self, endpoint: &str, body: &B, bearer: Option<&str>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.call(endpoint, body, bearer)
            .await?
            .ok_or_else(|| ApiError::Transport(format!("{endpoint}: response has no data")))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        self.call::<_, serde_json::Value>("register", &json!({ "email": email, "password": password }), None)
            .await
            .map(drop)
    }

    async fn verify(&self, email: &str, code: &str) -> Result<(), ApiError> {
        self.call::<_, serde_json::Value>("verify", &json!({ "email": email, "code": code }), None)
            .await
            .map(drop)
    }

    async fn login(&self, email: &str, password: &str, device_id: &Identity) -> Result<LoginData, ApiError> {
        let body = json!({
            "email": email,
            "password": password,
            "deviceId": device_id.to_string(),
        });
        self.call_for("login", &body, None).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.call::<_, serde_json::Value>("logout", &json!({}), Some(access_token))
            .await
            .map(drop)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshData, ApiError> {
        self.call_for("refresh", &json!({ "refreshToken": refresh_token }), None)
            .await
    }
}
