//! Unit-test doubles local to this crate

use crate::api::{AuthApi, LoginData, RefreshData};
use crate::error::ApiError;
use async_trait::async_trait;
use std::time::Duration;
use yoru_core::Identity;

pub(crate) fn login_data(user_id: &str) -> LoginData {
    LoginData {
        access_token: "access".into(),
        refresh_token: "refresh".into(),
        id_token: "id".into(),
        user_id: user_id.into(),
        email: None,
        tier: None,
        data_claimed: None,
        device_id: None,
    }
}

/// Answers every login the same way, optionally after a delay
pub(crate) struct StubApi {
    login: Result<LoginData, ApiError>,
    delay: Duration,
}

impl StubApi {
    pub(crate) fn accepting(data: LoginData) -> Self {
        Self {
            login: Ok(data),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn rejecting(message: &str) -> Self {
        Self {
            login: Err(ApiError::Rejected(message.into())),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl AuthApi for StubApi {
    async fn register(&self, _email: &str, _password: &str) -> Result<(), ApiError> {
        self.pause().await;
        Ok(())
    }

    async fn verify(&self, _email: &str, _code: &str) -> Result<(), ApiError> {
        self.pause().await;
        Ok(())
    }

    async fn login(&self, _email: &str, _password: &str, _device_id: &Identity) -> Result<LoginData, ApiError> {
        self.pause().await;
        self.login.clone()
    }

    async fn logout(&self, _access_token: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshData, ApiError> {
        Err(ApiError::Rejected("refresh not scripted".into()))
    }
}
