//! Background session writer
//!
//! Requests are queued to a dedicated task which retries each write. A write
//! that still fails is logged and published as
//! [`Notification::SessionSaveFailed`]; callers that must know the outcome use
//! [`SessionWriter::write`], which waits for it.

use crate::store::{SessionStore, PROFILE_KEY, TOKENS_KEY};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use yoru_core::{Notification, NotificationBus, Profile, StoreError, Tokens};

/// Queue depth
const QUEUE_DEPTH: usize = 32;

/// Writer errors
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// Task has stopped; nothing more will be written
    #[error("session writer closed")]
    Closed,

    /// Write was attempted and gave up after retries
    #[error("session write failed: {0}")]
    Failed(#[source] StoreError),
}

/// A queued write
#[derive(Debug, Clone)]
pub enum SaveRequest {
    Tokens(Tokens),
    Profile(Profile),
    Clear,
}

impl SaveRequest {
    fn key(&self) -> &'static str {
        match self {
            Self::Tokens(_) => TOKENS_KEY,
            Self::Profile(_) => PROFILE_KEY,
            Self::Clear => "auth.*",
        }
    }
}

/// Retry policy for background writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

struct Job {
    request: SaveRequest,
    ack: Option<oneshot::Sender<Result<(), StoreError>>>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("key", &self.request.key())
            .field("acknowledged", &self.ack.is_some())
            .finish()
    }
}

/// Handle to the background writer task
#[derive(Debug)]
pub struct SessionWriter {
    tx: mpsc::Sender<Job>,
    task: JoinHandle<()>,
}

impl SessionWriter {
    /// Spawn the writer task on the current runtime
    #[must_use]
    pub fn spawn(store: SessionStore, policy: RetryPolicy, bus: NotificationBus) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let task = tokio::spawn(writer_task(store, policy, bus, rx));
        Self { tx, task }
    }

    /// Queue a write without waiting for it
    ///
    /// # Errors
    /// - `WriterError::Closed` if the task is gone
    pub async fn submit(&self, request: SaveRequest) -> Result<(), WriterError> {
        self.send(Job { request, ack: None }).await
    }

    /// Queue a write behind any pending ones and wait until it has landed
    ///
    /// # Errors
    /// - `WriterError::Closed` if the task is gone
    /// - `WriterError::Failed` if every attempt failed
    pub async fn write(&self, request: SaveRequest) -> Result<(), WriterError> {
        let (ack, done) = oneshot::channel();
        self.send(Job {
            request,
            ack: Some(ack),
        })
        .await?;
        done.await
            .map_err(|_| WriterError::Closed)?
            .map_err(WriterError::Failed)
    }

    /// Stop accepting writes and wait for queued ones to finish
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "session writer task panicked");
        }
    }

    async fn send(&self, job: Job) -> Result<(), WriterError> {
        self.tx.send(job).await.map_err(|_| WriterError::Closed)
    }
}

/// Writer loop (runs in its own tokio task)
async fn writer_task(
    store: SessionStore,
    policy: RetryPolicy,
    bus: NotificationBus,
    mut rx: mpsc::Receiver<Job>,
) {
    while let Some(Job { request, ack }) = rx.recv().await {
        let key = request.key();
        let attempts = policy.attempts.max(1);
        let mut outcome = Ok(());

        for attempt in 1..=attempts {
            outcome = apply(&store, &request).await;
            match &outcome {
                Ok(()) => {
                    tracing::debug!(key, attempt, "background session write done");
                    break;
                }
                Err(e) => {
                    tracing::warn!(key, attempt, error = %e, "background session write failed");
                    if attempt < attempts {
                        tokio::time::sleep(policy.backoff).await;
                    }
                }
            }
        }

        if let Err(e) = &outcome {
            tracing::error!(key, attempts, error = %e, "giving up on session write");
            bus.publish(Notification::SessionSaveFailed {
                key: key.to_string(),
                error: e.to_string(),
            });
        }
        if let Some(ack) = ack {
            // Waiter may have gone away; the outcome is already logged
            let _ = ack.send(outcome);
        }
    }
    tracing::debug!("session writer stopped");
}

async fn apply(store: &SessionStore, request: &SaveRequest) -> Result<(), StoreError> {
    match request {
        SaveRequest::Tokens(tokens) => store.save_tokens(tokens).await,
        SaveRequest::Profile(profile) => store.save_profile(profile).await,
        SaveRequest::Clear => store.clear().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use yoru_core::testing::FlakyStore;

    fn tokens() -> Tokens {
        Tokens {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            id_token: "it".into(),
        }
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_until_write_lands() {
        let kv = Arc::new(FlakyStore::new());
        kv.fail_next(2);
        let store = SessionStore::new(kv);
        let writer = SessionWriter::spawn(store.clone(), quick(), NotificationBus::default());

        writer.submit(SaveRequest::Tokens(tokens())).await.unwrap();
        writer.shutdown().await;

        assert_eq!(store.load_tokens().await, Some(tokens()));
    }

    #[tokio::test]
    async fn exhausted_retries_are_published() {
        let kv = Arc::new(FlakyStore::new());
        kv.fail_writes(true);
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();
        let writer = SessionWriter::spawn(SessionStore::new(kv), quick(), bus);

        writer.submit(SaveRequest::Tokens(tokens())).await.unwrap();
        writer.shutdown().await;

        match rx.recv().await.unwrap() {
            Notification::SessionSaveFailed { key, error } => {
                assert_eq!(key, TOKENS_KEY);
                assert!(error.contains("injected write failure"));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_waits_for_the_outcome() {
        let kv = Arc::new(FlakyStore::new());
        let store = SessionStore::new(kv.clone());
        let writer = SessionWriter::spawn(store.clone(), quick(), NotificationBus::default());

        writer.write(SaveRequest::Tokens(tokens())).await.unwrap();
        assert_eq!(store.load_tokens().await, Some(tokens()));

        kv.fail_key(TOKENS_KEY);
        let err = writer.write(SaveRequest::Tokens(tokens())).await.unwrap_err();
        assert!(matches!(err, WriterError::Failed(StoreError::Backend(_))));
        writer.shutdown().await;
    }
}
