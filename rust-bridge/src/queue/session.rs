//! Broker session lifecycle management.
//!
//! A [`Session`] is one open connection plus one open channel, bound to the
//! durable queue. The [`SessionManager`] is the only component that creates
//! or closes sessions; the publisher and the consumer loop borrow them and
//! ask the manager for a fresh one when `is_usable` turns false.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use lapin::{
    options::QueueDeclareOptions, types::FieldTable, Channel, Connection, ConnectionProperties,
};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ConnectError;

/// Default number of connect attempts before giving up.
const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

/// Default delay between connect attempts.
const DEFAULT_CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fixed-delay retry budget for connection establishment.
///
/// The delay is injectable so tests can run the retry loop without real
/// sleeps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CONNECT_ATTEMPTS,
            delay: DEFAULT_CONNECT_RETRY_DELAY,
        }
    }
}

/// An open connection + channel pair scoped to one durable queue.
///
/// Owned by the [`SessionManager`]; other components only borrow it.
pub struct Session {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl Session {
    /// Whether the session can be used for publish/consume right now.
    ///
    /// True iff both the connection and the channel still report connected.
    /// Cheap and infallible; callers use it as a precondition check.
    pub fn is_usable(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    /// Name of the queue this session is bound to.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub(crate) fn channel(&self) -> &Channel {
        &self.channel
    }
}

/// Creates, checks, and closes broker sessions.
///
/// The single reconnection authority: components that find their session
/// unusable come back here for a new one instead of reconnecting themselves.
pub struct SessionManager {
    url: String,
    queue: String,
    retry: RetryPolicy,
}

impl SessionManager {
    pub fn new(url: impl Into<String>, queue: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
            retry,
        }
    }

    /// Establish a session: open a connection and a channel, declare the
    /// durable queue, and return the usable pair.
    ///
    /// Retries up to the policy's attempt budget with a fixed delay between
    /// attempts. When the budget is spent, returns
    /// [`ConnectError::AttemptsExhausted`] carrying the last broker error;
    /// the caller decides whether that is fatal. The returned future is
    /// cancel-safe: dropping it (e.g. from `tokio::select!`) abandons the
    /// attempt cycle.
    pub async fn connect(&self) -> Result<Session, ConnectError> {
        with_retry(&self.retry, |attempt| {
            info!(
                attempt,
                max_attempts = self.retry.max_attempts(),
                queue = %self.queue,
                "broker_connect_attempt"
            );
            self.open_session()
        })
        .await
        .map_err(|source| ConnectError::AttemptsExhausted {
            attempts: self.retry.max_attempts(),
            source,
        })
    }

    async fn open_session(&self) -> Result<Session, lapin::Error> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        // Idempotent: safe to declare on every (re)connect.
        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(queue = %self.queue, "broker_session_established");

        Ok(Session {
            connection,
            channel,
            queue: self.queue.clone(),
        })
    }

    /// Scoped release: close the channel, then the connection.
    ///
    /// Consuming the session makes double close unrepresentable. Close
    /// failures are logged and swallowed; a session whose transport already
    /// dropped has nothing left to release.
    pub async fn close(&self, session: Session) {
        if let Err(e) = session.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "channel_close_error");
        }

        if let Err(e) = session.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "connection_close_error");
        }

        info!(queue = %session.queue, "session_closed");
    }
}

/// Run `op` up to the policy's attempt budget, sleeping the policy's delay
/// between failed attempts. Returns the last error once the budget is spent.
async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "connect_attempt_failed"
                );
                attempt += 1;
                sleep(policy.delay).await;
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "connect_attempts_exhausted"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn zero_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_with_retry_returns_first_success() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = with_retry(&zero_delay(5), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(attempt) }
        })
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_within_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = with_retry(&zero_delay(5), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("attempt {} refused", attempt))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_stops_at_attempt_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = with_retry(&zero_delay(4), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("broker unreachable".to_string()) }
        })
        .await;

        assert_eq!(result, Err("broker unreachable".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_with_retry_single_attempt_budget() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = with_retry(&zero_delay(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("refused".to_string()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
