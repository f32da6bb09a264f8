//! Reconnection supervisor
//!
//! Wraps a dialer with infinite retry-with-backoff reconnect semantics and
//! publishes connection liveness through a watch channel. There is at most
//! one live session per supervisor: `acquire` takes `&mut self`, so a new
//! attempt can only start after the previous one has settled and the caller
//! has dropped the stale session.

use tokio_util::sync::CancellationToken;

use crate::config::ReconnectPolicy;
use crate::error::LinkError;
use crate::transport::{BoxedSession, Dial};

/// Connection state of one adapter instance
///
/// Owned exclusively by the supervisor; transitions are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session and no attempt in flight
    Disconnected,
    /// Dial attempt in flight
    Connecting,
    /// Handshake succeeded, session handed out
    Connected,
    /// Last session or attempt failed; waiting to retry
    Faulted,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Supervises one adapter's transport session lifecycle
pub struct Supervisor<D: Dial> {
    dialer: D,
    policy: ReconnectPolicy,
    state_tx: tokio::sync::watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl<D: Dial> Supervisor<D> {
    /// Create a supervisor in the `Disconnected` state
    pub fn new(dialer: D, policy: ReconnectPolicy, cancel: CancellationToken) -> Self {
        let (state_tx, _) = tokio::sync::watch::channel(ConnectionState::Disconnected);
        Self {
            dialer,
            policy,
            state_tx,
            cancel,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions without polling
    ///
    /// Liveness becomes visible the moment a transition happens; health
    /// queries read this receiver instead of touching the session.
    pub fn watch_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Endpoint label of the supervised dialer
    pub fn endpoint(&self) -> String {
        self.dialer.endpoint()
    }

    fn transition(&self, state: ConnectionState) {
        // send_replace never fails even with zero receivers
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(endpoint = %self.dialer.endpoint(), from = %previous, to = %state, "connection state transition");
        }
    }

    /// Obtain a live session, retrying forever until one is established
    ///
    /// Any stale session must be dropped by the caller before re-entry; the
    /// exclusive borrow makes concurrent attempts impossible. Returns
    /// `LinkError::Shutdown` only when the cancellation token fires.
    pub async fn acquire(&mut self) -> Result<BoxedSession, LinkError> {
        loop {
            if self.cancel.is_cancelled() {
                self.transition(ConnectionState::Disconnected);
                return Err(LinkError::Shutdown);
            }

            self.transition(ConnectionState::Connecting);
            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.transition(ConnectionState::Disconnected);
                    return Err(LinkError::Shutdown);
                }
                result = self.dialer.dial() => result,
            };

            match attempt {
                Ok(session) => {
                    self.transition(ConnectionState::Connected);
                    tracing::info!(endpoint = %self.dialer.endpoint(), "connected");
                    return Ok(session);
                }
                Err(error) => {
                    self.transition(ConnectionState::Faulted);
                    tracing::warn!(
                        endpoint = %self.dialer.endpoint(),
                        error = %error,
                        retry_in = ?self.policy.delay,
                        "connect failed, will retry"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            self.transition(ConnectionState::Disconnected);
                            return Err(LinkError::Shutdown);
                        }
                        _ = tokio::time::sleep(self.policy.delay) => {}
                    }
                }
            }
        }
    }

    /// Record a steady-state failure on the current session
    ///
    /// The caller drops the broken session and re-enters `acquire`.
    pub fn fault(&mut self, error: &LinkError) {
        tracing::warn!(
            endpoint = %self.dialer.endpoint(),
            error = %error,
            code = error.error_code(),
            "session faulted"
        );
        self.transition(ConnectionState::Faulted);
    }

    /// Record a clean shutdown
    pub fn disconnect(&mut self) {
        self.transition(ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BoxedSession;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Dialer that fails a fixed number of times before succeeding
    struct FlakyDialer {
        failures_left: Arc<AtomicU32>,
        dials: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Dial for FlakyDialer {
        async fn dial(&self) -> Result<BoxedSession, LinkError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(LinkError::transport_error("simulated refusal", true));
            }
            let (client, _server) = tokio::io::duplex(64);
            // Keep the peer alive for the duration of the test
            std::mem::forget(_server);
            Ok(Box::new(client))
        }

        fn endpoint(&self) -> String {
            "flaky:0".to_string()
        }
    }

    fn flaky(failures: u32) -> (FlakyDialer, Arc<AtomicU32>) {
        let dials = Arc::new(AtomicU32::new(0));
        (
            FlakyDialer {
                failures_left: Arc::new(AtomicU32::new(failures)),
                dials: dials.clone(),
            },
            dials,
        )
    }

    #[tokio::test]
    async fn test_acquire_retries_until_connected() {
        let (dialer, dials) = flaky(3);
        let policy = ReconnectPolicy::fixed(Duration::from_millis(5));
        let mut supervisor = Supervisor::new(dialer, policy, CancellationToken::new());

        let session = supervisor.acquire().await;
        assert!(session.is_ok());
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert_eq!(dials.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fault_and_reacquire_walks_states() {
        let (dialer, _) = flaky(0);
        let policy = ReconnectPolicy::fixed(Duration::from_millis(5));
        let mut supervisor = Supervisor::new(dialer, policy, CancellationToken::new());

        let session = supervisor.acquire().await.ok();
        assert_eq!(supervisor.state(), ConnectionState::Connected);

        // Steady-state failure: drop the session first, then fault
        drop(session);
        supervisor.fault(&LinkError::transport_error("peer reset", true));
        assert_eq!(supervisor.state(), ConnectionState::Faulted);

        let session = supervisor.acquire().await;
        assert!(session.is_ok());
        assert_eq!(supervisor.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_transitions_are_observable() {
        let (dialer, _) = flaky(1);
        let policy = ReconnectPolicy::fixed(Duration::from_millis(5));
        let mut supervisor = Supervisor::new(dialer, policy, CancellationToken::new());
        let mut watcher = supervisor.watch_state();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                if watcher.changed().await.is_err() {
                    break;
                }
                let state = *watcher.borrow_and_update();
                seen.push(state);
                if state == ConnectionState::Connected {
                    break;
                }
            }
            seen
        });

        supervisor.acquire().await.ok();
        let seen = observer.await.unwrap();
        assert_eq!(seen.last(), Some(&ConnectionState::Connected));
        assert!(seen.contains(&ConnectionState::Faulted));
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_retry_wait() {
        let (dialer, _) = flaky(u32::MAX);
        let policy = ReconnectPolicy::fixed(Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let mut supervisor = Supervisor::new(dialer, policy, cancel.clone());

        let handle = tokio::spawn(async move {
            let result = supervisor.acquire().await;
            (supervisor.state(), result)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let (state, result) = handle.await.unwrap();
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(matches!(result, Err(LinkError::Shutdown)));
    }
}
