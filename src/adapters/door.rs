//! Door adapter
//!
//! Owns one supervised serial session and serializes commands through a
//! mailbox: callers submit a request and await its outcome, the adapter's
//! task is the only code touching the session. Commands within one adapter
//! never interleave.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::adapters::{Commandable, LinkHealth};
use crate::bus::EventBus;
use crate::command::{CommandExecutor, CommandOutcome};
use crate::config::{CommandRetryPolicy, ReconnectPolicy};
use crate::error::LinkError;
use crate::health::HealthCheck;
use crate::model::AccessEvent;
use crate::supervisor::{ConnectionState, Supervisor};
use crate::transport::{BoxedSession, Dial};

/// Raw value reported when the adapter is shutting down
const SHUTDOWN_MARKER: &str = "SHUTDOWN";

const MAILBOX_CAPACITY: usize = 16;

struct DoorRequest {
    command: String,
    /// Set for unlock/lock; raw commands publish no access event
    access: Option<(u32, Option<u32>)>,
    reply: oneshot::Sender<CommandOutcome>,
}

/// Issues lock/unlock commands to one door controller
pub struct DoorAdapter {
    mailbox: mpsc::Sender<DoorRequest>,
    endpoint: String,
    state: tokio::sync::watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl DoorAdapter {
    /// Spawn the adapter's command loop
    ///
    /// `success_token` is the device-specific acknowledgement prefix,
    /// e.g. `"OK"`.
    pub fn spawn<D: Dial>(
        dialer: D,
        reconnect: ReconnectPolicy,
        retry: CommandRetryPolicy,
        success_token: impl Into<String>,
        bus: EventBus,
    ) -> Self {
        let endpoint = dialer.endpoint();
        let cancel = CancellationToken::new();
        let supervisor = Supervisor::new(dialer, reconnect, cancel.clone());
        let state = supervisor.watch_state();
        let executor = CommandExecutor::new(retry, success_token);
        let (mailbox, requests) = mpsc::channel(MAILBOX_CAPACITY);

        let task = tokio::spawn(run(supervisor, executor, bus, requests, cancel.clone()));

        Self {
            mailbox,
            endpoint,
            state,
            cancel,
            task,
        }
    }

    /// Unlock a door on behalf of a person
    pub async fn unlock(&self, door_id: u32, person_id: Option<u32>) -> CommandOutcome {
        self.submit(format!("UNLOCK:{}", door_id), Some((door_id, person_id)))
            .await
    }

    /// Lock a door on behalf of a person
    pub async fn lock(&self, door_id: u32, person_id: Option<u32>) -> CommandOutcome {
        self.submit(format!("LOCK:{}", door_id), Some((door_id, person_id)))
            .await
    }

    async fn submit(&self, command: String, access: Option<(u32, Option<u32>)>) -> CommandOutcome {
        let (reply, response) = oneshot::channel();
        let request = DoorRequest {
            command,
            access,
            reply,
        };
        if self.mailbox.send(request).await.is_err() {
            return shutdown_outcome();
        }
        response.await.unwrap_or_else(|_| shutdown_outcome())
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe connection state transitions
    pub fn watch_state(&self) -> tokio::sync::watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Health check backed by the supervisor's state
    pub fn health_check(&self) -> Arc<dyn HealthCheck> {
        Arc::new(LinkHealth::new(
            "door",
            self.endpoint.clone(),
            self.state.clone(),
        ))
    }

    /// Stop the command loop, closing the transport deterministically
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

#[async_trait::async_trait]
impl Commandable for DoorAdapter {
    async fn execute(&self, command: &str) -> CommandOutcome {
        self.submit(command.to_string(), None).await
    }
}

fn shutdown_outcome() -> CommandOutcome {
    CommandOutcome {
        success: false,
        timestamp: Utc::now(),
        raw: SHUTDOWN_MARKER.to_string(),
    }
}

/// Command loop: one request at a time against the owned session
async fn run<D: Dial>(
    mut supervisor: Supervisor<D>,
    executor: CommandExecutor,
    bus: EventBus,
    mut requests: mpsc::Receiver<DoorRequest>,
    cancel: CancellationToken,
) {
    // The port is opened at startup, not on first use, so liveness is
    // observable before any command is issued
    let mut session: Option<BoxedSession> = match supervisor.acquire().await {
        Ok(live) => Some(live),
        Err(_) => return,
    };

    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            request = requests.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        // The supervisor is consulted again when the session went dead
        if session.is_none() {
            match supervisor.acquire().await {
                Ok(live) => session = Some(live),
                Err(_) => {
                    let _ = request.reply.send(shutdown_outcome());
                    break;
                }
            }
        }
        let Some(io) = session.as_mut() else { break };

        let started = std::time::Instant::now();
        let (success, outcome) = executor.execute(io, &request.command).await;
        histogram!("serial_door_command_duration_seconds").record(started.elapsed().as_secs_f64());
        counter!(
            "serial_door_commands_total",
            "result" => if success { "success" } else { "failure" }
        )
        .increment(1);

        if !success && !outcome.saw_response() {
            // Every attempt went unanswered; presume the session is dead so
            // the next command reacquires through the supervisor
            session = None;
            supervisor.fault(&LinkError::transport_error("device went silent", true));
        }

        if let Some((door_id, person_id)) = request.access {
            bus.publish(&AccessEvent {
                door_id,
                person_id,
                granted: success,
                raw_response: outcome.raw.clone(),
                timestamp: outcome.timestamp,
            });
        }

        let _ = request.reply.send(outcome);
    }

    // Dropping the session closes the transport
    drop(session);
    supervisor.disconnect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BoxedSession;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Dialer backed by an in-memory device scripted with one reply line
    struct ScriptedDialer {
        reply: &'static str,
    }

    #[async_trait]
    impl Dial for ScriptedDialer {
        async fn dial(&self) -> Result<BoxedSession, LinkError> {
            let (client, server) = tokio::io::duplex(1024);
            let reply = self.reply;
            tokio::spawn(async move {
                let (read_half, mut write_half) = tokio::io::split(server);
                let mut lines = BufReader::new(read_half).lines();
                while let Ok(Some(_)) = lines.next_line().await {
                    if write_half
                        .write_all(format!("{}\n", reply).as_bytes())
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
            Ok(Box::new(client))
        }

        fn endpoint(&self) -> String {
            "/dev/ttySIM0@9600".to_string()
        }
    }

    fn quick_retry() -> CommandRetryPolicy {
        CommandRetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(5),
            attempt_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_connects_at_startup_before_any_command() {
        let bus = EventBus::new();
        let adapter = DoorAdapter::spawn(
            ScriptedDialer { reply: "OK" },
            ReconnectPolicy::fixed(Duration::from_millis(5)),
            quick_retry(),
            "OK",
            bus,
        );

        // The port opens without any command being issued
        let mut states = adapter.watch_state();
        tokio::time::timeout(Duration::from_secs(1), async {
            while *states.borrow_and_update() != ConnectionState::Connected {
                states.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert_eq!(adapter.state(), ConnectionState::Connected);

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn test_unlock_acknowledged_and_event_published() {
        let bus = EventBus::new();
        let (_sub, events) = bus.subscribe_channel::<AccessEvent>(8);

        let adapter = DoorAdapter::spawn(
            ScriptedDialer { reply: "OK" },
            ReconnectPolicy::fixed(Duration::from_millis(5)),
            quick_retry(),
            "OK",
            bus,
        );

        let outcome = adapter.unlock(1, Some(42)).await;
        assert!(outcome.success);
        assert_eq!(outcome.raw, "OK");

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv_async())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.door_id, 1);
        assert_eq!(event.person_id, Some(42));
        assert!(event.granted);

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_unlock_reports_failure() {
        let bus = EventBus::new();
        let adapter = DoorAdapter::spawn(
            ScriptedDialer { reply: "FAIL" },
            ReconnectPolicy::fixed(Duration::from_millis(5)),
            quick_retry(),
            "OK",
            bus,
        );

        let outcome = adapter.unlock(1, None).await;
        assert!(!outcome.success);
        assert_eq!(outcome.raw, "FAIL");

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn test_raw_command_capability() {
        let bus = EventBus::new();
        let (_sub, events) = bus.subscribe_channel::<AccessEvent>(8);

        let adapter = DoorAdapter::spawn(
            ScriptedDialer { reply: "OK_STATUS armed" },
            ReconnectPolicy::fixed(Duration::from_millis(5)),
            quick_retry(),
            "OK",
            bus,
        );

        let outcome = adapter.execute("STATUS").await;
        assert!(outcome.success);
        assert_eq!(outcome.raw, "OK_STATUS armed");
        // Raw commands publish no access event
        assert!(events.try_recv().is_err());

        adapter.shutdown().await;
    }
}
