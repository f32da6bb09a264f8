//! Bounded-retry command execution
//!
//! One command is exactly one request and exactly one response or a terminal
//! failure. The executor retries the round-trip a bounded number of times
//! with increasing backoff; connection recovery is explicitly not its job,
//! that belongs to the reconnection supervisor.

use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::CommandRetryPolicy;
use crate::error::LinkError;
use crate::transport::SessionIo;

/// Raw value reported when no response line was observed at all
pub const TIMEOUT_MARKER: &str = "TIMEOUT";

/// Terminal result of one command execution
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommandOutcome {
    /// Whether the device acknowledged the command
    pub success: bool,
    /// When the outcome was decided
    pub timestamp: DateTime<Utc>,
    /// Last observed raw response, or [`TIMEOUT_MARKER`]
    pub raw: String,
}

impl CommandOutcome {
    fn success(raw: String) -> Self {
        Self {
            success: true,
            timestamp: Utc::now(),
            raw,
        }
    }

    fn failure(raw: Option<String>) -> Self {
        Self {
            success: false,
            timestamp: Utc::now(),
            raw: raw.unwrap_or_else(|| TIMEOUT_MARKER.to_string()),
        }
    }

    /// Whether any response line was observed during the exchange
    ///
    /// `false` means every attempt ended in a timeout or I/O error; the
    /// owning adapter treats the session as suspect in that case.
    pub fn saw_response(&self) -> bool {
        self.raw != TIMEOUT_MARKER
    }
}

/// Executes newline-terminated text commands over a session
///
/// Success is classified by a configurable leading marker token; the exact
/// token is device-specific configuration, not a protocol constant.
pub struct CommandExecutor {
    policy: CommandRetryPolicy,
    success_token: String,
}

impl CommandExecutor {
    /// Create an executor with the given policy and success token
    pub fn new(policy: CommandRetryPolicy, success_token: impl Into<String>) -> Self {
        Self {
            policy,
            success_token: success_token.into(),
        }
    }

    /// Execute one command with bounded retry
    ///
    /// Writes never exceed `max_attempts` and the caller always gets a
    /// definite outcome: acknowledged, rejected with the last raw response,
    /// or timed out.
    pub async fn execute<S: SessionIo + ?Sized>(
        &self,
        io: &mut S,
        command: &str,
    ) -> (bool, CommandOutcome) {
        let mut last_raw: Option<String> = None;
        let mut carry = Vec::new();

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.backoff(attempt - 1)).await;
                // Bytes buffered for a timed-out attempt are stale; they
                // must not be scored as this attempt's reply
                carry.clear();
            }

            match self.attempt(io, command, &mut carry).await {
                Ok(line) => {
                    if line.starts_with(&self.success_token) {
                        tracing::debug!(command, response = %line, attempt, "command acknowledged");
                        return (true, CommandOutcome::success(line));
                    }
                    tracing::warn!(command, response = %line, attempt, "command rejected");
                    last_raw = Some(line);
                }
                Err(error) => {
                    tracing::warn!(command, %error, attempt, "command attempt failed");
                }
            }
        }

        let outcome = CommandOutcome::failure(last_raw);
        tracing::warn!(command, raw = %outcome.raw, "command failed after {} attempts", self.policy.max_attempts);
        (false, outcome)
    }

    /// One write + one response line within the attempt deadline
    async fn attempt<S: SessionIo + ?Sized>(
        &self,
        io: &mut S,
        command: &str,
        carry: &mut Vec<u8>,
    ) -> Result<String, LinkError> {
        let exchange = async {
            io.write_all(command.as_bytes()).await?;
            io.write_all(b"\n").await?;
            io.flush().await?;
            read_line(io, carry).await
        };

        match tokio::time::timeout(self.policy.attempt_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(LinkError::timeout_error(
                "command round-trip",
                self.policy.attempt_timeout,
            )),
        }
    }
}

/// Read one `\n`-terminated line, keeping overshoot bytes in `carry`
async fn read_line<S: SessionIo + ?Sized>(
    io: &mut S,
    carry: &mut Vec<u8>,
) -> Result<String, LinkError> {
    loop {
        if let Some(pos) = carry.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = carry.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            return Ok(text.trim_end_matches(['\n', '\r']).to_string());
        }

        let mut chunk = [0u8; 256];
        let read = io.read(&mut chunk).await?;
        if read == 0 {
            return Err(LinkError::transport_error(
                "connection closed mid-response",
                true,
            ));
        }
        carry.extend_from_slice(&chunk[..read]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};

    fn quick_policy() -> CommandRetryPolicy {
        CommandRetryPolicy {
            max_attempts: 3,
            backoff_step: Duration::from_millis(5),
            attempt_timeout: Duration::from_millis(100),
        }
    }

    /// Simulated device that replies with a fixed line to every command
    fn scripted_device(reply: &'static str) -> (tokio::io::DuplexStream, Arc<AtomicU32>) {
        let (client, server) = tokio::io::duplex(1024);
        let commands_seen = Arc::new(AtomicU32::new(0));
        let counter = commands_seen.clone();
        tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(_line)) = lines.next_line().await {
                counter.fetch_add(1, Ordering::SeqCst);
                if write_half
                    .write_all(format!("{}\n", reply).as_bytes())
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        (client, commands_seen)
    }

    #[tokio::test]
    async fn test_acknowledged_command_succeeds_first_attempt() {
        let (mut io, seen) = scripted_device("OK");
        let executor = CommandExecutor::new(quick_policy(), "OK");

        let (success, outcome) = executor.execute(&mut io, "UNLOCK:1").await;
        assert!(success);
        assert!(outcome.success);
        assert_eq!(outcome.raw, "OK");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_command_exhausts_exactly_max_attempts() {
        let (mut io, seen) = scripted_device("FAIL");
        let executor = CommandExecutor::new(quick_policy(), "OK");

        let (success, outcome) = executor.execute(&mut io, "UNLOCK:1").await;
        assert!(!success);
        assert!(!outcome.success);
        assert_eq!(outcome.raw, "FAIL");
        assert!(outcome.saw_response());
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_silent_device_reports_timeout_marker() {
        // Device that never answers
        let (mut client, _server) = tokio::io::duplex(1024);
        let executor = CommandExecutor::new(quick_policy(), "OK");

        let (success, outcome) = executor.execute(&mut client, "UNLOCK:1").await;
        assert!(!success);
        assert_eq!(outcome.raw, TIMEOUT_MARKER);
        assert!(!outcome.saw_response());
    }

    #[tokio::test]
    async fn test_success_token_is_a_prefix_match() {
        let (mut io, _) = scripted_device("OK_UNLOCK door=1");
        let executor = CommandExecutor::new(quick_policy(), "OK");

        let (success, outcome) = executor.execute(&mut io, "UNLOCK:1").await;
        assert!(success);
        assert_eq!(outcome.raw, "OK_UNLOCK door=1");
    }

    #[tokio::test]
    async fn test_stale_partial_reply_not_scored_against_next_attempt() {
        // First command gets a partial line that stalls past the deadline;
        // later commands get a prompt complete reply
        let (client, server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut lines = BufReader::new(read_half).lines();
            let mut first = true;
            while let Ok(Some(_)) = lines.next_line().await {
                let reply: &[u8] = if first { b"PART" } else { b"FAIL\n" };
                first = false;
                if write_half.write_all(reply).await.is_err() {
                    break;
                }
            }
        });

        let mut io = client;
        let executor = CommandExecutor::new(quick_policy(), "OK");
        let (success, outcome) = executor.execute(&mut io, "UNLOCK:1").await;

        // The dangling "PART" bytes never contaminate a later reply
        assert!(!success);
        assert_eq!(outcome.raw, "FAIL");
    }

    #[tokio::test]
    async fn test_recovers_after_transient_rejection() {
        // First command rejected, second accepted
        let (client, server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(server);
            let mut lines = BufReader::new(read_half).lines();
            let mut first = true;
            while let Ok(Some(_)) = lines.next_line().await {
                let reply = if first { "ERR busy\n" } else { "OK\n" };
                first = false;
                if write_half.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        let mut io = client;
        let executor = CommandExecutor::new(quick_policy(), "OK");
        let (success, outcome) = executor.execute(&mut io, "LOCK:2").await;
        assert!(success);
        assert_eq!(outcome.raw, "OK");
    }
}
