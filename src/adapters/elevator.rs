//! Elevator adapter
//!
//! HTTP-based: a call is a structured request (elevator id + user id) and
//! failure is classified by transport-level status rather than a textual
//! marker, but the bounded retry/backoff contract is identical to the
//! serial path. HTTP is session-less, so liveness is a reachability probe
//! instead of a supervised connection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use url::Url;

use crate::bus::EventBus;
use crate::command::{CommandOutcome, TIMEOUT_MARKER};
use crate::config::{CommandRetryPolicy, HttpEndpoint};
use crate::error::LinkError;
use crate::health::{HealthCheck, HealthReport};
use crate::model::{ElevatorCall, Person};

const CALL_PATH: &str = "api/call";

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Dispatches elevator calls against one controller API
pub struct ElevatorAdapter {
    client: reqwest::Client,
    call_url: Url,
    probe_url: Url,
    policy: CommandRetryPolicy,
    bus: EventBus,
}

impl ElevatorAdapter {
    /// Create the adapter; fails fast on an unusable endpoint
    pub fn new(
        endpoint: HttpEndpoint,
        policy: CommandRetryPolicy,
        bus: EventBus,
    ) -> Result<Self, LinkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LinkError::config_error("http_client", e.to_string()))?;
        let call_url = endpoint.join(CALL_PATH)?;
        let probe_url = endpoint.base_url.clone();
        Ok(Self {
            client,
            call_url,
            probe_url,
            policy,
            bus,
        })
    }

    /// Track an elevator call for a person, with bounded retry
    ///
    /// Always settles with a definite outcome; the result is also published
    /// as an [`ElevatorCall`] event.
    pub async fn track_call(&self, elevator_id: u32, user: &Person) -> CommandOutcome {
        let body = serde_json::json!({
            "elevatorId": elevator_id,
            "userId": user.id,
        });

        let started = Instant::now();
        let mut last_raw: Option<String> = None;
        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.policy.backoff(attempt - 1)).await;
            }

            let response = self
                .client
                .post(self.call_url.clone())
                .json(&body)
                .timeout(self.policy.attempt_timeout)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        tracing::debug!(elevator_id, user_id = user.id, %status, attempt, "elevator call accepted");
                        let outcome = CommandOutcome {
                            success: true,
                            timestamp: Utc::now(),
                            raw: status.to_string(),
                        };
                        histogram!("elevator_request_duration_seconds")
                            .record(started.elapsed().as_secs_f64());
                        counter!("elevator_requests_total", "result" => "accepted").increment(1);
                        self.publish(elevator_id, user.id, true, &outcome);
                        return outcome;
                    }
                    tracing::warn!(elevator_id, %status, attempt, "elevator call rejected");
                    last_raw = Some(status.to_string());
                }
                Err(error) => {
                    tracing::warn!(elevator_id, %error, attempt, "elevator call attempt failed");
                }
            }
        }

        let outcome = CommandOutcome {
            success: false,
            timestamp: Utc::now(),
            raw: last_raw.unwrap_or_else(|| TIMEOUT_MARKER.to_string()),
        };
        tracing::warn!(
            elevator_id,
            raw = %outcome.raw,
            "elevator call failed after {} attempts",
            self.policy.max_attempts
        );
        histogram!("elevator_request_duration_seconds").record(started.elapsed().as_secs_f64());
        counter!("elevator_requests_total", "result" => "failed").increment(1);
        self.publish(elevator_id, user.id, false, &outcome);
        outcome
    }

    fn publish(&self, elevator_id: u32, user_id: u32, accepted: bool, outcome: &CommandOutcome) {
        self.bus.publish(&ElevatorCall {
            elevator_id,
            user_id,
            accepted,
            timestamp: outcome.timestamp,
        });
    }

    /// Health check probing controller reachability
    pub fn health_check(&self) -> Arc<dyn HealthCheck> {
        Arc::new(ElevatorHealth {
            client: self.client.clone(),
            probe_url: self.probe_url.clone(),
        })
    }
}

/// Lightweight reachability probe against the controller's base URL
struct ElevatorHealth {
    client: reqwest::Client,
    probe_url: Url,
}

#[async_trait]
impl HealthCheck for ElevatorHealth {
    fn component(&self) -> &str {
        "elevator"
    }

    async fn check(&self) -> HealthReport {
        let probe = self
            .client
            .get(self.probe_url.clone())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match probe {
            // Any response at all means the controller is reachable
            Ok(response) => HealthReport::healthy(
                "elevator",
                format!("{} reachable ({})", self.probe_url, response.status()),
            ),
            Err(error) => {
                HealthReport::unhealthy("elevator", format!("{} unreachable: {}", self.probe_url, error))
            }
        }
    }
}
