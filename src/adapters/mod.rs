//! Device adapters
//!
//! One adapter per hardware endpoint, actor-style: all mutable state (the
//! session, the supervisor) is touched only by the adapter's own task, and
//! external callers communicate through message passing. Adapters share no
//! state with each other.
//!
//! Capabilities are small composable traits instead of a controller
//! hierarchy: a camera is `Streamable`, a door is `Commandable`, and every
//! adapter answers health queries through [`crate::health::HealthCheck`].

mod camera;
mod door;
mod elevator;

pub use camera::CameraAdapter;
pub use door::DoorAdapter;
pub use elevator::ElevatorAdapter;

use async_trait::async_trait;

use crate::command::CommandOutcome;
use crate::health::{HealthCheck, HealthReport};
use crate::supervisor::ConnectionState;

/// Capability of feeding a continuous stream of payloads onto the bus
pub trait Streamable {
    /// Whether the feed currently holds a live session
    fn is_live(&self) -> bool;
}

/// Capability of executing textual device commands
#[async_trait]
pub trait Commandable {
    /// Execute one raw command; always settles with a definite outcome
    async fn execute(&self, command: &str) -> CommandOutcome;
}

/// Health check backed by a supervisor's connection state
///
/// Reads the watch channel the supervisor already publishes on, so the
/// query is side-effect-free and never touches the session.
pub struct LinkHealth {
    component: String,
    endpoint: String,
    state: tokio::sync::watch::Receiver<ConnectionState>,
}

impl LinkHealth {
    pub(crate) fn new(
        component: impl Into<String>,
        endpoint: impl Into<String>,
        state: tokio::sync::watch::Receiver<ConnectionState>,
    ) -> Self {
        Self {
            component: component.into(),
            endpoint: endpoint.into(),
            state,
        }
    }
}

#[async_trait]
impl HealthCheck for LinkHealth {
    fn component(&self) -> &str {
        &self.component
    }

    async fn check(&self) -> HealthReport {
        let state = *self.state.borrow();
        if state == ConnectionState::Connected {
            HealthReport::healthy(&self.component, format!("connected to {}", self.endpoint))
        } else {
            HealthReport::unhealthy(
                &self.component,
                format!("{} ({})", state, self.endpoint),
            )
        }
    }
}
