//! gatelink - resilient device adapters for physical-access hardware
//!
//! Coordinates door locks, camera feeds and elevator dispatch over
//! long-lived, unreliable transports and fans access events out to
//! subscribers through a topic-based bus. The adapters absorb transport
//! faults internally: connections reconnect forever with a fixed delay,
//! commands retry a bounded number of times with increasing backoff, and
//! callers always get a definite outcome.

// Transport sessions
pub mod transport;

// Device adapters
pub mod adapters;

// Core building blocks
pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod framing;
pub mod health;
pub mod supervisor;

// Domain model and boundary contracts
pub mod collab;
pub mod model;
pub mod pipeline;

// Re-export core types
pub use adapters::{CameraAdapter, Commandable, DoorAdapter, ElevatorAdapter, Streamable};
pub use bus::{BusEvent, DispatchError, EventBus, Subscription};
pub use command::{CommandExecutor, CommandOutcome};
pub use config::{
    CommandRetryPolicy, HttpEndpoint, ReconnectPolicy, SerialEndpoint, TcpEndpoint,
};
pub use error::LinkError;
pub use framing::{Frame, FrameReader};
pub use health::{HealthCheck, HealthMonitor, HealthReport, HealthStatus};
pub use supervisor::{ConnectionState, Supervisor};
pub use transport::{BoxedSession, Dial, SerialDialer, SessionIo, TcpDialer};

/// Convenient result type alias
pub type Result<T> = std::result::Result<T, LinkError>;
