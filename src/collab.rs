//! External collaborator contracts
//!
//! Interfaces only. Recognition inference, people persistence and
//! notification delivery live outside this crate; the core consumes them as
//! opaque, possibly slow, asynchronous calls and must never let them block
//! the I/O path.

use async_trait::async_trait;

use crate::model::{NotificationMessage, Person};

/// Opaque face-recognition inference: frame bytes in, maybe a person out
#[async_trait]
pub trait FaceRecognizer: Send + Sync {
    /// Attempt to recognize a person in one frame
    async fn recognize(&self, frame: &[u8]) -> Option<Person>;
}

/// Read-only people records
#[async_trait]
pub trait PeopleStore: Send + Sync {
    /// All known people
    async fn get_all(&self) -> Vec<Person>;
}

/// Fire-and-forget notification delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message; failures are the collaborator's concern
    async fn notify(&self, message: NotificationMessage);
}
