//! Domain records and bus event payloads
//!
//! Events are serialized structured records keyed by their logical topic
//! name; the topic identifies the kind, never the value.

use chrono::{DateTime, Utc};

use crate::bus::BusEvent;

/// An individual known to the access system
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Person {
    /// Stable identifier from the people store
    pub id: u32,
    /// Full name
    pub full_name: String,
}

/// One camera frame captured off the wire
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CameraFrame {
    /// Source camera
    pub camera_id: u32,
    /// Opaque frame payload
    pub payload: Vec<u8>,
    /// Capture timestamp
    pub captured_at: DateTime<Utc>,
}

impl BusEvent for CameraFrame {
    const TOPIC: &'static str = "camera.frame";
}

/// Outcome of a door command, published after the hardware settles
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccessEvent {
    /// Door the command addressed
    pub door_id: u32,
    /// Person the access decision was made for, when known
    pub person_id: Option<u32>,
    /// Whether the door acknowledged the command
    pub granted: bool,
    /// Raw device response
    pub raw_response: String,
    /// Decision timestamp
    pub timestamp: DateTime<Utc>,
}

impl BusEvent for AccessEvent {
    const TOPIC: &'static str = "access.event";
}

/// An elevator dispatch issued on behalf of a person
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ElevatorCall {
    /// Elevator the call addressed
    pub elevator_id: u32,
    /// Person the call was made for
    pub user_id: u32,
    /// Whether the controller accepted the call
    pub accepted: bool,
    /// Call timestamp
    pub timestamp: DateTime<Utc>,
}

impl BusEvent for ElevatorCall {
    const TOPIC: &'static str = "elevator.call";
}

/// A person recognized in a camera frame
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PersonRecognized {
    /// Camera the frame came from
    pub camera_id: u32,
    /// The recognized person
    pub person: Person,
    /// Recognition timestamp
    pub recognized_at: DateTime<Utc>,
}

impl BusEvent for PersonRecognized {
    const TOPIC: &'static str = "access.recognized";
}

/// Message handed to the notification collaborator
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NotificationMessage {
    /// Short subject line
    pub subject: String,
    /// Message body
    pub body: String,
}
