//! Recognition pipeline
//!
//! Bridges camera frames to the opaque face-recognition collaborator.
//! Frames arrive through a bounded bus channel that drops on overflow, so a
//! slow recognizer can never back-pressure the camera read loop. Matches
//! are published as `PersonRecognized` events and handed to the notifier;
//! what to do with a match (unlock a door, call an elevator) is business
//! logic subscribing downstream.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::collab::{FaceRecognizer, Notifier};
use crate::model::{CameraFrame, NotificationMessage, PersonRecognized};

const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Consumes camera frames and emits recognition events
pub struct RecognitionPipeline {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl RecognitionPipeline {
    /// Spawn the pipeline with the default frame queue capacity
    pub fn spawn(
        bus: EventBus,
        recognizer: Arc<dyn FaceRecognizer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::spawn_with_capacity(bus, recognizer, notifier, DEFAULT_QUEUE_CAPACITY)
    }

    /// Spawn the pipeline with an explicit frame queue capacity
    pub fn spawn_with_capacity(
        bus: EventBus,
        recognizer: Arc<dyn FaceRecognizer>,
        notifier: Arc<dyn Notifier>,
        queue_capacity: usize,
    ) -> Self {
        let (subscription, frames) = bus.subscribe_channel::<CameraFrame>(queue_capacity);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            // The registration lives exactly as long as the task
            let _subscription = subscription;

            loop {
                let frame = tokio::select! {
                    _ = token.cancelled() => break,
                    frame = frames.recv_async() => match frame {
                        Ok(frame) => frame,
                        Err(_) => break,
                    },
                };

                let Some(person) = recognizer.recognize(&frame.payload).await else {
                    continue;
                };

                tracing::info!(
                    camera_id = frame.camera_id,
                    person_id = person.id,
                    person = %person.full_name,
                    "person recognized"
                );

                let message = NotificationMessage {
                    subject: "Access event".to_string(),
                    body: format!("{} seen on camera {}", person.full_name, frame.camera_id),
                };

                bus.publish(&PersonRecognized {
                    camera_id: frame.camera_id,
                    person,
                    recognized_at: Utc::now(),
                });
                notifier.notify(message).await;
            }
        });

        Self { cancel, task }
    }

    /// Stop the pipeline
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}
