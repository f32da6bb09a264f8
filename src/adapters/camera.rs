//! Camera adapter
//!
//! Owns one supervised streaming session and decodes the length-prefixed
//! frame protocol into `CameraFrame` events on the bus. On any transport or
//! protocol failure the frame sequence pauses, the supervisor reconnects,
//! and decoding resumes; consumers never see an end-of-stream, only a gap.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;

use crate::adapters::{LinkHealth, Streamable};
use crate::bus::EventBus;
use crate::config::ReconnectPolicy;
use crate::framing::{FrameReader, DEFAULT_MAX_FRAME_LEN};
use crate::health::HealthCheck;
use crate::model::CameraFrame;
use crate::supervisor::{ConnectionState, Supervisor};
use crate::transport::Dial;

/// Streams frames from one camera endpoint onto the bus
pub struct CameraAdapter {
    camera_id: u32,
    endpoint: String,
    state: tokio::sync::watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl CameraAdapter {
    /// Spawn the adapter's read loop with the default frame size bound
    pub fn spawn<D: Dial>(
        camera_id: u32,
        dialer: D,
        policy: ReconnectPolicy,
        bus: EventBus,
    ) -> Self {
        Self::spawn_with_max_frame_len(camera_id, dialer, policy, bus, DEFAULT_MAX_FRAME_LEN)
    }

    /// Spawn the adapter's read loop with an explicit frame size bound
    pub fn spawn_with_max_frame_len<D: Dial>(
        camera_id: u32,
        dialer: D,
        policy: ReconnectPolicy,
        bus: EventBus,
        max_frame_len: usize,
    ) -> Self {
        let endpoint = dialer.endpoint();
        let cancel = CancellationToken::new();
        let supervisor = Supervisor::new(dialer, policy, cancel.clone());
        let state = supervisor.watch_state();

        let task = tokio::spawn(run(camera_id, supervisor, bus, max_frame_len, cancel.clone()));

        Self {
            camera_id,
            endpoint,
            state,
            cancel,
            task,
        }
    }

    /// Camera identifier
    pub fn camera_id(&self) -> u32 {
        self.camera_id
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
            format!("camera-{}", self.camera_id),
            self.endpoint.clone(),
            self.state.clone(),
        ))
    }

    /// Stop the read loop, closing the transport deterministically
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

impl Streamable for CameraAdapter {
    fn is_live(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Read loop: acquire a session, decode frames until it fails, repeat
async fn run<D: Dial>(
    camera_id: u32,
    mut supervisor: Supervisor<D>,
    bus: EventBus,
    max_frame_len: usize,
    cancel: CancellationToken,
) {
    let camera_label = camera_id.to_string();

    loop {
        let session = match supervisor.acquire().await {
            Ok(session) => session,
            // Only shutdown escapes acquire
            Err(_) => {
                gauge!("camera_connection_status", "camera_id" => camera_label.clone()).set(0.0);
                return;
            }
        };
        gauge!("camera_connection_status", "camera_id" => camera_label.clone()).set(1.0);
        let mut reader = FrameReader::with_max_frame_len(session, max_frame_len);

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => None,
                frame = reader.next_frame() => Some(frame),
            };
            let Some(frame) = frame else {
                // Cancelled: dropping the reader closes the transport
                drop(reader);
                gauge!("camera_connection_status", "camera_id" => camera_label.clone()).set(0.0);
                supervisor.disconnect();
                return;
            };

            match frame {
                Ok(frame) => {
                    counter!("camera_frames_total", "camera_id" => camera_label.clone())
                        .increment(1);
                    bus.publish(&CameraFrame {
                        camera_id,
                        payload: frame.to_vec(),
                        captured_at: Utc::now(),
                    });
                }
                Err(error) => {
                    // Close the stale session before the supervisor opens
                    // a fresh one
                    drop(reader);
                    gauge!("camera_connection_status", "camera_id" => camera_label.clone())
                        .set(0.0);
                    supervisor.fault(&error);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::encode_frame;
    use crate::transport::{BoxedSession, Dial};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Dialer producing an in-memory session pre-loaded with wire bytes
    struct CannedDialer {
        wire: Vec<u8>,
    }

    #[async_trait]
    impl Dial for CannedDialer {
        async fn dial(&self) -> Result<BoxedSession, crate::error::LinkError> {
            let (client, mut server) = tokio::io::duplex(64 * 1024);
            let wire = self.wire.clone();
            tokio::spawn(async move {
                use tokio::io::AsyncWriteExt;
                let _ = server.write_all(&wire).await;
                // Hold the peer open so the reader blocks instead of
                // observing EOF and reconnecting in a tight loop
                std::future::pending::<()>().await;
            });
            Ok(Box::new(client))
        }

        fn endpoint(&self) -> String {
            "canned:9000".to_string()
        }
    }

    #[tokio::test]
    async fn test_frames_reach_the_bus_in_order() {
        let mut wire = encode_frame(&[1, 2, 3, 4]);
        wire.extend_from_slice(&encode_frame(&[9, 9]));

        let bus = EventBus::new();
        let (_sub, frames) = bus.subscribe_channel::<CameraFrame>(8);

        let adapter = CameraAdapter::spawn(
            7,
            CannedDialer { wire },
            ReconnectPolicy::fixed(Duration::from_millis(5)),
            bus,
        );

        let first = tokio::time::timeout(Duration::from_secs(1), frames.recv_async())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), frames.recv_async())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.camera_id, 7);
        assert_eq!(first.payload, vec![1, 2, 3, 4]);
        assert_eq!(second.payload, vec![9, 9]);

        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let bus = EventBus::new();
        let adapter = CameraAdapter::spawn(
            1,
            CannedDialer { wire: Vec::new() },
            ReconnectPolicy::fixed(Duration::from_millis(5)),
            bus,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(adapter.is_live());
        adapter.shutdown().await;
    }
}
