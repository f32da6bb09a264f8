//! Serial line transport session

use async_trait::async_trait;
use tokio_serial::SerialPortBuilderExt;

use crate::config::SerialEndpoint;
use crate::error::LinkError;
use crate::transport::{BoxedSession, Dial};

/// Opens serial sessions against a fixed port
#[derive(Debug, Clone)]
pub struct SerialDialer {
    endpoint: SerialEndpoint,
}

impl SerialDialer {
    /// Create a dialer for the given port
    pub fn new(endpoint: SerialEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Dial for SerialDialer {
    async fn dial(&self) -> Result<BoxedSession, LinkError> {
        let stream = tokio_serial::new(&self.endpoint.path, self.endpoint.baud_rate)
            .open_native_async()
            .map_err(|e| LinkError::transport_error(format!("serial open: {}", e), true))?;
        tracing::debug!(port = %self.endpoint.path, baud = self.endpoint.baud_rate, "serial session opened");
        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.endpoint.path, self.endpoint.baud_rate)
    }
}
