//! TCP transport session

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::TcpEndpoint;
use crate::error::LinkError;
use crate::transport::{BoxedSession, Dial};

/// Opens TCP sessions against a fixed endpoint
#[derive(Debug, Clone)]
pub struct TcpDialer {
    endpoint: TcpEndpoint,
}

impl TcpDialer {
    /// Create a dialer for the given endpoint
    pub fn new(endpoint: TcpEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Dial for TcpDialer {
    async fn dial(&self) -> Result<BoxedSession, LinkError> {
        let stream = TcpStream::connect(self.endpoint.address()).await?;
        // Frames are small and latency-sensitive
        stream.set_nodelay(true)?;
        tracing::debug!(endpoint = %self.endpoint.address(), "TCP session established");
        Ok(Box::new(stream))
    }

    fn endpoint(&self) -> String {
        self.endpoint.address()
    }
}
