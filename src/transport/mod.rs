//! Transport sessions
//!
//! A transport session owns exactly one physical or network connection and
//! its raw read/write primitives. Sessions are produced by dialers and
//! handed out exclusively; no other component touches the underlying I/O.

mod serial;
mod tcp;

pub use serial::SerialDialer;
pub use tcp::TcpDialer;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::LinkError;

/// Raw byte-stream I/O of one live session
pub trait SessionIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> SessionIo for T {}

/// A live transport session, type-erased over the concrete stream
pub type BoxedSession = Box<dyn SessionIo>;

/// Opens transport sessions against a fixed endpoint
///
/// One dialer per adapter; the endpoint descriptor behind it never changes
/// after construction.
#[async_trait]
pub trait Dial: Send + Sync + 'static {
    /// Open a new session; a returned session has completed its handshake
    /// (socket connected / port open)
    async fn dial(&self) -> Result<BoxedSession, LinkError>;

    /// Human-readable endpoint label for logs and health details
    fn endpoint(&self) -> String;
}
