use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::CrdbResult;

/// A bidirectional byte stream to the remote end of a tunnel.
pub trait RemoteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> RemoteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedRemoteStream = Box<dyn RemoteStream>;

/// Opens streams to the remote end of a tunnel, one per accepted local connection.
///
/// Failures that mean the remote end cannot be reached at all must use
/// [`crate::error::ErrorKind::RemoteUnreachableError`]; they terminate the tunnel.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self) -> CrdbResult<BoxedRemoteStream>;
}
