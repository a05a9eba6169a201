//! Single-instance check against the daemon socket.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;

/// How long a live daemon gets to accept the probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Whether a daemon is accepting connections on `path`.
///
/// A missing path, a refused connection (stale socket file) or a connect
/// that doesn't finish within [`PROBE_TIMEOUT`] all count as not running.
pub async fn is_instance_running(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }

    answers_within(path, PROBE_TIMEOUT, UnixStream::connect(path)).await
}

async fn answers_within<T>(
    path: &Path,
    limit: Duration,
    connect: impl Future<Output = std::io::Result<T>>,
) -> bool {
    match timeout(limit, connect).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("Socket {} present but not accepting: {}", path.display(), e);
            false
        }
        Err(_) => {
            debug!("Connecting to {} timed out", path.display());
            false
        }
    }
}
