//! Unix socket server: one request, one response, close.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use roonpipe_wire::{ipc::INVALID_REQUEST_FORMAT, IpcResponse};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{dispatch, RequestHandler};

/// Largest request accepted, in bytes.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Result of reading one request off a connection.
#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Request(Vec<u8>),
    TooLarge,
    /// Peer closed without sending anything (an instance probe)
    Empty,
}

pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Bind `path`, replacing any stale socket file.
    ///
    /// Callers must have checked that no live instance owns the path.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Failed to bind {}", path.display()))?;

        // Clients may run as another user
        if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o666)) {
            warn!("Failed to set socket permissions on {}: {}", path.display(), e);
        }

        info!("IPC server listening on {}", path.display());
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `shutdown` fires, then remove the socket file.
    pub async fn serve(self, handler: Arc<dyn RequestHandler>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handler.as_ref()).await {
                                debug!("IPC connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => warn!("IPC accept failed: {}", e),
                },
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Socket {} not removed: {}", self.path.display(), e);
        }
        info!("IPC server stopped");
    }
}

async fn handle_connection(mut stream: UnixStream, handler: &dyn RequestHandler) -> Result<()> {
    let response = match read_request(&mut stream).await? {
        Frame::Empty => return Ok(()),
        Frame::TooLarge => IpcResponse::error(INVALID_REQUEST_FORMAT),
        Frame::Request(payload) => dispatch(handler, &payload).await,
    };

    stream.write_all(response.to_line().as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read until a newline, EOF, or a buffer that is either a complete JSON
/// value or can never become one, whichever comes first.
async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Frame> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(if buf.iter().all(u8::is_ascii_whitespace) {
                Frame::Empty
            } else {
                Frame::Request(buf)
            });
        }

        let start = buf.len();
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buf[start..].iter().position(|b| *b == b'\n') {
            buf.truncate(start + pos);
            return Ok(Frame::Request(buf));
        }
        if buf.len() > MAX_REQUEST_BYTES {
            return Ok(Frame::TooLarge);
        }
        // Clients that don't terminate the line but keep the socket open.
        // Only a truncated value is worth waiting on.
        match serde_json::from_slice::<serde_json::Value>(&buf) {
            Err(e) if e.is_eof() => {}
            _ => return Ok(Frame::Request(buf)),
        }
    }
}
