//! Client side of the daemon socket.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use roonpipe_wire::{PlayRequest, PlayResponse, SearchResponse, SearchResult};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

pub struct IpcClient {
    path: PathBuf,
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let response: SearchResponse = self
            .request(&json!({ "command": "search", "query": query }))
            .await?;
        if let Some(error) = response.error {
            return Err(anyhow!(error));
        }
        Ok(response.results.unwrap_or_default())
    }

    pub async fn play(&self, req: &PlayRequest) -> Result<()> {
        let mut payload = serde_json::to_value(req)?;
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("command".to_string(), json!("play"));
        }

        let response: PlayResponse = self.request(&payload).await?;
        match response.error {
            Some(error) => Err(anyhow!(error)),
            None if !response.success => Err(anyhow!("Playback failed")),
            None => Ok(()),
        }
    }

    /// Send one request line and read the reply until the daemon closes.
    async fn request<T: DeserializeOwned>(&self, payload: &serde_json::Value) -> Result<T> {
        let mut stream = UnixStream::connect(&self.path).await.with_context(|| {
            format!(
                "Could not connect to the daemon at {}. Is roonpipe running?",
                self.path.display()
            )
        })?;

        let mut line = serde_json::to_vec(payload)?;
        line.push(b'\n');
        stream.write_all(&line).await?;

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;

        serde_json::from_slice(&reply).context("Malformed response from daemon")
    }
}
