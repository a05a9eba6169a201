//! Local socket bridge between the daemon and detached clients.
//!
//! Each connection carries exactly one request and one newline-terminated
//! JSON response. Request failures are reported in the response's `error`
//! field and never stop the server.

pub mod client;
pub mod probe;
pub mod server;

use async_trait::async_trait;
use roonpipe_wire::{IpcRequest, IpcResponse, PlayRequest, SearchResult};
use tracing::{debug, warn};

use crate::error::NavResult;

pub use client::IpcClient;
pub use probe::is_instance_running;
pub use server::IpcServer;

/// Socket path used when none is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/roonpipe.sock";

/// What the server calls for each decoded request.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn search(&self, query: &str) -> NavResult<Vec<SearchResult>>;

    async fn play(&self, req: &PlayRequest) -> NavResult<()>;
}

/// Decode one payload, run it and build the response.
pub async fn dispatch(handler: &dyn RequestHandler, payload: &[u8]) -> IpcResponse {
    let request = match IpcRequest::parse(payload) {
        Ok(request) => request,
        Err(error) => {
            debug!("Rejected request: {}", error);
            return IpcResponse::error(error);
        }
    };
    debug!("Handling {} request", request.command());

    match request {
        IpcRequest::Search { query } => match handler.search(&query).await {
            Ok(results) => IpcResponse::search_ok(results),
            Err(e) => {
                warn!("Search for {:?} failed: {}", query, e);
                IpcResponse::search_failed(e.to_string())
            }
        },
        IpcRequest::Play(req) => match handler.play(&req).await {
            Ok(()) => IpcResponse::play_ok(),
            Err(e) => {
                warn!("Play {:?} failed: {}", req.action_title, e);
                IpcResponse::play_failed(e.to_string())
            }
        },
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StubHandler;
    use super::*;

    #[tokio::test]
    async fn test_dispatch_search() {
        let handler = StubHandler::default();
        let response = dispatch(&handler, br#"{"command":"search","query":"abbey"}"#).await;
        match response {
            IpcResponse::Search(search) => {
                assert!(search.error.is_none());
                assert_eq!(search.results.unwrap().len(), 1);
            }
            other => panic!("Expected search response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_reports_handler_errors() {
        let handler = StubHandler::default();
        let line = dispatch(&handler, br#"{"command":"search","query":"offline"}"#)
            .await
            .to_line();
        assert_eq!(line, "{\"error\":\"Roon Core not connected\",\"results\":null}\n");

        let line = dispatch(
            &handler,
            br#"{"command":"play","item_key":"1","session_key":"s","category_key":"c","item_index":0,"action_title":"Queue"}"#,
        )
        .await
        .to_line();
        assert_eq!(
            line,
            "{\"error\":\"Action \\\"Queue\\\" not available\",\"success\":false}\n"
        );
    }

    #[tokio::test]
    async fn test_dispatch_rejections() {
        let handler = StubHandler::default();
        assert_eq!(
            dispatch(&handler, b"garbage").await.to_line(),
            "{\"error\":\"Invalid request format\"}\n"
        );
        assert_eq!(
            dispatch(&handler, br#"{"command":"volume"}"#).await.to_line(),
            "{\"error\":\"Unknown command\"}\n"
        );
    }
}
