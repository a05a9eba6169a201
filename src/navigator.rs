//! Daemon-side entry point for search and playback.
//!
//! Owns the handles every request needs (remote client, zone tracker,
//! artwork resolver) and runs one request against Roon at a time: search
//! and play share the Core's browse session state, so interleaving them
//! would let one traversal invalidate the other's item keys.

use std::sync::Arc;

use async_trait::async_trait;
use roonpipe_wire::{PlayRequest, SearchResult};
use tokio::sync::Mutex;
use tracing::debug;

use crate::browse::{ActionExecutor, BrowseLoadClient, SearchSession, MAX_RESULTS_PER_CATEGORY};
use crate::error::{NavError, NavResult};
use crate::images::ImageResolver;
use crate::ipc::RequestHandler;
use crate::zones::ZoneTracker;

pub struct Navigator {
    client: Arc<dyn BrowseLoadClient>,
    zones: ZoneTracker,
    images: Arc<dyn ImageResolver>,
    max_per_category: usize,
    gate: Mutex<()>,
}

impl Navigator {
    pub fn new(
        client: Arc<dyn BrowseLoadClient>,
        zones: ZoneTracker,
        images: Arc<dyn ImageResolver>,
    ) -> Self {
        Self {
            client,
            zones,
            images,
            max_per_category: MAX_RESULTS_PER_CATEGORY,
            gate: Mutex::new(()),
        }
    }

    pub fn with_max_per_category(mut self, max: usize) -> Self {
        self.max_per_category = max;
        self
    }

    /// Zone to target, once the Core is reachable.
    async fn target_zone(&self) -> NavResult<String> {
        if !self.client.is_connected().await {
            return Err(NavError::not_connected());
        }
        self.zones.current_zone_id().await.ok_or_else(NavError::no_zone)
    }
}

#[async_trait]
impl RequestHandler for Navigator {
    async fn search(&self, query: &str) -> NavResult<Vec<SearchResult>> {
        let zone_id = self.target_zone().await?;
        let _turn = self.gate.lock().await;
        debug!(zone_id = %zone_id, "search acquired remote session");

        SearchSession::new(self.client.as_ref(), self.images.as_ref(), zone_id)
            .with_max_per_category(self.max_per_category)
            .search(query)
            .await
    }

    async fn play(&self, req: &PlayRequest) -> NavResult<()> {
        let zone_id = self.target_zone().await?;
        let _turn = self.gate.lock().await;
        debug!(zone_id = %zone_id, "play acquired remote session");

        ActionExecutor::new(self.client.as_ref())
            .execute(&zone_id, req)
            .await
    }
}
