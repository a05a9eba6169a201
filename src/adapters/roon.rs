//! Roon Core binding using rust-roon-api
//!
//! One extension connection requesting the Browse, Image and Transport
//! services. Browse/load and image replies arrive on the core event channel;
//! callers wait on oneshot channels registered under the request id.
//! Zone pushes are fed to the [`ZoneTracker`].

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use roon_api::{
    browse::{Browse, BrowseOpts, BrowseResult, Item as BrowseItem, ItemHint, LoadOpts, LoadResult},
    image::{Args as ImageArgs, Format as ImageFormat, Image, Scale, Scaling},
    info,
    transport::Transport,
    CoreEvent, Parsed, RoonApi, Services, Svc,
};
use serde_json::Value;
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;

use crate::adapters::handle::{run_with_retry, RetryConfig};
use crate::browse::{
    BrowseContext, BrowseList, BrowseLoadClient, BrowseRequest, Hint, LoadRequest, MenuNode,
};
use crate::config::{RoonConfig, SearchSource};
use crate::error::{NavError, NavResult};
use crate::images::ImageFetcher;
use crate::zones::{ZonePush, ZoneTracker};

/// Items requested when looking for the source and Search entries
const MENU_SCAN_COUNT: usize = 10;

/// Pending browse request - delivers the result to the waiting caller
type PendingBrowse = oneshot::Sender<NavResult<BrowseResult>>;

/// Pending load request - delivers the result to the waiting caller
type PendingLoad = oneshot::Sender<NavResult<LoadResult>>;

/// Pending image request - delivers the JPEG bytes
type PendingImage = oneshot::Sender<Vec<u8>>;

/// Connection settings
#[derive(Debug, Clone)]
pub struct RoonSettings {
    pub state_file: PathBuf,
    pub request_timeout: Duration,
    pub source: SearchSource,
}

impl RoonSettings {
    pub fn from_config(roon: &RoonConfig, source: SearchSource) -> Self {
        Self {
            state_file: roon.state_file(),
            request_timeout: roon.request_timeout(),
            source,
        }
    }
}

/// Internal state for the core connection
#[derive(Default)]
struct CoreState {
    connected: bool,
    core_name: Option<String>,
    browse: Option<Browse>,
    image: Option<Image>,
    /// request_id -> (session_key, sender)
    pending_browses: HashMap<usize, (Option<String>, PendingBrowse)>,
    /// request_id -> (session_key, sender)
    pending_loads: HashMap<usize, (Option<String>, PendingLoad)>,
    /// request_id -> (image_key, sender)
    pending_images: HashMap<usize, (String, PendingImage)>,
}

impl CoreState {
    /// Forget the core; waiting callers see their request cancelled
    fn disconnect(&mut self) {
        self.connected = false;
        self.core_name = None;
        self.browse = None;
        self.image = None;
        self.pending_browses.clear();
        self.pending_loads.clear();
        self.pending_images.clear();
    }
}

/// Roon adapter
#[derive(Clone)]
pub struct RoonAdapter {
    state: Arc<RwLock<CoreState>>,
    zones: ZoneTracker,
    settings: RoonSettings,
}

impl RoonAdapter {
    pub fn new(settings: RoonSettings, zones: ZoneTracker) -> Self {
        Self {
            state: Arc::new(RwLock::new(CoreState::default())),
            zones,
            settings,
        }
    }

    pub async fn core_name(&self) -> Option<String> {
        self.state.read().await.core_name.clone()
    }

    /// Keep a core connection up until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let config = RetryConfig::new(Duration::from_secs(1), Duration::from_secs(60));
        run_with_retry("Roon connection", config, shutdown.clone(), || {
            self.run_once(shutdown.clone())
        })
        .await;

        self.state.write().await.disconnect();
    }

    async fn browse_service(&self) -> NavResult<Browse> {
        self.state
            .read()
            .await
            .browse
            .clone()
            .ok_or_else(NavError::not_connected)
    }

    /// Send a request and wait for the reply the event task routes back.
    ///
    /// `register` files the sender under the request id; `forget` drops it
    /// again on timeout.
    async fn issue<T, F>(
        &self,
        kind: &str,
        send: F,
        register: impl FnOnce(&mut CoreState, usize, oneshot::Sender<NavResult<T>>),
        forget: fn(&mut CoreState, usize),
    ) -> NavResult<T>
    where
        F: Future<Output = Option<usize>>,
    {
        let (tx, rx) = oneshot::channel();

        // Hold the lock until the sender is registered so the event task
        // can't see the reply first
        let req_id = {
            let mut state = self.state.write().await;
            let req_id = send.await.ok_or_else(|| {
                NavError::remote(format!(
                    "Failed to initiate {} request",
                    kind.to_lowercase()
                ))
            })?;
            register(&mut state, req_id, tx);
            req_id
        };
        tracing::debug!("{} request initiated with req_id {}", kind, req_id);

        let result = tokio::time::timeout(self.settings.request_timeout, rx).await;
        if result.is_err() {
            forget(&mut *self.state.write().await, req_id);
        }

        match result {
            Ok(Ok(data)) => data,
            Ok(Err(_)) => Err(NavError::remote(format!("{} request cancelled", kind))),
            Err(_) => Err(NavError::remote(format!("{} request timed out", kind))),
        }
    }

    /// Issue a browse and wait for its result
    async fn send_browse(&self, opts: BrowseOpts) -> NavResult<BrowseResult> {
        let session_key = opts.multi_session_key.clone();
        let browse = self.browse_service().await?;

        self.issue(
            "Browse",
            async move { browse.browse(&opts).await },
            move |state, req_id, tx| {
                state.pending_browses.insert(req_id, (session_key, tx));
            },
            |state, req_id| {
                state.pending_browses.remove(&req_id);
            },
        )
        .await
    }

    /// Issue a load and wait for its result
    async fn send_load(&self, opts: LoadOpts) -> NavResult<LoadResult> {
        let session_key = opts.multi_session_key.clone();
        let browse = self.browse_service().await?;

        self.issue(
            "Load",
            async move { browse.load(&opts).await },
            move |state, req_id, tx| {
                state.pending_loads.insert(req_id, (session_key, tx));
            },
            |state, req_id| {
                state.pending_loads.remove(&req_id);
            },
        )
        .await
    }

    /// Browse into the configured source's Search node with `query`.
    ///
    /// The library only browses the "browse" hierarchy, so the search
    /// hierarchy is reached by walking root -> source -> Search.
    async fn open_search(&self, ctx: &BrowseContext, query: &str) -> NavResult<BrowseResult> {
        let session_key = Some(ctx.session_key.clone());
        let zone = Some(ctx.zone_id.clone());
        let source_name = self.settings.source.title();

        self.send_browse(BrowseOpts {
            multi_session_key: session_key.clone(),
            zone_or_output_id: zone.clone(),
            pop_all: true,
            ..Default::default()
        })
        .await?;
        let root = self
            .send_load(LoadOpts {
                multi_session_key: session_key.clone(),
                count: Some(MENU_SCAN_COUNT),
                ..Default::default()
            })
            .await?;
        let source_key = find_key(&root.items, source_name)
            .ok_or_else(|| NavError::remote(format!("{} not found in browse root", source_name)))?;

        self.send_browse(BrowseOpts {
            multi_session_key: session_key.clone(),
            item_key: Some(source_key),
            zone_or_output_id: zone.clone(),
            ..Default::default()
        })
        .await?;
        let source_items = self
            .send_load(LoadOpts {
                multi_session_key: session_key.clone(),
                count: Some(MENU_SCAN_COUNT),
                ..Default::default()
            })
            .await?;
        let search_key = find_key(&source_items.items, "Search")
            .ok_or_else(|| NavError::remote(format!("Search not found in {}", source_name)))?;

        self.send_browse(BrowseOpts {
            multi_session_key: session_key,
            item_key: Some(search_key),
            input: Some(query.to_string()),
            zone_or_output_id: zone,
            ..Default::default()
        })
        .await
    }

    /// One connection lifetime: discovery until the core is lost.
    async fn run_once(&self, shutdown: CancellationToken) -> Result<()> {
        let state_path = self.settings.state_file.clone();
        if let Some(parent) = state_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let state_path = state_path.to_string_lossy().to_string();
        tracing::info!("Roon state file: {}", state_path);

        let info = info!("com.roonpipe", "RoonPipe");
        let mut roon = RoonApi::new(info);

        let services = vec![
            Services::Browse(Browse::new()),
            Services::Image(Image::new()),
            Services::Transport(Transport::new()),
        ];
        let provided: HashMap<String, Svc> = HashMap::new();

        let state_path_for_load = state_path.clone();
        let get_roon_state = move || RoonApi::load_roon_state(&state_path_for_load);

        let (mut handles, mut core_rx) = roon
            .start_discovery(Box::new(get_roon_state), provided, Some(services))
            .await
            .ok_or_else(|| anyhow!("Failed to start Roon discovery"))?;

        tracing::info!(
            "Roon discovery started, waiting for core (enable RoonPipe in Roon → Settings → Extensions)..."
        );

        let adapter = self.clone();
        let shutdown_for_events = shutdown.clone();
        handles.spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown_for_events.cancelled() => {
                        tracing::info!("Roon event handler shutdown requested");
                        break;
                    }
                    event = core_rx.recv() => event,
                };

                let Some((event, msg)) = event else {
                    tracing::info!("Roon event channel closed");
                    break;
                };

                if !adapter.handle_core_event(event).await {
                    break;
                }
                if let Some((raw, parsed)) = msg {
                    adapter.handle_parsed(&state_path, raw, parsed).await;
                }
            }
        });

        // The event task ends on shutdown, core loss or a closed channel
        handles.join_next().await;
        handles.abort_all();

        self.state.write().await.disconnect();
        if shutdown.is_cancelled() {
            Ok(())
        } else {
            Err(anyhow!("Roon core lost, reconnecting"))
        }
    }

    /// Returns false once the core is gone
    async fn handle_core_event(&self, event: CoreEvent) -> bool {
        match event {
            CoreEvent::Registered(mut core, _token) => {
                let core_name = core.display_name.clone();
                tracing::info!("Connected to Roon Core: {}", core_name);

                if let Some(transport) = core.get_transport() {
                    transport.subscribe_zones().await;
                }

                let mut s = self.state.write().await;
                s.connected = true;
                s.core_name = Some(core_name);
                s.browse = core.get_browse().cloned();
                s.image = core.get_image().cloned();
                if s.image.is_none() {
                    tracing::warn!("Roon Image service not available, artwork disabled");
                }
                true
            }
            CoreEvent::Lost(core) => {
                tracing::warn!("Lost connection to Roon Core: {}", core.display_name);
                self.state.write().await.disconnect();
                self.zones.apply(ZonePush::Unpaired).await;
                false
            }
            _ => true,
        }
    }

    async fn handle_parsed(&self, state_path: &str, raw: Value, parsed: Parsed) {
        match parsed {
            Parsed::RoonState(roon_state) => {
                if let Err(e) = RoonApi::save_roon_state(state_path, roon_state) {
                    tracing::warn!("Failed to save Roon state: {}", e);
                }
            }
            Parsed::Zones(_) => {
                if let Some(push) = ZonePush::from_body(message_body(&raw)) {
                    self.zones.apply(push).await;
                }
            }
            Parsed::ZonesSeek(_) => {
                let body = message_body(&raw);
                // Bodies that also carry zones were applied whole above
                if body.get("zones").is_none() && body.get("zones_changed").is_none() {
                    if let Some(push) = ZonePush::from_body(body) {
                        self.zones.apply(push).await;
                    }
                }
            }
            Parsed::BrowseResult(result, session_key) => {
                let mut s = self.state.write().await;
                if let Some(req_id) = s
                    .pending_browses
                    .iter()
                    .find(|(_, (key, _))| key == &session_key)
                    .map(|(k, _)| *k)
                {
                    if let Some((_key, sender)) = s.pending_browses.remove(&req_id) {
                        if sender.send(Ok(result)).is_err() {
                            tracing::debug!("Browse request dropped by caller: {:?}", session_key);
                        }
                    }
                }
            }
            Parsed::LoadResult(result, session_key) => {
                tracing::debug!(
                    "LoadResult {} items, session_key={:?}",
                    result.items.len(),
                    session_key
                );
                let mut s = self.state.write().await;
                if let Some(req_id) = s
                    .pending_loads
                    .iter()
                    .find(|(_, (key, _))| key == &session_key)
                    .map(|(k, _)| *k)
                {
                    if let Some((_key, sender)) = s.pending_loads.remove(&req_id) {
                        if sender.send(Ok(result)).is_err() {
                            tracing::debug!("Load request dropped by caller: {:?}", session_key);
                        }
                    }
                }
            }
            Parsed::Jpeg((image_key, data)) => {
                let mut s = self.state.write().await;
                if let Some(req_id) = s
                    .pending_images
                    .iter()
                    .find(|(_, (key, _))| key == &image_key)
                    .map(|(k, _)| *k)
                {
                    if let Some((_key, sender)) = s.pending_images.remove(&req_id) {
                        let _ = sender.send(data);
                    }
                }
            }
            Parsed::Error(err) => {
                // Errors carry no request id. Requests are serialized by the
                // navigator, so whatever is pending is what failed.
                tracing::warn!("Roon API error: {}", err);
                let message = err.to_string();
                let mut s = self.state.write().await;
                for (_, (_, sender)) in s.pending_browses.drain() {
                    let _ = sender.send(Err(NavError::remote(message.clone())));
                }
                for (_, (_, sender)) in s.pending_loads.drain() {
                    let _ = sender.send(Err(NavError::remote(message.clone())));
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl BrowseLoadClient for RoonAdapter {
    async fn is_connected(&self) -> bool {
        let s = self.state.read().await;
        s.connected && s.browse.is_some()
    }

    async fn browse(&self, ctx: &BrowseContext, req: BrowseRequest) -> NavResult<BrowseList> {
        tracing::debug!(
            hierarchy = ctx.hierarchy.as_str(),
            session_key = %ctx.session_key,
            item_key = ?req.item_key,
            "browse"
        );

        let result = match (&req.item_key, &req.input) {
            (None, Some(query)) => {
                self.open_search(ctx, query).await?
            }
            _ => {
                self.send_browse(BrowseOpts {
                    multi_session_key: Some(ctx.session_key.clone()),
                    item_key: req.item_key.clone(),
                    input: req.input.clone(),
                    zone_or_output_id: Some(ctx.zone_id.clone()),
                    ..Default::default()
                })
                .await?
            }
        };

        // The Core answers under the session key it was sent
        Ok(BrowseList {
            count: result.list.as_ref().map(|list| list.count),
            session_key: None,
        })
    }

    async fn load(&self, ctx: &BrowseContext, req: LoadRequest) -> NavResult<Vec<MenuNode>> {
        // Roon loads the list the session last browsed into; the item key
        // only identifies it for the caller
        tracing::debug!(
            session_key = %ctx.session_key,
            item_key = ?req.item_key,
            offset = req.offset,
            count = req.count,
            "load"
        );

        let result = self
            .send_load(LoadOpts {
                multi_session_key: Some(ctx.session_key.clone()),
                offset: req.offset,
                count: Some(req.count),
                ..Default::default()
            })
            .await?;

        Ok(result.items.into_iter().map(menu_node).collect())
    }
}

#[async_trait]
impl ImageFetcher for RoonAdapter {
    async fn fetch_jpeg(&self, image_key: &str, size: u32) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();

        let req_id = {
            let mut state = self.state.write().await;
            let image = state
                .image
                .as_ref()
                .ok_or_else(|| anyhow!("Image service not available"))?;

            let scaling = Scaling::new(Scale::Fit, size, size);
            let args = ImageArgs::new(Some(scaling), Some(ImageFormat::Jpeg));
            let req_id = image
                .get_image(image_key, args)
                .await
                .ok_or_else(|| anyhow!("Failed to request image"))?;
            state
                .pending_images
                .insert(req_id, (image_key.to_string(), tx));
            req_id
        };
        tracing::debug!("Requested image {} with req_id {}", image_key, req_id);

        let result = tokio::time::timeout(self.settings.request_timeout, rx).await;
        if !matches!(result, Ok(Ok(_))) {
            self.state.write().await.pending_images.remove(&req_id);
        }

        match result {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => Err(anyhow!("Image request cancelled")),
            Err(_) => Err(anyhow!("Image request timed out")),
        }
    }
}

/// Body of a transport message, whether or not the envelope was kept
fn message_body(raw: &Value) -> &Value {
    raw.get("body").unwrap_or(raw)
}

fn find_key(items: &[BrowseItem], title: &str) -> Option<String> {
    items
        .iter()
        .find(|item| item.title == title)
        .and_then(|item| item.item_key.clone())
}

fn menu_node(item: BrowseItem) -> MenuNode {
    let hint = match item.hint {
        Some(ItemHint::Action) => Hint::Action,
        Some(ItemHint::ActionList) => Hint::ActionList,
        Some(ItemHint::List) => Hint::List,
        Some(ItemHint::Header) => Hint::Header,
        _ => Hint::Item,
    };

    MenuNode {
        item_key: item.item_key,
        title: item.title,
        subtitle: item.subtitle,
        hint,
        image_key: item.image_key,
    }
}
