//! Desktop notifications for track changes on the tracked zone.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use roonpipe_wire::{NowPlaying, PlaybackState, Zone, ZoneEvent};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::images::ImageResolver;

/// Display fields of the current track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
}

/// Title, first artist and album out of Roon's three display lines.
pub fn parse_now_playing(now_playing: &NowPlaying) -> TrackInfo {
    let lines = &now_playing.three_line;

    let title = if lines.line1.is_empty() {
        "Unknown Track".to_string()
    } else {
        lines.line1.clone()
    };

    // Roon joins multiple artists with " / "
    let artists = match lines.line2.split(" / ").map(str::trim).next() {
        Some(first) if !lines.line2.is_empty() => vec![first.to_string()],
        _ => vec!["Unknown Artist".to_string()],
    };

    TrackInfo {
        title,
        artists,
        album: lines.line3.clone(),
    }
}

/// A notification ready to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub summary: String,
    pub body: String,
    pub image: Option<PathBuf>,
}

impl Notification {
    pub fn for_track(track: &TrackInfo, image: Option<PathBuf>) -> Self {
        Self {
            summary: track.title.clone(),
            body: format!("{} • {}", track.artists.join(", "), track.album),
            image,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<()>;
}

/// Shows notifications through the `notify-send` command
pub struct NotifySend;

#[async_trait]
impl Notifier for NotifySend {
    async fn show(&self, notification: &Notification) -> Result<()> {
        let mut cmd = Command::new("notify-send");
        cmd.arg("--app-name=Roon")
            .arg("--icon=audio-x-generic")
            .arg("--replace-id=1")
            .arg("--hint=int:transient:1")
            .arg("--expire-time=5000");
        if let Some(image) = &notification.image {
            cmd.arg(format!("--hint=string:image-path:{}", image.display()));
        }
        cmd.arg(&notification.summary).arg(&notification.body);

        let status = cmd.status().await.context("Failed to run notify-send")?;
        if !status.success() {
            bail!("notify-send exited with {}", status);
        }
        Ok(())
    }
}

/// Decides when a zone update is worth a notification.
///
/// The first update after start is recorded without notifying. After that,
/// playback starting or the track changing while playing triggers one.
pub struct TrackNotifier {
    notifier: Arc<dyn Notifier>,
    images: Arc<dyn ImageResolver>,
    last_track: Option<String>,
    last_state: Option<PlaybackState>,
    seen_first: bool,
}

impl TrackNotifier {
    pub fn new(notifier: Arc<dyn Notifier>, images: Arc<dyn ImageResolver>) -> Self {
        Self {
            notifier,
            images,
            last_track: None,
            last_state: None,
            seen_first: false,
        }
    }

    /// Whether `zone` warrants a notification. Updates the remembered state
    /// for every update that doesn't.
    fn observe(&mut self, zone: &Zone) -> bool {
        let Some(now_playing) = &zone.now_playing else {
            return false;
        };
        let track_id = now_playing.image_key.clone().unwrap_or_default();

        if !self.seen_first {
            self.seen_first = true;
            self.last_track = Some(track_id);
            self.last_state = Some(zone.state);
            return false;
        }

        let playing = zone.is_playing();
        let started = playing && self.last_state != Some(PlaybackState::Playing);
        let changed = self.last_track.as_deref() != Some(track_id.as_str());

        if started || (changed && playing) {
            true
        } else {
            self.last_state = Some(zone.state);
            false
        }
    }

    /// Record `zone` as notified
    fn confirm(&mut self, zone: &Zone) {
        self.last_track = zone
            .now_playing
            .as_ref()
            .map(|np| np.image_key.clone().unwrap_or_default());
        self.last_state = Some(zone.state);
    }

    pub async fn handle(&mut self, zone: &Zone) {
        if !self.observe(zone) {
            return;
        }
        let Some(now_playing) = &zone.now_playing else {
            return;
        };

        let track = parse_now_playing(now_playing);
        let image = match &now_playing.image_key {
            Some(key) => self.images.resolve(key).await,
            None => None,
        };

        info!("Showing notification for track: {}", track.title);
        match self
            .notifier
            .show(&Notification::for_track(&track, image))
            .await
        {
            Ok(()) => self.confirm(zone),
            Err(e) => warn!("Failed to show notification: {}", e),
        }
    }

    /// Consume zone events until the channel closes
    pub async fn run(mut self, mut events: broadcast::Receiver<ZoneEvent>) {
        loop {
            match events.recv().await {
                Ok(ZoneEvent::ZoneChanged { zone: Some(zone) }) => self.handle(&zone).await,
                Ok(other) => debug!("Notifier ignoring {}", other.event_type()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Notifier skipped {} zone events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
