//! Tracks the one zone the daemon targets, fed by Roon's zone pushes.
//!
//! Roon pushes per-zone deltas, not snapshots. Only one zone is ever
//! relevant here: whichever is playing, falling back to the first zone seen.

use std::sync::Arc;

use roonpipe_wire::{SeekUpdate, Zone, ZoneEvent};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Seek positions arrive in seconds; consumers want microseconds.
const MICROS_PER_SECOND: i64 = 1_000_000;

/// A zone push from the transport service.
#[derive(Debug, Clone, PartialEq)]
pub enum ZonePush {
    /// Full zone list, sent once after subscribing
    Subscribed(Vec<Zone>),
    Changed {
        zones_changed: Option<Vec<Zone>>,
        zones_seek_changed: Option<Vec<SeekUpdate>>,
    },
    /// The Core went away
    Unpaired,
}

impl ZonePush {
    /// Interpret a transport message body.
    ///
    /// Returns `None` for bodies carrying nothing the tracker uses
    /// (`zones_added`/`zones_removed` only, for instance).
    pub fn from_body(body: &Value) -> Option<Self> {
        if let Some(zones) = body.get("zones") {
            return Some(Self::Subscribed(parse_list(zones, "zones")));
        }

        let zones_changed = body
            .get("zones_changed")
            .map(|v| parse_list(v, "zones_changed"));
        let zones_seek_changed = body
            .get("zones_seek_changed")
            .map(|v| parse_list(v, "zones_seek_changed"));

        if zones_changed.is_none() && zones_seek_changed.is_none() {
            return None;
        }
        Some(Self::Changed {
            zones_changed,
            zones_seek_changed,
        })
    }
}

/// Entries that don't parse are dropped, the rest kept.
fn parse_list<T: serde::de::DeserializeOwned>(value: &Value, field: &str) -> Vec<T> {
    let Some(entries) = value.as_array() else {
        warn!("Zone push field {} is not a list", field);
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping malformed {} entry: {}", field, e);
                None
            }
        })
        .collect()
}

/// Owner of the tracked zone.
///
/// Only [`ZoneTracker::apply`] mutates it; everyone else reads snapshots or
/// listens on [`ZoneTracker::subscribe`].
#[derive(Clone)]
pub struct ZoneTracker {
    current: Arc<RwLock<Option<Zone>>>,
    events: broadcast::Sender<ZoneEvent>,
}

impl Default for ZoneTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneTracker {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            current: Arc::new(RwLock::new(None)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ZoneEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the tracked zone
    pub async fn current(&self) -> Option<Zone> {
        self.current.read().await.clone()
    }

    pub async fn current_zone_id(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|zone| zone.zone_id.clone())
    }

    pub async fn apply(&self, push: ZonePush) {
        match push {
            ZonePush::Subscribed(zones) => {
                let selected = zones
                    .iter()
                    .find(|z| z.is_playing())
                    .or_else(|| zones.first())
                    .cloned();
                if let Some(zone) = &selected {
                    info!("Tracking zone {} ({})", zone.display_name, zone.state);
                }
                *self.current.write().await = selected.clone();
                self.emit(ZoneEvent::ZoneChanged { zone: selected });
            }
            ZonePush::Changed {
                zones_changed,
                zones_seek_changed,
            } => {
                if let Some(changed) = zones_changed {
                    let snapshot = self.apply_changed(changed).await;
                    self.emit(ZoneEvent::ZoneChanged { zone: snapshot });
                }
                if let Some(seeks) = zones_seek_changed {
                    self.apply_seek(seeks).await;
                }
            }
            ZonePush::Unpaired => {
                info!("Core unpaired, no zone tracked");
                *self.current.write().await = None;
                self.emit(ZoneEvent::Unpaired);
            }
        }
    }

    async fn apply_changed(&self, changed: Vec<Zone>) -> Option<Zone> {
        let mut current = self.current.write().await;

        if let Some(playing) = changed.iter().find(|z| z.is_playing()) {
            if current.as_ref().map(|z| &z.zone_id) != Some(&playing.zone_id) {
                info!("Switching to playing zone {}", playing.display_name);
            }
            *current = Some(playing.clone());
        } else if let Some(tracked_id) = current.as_ref().map(|z| z.zone_id.clone()) {
            if let Some(updated) = changed.into_iter().find(|z| z.zone_id == tracked_id) {
                debug!("Tracked zone {} updated ({})", tracked_id, updated.state);
                *current = Some(updated);
            }
        }

        current.clone()
    }

    async fn apply_seek(&self, seeks: Vec<SeekUpdate>) {
        let position = {
            let mut current = self.current.write().await;
            let Some(zone) = current.as_mut() else {
                return;
            };
            let Some(update) = seeks.into_iter().find(|s| s.zone_id == zone.zone_id) else {
                return;
            };
            let Some(now_playing) = zone.now_playing.as_mut() else {
                return;
            };
            now_playing.seek_position = update.seek_position;
            update.seek_position
        };

        if let Some(seconds) = position {
            self.emit(ZoneEvent::SeekChanged {
                position_us: seconds.saturating_mul(MICROS_PER_SECOND),
            });
        }
    }

    fn emit(&self, event: ZoneEvent) {
        // No receivers is fine: nothing is listening yet
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roonpipe_wire::{NowPlaying, PlaybackState};
    use serde_json::json;

    fn zone(id: &str, state: &str) -> Zone {
        serde_json::from_value(json!({
            "zone_id": id,
            "display_name": format!("Zone {}", id),
            "state": state,
            "now_playing": { "seek_position": 0, "three_line": { "line1": "Something" } }
        }))
        .unwrap()
    }

    fn seek(id: &str, position: Option<i64>) -> SeekUpdate {
        SeekUpdate {
            zone_id: id.to_string(),
            seek_position: position,
            queue_time_remaining: 0,
        }
    }

    async fn tracking(zone: Zone) -> ZoneTracker {
        let tracker = ZoneTracker::new();
        tracker.apply(ZonePush::Subscribed(vec![zone])).await;
        tracker
    }

    #[tokio::test]
    async fn test_subscribed_prefers_playing_zone() {
        let tracker = ZoneTracker::new();
        tracker
            .apply(ZonePush::Subscribed(vec![
                zone("A", "paused"),
                zone("B", "playing"),
            ]))
            .await;
        assert_eq!(tracker.current_zone_id().await.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_subscribed_falls_back_to_first_zone() {
        let tracker = ZoneTracker::new();
        let mut rx = tracker.subscribe();
        tracker
            .apply(ZonePush::Subscribed(vec![
                zone("A", "stopped"),
                zone("B", "paused"),
            ]))
            .await;

        assert_eq!(tracker.current_zone_id().await.as_deref(), Some("A"));
        match rx.try_recv().unwrap() {
            ZoneEvent::ZoneChanged { zone } => assert_eq!(zone.unwrap().zone_id, "A"),
            other => panic!("Expected zone change, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_changed_switches_to_playing_zone() {
        let tracker = tracking(zone("B", "paused")).await;
        tracker
            .apply(ZonePush::Changed {
                zones_changed: Some(vec![zone("A", "playing")]),
                zones_seek_changed: None,
            })
            .await;
        assert_eq!(tracker.current_zone_id().await.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_changed_replaces_tracked_zone_and_always_notifies() {
        let tracker = tracking(zone("A", "playing")).await;
        let mut rx = tracker.subscribe();

        tracker
            .apply(ZonePush::Changed {
                zones_changed: Some(vec![zone("A", "paused")]),
                zones_seek_changed: None,
            })
            .await;
        let current = tracker.current().await.unwrap();
        assert_eq!(current.state, PlaybackState::Paused);
        assert!(matches!(rx.try_recv(), Ok(ZoneEvent::ZoneChanged { .. })));

        // An unrelated paused zone leaves the tracked one alone, but still notifies
        tracker
            .apply(ZonePush::Changed {
                zones_changed: Some(vec![zone("C", "paused")]),
                zones_seek_changed: None,
            })
            .await;
        assert_eq!(tracker.current_zone_id().await.as_deref(), Some("A"));
        match rx.try_recv().unwrap() {
            ZoneEvent::ZoneChanged { zone } => assert_eq!(zone.unwrap().zone_id, "A"),
            other => panic!("Expected zone change, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_seek_updates_tracked_zone() {
        let tracker = tracking(zone("A", "playing")).await;
        let mut rx = tracker.subscribe();

        tracker
            .apply(ZonePush::Changed {
                zones_changed: None,
                zones_seek_changed: Some(vec![seek("A", Some(42))]),
            })
            .await;

        let now_playing: NowPlaying = tracker.current().await.unwrap().now_playing.unwrap();
        assert_eq!(now_playing.seek_position, Some(42));
        assert_eq!(
            rx.try_recv().unwrap(),
            ZoneEvent::SeekChanged {
                position_us: 42_000_000
            }
        );
    }

    #[tokio::test]
    async fn test_seek_position_saturates() {
        let tracker = tracking(zone("A", "playing")).await;
        let mut rx = tracker.subscribe();

        tracker
            .apply(ZonePush::Changed {
                zones_changed: None,
                zones_seek_changed: Some(vec![seek("A", Some(i64::MAX))]),
            })
            .await;
        assert_eq!(
            rx.try_recv().unwrap(),
            ZoneEvent::SeekChanged {
                position_us: i64::MAX
            }
        );
    }

    #[tokio::test]
    async fn test_seek_for_other_zone_is_ignored() {
        let tracker = tracking(zone("A", "playing")).await;
        let mut rx = tracker.subscribe();

        tracker
            .apply(ZonePush::Changed {
                zones_changed: None,
                zones_seek_changed: Some(vec![seek("B", Some(42))]),
            })
            .await;

        assert!(rx.try_recv().is_err());
        let now_playing = tracker.current().await.unwrap().now_playing.unwrap();
        assert_eq!(now_playing.seek_position, Some(0));
    }

    #[tokio::test]
    async fn test_seek_without_now_playing_is_ignored() {
        let mut idle = zone("A", "stopped");
        idle.now_playing = None;
        let tracker = tracking(idle).await;
        let mut rx = tracker.subscribe();

        tracker
            .apply(ZonePush::Changed {
                zones_changed: None,
                zones_seek_changed: Some(vec![seek("A", Some(3))]),
            })
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unpaired_clears_zone() {
        let tracker = tracking(zone("A", "playing")).await;
        let mut rx = tracker.subscribe();

        tracker.apply(ZonePush::Unpaired).await;
        assert!(tracker.current().await.is_none());
        assert_eq!(rx.try_recv().unwrap(), ZoneEvent::Unpaired);
    }

    #[test]
    fn test_push_from_body() {
        let subscribed = ZonePush::from_body(&json!({
            "zones": [{ "zone_id": "A", "state": "playing" }]
        }))
        .unwrap();
        assert!(matches!(subscribed, ZonePush::Subscribed(ref z) if z.len() == 1));

        let changed = ZonePush::from_body(&json!({
            "zones_seek_changed": [{ "zone_id": "A", "seek_position": 7, "queue_time_remaining": 100 }]
        }))
        .unwrap();
        match changed {
            ZonePush::Changed {
                zones_changed,
                zones_seek_changed,
            } => {
                assert!(zones_changed.is_none());
                assert_eq!(zones_seek_changed.unwrap()[0].seek_position, Some(7));
            }
            other => panic!("Expected change, got {:?}", other),
        }

        assert_eq!(
            ZonePush::from_body(&json!({ "zones_removed": ["A"] })),
            None
        );
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let push = ZonePush::from_body(&json!({
            "zones_changed": [{ "display_name": "no id" }, { "zone_id": "B" }]
        }))
        .unwrap();
        match push {
            ZonePush::Changed { zones_changed, .. } => {
                let zones = zones_changed.unwrap();
                assert_eq!(zones.len(), 1);
                assert_eq!(zones[0].zone_id, "B");
            }
            other => panic!("Expected change, got {:?}", other),
        }
    }
}
