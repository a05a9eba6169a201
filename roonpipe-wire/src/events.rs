//! Notifications published by the zone synchronizer.
//!
//! Consumers (desktop notifications, media-key bridges) subscribe to these
//! instead of reading the Roon push stream themselves.

use crate::zone::Zone;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ZoneEvent {
    /// The tracked zone was (re)selected or one of its fields changed
    ZoneChanged {
        /// Snapshot of the tracked zone after the change
        zone: Option<Zone>,
    },

    /// Seek position of the tracked zone moved
    SeekChanged {
        /// Position in microseconds
        position_us: i64,
    },

    /// The Roon Core went away; no zone is tracked anymore
    Unpaired,
}

impl ZoneEvent {
    /// Get the event type as a string (for logging/filtering)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ZoneChanged { .. } => "zone_changed",
            Self::SeekChanged { .. } => "seek_changed",
            Self::Unpaired => "unpaired",
        }
    }
}
