//! Shared wire protocol types for RoonPipe.
//!
//! This crate defines the types that cross boundaries between:
//! - the daemon, which holds the Roon connection and the tracked zone
//! - detached clients talking to the daemon over its Unix socket
//! - in-process consumers of zone notifications (desktop notifications)
//!
//! # Modules
//! - [`zone`] - Zone and playback state types
//! - [`search`] - Search results and their actions
//! - [`ipc`] - Socket request/response envelopes
//! - [`events`] - Zone notifications published by the synchronizer

pub mod events;
pub mod ipc;
pub mod search;
pub mod zone;

// Re-export commonly used types at crate root
pub use events::ZoneEvent;
pub use ipc::{ErrorResponse, IpcRequest, IpcResponse, PlayRequest, PlayResponse, SearchResponse};
pub use search::{Action, ResultType, SearchResult};
pub use zone::{
    LoopMode, NowPlaying, Output, PlaybackState, SeekUpdate, ThreeLine, VolumeInfo, Zone,
    ZoneSettings,
};
