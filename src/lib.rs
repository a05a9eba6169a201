//! RoonPipe
//!
//! Search a Roon library from the desktop and play results on the active
//! zone.
//!
//! This library provides:
//! - Menu navigation over Roon's browse/load protocol (search, action
//!   discovery, action execution)
//! - Tracking of the active zone from transport pushes
//! - A Unix socket daemon and its client
//! - Artwork caching and desktop notifications

// Deny truly dangerous patterns (these will fail the build)
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod browse;
pub mod cli;
pub mod config;
pub mod error;
pub mod images;
pub mod ipc;
pub mod navigator;
pub mod notify;
pub mod zones;
