//! Remote service adapters

pub mod handle;
pub mod roon;

pub use handle::{run_with_retry, RetryConfig};
pub use roon::{RoonAdapter, RoonSettings};
