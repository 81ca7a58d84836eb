//! PictoPy progress hub.
//!
//! This crate turns raw progress updates from job workers into the
//! ordered event stream that clients consume:
//!
//! - [`ProgressHub`]: stamps each emitted update with a monotonic
//!   sequence number and timestamp, and fans it out via
//!   `tokio::sync::broadcast`.
//! - [`Throttle`]: per-job send-now vs. coalesce decision.
//! - [`ReplayBuffer`]: bounded history served to reconnecting clients.
//! - [`HubConfig`]: tuning knobs with production defaults.

pub mod config;
pub mod hub;
pub mod replay;
pub mod throttle;

pub use config::HubConfig;
pub use hub::{HubStats, ProgressHub, ProgressPublisher, PublishError};
pub use replay::ReplayBuffer;
pub use throttle::Throttle;
