use std::time::Duration;

#[cfg(feature = "metrics")]
pub mod metrics;
pub mod patch;

pub(crate) mod colors;

mod error;

pub use error::*;

/// The default interval between reconciliation ticks for a tracked cluster.
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Name of the kubernetes resource manager used in server-side apply patches.
pub(crate) const MANAGER_NAME: &str = "rss-operator";
