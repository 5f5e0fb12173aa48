// DriveShare - client file-sharing portal for cloud-storage folders
// Library crate: backend client, listing accumulation, navigation and admin tools

pub mod accumulator;
pub mod assistant;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod context;
pub mod download;
pub mod navigation;
pub mod notifications;
pub mod portal;
pub mod shares;

pub use accumulator::{
    accumulate, AccumulationOutcome, Accumulator, AccumulatorLimits, FetchTicket, FolderView,
    LoadError, LoadState,
};
pub use navigation::{BrowserSnapshot, FolderBrowser, NavigationState};
pub use portal::{Access, Entry, ListingPage, PathSegment, PortalBackend, PortalError, ScriptBackend};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr log subscriber; `RUST_LOG` overrides the default `info`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
