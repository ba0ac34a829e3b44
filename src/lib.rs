pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};
pub use config::TrackerConfig;

pub use adapters::{
    file_source::FileSnapshotSource, marketplace::MarketplaceClient,
    sqlite_store::SqliteProductStore,
};
pub use core::engine::SyncEngine;
pub use utils::error::{Result, TrackerError};
