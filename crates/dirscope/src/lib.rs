pub mod server;

pub mod analysis;
pub mod application;
pub mod coalesce;
pub mod config;
pub mod core;
pub mod directory;
pub mod error;
pub mod storage;
pub mod utils;

pub use crate::analysis::ScanReport;
pub use crate::application::InstalledApp;
pub use crate::config::DirscopeConfig;
pub use crate::core::Core;
pub use crate::error::{CoreError, CoreResult};
pub use crate::server::Server;
