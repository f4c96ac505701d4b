pub mod cli;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod logging;

pub use config::{DeviceConfig, ReconcileConfig};
pub use core::{ReconcileEngine, ReconcileReport, RunStatus};
pub use error::{ReconcileError, Result};
