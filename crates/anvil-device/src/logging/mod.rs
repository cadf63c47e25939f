//! Optional `env_logger` backend for anvil hosts.
//!
//! Devices log handle lifetimes under `anvil_device` and mirror status
//! messages under the `anvil::status` target. Nothing here is required;
//! any `log` backend receives the same records.

mod init;

pub use init::{init_logging, LoggingConfig};
