//! CLI command implementations

mod adb;
mod config;
mod exec;
mod packages;
mod status;

pub use adb::{adb_connect, adb_set_tcp, adb_status};
pub use config::{config_get, config_init, config_set, config_show, resolve_config_path};
pub use exec::exec_command;
pub use packages::packages_command;
pub use status::status_command;
