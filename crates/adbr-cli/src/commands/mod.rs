//! CLI command implementations

mod config;
mod connect;
mod list;
mod serve;

pub use config::{config_init, config_show};
pub use connect::connect_command;
pub use list::list_command;
pub use serve::serve_command;
