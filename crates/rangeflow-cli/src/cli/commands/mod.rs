//! CLI command handlers. Each command is in its own file.

mod config;
mod fetch;
mod probe;

pub use config::run_config;
pub use fetch::run_fetch;
pub use probe::run_probe;
