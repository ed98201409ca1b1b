//! CLI command handlers. Each command is in its own file.

pub(crate) mod get;
mod merge;
mod probe;

pub use get::{run_get, GetArgs};
pub use merge::run_merge;
pub use probe::run_probe;
