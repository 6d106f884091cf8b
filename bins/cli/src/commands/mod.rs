//! CLI command handlers.

pub mod checkpoint;
pub mod collections;
pub mod config;
pub mod ingest;
pub mod search;

pub use checkpoint::{run_checkpoint_clear, run_checkpoint_show};
pub use collections::run_collections_info;
pub use config::run_config_show;
pub use ingest::run_ingest;
pub use search::{SearchCommandInput, run_search};
