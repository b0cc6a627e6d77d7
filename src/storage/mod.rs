//! Data storage and persistence
//!
//! The sled block store used by the CLI and the JSON export/import format.

pub mod block_store;
pub mod json_file;

pub use block_store::BlockStore;
pub use json_file::{load_json, load_json_blocks, save_json};
