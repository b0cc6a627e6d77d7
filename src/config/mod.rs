//! Configuration management
//!
//! Chain and mining settings, loaded from a TOML file or defaults and then
//! overridden from the environment.

pub mod settings;

pub use settings::{Config, StrategyKind};
