//! Configuration loading for the read-aloud engine.
//!
//! Settings live in a sectioned TOML file (`[playback]`, `[voice]`,
//! `[highlight]`, `[progress]`, `[logging]`). Missing entries fall back to
//! defaults and out-of-range values are repaired on load.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, serialize_config};
pub use models::{EngineConfig, LogLevel};
