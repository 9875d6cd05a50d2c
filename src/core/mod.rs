//! Core types shared by the library and the CLI.
//!
//! Currently this is the configuration layer: file lookup, defaults and the
//! host filesystem layout derived from it.

mod config;

pub use config::{
    AutoloadConfig, AutoloadMode, Config, DatabaseConfig, OverlayConfig, PathsConfig,
    RemoteConfig, DEFAULT_REMOTE_URL,
};
