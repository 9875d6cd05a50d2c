//! # Addonkit
//!
//! Addon lifecycle manager for a host web application.
//!
//! Addonkit downloads addon packages, extracts them into a private
//! directory, overlays their files onto the shared application tree with a
//! conflict gate, and regenerates the derived artifacts the host reads: the
//! combined bootstrap script and the autoload manifest.
//!
//! ## Features
//!
//! - **Lifecycle**: install, uninstall, enable and disable, each with a `force` flag
//! - **Conflict gate**: refuses to overwrite host files an addon does not own
//! - **Rollback**: a failed install leaves no private directory behind
//! - **Seed scripts**: `install.sql` with table prefix substitution (SQLite)
//!
//! ## Quick Start
//!
//! ```bash
//! addonkit --config addonkit.toml install blog
//! addonkit list
//! addonkit disable blog --force
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::needless_pass_by_value)]

pub mod addon;
pub mod core;

// Re-export commonly used types
pub use addon::{
    AddonError, AddonInfo, AddonModule, AddonResult, AddonService, AddonState, InstalledAddon,
    ModuleRegistry,
};
pub use core::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "addonkit";
