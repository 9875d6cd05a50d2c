//! Addon lifecycle management.
//!
//! An addon is a self-contained package: a private directory under the
//! addon root holding metadata, an optional bootstrap script, an optional
//! seed script, public assets, and overlay subtrees that get copied into the
//! shared application tree.
//!
//! # Layout
//!
//! ```text
//! addons/<name>/
//!   info.toml            metadata and persisted state
//!   bootstrap.js         concatenated into the bootstrap registry
//!   install.sql          seed script, `__PREFIX__` replaced on import
//!   assets/              published to public/assets/addons/<name>/
//!   application/ public/ overlay subtrees copied into the shared root
//!   .global-files.json   ownership ledger of placed files
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [paths]
//! root = "/srv/app"
//!
//! [overlay]
//! roots = ["application", "public"]
//!
//! [database]
//! path = "data/app.db"
//! prefix = "fa_"
//! ```

mod error;
mod extractor;
mod fetcher;
mod info;
mod ledger;
mod module;
mod refresh;
mod scanner;
mod seed;
mod service;
mod sync;
mod types;

pub use error::{AddonError, AddonResult, CONFLICT_CODE};
pub use extractor::extract_archive;
pub use fetcher::{classify_payload, LocalSource, PackageSource, RemoteSource};
pub use info::AddonInfo;
pub use ledger::{hash_file, GlobalFileLedger};
pub use module::{AddonModule, HookContext, ManifestModule, ModuleRegistry};
pub use refresh::{
    build_autoload, render_bootstrap, AutoloadManifest, BOOTSTRAP_TEMPLATE, BOOTSTRAP_TOKEN,
};
pub use scanner::{GlobalFileScanner, ScanMode};
#[cfg(feature = "sqlite")]
pub use seed::SqliteSeedRunner;
pub use seed::{prepare_seed, runner_for, NoDatabase, SeedRunner};
pub use service::{AddonService, InstalledAddon};
pub use sync::{copy_dirs, remove_dirs, SyncReport};
pub use types::{
    validate_name, AddonState, ASSETS_DIR, BOOTSTRAP_FILE, INFO_FILE, LEDGER_FILE, PREFIX_TOKEN,
    SEED_FILE,
};
