//! Core addon types.

use serde::{Deserialize, Serialize};

use super::{AddonError, AddonResult};

/// Persisted state of an installed addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddonState {
    /// Overlay files are published to the shared root.
    Enabled,
    /// Installed but not published.
    Disabled,
}

impl Default for AddonState {
    fn default() -> Self {
        Self::Disabled
    }
}

impl AddonState {
    /// Whether the addon is enabled.
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }

    /// Get the display name for this state.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for AddonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Addon metadata file name.
pub const INFO_FILE: &str = "info.toml";

/// Client-side bootstrap script inside an addon directory.
pub const BOOTSTRAP_FILE: &str = "bootstrap.js";

/// Seed script inside an addon directory.
pub const SEED_FILE: &str = "install.sql";

/// Placeholder replaced by the configured table prefix in seed scripts.
pub const PREFIX_TOKEN: &str = "__PREFIX__";

/// Private assets subtree inside an addon directory.
pub const ASSETS_DIR: &str = "assets";

/// Ownership ledger inside an addon directory.
pub const LEDGER_FILE: &str = ".global-files.json";

/// Validate an addon name before it is used as a path component.
pub fn validate_name(name: &str) -> AddonResult<()> {
    if name.is_empty()
        || name.starts_with('-')
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AddonError::InvalidName(name.to_string()));
    }
    Ok(())
}
