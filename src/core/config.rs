//! Configuration management for Addonkit.
//!
//! Handles loading configuration from TOML files and deriving the
//! filesystem layout of the host application from it.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default package download endpoint.
pub const DEFAULT_REMOTE_URL: &str = "https://addons.example.com/api/addon/download";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem layout
    pub paths: PathsConfig,

    /// Package download settings
    pub remote: RemoteConfig,

    /// Shared directories addons may overlay
    pub overlay: OverlayConfig,

    /// Host data store for seed scripts
    pub database: DatabaseConfig,

    /// Autoload manifest generation
    pub autoload: AutoloadConfig,
}

/// Filesystem layout of the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Shared application root
    pub root: PathBuf,

    /// Directory holding addon private directories (default: `<root>/addons`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addons: Option<PathBuf>,

    /// Runtime directory for downloads (default: `<root>/runtime`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<PathBuf>,
}

/// Package download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Download endpoint, receives the addon name as `name`
    pub url: String,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds
    pub timeout_secs: u64,
}

/// Overlay allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Shared-root subdirectories an addon may place files into, in scan order
    pub roots: Vec<String>,
}

/// Data store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file seed scripts run against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Table prefix substituted for `__PREFIX__`
    pub prefix: String,
}

/// How the host locates addon namespaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoloadMode {
    /// From the generated manifest.
    #[default]
    Static,
    /// At runtime; no manifest is written.
    Dynamic,
}

/// Autoload manifest settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoloadConfig {
    /// Resolution mode
    pub mode: AutoloadMode,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("."), addons: None, runtime: None }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { url: DEFAULT_REMOTE_URL.to_string(), connect_timeout_secs: 10, timeout_secs: 10 }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { roots: vec!["application".to_string(), "public".to_string()] }
    }
}

impl OverlayConfig {
    /// Whether `root` names exactly one directory directly below the shared root.
    ///
    /// Empty strings, `.`/`..`, nested paths and absolute paths are rejected.
    pub fn is_valid_root(root: &str) -> bool {
        let mut components = Path::new(root).components();
        matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
    }

    /// First configured root that is not a single directory name.
    pub fn invalid_root(&self) -> Option<&str> {
        self.roots.iter().map(String::as_str).find(|root| !Self::is_valid_root(root))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: None, prefix: "fa_".to_string() }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Looks for config in:
    /// 1. `explicit`, when given
    /// 2. `.addonkit.toml` in current directory
    /// 3. `~/.config/addonkit/config.toml`
    /// 4. Falls back to defaults
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".addonkit.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        if let Some(root) = config.overlay.invalid_root() {
            anyhow::bail!(
                "Invalid overlay root {root:?} in {}: expected a single directory name",
                path.display()
            );
        }
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Configuration rooted at `root` with every other setting defaulted.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.paths.root = root.into();
        config
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("addonkit"))
    }

    /// Shared application root.
    pub fn shared_root(&self) -> PathBuf {
        expand(&self.paths.root)
    }

    /// Directory holding every addon's private directory.
    pub fn addon_root(&self) -> PathBuf {
        self.under_root(self.paths.addons.as_deref(), "addons")
    }

    /// Runtime directory.
    pub fn runtime_root(&self) -> PathBuf {
        self.under_root(self.paths.runtime.as_deref(), "runtime")
    }

    /// Private directory of `name`.
    pub fn addon_dir(&self, name: &str) -> PathBuf {
        self.addon_root().join(name)
    }

    /// Where the downloaded package for `name` is kept until extracted.
    pub fn temp_archive(&self, name: &str) -> PathBuf {
        self.runtime_root().join("addons").join(format!("{name}.zip"))
    }

    /// Public assets published for `name`.
    pub fn dest_assets_dir(&self, name: &str) -> PathBuf {
        self.shared_root().join("public").join("assets").join("addons").join(name)
    }

    /// Generated bootstrap registry.
    pub fn bootstrap_output(&self) -> PathBuf {
        self.shared_root().join("public").join("assets").join("js").join("addons.js")
    }

    /// Generated autoload manifest.
    pub fn autoload_output(&self) -> PathBuf {
        self.shared_root().join("application").join("extra").join("addons.json")
    }

    /// Database for seed scripts, resolved against the shared root.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.path.as_deref().map(|p| self.resolve(p))
    }

    fn under_root(&self, configured: Option<&Path>, default: &str) -> PathBuf {
        match configured {
            Some(path) => self.resolve(path),
            None => self.shared_root().join(default),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = expand(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.shared_root().join(expanded)
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
