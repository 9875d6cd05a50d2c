//! Addon metadata (`info.toml`) parsing and validation.
//!
//! The metadata file ships inside the addon package. The service only ever
//! rewrites its `state` and `url` keys; everything else an author declares
//! is kept as written.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::sync::write_atomic;
use super::{AddonError, AddonResult, AddonState};

/// Addon metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonInfo {
    /// Addon name (unique identifier, equals the directory name).
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Short introduction.
    pub intro: String,
    /// Addon author.
    pub author: String,
    /// Author or project website.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Addon version.
    pub version: String,
    /// Persisted enable flag.
    pub state: AddonState,
    /// Download URL recorded by the remote package, cleared on enable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Host events this addon listens to.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<String>,
    /// URL rewrite rules contributed by this addon (pattern -> target).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub routes: BTreeMap<String, String>,
}

impl AddonInfo {
    /// Parse metadata from a TOML string.
    pub fn from_toml(content: &str) -> AddonResult<Self> {
        toml::from_str(content).map_err(|e| AddonError::Config(e.to_string()))
    }

    /// Parse metadata from a file.
    pub fn from_file(path: &Path) -> AddonResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Persist `state` into the metadata file at `path`.
    ///
    /// The file is edited as a plain TOML table, so keys this struct does not
    /// model survive. Enabling also drops the package `url`.
    pub fn write_state(path: &Path, state: AddonState) -> AddonResult<()> {
        let content = std::fs::read_to_string(path)?;
        let mut table: toml::Table =
            content.parse().map_err(|e: toml::de::Error| AddonError::Config(e.to_string()))?;

        table.insert("state".to_string(), toml::Value::String(state.display_name().to_string()));
        if state.is_enabled() {
            table.remove("url");
        }

        let rendered =
            toml::to_string_pretty(&table).map_err(|e| AddonError::Config(e.to_string()))?;
        write_atomic(path, rendered.as_bytes())
    }

    /// Required fields that are empty.
    ///
    /// `dir_name` is the directory the metadata was loaded from; a mismatching
    /// `name` is reported as missing.
    pub fn missing_fields(&self, dir_name: &str) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() || self.name != dir_name {
            missing.push("name");
        }
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.intro.trim().is_empty() {
            missing.push("intro");
        }
        if self.author.trim().is_empty() {
            missing.push("author");
        }
        if self.version.trim().is_empty() {
            missing.push("version");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DEMO_INFO: &str = r#"
name = "demo"
title = "Demo"
intro = "A demo addon"
author = "Someone"
version = "1.0.0"
state = "enabled"
url = "/addons/demo"
hooks = ["app_init"]

[routes]
"/demo$" = "demo/index/index"
"#;

    #[test]
    fn test_parse_info() {
        let info = AddonInfo::from_toml(DEMO_INFO).unwrap();

        assert_eq!(info.name, "demo");
        assert_eq!(info.state, AddonState::Enabled);
        assert_eq!(info.hooks, vec!["app_init".to_string()]);
        assert_eq!(info.routes.get("/demo$").map(String::as_str), Some("demo/index/index"));
        assert!(info.missing_fields("demo").is_empty());
    }

    #[test]
    fn test_missing_fields() {
        let info = AddonInfo::from_toml("name = \"demo\"\ntitle = \"Demo\"").unwrap();
        assert_eq!(info.missing_fields("demo"), vec!["intro", "author", "version"]);
        assert!(info.missing_fields("other").contains(&"name"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(AddonInfo::from_toml("name = "), Err(AddonError::Config(_))));
    }

    #[test]
    fn test_write_state_disable_keeps_url() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("info.toml");
        std::fs::write(&path, DEMO_INFO).unwrap();

        AddonInfo::write_state(&path, AddonState::Disabled).unwrap();

        let loaded = AddonInfo::from_file(&path).unwrap();
        assert_eq!(loaded.state, AddonState::Disabled);
        assert_eq!(loaded.url.as_deref(), Some("/addons/demo"));
        assert_eq!(loaded.routes.len(), 1);
    }

    #[test]
    fn test_write_state_keeps_unmodelled_keys() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("info.toml");
        let content = r#"
name = "demo"
state = "disabled"
url = "/addons/demo"
license = "MIT"
require = "1.0"

[config]
theme = "dark"
limit = 5
"#;
        std::fs::write(&path, content).unwrap();

        AddonInfo::write_state(&path, AddonState::Enabled).unwrap();

        let table: toml::Table = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        assert_eq!(table["state"].as_str(), Some("enabled"));
        assert_eq!(table["license"].as_str(), Some("MIT"));
        assert_eq!(table["require"].as_str(), Some("1.0"));
        assert_eq!(table["config"]["theme"].as_str(), Some("dark"));
        assert_eq!(table["config"]["limit"].as_integer(), Some(5));
        assert!(!table.contains_key("url"));
    }

    #[test]
    fn test_write_state_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("info.toml");
        std::fs::write(&path, "name = ").unwrap();

        let result = AddonInfo::write_state(&path, AddonState::Enabled);
        assert!(matches!(result, Err(AddonError::Config(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "name = ");
    }
}
