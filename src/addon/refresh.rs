//! Derived artifacts regenerated after every lifecycle transition: the
//! combined bootstrap script and the autoload manifest.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::sync::write_atomic;
use super::{AddonError, AddonResult, InstalledAddon, ModuleRegistry, BOOTSTRAP_FILE};

/// Substitution token in [`BOOTSTRAP_TEMPLATE`].
pub const BOOTSTRAP_TOKEN: &str = "{__JS__}";

/// Wrapper around the concatenated bootstrap scripts.
pub const BOOTSTRAP_TEMPLATE: &str = "define(['backend'], function (Backend) {\n    {__JS__}\n});\n";

/// Namespaces and events the host must be able to find.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoloadManifest {
    /// Always `false` in a written manifest; dynamic hosts never read one.
    pub autoload: bool,
    /// Event name -> addons listening to it, in listing order.
    pub hooks: BTreeMap<String, Vec<String>>,
    /// Rewrite rule -> target.
    pub route: BTreeMap<String, String>,
}

/// Concatenate the bootstrap scripts of the enabled addons into the template.
pub fn render_bootstrap(addons: &[InstalledAddon]) -> AddonResult<String> {
    let mut scripts = Vec::new();

    for addon in addons.iter().filter(|a| a.info.state.is_enabled()) {
        let file = addon.dir.join(BOOTSTRAP_FILE);
        if file.is_file() {
            scripts.push(std::fs::read_to_string(&file)?);
        }
    }

    Ok(BOOTSTRAP_TEMPLATE.replace(BOOTSTRAP_TOKEN, &scripts.join("\n")))
}

/// Compute the autoload manifest for the enabled addons.
pub fn build_autoload(addons: &[InstalledAddon], modules: &ModuleRegistry) -> AutoloadManifest {
    let mut manifest = AutoloadManifest::default();

    for addon in addons.iter().filter(|a| a.info.state.is_enabled()) {
        let mut events = addon.info.hooks.clone();
        if let Some(module) = modules.resolve(&addon.name, &addon.dir) {
            events.extend(module.hooks());
        }
        events.sort();
        events.dedup();

        for event in events {
            manifest.hooks.entry(event).or_default().push(addon.name.clone());
        }
        for (rule, target) in &addon.info.routes {
            manifest.route.insert(rule.clone(), target.clone());
        }
    }

    manifest
}

/// Write the bootstrap registry to `path`.
pub fn write_bootstrap(path: &Path, addons: &[InstalledAddon]) -> AddonResult<()> {
    let content = render_bootstrap(addons)?;
    write_atomic(path, content.as_bytes())?;
    tracing::debug!(path = %path.display(), "Wrote bootstrap registry");
    Ok(())
}

/// Write the autoload manifest to `path`.
pub fn write_autoload(path: &Path, manifest: &AutoloadManifest) -> AddonResult<()> {
    let content =
        serde_json::to_string_pretty(manifest).map_err(|e| AddonError::Config(e.to_string()))?;
    write_atomic(path, content.as_bytes())?;
    tracing::debug!(path = %path.display(), hooks = manifest.hooks.len(), "Wrote autoload manifest");
    Ok(())
}
