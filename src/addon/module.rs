//! Addon modules: the capability set an addon exposes to the host.
//!
//! Modules are registered by name when the service is built. An addon with
//! no registered module falls back to [`ManifestModule`] when its directory
//! carries `info.toml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{AddonInfo, AddonResult, INFO_FILE};

/// What a module hook gets to see.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Addon name.
    pub name: String,
    /// The addon's private directory.
    pub addon_dir: PathBuf,
    /// The shared application root.
    pub shared_root: PathBuf,
}

impl HookContext {
    /// Path of the addon's metadata file.
    pub fn info_path(&self) -> PathBuf {
        self.addon_dir.join(INFO_FILE)
    }
}

/// Capability set of an addon.
pub trait AddonModule: Send + Sync {
    /// Self-check of the addon's configuration.
    fn check_info(&self, ctx: &HookContext) -> bool;

    /// Run after the addon's files have been placed.
    fn install(&self, _ctx: &HookContext) -> AddonResult<()> {
        Ok(())
    }

    /// Run before the addon's private directory is removed.
    fn uninstall(&self, _ctx: &HookContext) -> AddonResult<()> {
        Ok(())
    }

    /// Host events the module listens to.
    fn hooks(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Module backed solely by the addon's `info.toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestModule;

impl AddonModule for ManifestModule {
    fn check_info(&self, ctx: &HookContext) -> bool {
        match AddonInfo::from_file(&ctx.info_path()) {
            Ok(info) => {
                let missing = info.missing_fields(&ctx.name);
                if !missing.is_empty() {
                    tracing::debug!(addon = %ctx.name, ?missing, "Incomplete addon info");
                }
                missing.is_empty()
            }
            Err(e) => {
                tracing::debug!(addon = %ctx.name, error = %e, "Unreadable addon info");
                false
            }
        }
    }
}

/// Name -> module lookup table.
#[derive(Clone)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn AddonModule>>,
    manifest_fallback: bool,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.modules.keys().collect();
        names.sort();
        f.debug_struct("ModuleRegistry")
            .field("modules", &names)
            .field("manifest_fallback", &self.manifest_fallback)
            .finish()
    }
}

impl ModuleRegistry {
    /// Empty registry with manifest fallback enabled.
    pub fn new() -> Self {
        Self { modules: HashMap::new(), manifest_fallback: true }
    }

    /// Empty registry that only resolves registered modules.
    pub fn strict() -> Self {
        Self { modules: HashMap::new(), manifest_fallback: false }
    }

    /// Register a module for `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, module: Arc<dyn AddonModule>) {
        self.modules.insert(name.into(), module);
    }

    /// Builder-style [`Self::register`].
    pub fn with(mut self, name: impl Into<String>, module: Arc<dyn AddonModule>) -> Self {
        self.register(name, module);
        self
    }

    /// Resolve the module for `name` living in `addon_dir`.
    pub fn resolve(&self, name: &str, addon_dir: &Path) -> Option<Arc<dyn AddonModule>> {
        if let Some(module) = self.modules.get(name) {
            return Some(Arc::clone(module));
        }
        if self.manifest_fallback && addon_dir.join(INFO_FILE).is_file() {
            return Some(Arc::new(ManifestModule));
        }
        None
    }

    /// Number of registered modules.
    pub fn count(&self) -> usize {
        self.modules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct AlwaysValid;

    impl AddonModule for AlwaysValid {
        fn check_info(&self, _ctx: &HookContext) -> bool {
            true
        }

        fn hooks(&self) -> Vec<String> {
            vec!["app_init".to_string()]
        }
    }

    fn ctx(dir: &Path) -> HookContext {
        HookContext {
            name: "demo".to_string(),
            addon_dir: dir.to_path_buf(),
            shared_root: dir.to_path_buf(),
        }
    }

    #[test]
    fn test_registered_module_wins() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ModuleRegistry::new().with("demo", Arc::new(AlwaysValid));

        let module = registry.resolve("demo", temp_dir.path()).unwrap();
        assert_eq!(module.hooks(), vec!["app_init".to_string()]);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_manifest_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let registry = ModuleRegistry::new();
        assert!(registry.resolve("demo", temp_dir.path()).is_none());

        std::fs::write(temp_dir.path().join(INFO_FILE), "name = \"demo\"").unwrap();
        let module = registry.resolve("demo", temp_dir.path()).unwrap();
        assert!(!module.check_info(&ctx(temp_dir.path())));

        assert!(ModuleRegistry::strict().resolve("demo", temp_dir.path()).is_none());
    }

    #[test]
    fn test_manifest_check_info() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(INFO_FILE),
            "name = \"demo\"\ntitle = \"Demo\"\nintro = \"Intro\"\nauthor = \"Me\"\nversion = \"1.0.0\"\n",
        )
        .unwrap();

        assert!(ManifestModule.check_info(&ctx(temp_dir.path())));
        assert!(ManifestModule.install(&ctx(temp_dir.path())).is_ok());
    }
}
