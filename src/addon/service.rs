//! Addon lifecycle: install, uninstall, enable and disable.
//!
//! Every transition ends with a refresh of the bootstrap registry and the
//! autoload manifest. Only install rolls back on failure; the other
//! transitions leave whatever partial state a failing step produced.
//!
//! Nothing here serializes concurrent calls for the same addon. Callers that
//! may run transitions in parallel must hold their own per-name lock.

use std::fs;
use std::path::{Path, PathBuf};

use super::extractor::extract_archive;
use super::fetcher::{PackageSource, RemoteSource};
use super::ledger::GlobalFileLedger;
use super::refresh::{build_autoload, write_autoload, write_bootstrap};
use super::scanner::{GlobalFileScanner, ScanMode};
use super::seed::{prepare_seed, runner_for, SeedRunner};
use super::sync::{
    copy_dirs, is_real_dir, prune_empty_dirs, remove_dirs, remove_dirs_best_effort,
    remove_file_best_effort, SyncReport,
};
use super::{
    validate_name, AddonError, AddonInfo, AddonResult, AddonState, HookContext, ModuleRegistry,
    ASSETS_DIR, INFO_FILE, LEDGER_FILE, SEED_FILE,
};
use crate::core::{AutoloadMode, Config};

/// An addon found in the addon root.
#[derive(Debug, Clone)]
pub struct InstalledAddon {
    /// Addon name (directory name).
    pub name: String,
    /// Private directory.
    pub dir: PathBuf,
    /// Persisted metadata.
    pub info: AddonInfo,
}

#[derive(Debug, Clone, Copy)]
enum Hook {
    Install,
    Uninstall,
}

/// Coordinates the addon lifecycle.
pub struct AddonService {
    config: Config,
    modules: ModuleRegistry,
    source: Box<dyn PackageSource>,
    seeds: Box<dyn SeedRunner>,
}

impl AddonService {
    /// Create a service from its collaborators.
    ///
    /// Fails with [`AddonError::Config`] if an overlay root is not a single
    /// directory name.
    pub fn new(
        config: Config,
        modules: ModuleRegistry,
        source: Box<dyn PackageSource>,
        seeds: Box<dyn SeedRunner>,
    ) -> AddonResult<Self> {
        if let Some(root) = config.overlay.invalid_root() {
            return Err(AddonError::Config(format!(
                "Invalid overlay root {root:?}: expected a single directory name"
            )));
        }
        Ok(Self { config, modules, source, seeds })
    }

    /// Service downloading from the configured remote endpoint.
    pub fn from_config(config: Config, modules: ModuleRegistry) -> AddonResult<Self> {
        let source = RemoteSource::new(&config.remote)?;
        let seeds = runner_for(config.database_path().as_deref())?;
        Self::new(config, modules, Box::new(source), seeds)
    }

    /// Replace the package source.
    pub fn with_source(mut self, source: Box<dyn PackageSource>) -> Self {
        self.source = source;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch, extract, validate and publish `name`.
    ///
    /// Without `force`, an existing addon directory or any conflicting global
    /// file aborts the install. With `force`, an existing directory is
    /// replaced and conflicting files are overwritten. A fresh install ends
    /// enabled.
    pub fn install(&self, name: &str, force: bool) -> AddonResult<()> {
        validate_name(name)?;
        let addon_dir = self.config.addon_dir(name);
        if addon_dir.exists() && !force {
            return Err(AddonError::AlreadyExists(name.to_string()));
        }

        tracing::info!(addon = name, force, "Installing addon");

        let archive = self.source.fetch(name, &self.config.temp_archive(name))?;

        let backup = if addon_dir.exists() { Some(self.move_aside(name, &addon_dir)?) } else { None };

        let staged = extract_archive(&archive, &addon_dir);
        remove_file_best_effort(&archive);

        let staged = staged.and_then(|()| {
            // A packaged ledger must never vouch for shared-root files.
            remove_file_best_effort(&addon_dir.join(LEDGER_FILE));
            self.check(name)?;
            if !force {
                self.no_conflict(name)?;
            }
            Ok(())
        });

        if let Err(e) = staged {
            tracing::warn!(addon = name, error = %e, "Install failed, rolling back");
            remove_dirs_best_effort(&addon_dir);
            if let Some(backup) = backup {
                restore_backup(&backup, &addon_dir);
            }
            return Err(e);
        }
        if let Some(backup) = backup {
            remove_dirs_best_effort(&backup);
        }

        self.publish(name, &addon_dir)?;
        self.set_state(&addon_dir, AddonState::Enabled)?;
        self.run_hook(name, &addon_dir, Hook::Install)?;
        self.import_sql(name)?;
        self.refresh()?;

        tracing::info!(addon = name, "Installed addon");
        Ok(())
    }

    /// Remove `name` entirely.
    ///
    /// With `force`, every global file the addon's overlays name is deleted
    /// from the shared root as well.
    pub fn uninstall(&self, name: &str, force: bool) -> AddonResult<()> {
        let addon_dir = self.existing_dir(name)?;
        if !force {
            self.no_conflict(name)?;
        }

        tracing::info!(addon = name, force, "Uninstalling addon");

        self.retract_assets(name, &addon_dir)?;
        if force {
            self.remove_global_files(&addon_dir)?;
        }
        self.run_hook(name, &addon_dir, Hook::Uninstall)?;
        remove_dirs(&addon_dir)?;
        self.refresh()?;

        tracing::info!(addon = name, "Uninstalled addon");
        Ok(())
    }

    /// Publish `name`'s assets and overlay files and mark it enabled.
    pub fn enable(&self, name: &str, force: bool) -> AddonResult<()> {
        let addon_dir = self.existing_dir(name)?;
        if !force {
            self.no_conflict(name)?;
        }

        self.publish(name, &addon_dir)?;
        self.set_state(&addon_dir, AddonState::Enabled)?;
        self.refresh()?;

        tracing::info!(addon = name, force, "Enabled addon");
        Ok(())
    }

    /// Retract `name`'s assets and mark it disabled.
    ///
    /// Global files are only removed with `force`.
    pub fn disable(&self, name: &str, force: bool) -> AddonResult<()> {
        let addon_dir = self.existing_dir(name)?;
        if !force {
            self.no_conflict(name)?;
        }

        self.retract_assets(name, &addon_dir)?;
        if force {
            self.remove_global_files(&addon_dir)?;
        }
        self.set_state(&addon_dir, AddonState::Disabled)?;
        self.refresh()?;

        tracing::info!(addon = name, force, "Disabled addon");
        Ok(())
    }

    /// Verify that `name` is extracted and its module accepts its own info.
    pub fn check(&self, name: &str) -> AddonResult<()> {
        let addon_dir = self.existing_dir(name)?;

        let module = self
            .modules
            .resolve(name, &addon_dir)
            .ok_or_else(|| AddonError::NotFound(format!("{name}: no addon module")))?;

        if !module.check_info(&self.hook_ctx(name, &addon_dir)) {
            return Err(AddonError::IncompleteConfig(name.to_string()));
        }
        AddonInfo::from_file(&addon_dir.join(INFO_FILE))
            .map_err(|_| AddonError::IncompleteConfig(name.to_string()))?;

        Ok(())
    }

    /// Fail with [`AddonError::Conflict`] if any global file of `name` collides.
    pub fn no_conflict(&self, name: &str) -> AddonResult<()> {
        let files = self.global_files(name, true)?;
        if files.is_empty() {
            return Ok(());
        }

        tracing::warn!(addon = name, count = files.len(), "Conflicting global files");
        Err(AddonError::Conflict { files })
    }

    /// Global files of `name`: all of them, or only the conflicting ones.
    pub fn global_files(&self, name: &str, only_conflict: bool) -> AddonResult<Vec<String>> {
        let addon_dir = self.existing_dir(name)?;
        let shared_root = self.config.shared_root();
        let scanner = GlobalFileScanner::new(&shared_root, &self.config.overlay.roots);

        let mode = if only_conflict { ScanMode::ConflictsOnly } else { ScanMode::All };
        scanner.scan(&addon_dir, mode, &load_ledger(&addon_dir))
    }

    /// Run `name`'s `install.sql`, if it ships one.
    pub fn import_sql(&self, name: &str) -> AddonResult<()> {
        let addon_dir = self.existing_dir(name)?;
        let sql_file = addon_dir.join(SEED_FILE);
        if !sql_file.is_file() {
            return Ok(());
        }

        let sql = fs::read_to_string(&sql_file)?;
        self.seeds.execute(name, &prepare_seed(&sql, &self.config.database.prefix))
    }

    /// Regenerate the bootstrap registry and, in static mode, the autoload manifest.
    pub fn refresh(&self) -> AddonResult<()> {
        let addons = self.list()?;

        write_bootstrap(&self.config.bootstrap_output(), &addons)?;

        if self.config.autoload.mode == AutoloadMode::Dynamic {
            tracing::debug!("Dynamic autoload, skipping manifest");
            return Ok(());
        }

        let manifest = build_autoload(&addons, &self.modules);
        write_autoload(&self.config.autoload_output(), &manifest)
    }

    /// Every addon in the addon root, sorted by name.
    pub fn list(&self) -> AddonResult<Vec<InstalledAddon>> {
        let addon_root = self.config.addon_root();
        let entries = match fs::read_dir(&addon_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut addons = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        addon_root = %addon_root.display(),
                        error = %e,
                        "Skipping unreadable addon entry"
                    );
                    continue;
                }
            };
            let dir = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if validate_name(&name).is_err() || !is_real_dir(&dir) {
                continue;
            }

            let info_path = dir.join(INFO_FILE);
            if !info_path.is_file() {
                continue;
            }
            match AddonInfo::from_file(&info_path) {
                Ok(info) => addons.push(InstalledAddon { name, dir, info }),
                Err(e) => tracing::warn!(addon = %name, error = %e, "Skipping unreadable addon"),
            }
        }

        addons.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(addons)
    }

    /// Look up one addon.
    pub fn info(&self, name: &str) -> AddonResult<InstalledAddon> {
        let dir = self.existing_dir(name)?;
        let info = AddonInfo::from_file(&dir.join(INFO_FILE))?;
        Ok(InstalledAddon { name: name.to_string(), dir, info })
    }

    fn existing_dir(&self, name: &str) -> AddonResult<PathBuf> {
        validate_name(name)?;
        let dir = self.config.addon_dir(name);
        if !is_real_dir(&dir) {
            return Err(AddonError::NotFound(name.to_string()));
        }
        Ok(dir)
    }

    fn hook_ctx(&self, name: &str, addon_dir: &Path) -> HookContext {
        HookContext {
            name: name.to_string(),
            addon_dir: addon_dir.to_path_buf(),
            shared_root: self.config.shared_root(),
        }
    }

    /// Copy assets and overlay subtrees into the shared tree, recording ownership.
    fn publish(&self, name: &str, addon_dir: &Path) -> AddonResult<()> {
        let shared_root = self.config.shared_root();
        let mut report = SyncReport::default();

        let source_assets = addon_dir.join(ASSETS_DIR);
        if is_real_dir(&source_assets) {
            // Asset files are not global files; only the directories are tracked.
            let assets = copy_dirs(&source_assets, &self.config.dest_assets_dir(name))?;
            report.created_dirs.extend(assets.created_dirs);
        }

        for root in &self.config.overlay.roots {
            let overlay = addon_dir.join(root);
            if is_real_dir(&overlay) {
                report.merge(copy_dirs(&overlay, &shared_root.join(root))?);
            }
        }

        let ledger_path = addon_dir.join(LEDGER_FILE);
        let mut ledger = load_ledger(addon_dir);
        ledger.record(&shared_root, &report)?;
        ledger.save(&ledger_path)?;

        tracing::debug!(addon = name, files = report.files.len(), "Published global files");
        Ok(())
    }

    /// Delete the published assets and any now-empty directories the addon created.
    fn retract_assets(&self, name: &str, addon_dir: &Path) -> AddonResult<()> {
        remove_dirs(&self.config.dest_assets_dir(name))?;
        prune_empty_dirs(&load_ledger(addon_dir).created_dirs_under(&self.config.shared_root()));
        Ok(())
    }

    /// Best-effort removal of every global file, then prune what the addon created.
    fn remove_global_files(&self, addon_dir: &Path) -> AddonResult<()> {
        let shared_root = self.config.shared_root();
        let mut ledger = load_ledger(addon_dir);

        let files = GlobalFileScanner::new(&shared_root, &self.config.overlay.roots).scan(
            addon_dir,
            ScanMode::All,
            &ledger,
        )?;
        for file in &files {
            remove_file_best_effort(&shared_root.join(file));
        }
        prune_empty_dirs(&ledger.created_dirs_under(&shared_root));

        ledger.clear();
        ledger.save(&addon_dir.join(LEDGER_FILE))?;

        tracing::debug!(files = files.len(), "Removed global files");
        Ok(())
    }

    fn set_state(&self, addon_dir: &Path, state: AddonState) -> AddonResult<()> {
        AddonInfo::write_state(&addon_dir.join(INFO_FILE), state)
    }

    fn run_hook(&self, name: &str, addon_dir: &Path, hook: Hook) -> AddonResult<()> {
        let Some(module) = self.modules.resolve(name, addon_dir) else {
            tracing::debug!(addon = name, ?hook, "No addon module, skipping hook");
            return Ok(());
        };

        let ctx = self.hook_ctx(name, addon_dir);
        let result = match hook {
            Hook::Install => module.install(&ctx),
            Hook::Uninstall => module.uninstall(&ctx),
        };

        result.map_err(|e| match e {
            e @ (AddonError::Hook { .. } | AddonError::Remote { .. } | AddonError::Conflict { .. }) => e,
            other => AddonError::Hook { name: name.to_string(), message: other.to_string() },
        })
    }

    fn move_aside(&self, name: &str, addon_dir: &Path) -> AddonResult<PathBuf> {
        let backup = self.config.addon_root().join(format!(".{name}.previous"));
        remove_dirs(&backup)?;
        fs::rename(addon_dir, &backup)?;
        tracing::debug!(addon = name, backup = %backup.display(), "Moved previous install aside");
        Ok(backup)
    }
}

fn restore_backup(backup: &Path, addon_dir: &Path) {
    if let Err(e) = fs::rename(backup, addon_dir) {
        tracing::warn!(
            backup = %backup.display(),
            error = %e,
            "Failed to restore previous install"
        );
    }
}

fn load_ledger(addon_dir: &Path) -> GlobalFileLedger {
    GlobalFileLedger::load(&addon_dir.join(LEDGER_FILE)).unwrap_or_else(|e| {
        tracing::warn!(addon_dir = %addon_dir.display(), error = %e, "Ignoring unreadable ledger");
        GlobalFileLedger::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::{LocalSource, NoDatabase};
    use tempfile::TempDir;

    const INFO: &str = "name = \"demo\"\ntitle = \"Demo\"\nintro = \"Intro\"\nauthor = \"Me\"\nversion = \"1.0.0\"\nstate = \"disabled\"\n";

    fn service(root: &Path) -> AddonService {
        AddonService::new(
            Config::with_root(root),
            ModuleRegistry::new(),
            Box::new(LocalSource::Directory(root.join("packages"))),
            Box::new(NoDatabase),
        )
        .unwrap()
    }

    fn place_addon(root: &Path, files: &[(&str, &str)]) -> PathBuf {
        let dir = root.join("addons/demo");
        for (path, content) in files {
            let path = dir.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn test_operations_require_existing_addon() {
        let temp_dir = TempDir::new().unwrap();
        let service = service(temp_dir.path());

        assert!(matches!(service.enable("demo", false), Err(AddonError::NotFound(_))));
        assert!(matches!(service.disable("demo", true), Err(AddonError::NotFound(_))));
        assert!(matches!(service.uninstall("demo", true), Err(AddonError::NotFound(_))));
        assert!(matches!(service.check("demo"), Err(AddonError::NotFound(_))));
        assert!(matches!(service.enable("../etc", true), Err(AddonError::InvalidName(_))));
    }

    #[test]
    fn test_install_refuses_existing_dir() {
        let temp_dir = TempDir::new().unwrap();
        place_addon(temp_dir.path(), &[("info.toml", INFO)]);

        let result = service(temp_dir.path()).install("demo", false);
        assert!(matches!(result, Err(AddonError::AlreadyExists(_))));
    }

    #[test]
    fn test_check_reports_incomplete_info() {
        let temp_dir = TempDir::new().unwrap();
        place_addon(temp_dir.path(), &[("info.toml", "name = \"demo\"")]);

        let result = service(temp_dir.path()).check("demo");
        assert!(matches!(result, Err(AddonError::IncompleteConfig(_))));
    }

    #[test]
    fn test_check_requires_module() {
        let temp_dir = TempDir::new().unwrap();
        place_addon(temp_dir.path(), &[("assets/logo.png", "png")]);

        let result = service(temp_dir.path()).check("demo");
        assert!(matches!(result, Err(AddonError::NotFound(_))));
    }

    #[test]
    fn test_enable_then_disable_keeps_state_in_info() {
        let temp_dir = TempDir::new().unwrap();
        let dir = place_addon(
            temp_dir.path(),
            &[("info.toml", INFO), ("public/demo.js", "js"), ("assets/logo.png", "png")],
        );
        let service = service(temp_dir.path());

        service.enable("demo", false).unwrap();
        assert_eq!(service.info("demo").unwrap().info.state, AddonState::Enabled);
        assert!(temp_dir.path().join("public/demo.js").is_file());
        assert!(temp_dir.path().join("public/assets/addons/demo/logo.png").is_file());
        assert!(dir.join(LEDGER_FILE).is_file());

        // The file is ours now, so the gate still passes.
        service.no_conflict("demo").unwrap();

        service.disable("demo", false).unwrap();
        assert_eq!(service.info("demo").unwrap().info.state, AddonState::Disabled);
        assert!(!temp_dir.path().join("public/assets/addons/demo").exists());
        assert!(temp_dir.path().join("public/demo.js").is_file());
    }

    #[test]
    fn test_enable_keeps_unmodelled_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let info = format!("{INFO}license = \"MIT\"\nrequire = \"1.0\"\n\n[config]\ntheme = \"dark\"\n");
        let dir = place_addon(temp_dir.path(), &[("info.toml", info.as_str())]);
        let service = service(temp_dir.path());

        service.enable("demo", false).unwrap();
        service.disable("demo", false).unwrap();
        service.enable("demo", false).unwrap();

        let after = fs::read_to_string(dir.join(INFO_FILE)).unwrap();
        let table: toml::Table = after.parse().unwrap();
        assert_eq!(table["state"].as_str(), Some("enabled"));
        assert_eq!(table["license"].as_str(), Some("MIT"));
        assert_eq!(table["require"].as_str(), Some("1.0"));
        assert_eq!(table["config"]["theme"].as_str(), Some("dark"));
        assert_eq!(table["title"].as_str(), Some("Demo"));
    }

    #[test]
    fn test_list_skips_noise() {
        let temp_dir = TempDir::new().unwrap();
        place_addon(temp_dir.path(), &[("info.toml", INFO)]);
        let addons = temp_dir.path().join("addons");
        fs::create_dir_all(addons.join(".demo.previous")).unwrap();
        fs::create_dir_all(addons.join("no-info")).unwrap();
        fs::create_dir_all(addons.join("broken")).unwrap();
        fs::write(addons.join("broken/info.toml"), "name = ").unwrap();
        fs::write(addons.join("stray.txt"), "x").unwrap();

        let listed = service(temp_dir.path()).list().unwrap();
        let names: Vec<&str> = listed.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["demo"]);
    }

    #[test]
    fn test_list_without_addon_root() {
        let temp_dir = TempDir::new().unwrap();
        assert!(service(temp_dir.path()).list().unwrap().is_empty());
    }

    #[test]
    fn test_dynamic_autoload_skips_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::with_root(temp_dir.path());
        config.autoload.mode = AutoloadMode::Dynamic;
        let service = AddonService::new(
            config,
            ModuleRegistry::new(),
            Box::new(LocalSource::Directory(temp_dir.path().to_path_buf())),
            Box::new(NoDatabase),
        )
        .unwrap();

        service.refresh().unwrap();

        assert!(service.config().bootstrap_output().is_file());
        assert!(!service.config().autoload_output().exists());
    }

    #[test]
    fn test_new_rejects_invalid_overlay_roots() {
        let temp_dir = TempDir::new().unwrap();

        for root in ["", "..", "a/b", "/abs"] {
            let mut config = Config::with_root(temp_dir.path());
            config.overlay.roots = vec!["public".to_string(), root.to_string()];
            let result = AddonService::new(
                config,
                ModuleRegistry::new(),
                Box::new(LocalSource::Directory(temp_dir.path().to_path_buf())),
                Box::new(NoDatabase),
            );
            assert!(matches!(result, Err(AddonError::Config(_))), "{root:?} was accepted");
        }
    }
}
