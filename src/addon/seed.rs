//! Seed script (`install.sql`) execution against the host data store.

use std::path::{Path, PathBuf};

use super::{AddonError, AddonResult, PREFIX_TOKEN};

/// Executes SQL batches for an addon.
pub trait SeedRunner: Send + Sync {
    /// Execute a prepared SQL batch.
    fn execute(&self, addon: &str, sql: &str) -> AddonResult<()>;
}

/// Substitute the table prefix placeholder.
pub fn prepare_seed(sql: &str, prefix: &str) -> String {
    sql.replace(PREFIX_TOKEN, prefix)
}

/// Used when no data store is configured; scripts are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDatabase;

impl SeedRunner for NoDatabase {
    fn execute(&self, addon: &str, _sql: &str) -> AddonResult<()> {
        tracing::warn!(addon, "No database configured, skipping seed script");
        Ok(())
    }
}

/// Runs seed scripts against a SQLite database file.
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone)]
pub struct SqliteSeedRunner {
    path: PathBuf,
}

#[cfg(feature = "sqlite")]
impl SqliteSeedRunner {
    /// Create a runner for the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Database path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "sqlite")]
impl SeedRunner for SqliteSeedRunner {
    fn execute(&self, addon: &str, sql: &str) -> AddonResult<()> {
        let conn =
            rusqlite::Connection::open(&self.path).map_err(|e| AddonError::Seed(e.to_string()))?;
        conn.execute_batch(sql).map_err(|e| AddonError::Seed(e.to_string()))?;

        tracing::info!(addon, db = %self.path.display(), "Imported seed script");
        Ok(())
    }
}

/// Pick a runner for the configured database.
pub fn runner_for(database: Option<&Path>) -> AddonResult<Box<dyn SeedRunner>> {
    match database {
        None => Ok(Box::new(NoDatabase)),
        #[cfg(feature = "sqlite")]
        Some(path) => Ok(Box::new(SqliteSeedRunner::new(path))),
        #[cfg(not(feature = "sqlite"))]
        Some(path) => Err(AddonError::Config(format!(
            "database {} configured but built without the `sqlite` feature",
            path.display()
        ))),
    }
}
