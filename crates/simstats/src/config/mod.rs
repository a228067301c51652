//! Locations the CLI works with: the home and working directories and the
//! telemetry database.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

pub const DEFAULT_DATA_DIR: &str = ".simstats";
pub const DEFAULT_DATABASE_FILE: &str = "stats.sqlite";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub database: PathBuf,
}

impl RuntimePaths {
    /// Fills missing overrides from `HOME` and the process working directory.
    pub fn from_environment(
        home_dir: Option<&Path>,
        cwd: Option<&Path>,
        database: Option<&Path>,
    ) -> Result<Self> {
        let home_dir = match home_dir {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
        };
        let cwd = match cwd {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir().context("failed to read the working directory")?,
        };

        resolve_runtime_paths(&home_dir, &cwd, database)
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.database.parent().unwrap_or(&self.cwd)
    }
}

/// Resolves the database location. Without an override it is
/// `<home>/.simstats/stats.sqlite`; an override may start with `~/` and is
/// otherwise taken relative to `cwd`.
pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    database_override: Option<&Path>,
) -> Result<RuntimePaths> {
    let home_dir = absolute("home_dir", home_dir)?;
    let cwd = absolute("cwd", cwd)?;

    let database = match database_override {
        None => home_dir.join(DEFAULT_DATA_DIR).join(DEFAULT_DATABASE_FILE),
        Some(path) => clean(&cwd.join(expand_home(path, &home_dir)?)),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        database,
    })
}

fn absolute(label: &str, path: &Path) -> Result<PathBuf> {
    if !path.is_absolute() {
        bail!("{label} must be absolute: {}", path.display());
    }
    Ok(clean(path))
}

fn expand_home(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    if let Ok(rest) = path.strip_prefix("~") {
        return Ok(home_dir.join(rest));
    }
    if path.to_str().is_some_and(|raw| raw.starts_with('~')) {
        bail!("only `~` and `~/...` home paths are supported: {}", path.display());
    }
    Ok(path.to_path_buf())
}

// `..` at the root is kept rather than dropped.
fn clean(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut cleaned, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !cleaned.pop() {
                        cleaned.push(component);
                    }
                }
                other => cleaned.push(other),
            }
            cleaned
        })
}
