pub mod analytics;

use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

pub use analytics::{AnalyticsConfig, AnalyticsRules, config_json_schema, load_analytics_config};

pub const DEFAULT_STATE_DIR: &str = ".querylens";
pub const DEFAULT_DB_FILE: &str = "querylens.sqlite";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    /// The config path was passed explicitly, so it must exist.
    pub config_required: bool,
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    db_override: Option<&Path>,
    config_override: Option<&Path>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let state_dir = home_dir.join(DEFAULT_STATE_DIR);
    let db_path = match db_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => state_dir.join(DEFAULT_DB_FILE),
    };
    let config_path = match config_override {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => state_dir.join(DEFAULT_CONFIG_FILE),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        db_path: normalize_lexical(&db_path),
        config_path: normalize_lexical(&config_path),
        config_required: config_override.is_some(),
    })
}

/// Expands a leading `~` against `home_dir`, then anchors relative paths at `cwd`.
fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let anchored = match path.strip_prefix("~") {
        Ok(rest) => home_dir.join(rest),
        Err(_) if starts_with_tilde(path) => bail!(
            "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
            path.display()
        ),
        Err(_) => cwd.join(path),
    };
    Ok(normalize_lexical(&anchored))
}

fn starts_with_tilde(path: &Path) -> bool {
    matches!(
        path.components().next(),
        Some(Component::Normal(first)) if first.to_string_lossy().starts_with('~')
    )
}

/// Drops `.` and folds `..` without touching the filesystem.
fn normalize_lexical(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut normalized, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir if normalized.pop() => {}
                other => normalized.push(other.as_os_str()),
            }
            normalized
        })
}
