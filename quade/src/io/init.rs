//! Initialization helpers for `.quade/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{QuadeConfig, write_config};
use super::scenario_config::SCENARIO_CONFIG_SCHEMA;

/// All canonical paths within `.quade/` for a project root.
#[derive(Debug, Clone)]
pub struct QuadePaths {
    pub root: PathBuf,
    pub quade_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub database_path: PathBuf,
    pub schema_path: PathBuf,
}

impl QuadePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let quade_dir = root.join(".quade");
        Self {
            root: root.clone(),
            quade_dir: quade_dir.clone(),
            gitignore_path: quade_dir.join(".gitignore"),
            config_path: quade_dir.join("config.toml"),
            database_path: quade_dir.join("db.json"),
            schema_path: quade_dir.join("scenario_config.schema.json"),
        }
    }
}

/// Options for `init_quade`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing quade-owned files.
    pub force: bool,
}

/// Create `.quade/` scaffolding in `root`.
///
/// Fails if `.quade/` already exists unless `options.force` is set. The
/// database file is never touched; it is created on the first write.
pub fn init_quade(root: &Path, options: &InitOptions) -> Result<QuadePaths> {
    let paths = QuadePaths::new(root);
    if paths.quade_dir.exists() && !paths.quade_dir.is_dir() {
        return Err(anyhow!("quade init: .quade exists but is not a directory"));
    }
    if paths.quade_dir.exists() && !options.force {
        return Err(anyhow!(
            "quade init: .quade already exists (use --force to overwrite)"
        ));
    }

    fs::create_dir_all(&paths.quade_dir)
        .with_context(|| format!("create directory {}", paths.quade_dir.display()))?;
    write_file(&paths.gitignore_path, QUADE_GITIGNORE)?;
    write_file(&paths.schema_path, SCENARIO_CONFIG_SCHEMA)?;
    write_config(&paths.config_path, &QuadeConfig::default())?;

    Ok(paths)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const QUADE_GITIGNORE: &str = "db.json\n*.tmp\n";
