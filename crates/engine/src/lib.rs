use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod grid;
pub mod interactables;
pub mod levels;
pub mod session;

pub use grid::{cluster_tiles, TileCoord, GRID_CELL_PX};
pub use interactables::{
    assign_rules, AssignmentSummary, Interactable, InteractableId, InteractableKind,
    InteractableStore, RegistryError, RuleAssignError, RuleCatalog,
};
pub use levels::{read_level, write_level, LevelDocument, LevelFileError};
pub use session::{InteractionOutcome, LevelSession, DEFAULT_RULE_COUNT};

pub const ROOT_ENV_VAR: &str = "PASSAGE_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub levels_dir: PathBuf,
}

impl AppPaths {
    pub fn level_file(&self, level: &str) -> PathBuf {
        self.levels_dir.join(format!("{level}.json"))
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create levels directory at {path}: {source}")]
    CreateLevelsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "PASSAGE_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either assets/levels/ or crates/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either assets/levels/ or crates/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/passage\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let levels_dir = root.join("assets").join("levels");

    fs::create_dir_all(&levels_dir).map_err(|source| StartupError::CreateLevelsDir {
        path: levels_dir.clone(),
        source,
    })?;

    Ok(AppPaths { root, levels_dir })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    if let Some(raw) = env::var_os(ROOT_ENV_VAR) {
        let root = canonical_or_raw(Path::new(&raw));
        return if looks_like_project_root(&root) {
            Ok(root)
        } else {
            Err(StartupError::InvalidEnvRoot { path: root })
        };
    }

    let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
    let exe_dir = exe
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

    exe_dir
        .ancestors()
        .find(|candidate| looks_like_project_root(candidate))
        .map(canonical_or_raw)
        .ok_or_else(|| StartupError::RootNotFound {
            start_dir: canonical_or_raw(&exe_dir),
            env_var: ROOT_ENV_VAR,
        })
}

/// A deployed tree has `assets/levels/` next to `Cargo.toml`; a source
/// checkout has `crates/` before any level has been authored.
fn looks_like_project_root(path: &Path) -> bool {
    if !path.join("Cargo.toml").is_file() {
        return false;
    }
    path.join("assets").join("levels").is_dir() || path.join("crates").is_dir()
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
