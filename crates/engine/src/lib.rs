use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod content;
pub mod module;
pub mod render;
pub mod resources;
pub mod script;
pub mod world;

pub use content::{
    ContentError, ContentErrorCode, ContentKind, ContentParseError, ContentSource,
    FsContentSource, MemoryContentSource, ModuleInfo, SourceLocation, WalkableSurfaces,
};
pub use module::{
    Action, ActionKind, AreaTransitionCoordinator, CameraState, DeferredActionQueue,
    EntryLocation, Event, EventKind, EventQueue, Key, ModuleConfig, ModuleController,
    ModuleError, ModuleServices, ModuleState, ModuleStatus, TexturePack, TickOutcome,
    TransitionError,
};
pub use render::{FrameGuard, FrameLock, HeadlessRenderBackend, RenderBackend};
pub use resources::{MemoryResourceSystem, ResourceScope, ResourceSource, ResourceSystem};
pub use script::{CallScriptRunner, ScriptError, ScriptRunner};
pub use world::{Area, GameObject, ObjectId, ObjectKind, Vec3};

pub const ROOT_ENV_VAR: &str = "MODRUN_ROOT";
pub const CONTENT_DIR: &str = "assets";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub content_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "MODRUN_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and an assets/ directory."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/project\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let content_dir = root.join(CONTENT_DIR);
    Ok(AppPaths { root, content_dir })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_root_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_root_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_root_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join(CONTENT_DIR).is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn root_marker_requires_cargo_toml_and_assets() {
        let temp = TempDir::new().expect("temp");
        assert!(!is_root_marker(temp.path()));

        fs::create_dir(temp.path().join(CONTENT_DIR)).expect("assets");
        assert!(!is_root_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_root_marker(temp.path()));
    }
}
