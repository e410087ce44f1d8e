use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{ModuleConfig, ModuleError, StartupError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub(crate) const CONFIG_ENV_VAR: &str = "MODRUN_CONFIG";
pub(crate) const START_MODULE_ENV_VAR: &str = "MODRUN_START_MODULE";
pub(crate) const DEFAULT_CONFIG_FILE: &str = "modrun.json";

#[derive(Debug, Error)]
pub(crate) enum HostError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path} at {field}: {source}")]
    ConfigParse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to spawn render thread: {0}")]
    SpawnRenderThread(#[source] io::Error),
    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// Host settings read from `modrun.json` (or `$MODRUN_CONFIG`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HostConfig {
    /// Overrides `<root>/assets`.
    pub(crate) content_root: Option<PathBuf>,
    pub(crate) start_module: String,
    pub(crate) entry_tag: Option<String>,
    pub(crate) pc_tag: String,
    pub(crate) pc_model: Option<String>,
    pub(crate) target_tps: u32,
    pub(crate) max_ticks_per_frame: u32,
    pub(crate) max_frame_delta_ms: u64,
    /// `None` runs until the module exits.
    pub(crate) run_ticks: Option<u64>,
    pub(crate) render_thread: bool,
    pub(crate) render_fps: u32,
    pub(crate) metrics_interval_ms: u64,
    pub(crate) module: ModuleConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            content_root: None,
            start_module: "harbour".to_string(),
            entry_tag: None,
            pc_tag: "player".to_string(),
            pc_model: Some("p_hero".to_string()),
            target_tps: 30,
            max_ticks_per_frame: 5,
            max_frame_delta_ms: 250,
            run_ticks: Some(900),
            render_thread: true,
            render_fps: 30,
            metrics_interval_ms: 1000,
            module: ModuleConfig::default(),
        }
    }
}

pub(crate) fn parse_host_config(path: &Path, raw: &str) -> Result<HostConfig, HostError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, HostConfig>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        HostError::ConfigParse {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}

/// Loads the host config: `$MODRUN_CONFIG` if set, else `<root>/modrun.json`
/// if present, else defaults. `$MODRUN_START_MODULE` overrides the start
/// module either way.
pub(crate) fn load_host_config(root: &Path) -> Result<HostConfig, HostError> {
    let explicit = read_env(CONFIG_ENV_VAR)?.map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));

    let mut config = match fs::read_to_string(&path) {
        Ok(raw) => {
            let config = parse_host_config(&path, &raw)?;
            info!(path = %path.display(), "host_config_loaded");
            config
        }
        Err(source) if source.kind() == io::ErrorKind::NotFound && explicit.is_none() => {
            info!(path = %path.display(), "host_config_defaulted");
            HostConfig::default()
        }
        Err(source) => return Err(HostError::ConfigRead { path, source }),
    };

    if let Some(module) = read_env(START_MODULE_ENV_VAR)? {
        let module = module.trim();
        if module.is_empty() {
            warn!(env_var = START_MODULE_ENV_VAR, "empty start module override ignored");
        } else {
            config.start_module = module.to_string();
        }
    }
    Ok(config)
}

fn read_env(var: &'static str) -> Result<Option<String>, HostError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(source) => Err(HostError::EnvVar { var, source }),
    }
}

#[cfg(test)]
mod tests {
    use engine::TexturePack;

    use super::*;

    fn path() -> PathBuf {
        PathBuf::from("modrun.json")
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = parse_host_config(&path(), r#"{ "start_module": "inland" }"#).expect("parse");

        assert_eq!(config.start_module, "inland");
        assert_eq!(config.target_tps, 30);
        assert_eq!(config.module, ModuleConfig::default());
    }

    #[test]
    fn nested_module_config_is_parsed() {
        let raw = r#"{
            "run_ticks": null,
            "render_thread": false,
            "module": { "texture_pack": "medium", "heartbeat_interval_ms": 0 }
        }"#;
        let config = parse_host_config(&path(), raw).expect("parse");

        assert_eq!(config.run_ticks, None);
        assert!(!config.render_thread);
        assert_eq!(config.module.texture_pack, TexturePack::Medium);
        assert_eq!(config.module.heartbeat_interval_ms, 0);
    }

    #[test]
    fn parse_error_names_the_failing_field() {
        let raw = r#"{ "module": { "walk_speed": "fast" } }"#;
        let error = parse_host_config(&path(), raw).expect_err("must fail");

        match error {
            HostError::ConfigParse { field, .. } => assert_eq!(field, "module.walk_speed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = parse_host_config(&path(), r#"{ "fullscreen": true }"#).expect_err("must fail");
        assert!(matches!(error, HostError::ConfigParse { .. }));
    }

    #[test]
    fn config_file_under_root_is_picked_up() {
        let temp = tempfile::TempDir::new().expect("temp");
        fs::write(
            temp.path().join(DEFAULT_CONFIG_FILE),
            r#"{ "max_ticks_per_frame": 2 }"#,
        )
        .expect("write config");

        let config = load_host_config(temp.path()).expect("load");
        assert_eq!(config.max_ticks_per_frame, 2);
    }
}
