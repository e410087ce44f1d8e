use std::path::Path;
use std::sync::Arc;

use engine::{
    resolve_app_paths, CallScriptRunner, EntryLocation, FsContentSource, GameObject,
    HeadlessRenderBackend, MemoryResourceSystem, ModuleController, ModuleServices, ObjectKind,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{load_host_config, HostConfig, HostError};
use super::loop_runner::HostLoop;
use super::metrics::MetricsHandle;
use super::render_thread::{RenderThread, StatusHandle};

pub(crate) struct HostWiring {
    pub(crate) host_loop: HostLoop,
    pub(crate) render_thread: Option<RenderThread>,
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn build_host() -> Result<HostWiring, HostError> {
    let app_paths = resolve_app_paths()?;
    let config = load_host_config(&app_paths.root)?;
    let content_root = config
        .content_root
        .clone()
        .unwrap_or_else(|| app_paths.content_dir.clone());
    info!(
        root = %app_paths.root.display(),
        content_root = %content_root.display(),
        start_module = %config.start_module,
        "startup"
    );

    let render = HeadlessRenderBackend::new();
    let frame_lock = render.frame_lock();
    let controller = start_controller(&config, &content_root, render)?;

    let status = StatusHandle::default();
    let metrics = MetricsHandle::default();
    let render_thread = if config.render_thread {
        Some(RenderThread::spawn(
            Arc::clone(&frame_lock),
            status.clone(),
            metrics.clone(),
            config.render_fps,
        )?)
    } else {
        None
    };

    Ok(HostWiring {
        host_loop: HostLoop::new(controller, frame_lock, status, metrics, &config),
        render_thread,
    })
}

/// Wires the controller to on-disk content, attaches the PC and enters the
/// start module.
pub(crate) fn start_controller(
    config: &HostConfig,
    content_root: &Path,
    render: HeadlessRenderBackend,
) -> Result<ModuleController, HostError> {
    let services = ModuleServices {
        content: Box::new(FsContentSource::new(content_root)),
        resources: Arc::new(MemoryResourceSystem::new()),
        render: Arc::new(render),
        scripts: Box::new(CallScriptRunner::new()),
    };
    let mut controller = ModuleController::new(services, config.module.clone());

    let mut pc = GameObject::new(config.pc_tag.clone(), ObjectKind::Creature);
    pc.model = config.pc_model.clone();
    controller.use_pc(pc);

    let entry = config.entry_tag.as_deref().map(EntryLocation::tag);
    controller.load(&config.start_module, entry)?;
    controller.enter()?;
    Ok(controller)
}

#[cfg(test)]
mod tests {
    use engine::{ModuleError, ModuleState};

    use super::super::test_support::write_demo_content;
    use super::*;

    #[test]
    fn start_controller_enters_the_start_module() {
        let temp = tempfile::TempDir::new().expect("temp");
        write_demo_content(temp.path());

        let controller =
            start_controller(&HostConfig::default(), temp.path(), HeadlessRenderBackend::new())
                .expect("start");

        assert_eq!(controller.state(), ModuleState::Running);
        assert_eq!(controller.module_name(), Some("harbour"));
        assert_eq!(
            controller.current_area().map(|area| area.resref.as_str()),
            Some("dock")
        );
        assert_eq!(controller.pc().map(|pc| pc.tag.as_str()), Some("player"));
    }

    #[test]
    fn entry_tag_places_the_pc() {
        let temp = tempfile::TempDir::new().expect("temp");
        write_demo_content(temp.path());
        let config = HostConfig {
            entry_tag: Some("wp_bay".to_string()),
            ..HostConfig::default()
        };

        let controller =
            start_controller(&config, temp.path(), HeadlessRenderBackend::new()).expect("start");

        assert_eq!(
            controller.current_area().map(|area| area.resref.as_str()),
            Some("bay")
        );
    }

    #[test]
    fn unknown_start_module_is_reported() {
        let temp = tempfile::TempDir::new().expect("temp");
        write_demo_content(temp.path());
        let config = HostConfig {
            start_module: "atlantis".to_string(),
            ..HostConfig::default()
        };

        let error = start_controller(&config, temp.path(), HeadlessRenderBackend::new())
            .err()
            .expect("must fail");
        assert!(matches!(
            error,
            HostError::Module(ModuleError::ContentNotFound { .. })
        ));
    }
}
