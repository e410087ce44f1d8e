use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use engine::{FrameLock, ModuleStatus};
use tracing::{debug, info, warn};

use super::config::HostError;
use super::loop_runner::{compute_cap_sleep, target_frame_duration};
use super::metrics::MetricsHandle;

static STATUS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_status_lock_poison_once(operation: &'static str) {
    if STATUS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "status lock poisoned; recovered inner value");
    }
}

/// World summary shared with the render thread. The simulation thread
/// publishes while holding the frame lock.
#[derive(Clone, Debug, Default)]
pub(crate) struct StatusHandle {
    status: Arc<RwLock<Option<ModuleStatus>>>,
}

impl StatusHandle {
    pub(crate) fn snapshot(&self) -> Option<ModuleStatus> {
        match self.status.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                warn_status_lock_poison_once("read");
                poisoned.into_inner().clone()
            }
        }
    }

    pub(crate) fn publish(&self, status: ModuleStatus) {
        match self.status.write() {
            Ok(mut guard) => *guard = Some(status),
            Err(poisoned) => {
                warn_status_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = Some(status);
            }
        }
    }
}

pub(crate) struct RenderThread {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl RenderThread {
    pub(crate) fn spawn(
        frame_lock: Arc<FrameLock>,
        status: StatusHandle,
        metrics: MetricsHandle,
        fps: u32,
    ) -> Result<Self, HostError> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let frame_target = target_frame_duration(Some(fps.max(1)));
        let handle = thread::Builder::new()
            .name("render".to_string())
            .spawn(move || {
                render_loop(&frame_lock, &status, &metrics, &thread_stop, frame_target)
            })
            .map_err(HostError::SpawnRenderThread)?;
        info!(fps = fps.max(1), "render_thread_started");
        Ok(Self { stop, handle })
    }

    /// Stops the thread and returns how many frames it presented.
    pub(crate) fn stop(self) -> u64 {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.join() {
            Ok(frames) => frames,
            Err(_) => {
                warn!("render thread panicked");
                0
            }
        }
    }
}

fn render_loop(
    frame_lock: &FrameLock,
    status: &StatusHandle,
    metrics: &MetricsHandle,
    stop: &AtomicBool,
    frame_target: Option<Duration>,
) -> u64 {
    let mut frames = 0u64;
    let mut last_logged_area: Option<String> = None;
    while !stop.load(Ordering::Relaxed) {
        let started = Instant::now();
        if let Some(current) = present_frame(frame_lock, status) {
            frames = frames.saturating_add(1);
            if current.area != last_logged_area {
                let json = serde_json::to_string(&current).unwrap_or_default();
                let loop_metrics = metrics.snapshot();
                debug!(
                    frame = frames,
                    tps = loop_metrics.tps,
                    status = %json,
                    "frame_area_changed"
                );
                last_logged_area = current.area;
            }
        }
        thread::sleep(compute_cap_sleep(started.elapsed(), frame_target));
    }
    frames
}

/// Reads the published world summary the way a renderer would draw it:
/// with the frame lock held so no module swap is half-applied.
pub(crate) fn present_frame(frame_lock: &FrameLock, status: &StatusHandle) -> Option<ModuleStatus> {
    frame_lock.lock();
    let snapshot = status.snapshot();
    frame_lock.unlock();
    snapshot
}

#[cfg(test)]
mod tests {
    use engine::ModuleState;

    use super::*;

    fn status(area: &str) -> ModuleStatus {
        ModuleStatus {
            state: ModuleState::Running,
            module: Some("harbour".to_string()),
            area: Some(area.to_string()),
            pc_position: None,
            sim_time_ms: 0,
            pending_actions: 0,
            pending_events: 0,
            object_count: 1,
        }
    }

    #[test]
    fn present_frame_reads_latest_status_and_releases_lock() {
        let lock = FrameLock::new();
        let handle = StatusHandle::default();
        assert!(present_frame(&lock, &handle).is_none());

        handle.publish(status("dock"));
        handle.publish(status("bay"));

        let presented = present_frame(&lock, &handle).expect("status");
        assert_eq!(presented.area.as_deref(), Some("bay"));
        assert!(!lock.is_locked());
    }

    #[test]
    fn render_thread_presents_frames_until_stopped() {
        let lock = Arc::new(FrameLock::new());
        let handle = StatusHandle::default();
        handle.publish(status("dock"));

        let thread = RenderThread::spawn(
            Arc::clone(&lock),
            handle,
            MetricsHandle::default(),
            200,
        )
        .expect("spawn");
        thread::sleep(Duration::from_millis(50));
        let frames = thread.stop();

        assert!(frames > 0);
        assert!(!lock.is_locked());
    }
}
