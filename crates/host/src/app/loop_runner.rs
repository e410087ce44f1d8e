use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use engine::{FrameLock, ModuleController, ModuleState, TickOutcome};
use tracing::{info, warn};

use super::bootstrap::HostWiring;
use super::config::{HostConfig, HostError};
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::render_thread::{RenderThread, StatusHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    ModuleExited,
    TickLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Stop(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub(crate) ticks: u64,
    pub(crate) sim_time_ms: u64,
    pub(crate) frames_presented: u64,
    pub(crate) stop_reason: StopReason,
}

/// Fixed-timestep driver around the module controller.
pub(crate) struct HostLoop {
    controller: ModuleController,
    frame_lock: Arc<FrameLock>,
    status: StatusHandle,
    metrics_handle: MetricsHandle,
    metrics: MetricsAccumulator,
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    run_ticks: Option<u64>,
    accumulator: Duration,
    ticks: u64,
}

impl HostLoop {
    pub(crate) fn new(
        controller: ModuleController,
        frame_lock: Arc<FrameLock>,
        status: StatusHandle,
        metrics_handle: MetricsHandle,
        config: &HostConfig,
    ) -> Self {
        let target_tps = config.target_tps.max(1);
        let fixed_dt = Duration::from_millis(u64::from((1000 / target_tps).max(1)));
        let max_frame_delta = normalize_non_zero_duration(
            Duration::from_millis(config.max_frame_delta_ms),
            Duration::from_millis(250),
        );
        let metrics_interval = normalize_non_zero_duration(
            Duration::from_millis(config.metrics_interval_ms),
            Duration::from_secs(1),
        );
        let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
        info!(
            target_tps,
            fixed_dt_ms = fixed_dt.as_millis() as u64,
            max_frame_delta_ms = max_frame_delta.as_millis() as u64,
            max_ticks_per_frame,
            run_ticks = ?config.run_ticks,
            "loop_config"
        );

        let host_loop = Self {
            controller,
            frame_lock,
            status,
            metrics_handle,
            metrics: MetricsAccumulator::new(metrics_interval),
            fixed_dt,
            max_frame_delta,
            max_ticks_per_frame,
            run_ticks: config.run_ticks,
            accumulator: Duration::ZERO,
            ticks: 0,
        };
        host_loop.publish_status();
        host_loop
    }

    pub(crate) fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }

    pub(crate) fn controller(&self) -> &ModuleController {
        &self.controller
    }

    #[cfg(test)]
    pub(crate) fn controller_mut(&mut self) -> &mut ModuleController {
        &mut self.controller
    }

    /// Feeds one frame's worth of wall time into the accumulator and runs
    /// the ticks it pays for.
    pub(crate) fn advance(&mut self, frame_dt: Duration) -> Result<LoopControl, HostError> {
        let clamped = clamp_frame_delta(frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        self.accumulator = step_plan.remaining_accumulator;
        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        let mut control = LoopControl::Continue;
        for _ in 0..step_plan.ticks_to_run {
            if let Some(reason) = self.step()? {
                control = LoopControl::Stop(reason);
                break;
            }
        }
        self.publish_status();
        self.publish_metrics();
        Ok(control)
    }

    /// Leaves a still-running module.
    pub(crate) fn finish(&mut self) -> Result<(), HostError> {
        if self.controller.state() == ModuleState::Running {
            self.controller.leave()?;
        }
        self.publish_status();
        Ok(())
    }

    fn step(&mut self) -> Result<Option<StopReason>, HostError> {
        if self.limit_reached() {
            return Ok(Some(StopReason::TickLimit));
        }

        let started = Instant::now();
        let outcome = self.controller.tick(self.fixed_dt.as_millis() as u64);
        self.metrics.record_tick(started.elapsed());
        self.ticks = self.ticks.saturating_add(1);

        match outcome {
            Ok(TickOutcome::Continue) => {}
            Ok(TickOutcome::ModuleChanged { module }) => {
                info!(module = %module, tick = self.ticks, "module_changed");
            }
            Ok(TickOutcome::Exited) => return Ok(Some(StopReason::ModuleExited)),
            Err(err) if self.controller.state() == ModuleState::Running => {
                warn!(error = %err, "module_change_failed");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(self.limit_reached().then_some(StopReason::TickLimit))
    }

    fn limit_reached(&self) -> bool {
        self.run_ticks.is_some_and(|limit| self.ticks >= limit)
    }

    fn publish_status(&self) {
        self.frame_lock.lock();
        self.status.publish(self.controller.status());
        self.frame_lock.unlock();
    }

    fn publish_metrics(&mut self) {
        let snapshot = self.metrics.maybe_snapshot(
            Instant::now(),
            self.controller.sim_time_ms(),
            self.controller.pending_actions(),
        );
        if let Some(snapshot) = snapshot {
            self.metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                sim_time_ms = snapshot.sim_time_ms,
                pending_actions = snapshot.pending_actions,
                module = self.controller.module_name().unwrap_or_default(),
                "loop_metrics"
            );
        }
    }
}

/// Runs the host loop in real time until the module exits or the tick
/// budget is spent, then leaves the module and stops the render thread.
pub(crate) fn run_host(wiring: HostWiring) -> Result<RunSummary, HostError> {
    let HostWiring {
        mut host_loop,
        render_thread,
    } = wiring;

    let result = drive(&mut host_loop).and_then(|reason| {
        host_loop.finish()?;
        Ok(reason)
    });
    let frames_presented = render_thread.map(RenderThread::stop).unwrap_or(0);
    let stop_reason = result?;

    Ok(RunSummary {
        ticks: host_loop.ticks(),
        sim_time_ms: host_loop.controller().sim_time_ms(),
        frames_presented,
        stop_reason,
    })
}

fn drive(host_loop: &mut HostLoop) -> Result<StopReason, HostError> {
    let fixed_dt = host_loop.fixed_dt();
    let mut last_frame_instant = Instant::now();
    loop {
        let elapsed = Instant::now().saturating_duration_since(last_frame_instant);
        let sleep = compute_cap_sleep(elapsed, Some(fixed_dt));
        if sleep > Duration::ZERO {
            thread::sleep(sleep);
        }

        let now = Instant::now();
        let frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        if let LoopControl::Stop(reason) = host_loop.advance(frame_dt)? {
            info!(reason = ?reason, ticks = host_loop.ticks(), "host_loop_stopped");
            return Ok(reason);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

pub(super) fn target_frame_duration(max_fps: Option<u32>) -> Option<Duration> {
    max_fps
        .filter(|fps| *fps > 0)
        .map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

pub(super) fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use engine::{Event, HeadlessRenderBackend};

    use super::super::bootstrap::start_controller;
    use super::super::test_support::write_demo_content;
    use super::*;

    fn host_loop(config: &HostConfig) -> (tempfile::TempDir, HostLoop) {
        let temp = tempfile::TempDir::new().expect("temp");
        write_demo_content(temp.path());
        let render = HeadlessRenderBackend::new();
        let frame_lock = render.frame_lock();
        let controller = start_controller(config, temp.path(), render).expect("start");
        let host_loop = HostLoop::new(
            controller,
            frame_lock,
            StatusHandle::default(),
            MetricsHandle::default(),
            config,
        );
        (temp, host_loop)
    }

    fn config() -> HostConfig {
        HostConfig {
            target_tps: 10,
            max_ticks_per_frame: 3,
            run_ticks: Some(5),
            render_thread: false,
            ..HostConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let result = plan_sim_steps(Duration::from_millis(100), Duration::from_millis(33), 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(1));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(120), Duration::from_millis(16), 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn compute_cap_sleep_only_sleeps_under_budget() {
        let target = target_frame_duration(Some(30));
        assert_eq!(compute_cap_sleep(Duration::from_millis(40), target), Duration::ZERO);
        assert!(compute_cap_sleep(Duration::from_millis(5), target) > Duration::ZERO);
        assert_eq!(target_frame_duration(Some(0)), None);
    }

    #[test]
    fn advance_runs_paid_ticks_and_stops_at_the_limit() {
        let (_temp, mut host_loop) = host_loop(&config());

        assert_eq!(
            host_loop.advance(Duration::from_millis(250)).expect("advance"),
            LoopControl::Continue
        );
        assert_eq!(host_loop.ticks(), 2);
        assert_eq!(host_loop.controller().sim_time_ms(), 200);

        assert_eq!(
            host_loop.advance(Duration::from_millis(250)).expect("advance"),
            LoopControl::Stop(StopReason::TickLimit)
        );
        assert_eq!(host_loop.ticks(), 5);
        assert_eq!(host_loop.controller().sim_time_ms(), 500);
    }

    #[test]
    fn quit_event_stops_the_loop_and_finish_is_idempotent() {
        let (_temp, mut host_loop) = host_loop(&HostConfig {
            run_ticks: None,
            ..config()
        });
        host_loop.controller_mut().add_event(Event::quit());

        assert_eq!(
            host_loop.advance(Duration::from_millis(100)).expect("advance"),
            LoopControl::Stop(StopReason::ModuleExited)
        );
        assert_eq!(host_loop.controller().state(), ModuleState::Unloaded);
        host_loop.finish().expect("finish");
    }

    #[test]
    fn finish_leaves_a_running_module() {
        let (_temp, mut host_loop) = host_loop(&config());
        host_loop.advance(Duration::from_millis(100)).expect("advance");

        host_loop.finish().expect("finish");
        assert_eq!(host_loop.controller().state(), ModuleState::Unloaded);
    }
}
