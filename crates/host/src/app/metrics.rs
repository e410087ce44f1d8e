use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct LoopMetricsSnapshot {
    pub(crate) tps: f32,
    /// Mean wall time spent inside `tick`.
    pub(crate) tick_time_ms: f32,
    pub(crate) sim_time_ms: u64,
    pub(crate) pending_actions: usize,
}

#[derive(Clone, Debug)]
pub(crate) struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub(crate) fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    ticks: u32,
    tick_time_sum: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub(crate) fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            interval_start: start,
            interval,
            ticks: 0,
            tick_time_sum: Duration::ZERO,
        }
    }

    pub(crate) fn record_tick(&mut self, tick_time: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.tick_time_sum = self.tick_time_sum.saturating_add(tick_time);
    }

    pub(crate) fn maybe_snapshot(
        &mut self,
        now: Instant,
        sim_time_ms: u64,
        pending_actions: usize,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let tick_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.tick_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            tick_time_ms,
            sim_time_ms,
            pending_actions,
        };

        self.interval_start = now;
        self.ticks = 0;
        self.tick_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;

    fn poison_lock(lock: &RwLock<LoopMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    #[test]
    fn snapshot_computes_expected_values() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));

        for _ in 0..4 {
            accumulator.record_tick(Duration::from_millis(2));
        }

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1), 400, 3)
            .expect("snapshot should be emitted");

        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert!((snapshot.tick_time_ms - 2.0).abs() < 0.001);
        assert_eq!(snapshot.sim_time_ms, 400);
        assert_eq!(snapshot.pending_actions, 3);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::starting_at(base, Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(1));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500), 0, 0)
            .is_none());
    }

    #[test]
    fn publish_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());
        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());

        let expected = LoopMetricsSnapshot {
            tps: 30.0,
            tick_time_ms: 0.5,
            sim_time_ms: 1_000,
            pending_actions: 2,
        };
        handle.publish(expected);

        assert_eq!(handle.snapshot(), expected);
    }
}
