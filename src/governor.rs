//! Single-in-flight frame admission and throughput accounting.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::GovernorConfig;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Outcome of one completed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub processing_ms: f32,
    pub over_budget: bool,
    /// Set when this completion closed a one-second window.
    pub fps: Option<f32>,
}

#[derive(Debug)]
struct Stats {
    window_start: Instant,
    window_frames: u32,
    fps: f32,
    last_processing_ms: f32,
    last_over_budget: bool,
}

/// Admits at most one frame at a time. Frames arriving while one is in
/// flight are rejected, never queued.
#[derive(Debug)]
pub struct FrameGovernor {
    busy: AtomicBool,
    budget_ms: f32,
    stats: Mutex<Stats>,
    admitted: AtomicU64,
    dropped: AtomicU64,
    over_budget: AtomicU64,
}

impl FrameGovernor {
    pub fn new(budget_ms: f32) -> Self {
        Self {
            busy: AtomicBool::new(false),
            budget_ms,
            stats: Mutex::new(Stats {
                window_start: Instant::now(),
                window_frames: 0,
                fps: 0.0,
                last_processing_ms: 0.0,
                last_over_budget: false,
            }),
            admitted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            over_budget: AtomicU64::new(0),
        }
    }

    /// Budget of `1000 / target_fps` ms.
    pub fn with_target_fps(target_fps: u32) -> Self {
        Self::new(1000.0 / target_fps.max(1) as f32)
    }

    pub fn from_config(config: &GovernorConfig) -> Self {
        Self::new(config.frame_budget_ms())
    }

    pub fn budget_ms(&self) -> f32 {
        self.budget_ms
    }

    /// Claim the pipeline. Returns false while another frame is in flight.
    pub fn try_admit(&self) -> bool {
        let ok = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if ok {
            self.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        ok
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Release the pipeline after an admitted frame. Call exactly once per
    /// successful `try_admit`.
    pub fn record_completion(&self, processing_ms: f32) -> FrameReport {
        self.record_completion_at(processing_ms, Instant::now())
    }

    /// As [`record_completion`](Self::record_completion) with an explicit
    /// clock reading.
    pub fn record_completion_at(&self, processing_ms: f32, now: Instant) -> FrameReport {
        let over_budget = processing_ms > self.budget_ms;
        if over_budget {
            self.over_budget.fetch_add(1, Ordering::Relaxed);
            warn!(
                processing_ms,
                budget_ms = self.budget_ms,
                "frame over budget"
            );
        }

        let fps = {
            let mut stats = self.lock_stats();
            stats.last_processing_ms = processing_ms;
            stats.last_over_budget = over_budget;
            stats.window_frames += 1;
            let elapsed = now.saturating_duration_since(stats.window_start);
            if elapsed >= FPS_WINDOW {
                let fps = stats.window_frames as f32 / elapsed.as_secs_f32();
                stats.fps = fps;
                stats.window_frames = 0;
                stats.window_start = now;
                debug!(fps, "frame rate");
                Some(fps)
            } else {
                None
            }
        };

        self.busy.store(false, Ordering::Release);

        FrameReport {
            processing_ms,
            over_budget,
            fps,
        }
    }

    /// Frames completed per second over the last closed window.
    pub fn fps(&self) -> f32 {
        self.lock_stats().fps
    }

    pub fn last_processing_ms(&self) -> f32 {
        self.lock_stats().last_processing_ms
    }

    /// Whether the most recent frame exceeded the budget.
    pub fn last_over_budget(&self) -> bool {
        self.lock_stats().last_over_budget
    }

    pub fn admitted_count(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn over_budget_count(&self) -> u64 {
        self.over_budget.load(Ordering::Relaxed)
    }

    // 統計はロック中に panic しても値として壊れないのでそのまま使う
    fn lock_stats(&self) -> MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FrameGovernor {
    fn default() -> Self {
        Self::with_target_fps(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let g = FrameGovernor::default();
        assert!((g.budget_ms() - 16.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_single_in_flight() {
        let g = FrameGovernor::default();
        assert!(g.try_admit());
        assert!(g.is_busy());
        assert!(!g.try_admit());
        assert!(!g.try_admit());
        g.record_completion(5.0);
        assert!(!g.is_busy());
        assert!(g.try_admit());
        assert_eq!(g.admitted_count(), 2);
        assert_eq!(g.dropped_count(), 2);
    }

    #[test]
    fn test_over_budget_is_reported_not_fatal() {
        let g = FrameGovernor::default();
        assert!(g.try_admit());
        let report = g.record_completion(25.0);
        assert!(report.over_budget);
        assert!(g.last_over_budget());
        assert_eq!(g.last_processing_ms(), 25.0);
        assert_eq!(g.over_budget_count(), 1);

        assert!(g.try_admit());
        assert!(!g.record_completion(10.0).over_budget);
        assert!(!g.last_over_budget());
    }

    #[test]
    fn test_fps_window() {
        let g = FrameGovernor::default();
        let start = Instant::now();
        for i in 0..30 {
            assert!(g.try_admit());
            let at = start + Duration::from_millis(i * 10);
            assert_eq!(g.record_completion_at(1.0, at).fps, None);
        }
        assert!(g.try_admit());
        let report = g.record_completion_at(1.0, start + Duration::from_millis(1000));
        let fps = report.fps.expect("window closed");
        assert!(fps > 30.0 && fps <= 31.0, "fps {}", fps);
        assert_eq!(g.fps(), fps);
    }

    #[test]
    fn test_concurrent_admission() {
        use std::sync::Arc;
        use std::thread;

        let g = Arc::new(FrameGovernor::default());
        assert!(g.try_admit());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = Arc::clone(&g);
                thread::spawn(move || g.try_admit())
            })
            .collect();
        for h in handles {
            assert!(!h.join().unwrap());
        }
        g.record_completion(1.0);
        assert!(g.try_admit());
    }
}
