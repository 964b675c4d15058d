//! Governor → fusion → analysis → session, one frame at a time.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::biomechanics::{BiometricResult, BiomechanicsAnalyzer, ExerciseKind};
use crate::capability::{DeviceMode, ModeHandle};
use crate::config::Config;
use crate::fusion::{DepthMap, SensorFusion};
use crate::governor::FrameGovernor;
use crate::pose::PoseEstimate;
use crate::session::{SessionAggregator, SessionSummary};

/// Detector output for one camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    pub timestamp: f64,
    pub joints: PoseEstimate,
    pub depth: Option<DepthMap>,
}

impl FrameInput {
    pub fn new(timestamp: f64, joints: PoseEstimate) -> Self {
        Self {
            timestamp,
            joints,
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: DepthMap) -> Self {
        self.depth = Some(depth);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Rejected at admission because a frame was in flight.
    Dropped,
    Analyzed(BiometricResult),
    /// Analyzed, but its timestamp went backwards; neither stored nor emitted.
    OutOfOrder,
}

pub struct Pipeline {
    governor: Arc<FrameGovernor>,
    fusion: SensorFusion,
    analyzer: BiomechanicsAnalyzer,
    mode: ModeHandle,
    exercise: ExerciseKind,
    session: SessionAggregator,
    results: Option<Sender<BiometricResult>>,
}

impl Pipeline {
    pub fn new(
        exercise: ExerciseKind,
        mode: ModeHandle,
        governor: Arc<FrameGovernor>,
        fusion: SensorFusion,
    ) -> Self {
        Self {
            governor,
            fusion,
            analyzer: BiomechanicsAnalyzer::new(),
            mode,
            exercise,
            session: SessionAggregator::new(),
            results: None,
        }
    }

    pub fn from_config(config: &Config, exercise: ExerciseKind, mode: ModeHandle) -> Self {
        Self::new(
            exercise,
            mode,
            Arc::new(FrameGovernor::from_config(&config.governor)),
            SensorFusion::from_config(&config.fusion),
        )
    }

    /// Emit every appended result on `tx`.
    pub fn with_results(mut self, tx: Sender<BiometricResult>) -> Self {
        self.results = Some(tx);
        self
    }

    pub fn governor(&self) -> &Arc<FrameGovernor> {
        &self.governor
    }

    pub fn exercise(&self) -> ExerciseKind {
        self.exercise
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode.current()
    }

    pub fn session(&self) -> &SessionAggregator {
        &self.session
    }

    /// Admit and analyze one frame, or drop it if one is already in flight.
    pub fn process(&mut self, input: &FrameInput) -> FrameOutcome {
        if !self.governor.try_admit() {
            debug!(timestamp = input.timestamp, "frame dropped");
            return FrameOutcome::Dropped;
        }
        match self.run_admitted(input) {
            Some(result) => FrameOutcome::Analyzed(result),
            None => FrameOutcome::OutOfOrder,
        }
    }

    /// Analyze a frame the caller already admitted through
    /// [`governor`](Self::governor). Always records the completion.
    /// Returns `None` when the session rejected the result as out of order.
    pub fn run_admitted(&mut self, input: &FrameInput) -> Option<BiometricResult> {
        let started = Instant::now();
        let mode = self.mode.current();

        let frame = self
            .fusion
            .fuse(&input.joints, input.depth.as_ref(), mode, input.timestamp);
        let result = self
            .analyzer
            .analyze(self.exercise, &frame.positions(), frame.timestamp());
        debug!(
            timestamp = result.timestamp,
            %mode,
            joints = frame.len(),
            correct = result.is_correct,
            "frame analyzed"
        );

        let appended = self.session.append(result.clone());
        if appended {
            self.emit(&result);
        }

        let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;
        self.governor.record_completion(elapsed_ms);
        appended.then_some(result)
    }

    /// Summary of everything appended so far.
    pub fn finish(&self) -> SessionSummary {
        self.session.summary()
    }

    /// Start a new session, possibly for a different exercise.
    pub fn restart(&mut self, exercise: ExerciseKind) {
        self.exercise = exercise;
        self.session.reset();
    }

    fn emit(&mut self, result: &BiometricResult) {
        if let Some(tx) = &self.results {
            if tx.send(result.clone()).is_err() {
                debug!("result receiver closed");
                self.results = None;
            }
        }
    }
}
