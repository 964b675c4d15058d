//! Exercise-specific form analysis on anatomical-space joints.

pub mod geometry;
pub mod lunge;
pub mod plank;
pub mod push_up;
pub mod result;
pub mod rules;
pub mod squat;

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pose::{JointId, JointPositions, Vec3};
pub use result::{BiometricResult, Metrics};
pub use rules::{Check, Severity, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseKind {
    Squat,
    Plank,
    PushUp,
    Lunge,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 4] = [
        ExerciseKind::Squat,
        ExerciseKind::Plank,
        ExerciseKind::PushUp,
        ExerciseKind::Lunge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
            ExerciseKind::Plank => "plank",
            ExerciseKind::PushUp => "push_up",
            ExerciseKind::Lunge => "lunge",
        }
    }

    pub fn analyzer(&self) -> &'static dyn ExerciseAnalyzer {
        match self {
            ExerciseKind::Squat => &squat::SquatAnalyzer,
            ExerciseKind::Plank => &plank::PlankAnalyzer,
            ExerciseKind::PushUp => &push_up::PushUpAnalyzer,
            ExerciseKind::Lunge => &lunge::LungeAnalyzer,
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routes free-form exercise names ("Bodyweight Squat", "push-ups", ...)
/// to a kind by case-insensitive keyword.
impl FromStr for ExerciseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if lower.contains("squat") {
            Ok(ExerciseKind::Squat)
        } else if lower.contains("plank") {
            Ok(ExerciseKind::Plank)
        } else if lower.contains("push") {
            Ok(ExerciseKind::PushUp)
        } else if lower.contains("lunge") {
            Ok(ExerciseKind::Lunge)
        } else {
            Err(anyhow!("unknown exercise: {:?}", s))
        }
    }
}

/// Output of one analyzer before it is stamped with a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub measurements: Metrics,
    pub angles: Metrics,
    pub deviations: Metrics,
}

impl Evaluation {
    pub fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            measurements: Metrics::new(),
            angles: Metrics::new(),
            deviations: Metrics::new(),
        }
    }

    pub fn into_result(self, timestamp: f64) -> BiometricResult {
        BiometricResult {
            is_correct: self.verdict.is_correct,
            feedback: self.verdict.feedback.to_string(),
            confidence: self.verdict.confidence,
            metric_measurements: self.measurements,
            joint_angles: self.angles,
            deviation_metrics: self.deviations,
            timestamp,
        }
    }
}

/// One exercise's form model.
pub trait ExerciseAnalyzer: Send + Sync {
    fn kind(&self) -> ExerciseKind;

    /// Joints that must all be present for `evaluate` to run.
    fn required_joints(&self) -> &'static [JointId];

    /// Evaluate a frame. Returns `None` only if a required joint is absent.
    fn evaluate(&self, joints: &JointPositions) -> Option<Evaluation>;
}

/// Stateless entry point dispatching to the per-exercise analyzers.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiomechanicsAnalyzer;

impl BiomechanicsAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(
        &self,
        kind: ExerciseKind,
        joints: &JointPositions,
        timestamp: f64,
    ) -> BiometricResult {
        let analyzer = kind.analyzer();
        let missing: Vec<&str> = analyzer
            .required_joints()
            .iter()
            .filter(|id| !joints.contains_key(*id))
            .map(|id| id.name())
            .collect();
        if !missing.is_empty() {
            debug!(exercise = %kind, ?missing, "required joints missing");
            return BiometricResult::neutral(timestamp);
        }

        match analyzer.evaluate(joints) {
            Some(evaluation) => evaluation.into_result(timestamp),
            None => BiometricResult::neutral(timestamp),
        }
    }
}

/// Fetch a joint, for use with `?` inside `evaluate`.
pub(crate) fn joint(joints: &JointPositions, id: JointId) -> Option<Vec3> {
    joints.get(&id).copied()
}
