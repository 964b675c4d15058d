use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Named scalar metrics. Ordered so serialized output is stable.
pub type Metrics = BTreeMap<String, f32>;

/// Per-frame analysis outcome.
///
/// Measurements and deviations are in meters, angles in degrees. Signed
/// quantities (heights, valgus) say so in their key or doc; the rest are
/// magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricResult {
    pub is_correct: bool,
    pub feedback: String,
    pub confidence: f32,
    pub metric_measurements: Metrics,
    pub joint_angles: Metrics,
    pub deviation_metrics: Metrics,
    pub timestamp: f64,
}

impl BiometricResult {
    /// Confidence carried by the neutral result.
    pub const NEUTRAL_CONFIDENCE: f32 = 0.3;

    /// Result for a frame whose required joints were not all tracked.
    /// Insufficient tracking is never reported as a form error.
    pub fn neutral(timestamp: f64) -> Self {
        Self {
            is_correct: true,
            feedback: String::new(),
            confidence: Self::NEUTRAL_CONFIDENCE,
            metric_measurements: Metrics::new(),
            joint_angles: Metrics::new(),
            deviation_metrics: Metrics::new(),
            timestamp,
        }
    }

    /// True when produced by [`BiometricResult::neutral`].
    pub fn is_neutral(&self) -> bool {
        self.feedback.is_empty()
            && self.metric_measurements.is_empty()
            && self.joint_angles.is_empty()
            && self.deviation_metrics.is_empty()
    }
}

impl fmt::Display for BiometricResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_neutral() {
            "--"
        } else if self.is_correct {
            "OK"
        } else {
            "NG"
        };
        write!(
            f,
            "[{:>8.3}s] {} {:.2} {}",
            self.timestamp, status, self.confidence, self.feedback
        )?;
        for (name, value) in &self.joint_angles {
            write!(f, " {}={:.1}", name, value)?;
        }
        for (name, value) in &self.deviation_metrics {
            write!(f, " {}={:.3}", name, value)?;
        }
        Ok(())
    }
}
