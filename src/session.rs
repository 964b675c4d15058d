//! Ordered per-session result log and end-of-session summary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::biomechanics::BiometricResult;

/// How often one correction message was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionCount {
    pub feedback: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_frames: u32,
    /// Frames with every required joint tracked.
    pub analyzed_frames: u32,
    pub correct_frames: u32,
    /// `correct / analyzed` in percent; 100 when nothing was analyzed.
    pub accuracy_pct: f32,
    /// Per-key mean over the session. Deviations are averaged by magnitude.
    pub averages: BTreeMap<String, f32>,
    /// Most common correction first.
    pub corrections: Vec<CorrectionCount>,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "frames: {} (analyzed {}, correct {}), accuracy {:.0}%",
            self.total_frames, self.analyzed_frames, self.correct_frames, self.accuracy_pct
        )?;
        for (key, value) in &self.averages {
            writeln!(f, "  avg {:<36} {:>8.3}", key, value)?;
        }
        for c in &self.corrections {
            writeln!(f, "  x{:<4} {}", c.count, c.feedback)?;
        }
        Ok(())
    }
}

/// Append-only result log. Timestamps must not go backwards.
#[derive(Debug, Default)]
pub struct SessionAggregator {
    results: Vec<BiometricResult>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result. Returns false (and keeps the log unchanged) if its
    /// timestamp is earlier than the last one appended.
    pub fn append(&mut self, result: BiometricResult) -> bool {
        if let Some(last) = self.results.last() {
            if result.timestamp < last.timestamp {
                warn!(
                    timestamp = result.timestamp,
                    last = last.timestamp,
                    "out-of-order result rejected"
                );
                return false;
            }
        }
        self.results.push(result);
        true
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[BiometricResult] {
        &self.results
    }

    pub fn last(&self) -> Option<&BiometricResult> {
        self.results.last()
    }

    /// Per-key mean across every result carrying the key. Angles and
    /// measurements are averaged as-is, deviations by absolute value.
    pub fn averages(&self) -> BTreeMap<String, f32> {
        let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
        let mut add = |key: &str, value: f32| {
            let entry = sums.entry(key.to_string()).or_insert((0.0, 0));
            entry.0 += value as f64;
            entry.1 += 1;
        };
        for r in &self.results {
            for (k, v) in &r.joint_angles {
                add(k, *v);
            }
            for (k, v) in &r.metric_measurements {
                add(k, *v);
            }
            for (k, v) in &r.deviation_metrics {
                add(k, v.abs());
            }
        }
        sums.into_iter()
            .map(|(k, (sum, n))| (k, (sum / n as f64) as f32))
            .collect()
    }

    pub fn summary(&self) -> SessionSummary {
        let total = self.results.len() as u32;
        let analyzed: Vec<&BiometricResult> =
            self.results.iter().filter(|r| !r.is_neutral()).collect();
        let correct = analyzed.iter().filter(|r| r.is_correct).count() as u32;
        let accuracy = if analyzed.is_empty() {
            100.0
        } else {
            correct as f32 / analyzed.len() as f32 * 100.0
        };

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for r in analyzed.iter().filter(|r| !r.is_correct) {
            *counts.entry(r.feedback.as_str()).or_insert(0) += 1;
        }
        let mut corrections: Vec<CorrectionCount> = counts
            .into_iter()
            .map(|(feedback, count)| CorrectionCount {
                feedback: feedback.to_string(),
                count,
            })
            .collect();
        // 同数ならメッセージ順 (BTreeMap 由来) のまま
        corrections.sort_by(|a, b| b.count.cmp(&a.count));

        let summary = SessionSummary {
            total_frames: total,
            analyzed_frames: analyzed.len() as u32,
            correct_frames: correct,
            accuracy_pct: accuracy,
            averages: self.averages(),
            corrections,
        };
        info!(
            frames = summary.total_frames,
            accuracy = summary.accuracy_pct,
            "session summary"
        );
        summary
    }

    /// Drop all results and start over.
    pub fn reset(&mut self) {
        self.results.clear();
    }
}
