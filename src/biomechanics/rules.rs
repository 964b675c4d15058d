//! Ordered form checks. The first failing check decides the verdict.

/// How a failing check affects correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Form is wrong: `is_correct = false`.
    Fault,
    /// Form is acceptable but can improve: `is_correct = true`.
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub is_correct: bool,
    pub feedback: &'static str,
    pub confidence: f32,
}

impl Verdict {
    pub const fn good(feedback: &'static str, confidence: f32) -> Self {
        Self {
            is_correct: true,
            feedback,
            confidence,
        }
    }
}

/// A single threshold test with the verdict it yields when it trips.
#[derive(Debug, Clone, Copy)]
pub struct Check {
    pub name: &'static str,
    pub severity: Severity,
    pub feedback: &'static str,
    pub confidence: f32,
}

impl Check {
    pub const fn fault(name: &'static str, feedback: &'static str, confidence: f32) -> Self {
        Self {
            name,
            severity: Severity::Fault,
            feedback,
            confidence,
        }
    }

    pub const fn advisory(name: &'static str, feedback: &'static str, confidence: f32) -> Self {
        Self {
            name,
            severity: Severity::Advisory,
            feedback,
            confidence,
        }
    }

    fn verdict(&self) -> Verdict {
        Verdict {
            is_correct: self.severity == Severity::Advisory,
            feedback: self.feedback,
            confidence: self.confidence,
        }
    }
}

/// Walk `checks` in order and return the verdict of the first one whose
/// condition holds, or `good` when none does.
pub fn first_failure<'a, I>(checks: I, good: Verdict) -> Verdict
where
    I: IntoIterator<Item = (&'a Check, bool)>,
{
    checks
        .into_iter()
        .find(|(_, tripped)| *tripped)
        .map(|(check, _)| check.verdict())
        .unwrap_or(good)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Check = Check::fault("a", "fault a", 0.7);
    const B: Check = Check::advisory("b", "advice b", 0.8);
    const GOOD: Verdict = Verdict::good("fine", 0.9);

    #[test]
    fn test_first_failure_wins() {
        let v = first_failure([(&A, true), (&B, true)], GOOD);
        assert_eq!(v.feedback, "fault a");
        assert!(!v.is_correct);
        assert_eq!(v.confidence, 0.7);
    }

    #[test]
    fn test_advisory_keeps_correct() {
        let v = first_failure([(&A, false), (&B, true)], GOOD);
        assert_eq!(v.feedback, "advice b");
        assert!(v.is_correct);
    }

    #[test]
    fn test_none_tripped() {
        assert_eq!(first_failure([(&A, false), (&B, false)], GOOD), GOOD);
    }
}
