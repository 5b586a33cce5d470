//! Host collaborator traits and the per-attempt evaluation context.
//!
//! The engine never owns grade data. The host implements these traits over
//! whatever storage it uses; `crate::store` provides in-memory versions.

use crate::error::{QuizError, QuizResult};
use crate::model::{AttemptId, ElementId, QuizId, GRADE_EPSILON};
use crate::rows::QuizRows;

// ---------------------------------------------------------------------------
// Host traits
// ---------------------------------------------------------------------------

/// Read-only access to the grades achieved in an attempt.
pub trait GradeStore {
    /// Achieved grade for an element, or `None` if it has not been graded.
    fn achieved_grade(&self, attempt: AttemptId, element: ElementId)
        -> anyhow::Result<Option<f64>>;
}

/// Tracks which elements were shown to the learner during an attempt.
pub trait DisplayLog {
    fn was_displayed(&self, attempt: AttemptId, element: ElementId) -> anyhow::Result<bool>;
}

/// Bulk loader for the persisted rows of one quiz.
pub trait QuizSource {
    fn load_rows(&self, quiz: QuizId) -> anyhow::Result<QuizRows>;
}

// ---------------------------------------------------------------------------
// Attempt context
// ---------------------------------------------------------------------------

/// Everything evaluation needs to know about one attempt.
///
/// Cross-cutting host state travels here explicitly instead of living in
/// globals.
#[derive(Clone, Copy)]
pub struct AttemptContext<'a> {
    attempt: AttemptId,
    grades: &'a dyn GradeStore,
    display: &'a dyn DisplayLog,
    epsilon: f64,
}

impl<'a> AttemptContext<'a> {
    pub fn new(
        attempt: AttemptId,
        grades: &'a dyn GradeStore,
        display: &'a dyn DisplayLog,
    ) -> Self {
        Self {
            attempt,
            grades,
            display,
            epsilon: GRADE_EPSILON,
        }
    }

    /// Build a context from a single store that tracks both grades and display.
    pub fn from_store<S>(attempt: AttemptId, store: &'a S) -> Self
    where
        S: GradeStore + DisplayLog,
    {
        Self::new(attempt, store, store)
    }

    /// Override the comparison tolerance.
    ///
    /// A negative or non-finite value is ignored and the current tolerance
    /// kept.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        if epsilon.is_finite() && epsilon >= 0.0 {
            self.epsilon = epsilon;
        } else {
            tracing::warn!(epsilon, "ignoring invalid grade epsilon");
        }
        self
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Achieved grade for an element. Ungraded elements count as 0.
    pub fn grade(&self, element: ElementId) -> QuizResult<f64> {
        let grade = self
            .grades
            .achieved_grade(self.attempt, element)
            .map_err(QuizError::Host)?;
        Ok(match grade {
            Some(value) if value.is_finite() => value,
            Some(value) => {
                tracing::debug!(%element, value, "ignoring non-finite grade");
                0.0
            }
            None => 0.0,
        })
    }

    pub fn was_displayed(&self, element: ElementId) -> QuizResult<bool> {
        self.display
            .was_displayed(self.attempt, element)
            .map_err(QuizError::Host)
    }
}

impl std::fmt::Debug for AttemptContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptContext")
            .field("attempt", &self.attempt)
            .field("epsilon", &self.epsilon)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Comparator;

    struct Broken;

    impl GradeStore for Broken {
        fn achieved_grade(&self, _: AttemptId, _: ElementId) -> anyhow::Result<Option<f64>> {
            anyhow::bail!("grade table unavailable")
        }
    }

    impl DisplayLog for Broken {
        fn was_displayed(&self, _: AttemptId, _: ElementId) -> anyhow::Result<bool> {
            anyhow::bail!("display log unavailable")
        }
    }

    struct Fixed(Option<f64>);

    impl GradeStore for Fixed {
        fn achieved_grade(&self, _: AttemptId, _: ElementId) -> anyhow::Result<Option<f64>> {
            Ok(self.0)
        }
    }

    impl DisplayLog for Fixed {
        fn was_displayed(&self, _: AttemptId, _: ElementId) -> anyhow::Result<bool> {
            Ok(self.0.is_some())
        }
    }

    #[test]
    fn missing_grade_is_zero() {
        let store = Fixed(None);
        let ctx = AttemptContext::from_store(AttemptId(1), &store);
        assert_eq!(ctx.grade(ElementId(3)).unwrap(), 0.0);
        assert!(!ctx.was_displayed(ElementId(3)).unwrap());
    }

    #[test]
    fn non_finite_grade_is_zero() {
        let store = Fixed(Some(f64::NAN));
        let ctx = AttemptContext::from_store(AttemptId(1), &store);
        assert_eq!(ctx.grade(ElementId(3)).unwrap(), 0.0);
    }

    #[test]
    fn host_failures_propagate() {
        let ctx = AttemptContext::from_store(AttemptId(1), &Broken);
        let err = ctx.grade(ElementId(1)).unwrap_err();
        assert!(err.is_host_error());
        assert!(err.to_string().contains("grade table unavailable"));
        assert!(ctx.was_displayed(ElementId(1)).unwrap_err().is_host_error());
    }

    #[test]
    fn epsilon_override() {
        let store = Fixed(None);
        let ctx = AttemptContext::from_store(AttemptId(9), &store).with_epsilon(0.5);
        assert_eq!(ctx.epsilon(), 0.5);
        assert_eq!(ctx.attempt(), AttemptId(9));
    }

    #[test]
    fn invalid_epsilon_is_ignored() {
        let store = Fixed(Some(4.0));
        for bad in [-0.5, f64::NAN, f64::INFINITY] {
            let ctx = AttemptContext::from_store(AttemptId(1), &store).with_epsilon(bad);
            assert_eq!(ctx.epsilon(), GRADE_EPSILON);
            let grade = ctx.grade(ElementId(1)).unwrap();
            assert!(Comparator::Equal.holds(grade, 4.0, ctx.epsilon()));
        }

        let ctx = AttemptContext::from_store(AttemptId(1), &store)
            .with_epsilon(0.25)
            .with_epsilon(-1.0);
        assert_eq!(ctx.epsilon(), 0.25);
    }
}
