//! In-memory host collaborators.
//!
//! Useful for tests, simulations and hosts that preload an attempt's data.

use std::collections::{HashMap, HashSet};

use crate::model::{AttemptId, ElementId, QuizId};
use crate::rows::QuizRows;
use crate::traits::{DisplayLog, GradeStore, QuizSource};

/// Grades and display flags held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryGradeStore {
    grades: HashMap<(AttemptId, ElementId), f64>,
    displayed: HashSet<(AttemptId, ElementId)>,
}

impl MemoryGradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the grade achieved for an element.
    pub fn record_grade(&mut self, attempt: AttemptId, element: ElementId, grade: f64) {
        self.grades.insert((attempt, element), grade);
    }

    pub fn mark_displayed(&mut self, attempt: AttemptId, element: ElementId) {
        self.displayed.insert((attempt, element));
    }

    /// Builder-style variant of [`Self::record_grade`].
    pub fn with_grade(mut self, attempt: AttemptId, element: ElementId, grade: f64) -> Self {
        self.record_grade(attempt, element, grade);
        self
    }

    /// Builder-style variant of [`Self::mark_displayed`].
    pub fn with_displayed(mut self, attempt: AttemptId, element: ElementId) -> Self {
        self.mark_displayed(attempt, element);
        self
    }

    /// Number of grade records across all attempts.
    pub fn grade_count(&self) -> usize {
        self.grades.len()
    }
}

impl GradeStore for MemoryGradeStore {
    fn achieved_grade(
        &self,
        attempt: AttemptId,
        element: ElementId,
    ) -> anyhow::Result<Option<f64>> {
        Ok(self.grades.get(&(attempt, element)).copied())
    }
}

impl DisplayLog for MemoryGradeStore {
    fn was_displayed(&self, attempt: AttemptId, element: ElementId) -> anyhow::Result<bool> {
        Ok(self.displayed.contains(&(attempt, element)))
    }
}

/// Quiz rows held in memory, keyed by quiz id.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuizSource {
    quizzes: HashMap<QuizId, QuizRows>,
}

impl MemoryQuizSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rows: QuizRows) {
        self.quizzes.insert(rows.quiz.id, rows);
    }
}

impl QuizSource for MemoryQuizSource {
    fn load_rows(&self, quiz: QuizId) -> anyhow::Result<QuizRows> {
        self.quizzes
            .get(&quiz)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("quiz {quiz} not found"))
    }
}
