//! Conditions gating blocks and feedback.
//!
//! A [`Condition`] combines [`ConditionPart`]s with AND or OR. Each part
//! either compares an achieved grade against a threshold or checks that an
//! element was displayed.

use std::fmt;

use crate::error::QuizResult;
use crate::model::{Comparator, ConditionId, ElementId, PartId};
use crate::traits::AttemptContext;

/// The element(s) whose grade a part compares.
#[derive(Debug, Clone, PartialEq)]
pub enum PartTarget {
    Single(ElementId),
    /// Compared against the sum of the grades of all listed elements.
    Sum(Vec<ElementId>),
}

impl PartTarget {
    /// Build a target from a list of ids. One id yields the simple form.
    pub fn from_ids(mut ids: Vec<ElementId>) -> Self {
        if ids.len() == 1 {
            PartTarget::Single(ids.remove(0))
        } else {
            PartTarget::Sum(ids)
        }
    }

    pub fn ids(&self) -> &[ElementId] {
        match self {
            PartTarget::Single(id) => std::slice::from_ref(id),
            PartTarget::Sum(ids) => ids,
        }
    }
}

/// What a single condition part checks.
#[derive(Debug, Clone, PartialEq)]
pub enum PartKind {
    Grade {
        comparator: Comparator,
        threshold: f64,
        target: PartTarget,
    },
    WasDisplayed {
        target: ElementId,
    },
}

/// One predicate of a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionPart {
    pub id: PartId,
    pub kind: PartKind,
}

impl ConditionPart {
    /// Grade comparison against a single element. The id is assigned when
    /// the part is attached to a tree.
    pub fn grade(comparator: Comparator, threshold: f64, target: ElementId) -> Self {
        Self {
            id: PartId(0),
            kind: PartKind::Grade {
                comparator,
                threshold,
                target: PartTarget::Single(target),
            },
        }
    }

    /// Grade comparison against the summed grades of several elements.
    pub fn grade_sum(comparator: Comparator, threshold: f64, targets: Vec<ElementId>) -> Self {
        Self {
            id: PartId(0),
            kind: PartKind::Grade {
                comparator,
                threshold,
                target: PartTarget::from_ids(targets),
            },
        }
    }

    pub fn was_displayed(target: ElementId) -> Self {
        Self {
            id: PartId(0),
            kind: PartKind::WasDisplayed { target },
        }
    }

    /// Elements this part reads.
    pub fn targets(&self) -> &[ElementId] {
        match &self.kind {
            PartKind::Grade { target, .. } => target.ids(),
            PartKind::WasDisplayed { target } => std::slice::from_ref(target),
        }
    }

    /// Evaluate the part for one attempt. Missing grades count as 0.
    pub fn evaluate(&self, ctx: &AttemptContext<'_>) -> QuizResult<bool> {
        match &self.kind {
            PartKind::Grade {
                comparator,
                threshold,
                target,
            } => {
                let mut achieved = 0.0;
                for element in target.ids() {
                    achieved += ctx.grade(*element)?;
                }
                let holds = comparator.holds(achieved, *threshold, ctx.epsilon());
                tracing::trace!(part = %self.id, achieved, threshold, %comparator, holds, "grade part");
                Ok(holds)
            }
            PartKind::WasDisplayed { target } => ctx.was_displayed(*target),
        }
    }
}

impl fmt::Display for ConditionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PartKind::Grade {
                comparator,
                threshold,
                target,
            } => match target {
                PartTarget::Single(id) => write!(f, "grade(#{id}) {comparator} {threshold}"),
                PartTarget::Sum(ids) => {
                    let ids: Vec<String> = ids.iter().map(|id| format!("#{id}")).collect();
                    write!(f, "sum({}) {comparator} {threshold}", ids.join(", "))
                }
            },
            PartKind::WasDisplayed { target } => write!(f, "displayed(#{target})"),
        }
    }
}

/// A conjunction or disjunction of condition parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub id: ConditionId,
    /// `true`: every part must hold. `false`: at least one must.
    pub use_and: bool,
    pub parts: Vec<ConditionPart>,
}

impl Condition {
    /// Condition satisfied when every part holds.
    pub fn all(parts: Vec<ConditionPart>) -> Self {
        Self {
            id: ConditionId(0),
            use_and: true,
            parts,
        }
    }

    /// Condition satisfied when at least one part holds.
    pub fn any(parts: Vec<ConditionPart>) -> Self {
        Self {
            id: ConditionId(0),
            use_and: false,
            parts,
        }
    }

    /// Returns `true` if the condition admits the attempt.
    ///
    /// An empty condition is vacuously satisfied regardless of `use_and`.
    /// Evaluation short-circuits; the result does not depend on part order.
    pub fn is_satisfied(&self, ctx: &AttemptContext<'_>) -> QuizResult<bool> {
        if self.parts.is_empty() {
            return Ok(true);
        }
        for part in &self.parts {
            let holds = part.evaluate(ctx)?;
            if self.use_and && !holds {
                return Ok(false);
            }
            if !self.use_and && holds {
                return Ok(true);
            }
        }
        Ok(self.use_and)
    }

    /// Every element referenced by any part.
    pub fn targets(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.parts.iter().flat_map(|p| p.targets().iter().copied())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str("always");
        }
        let joiner = if self.use_and { " AND " } else { " OR " };
        let parts: Vec<String> = self.parts.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(joiner))
    }
}
