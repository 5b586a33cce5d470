//! Feedback blocks and their selection after an attempt is graded.
//!
//! Selection order is ascending feedback id. When several selected blocks
//! claim the same question in their `uses`, the lowest id wins.

use std::collections::BTreeMap;

use crate::condition::Condition;
use crate::error::QuizResult;
use crate::model::{ElementId, FeedbackId};
use crate::traits::AttemptContext;

/// Conditionally shown feedback text.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackBlock {
    pub(crate) id: FeedbackId,
    pub(crate) name: String,
    pub(crate) text: String,
    pub(crate) domain: Option<String>,
    pub(crate) condition: Option<Condition>,
    pub(crate) uses: Vec<ElementId>,
}

impl FeedbackBlock {
    pub fn id(&self) -> FeedbackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Domain tag; `None` for global feedback.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Question elements whose own feedback this block replaces.
    pub fn uses(&self) -> &[ElementId] {
        &self.uses
    }

    /// Feedback without a condition always applies.
    pub fn applies(&self, ctx: &AttemptContext<'_>) -> QuizResult<bool> {
        match &self.condition {
            Some(condition) => condition.is_satisfied(ctx),
            None => Ok(true),
        }
    }
}

/// A new feedback block to add to a quiz.
#[derive(Debug, Clone, Default)]
pub struct NewFeedback {
    pub name: String,
    pub text: String,
    pub domain: Option<String>,
    pub condition: Option<Condition>,
    pub uses: Vec<ElementId>,
}

/// Feedback chosen for one attempt within one scope.
#[derive(Debug, Clone, Default)]
pub struct FeedbackSelection<'t> {
    blocks: Vec<&'t FeedbackBlock>,
    overrides: BTreeMap<ElementId, &'t FeedbackBlock>,
}

impl<'t> FeedbackSelection<'t> {
    /// Selected blocks in ascending id order.
    pub fn blocks(&self) -> &[&'t FeedbackBlock] {
        &self.blocks
    }

    /// The block whose text replaces the given question's own feedback.
    pub fn feedback_for(&self, element: ElementId) -> Option<&'t FeedbackBlock> {
        self.overrides.get(&element).copied()
    }

    /// All question overrides, ordered by element id.
    pub fn overrides(&self) -> impl Iterator<Item = (ElementId, &'t FeedbackBlock)> + '_ {
        self.overrides.iter().map(|(element, block)| (*element, *block))
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

/// Pick the feedback blocks that apply to an attempt.
///
/// Without a domain tag only global blocks are considered; with one, only
/// blocks carrying that tag.
pub fn select_feedback<'t>(
    feedback: &'t [FeedbackBlock],
    ctx: &AttemptContext<'_>,
    domain: Option<&str>,
) -> QuizResult<FeedbackSelection<'t>> {
    let mut candidates: Vec<&FeedbackBlock> = feedback
        .iter()
        .filter(|f| f.domain() == domain)
        .collect();
    candidates.sort_by_key(|f| f.id);

    let mut selection = FeedbackSelection::default();
    for block in candidates {
        if !block.applies(ctx)? {
            continue;
        }
        for element in &block.uses {
            selection.overrides.entry(*element).or_insert(block);
        }
        selection.blocks.push(block);
    }

    tracing::debug!(
        attempt = %ctx.attempt(),
        domain = domain.unwrap_or("<global>"),
        selected = selection.blocks.len(),
        overrides = selection.overrides.len(),
        "selected feedback"
    );
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionPart;
    use crate::model::{AttemptId, Comparator};
    use crate::store::MemoryGradeStore;

    fn feedback(id: u64, domain: Option<&str>, gate: Option<f64>, uses: &[u64]) -> FeedbackBlock {
        FeedbackBlock {
            id: FeedbackId(id),
            name: format!("fb{id}"),
            text: format!("text {id}"),
            domain: domain.map(String::from),
            condition: gate.map(|threshold| {
                Condition::all(vec![ConditionPart::grade(
                    Comparator::GreaterOrEqual,
                    threshold,
                    ElementId(1),
                )])
            }),
            uses: uses.iter().copied().map(ElementId).collect(),
        }
    }

    fn ctx_store(grade: f64) -> MemoryGradeStore {
        let mut store = MemoryGradeStore::new();
        store.record_grade(AttemptId(1), ElementId(1), grade);
        store
    }

    #[test]
    fn unconditional_feedback_always_selected() {
        let blocks = vec![feedback(1, None, None, &[])];
        let store = ctx_store(0.0);
        let ctx = AttemptContext::from_store(AttemptId(1), &store);
        let selection = select_feedback(&blocks, &ctx, None).unwrap();
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn conditions_filter_and_order_by_id() {
        let blocks = vec![
            feedback(5, None, Some(2.0), &[]),
            feedback(2, None, Some(8.0), &[]),
            feedback(3, None, None, &[]),
        ];
        let store = ctx_store(4.0);
        let ctx = AttemptContext::from_store(AttemptId(1), &store);
        let selection = select_feedback(&blocks, &ctx, None).unwrap();
        let ids: Vec<u64> = selection.blocks().iter().map(|f| f.id().0).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn domain_scoping() {
        let blocks = vec![
            feedback(1, None, None, &[]),
            feedback(2, Some("algebra"), None, &[]),
            feedback(3, Some("geometry"), None, &[]),
        ];
        let store = ctx_store(0.0);
        let ctx = AttemptContext::from_store(AttemptId(1), &store);

        let global = select_feedback(&blocks, &ctx, None).unwrap();
        assert_eq!(global.blocks()[0].id(), FeedbackId(1));
        assert_eq!(global.len(), 1);

        let algebra = select_feedback(&blocks, &ctx, Some("algebra")).unwrap();
        assert_eq!(algebra.len(), 1);
        assert_eq!(algebra.blocks()[0].id(), FeedbackId(2));

        assert!(select_feedback(&blocks, &ctx, Some("calculus"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn overlapping_uses_lowest_id_wins() {
        let blocks = vec![
            feedback(7, None, None, &[10, 11]),
            feedback(4, None, None, &[11]),
            feedback(2, None, Some(9.0), &[10]),
        ];
        let store = ctx_store(1.0);
        let ctx = AttemptContext::from_store(AttemptId(1), &store);
        let selection = select_feedback(&blocks, &ctx, None).unwrap();

        // Feedback 2 is not selected, so it cannot claim element 10.
        assert_eq!(selection.feedback_for(ElementId(10)).unwrap().id(), FeedbackId(7));
        assert_eq!(selection.feedback_for(ElementId(11)).unwrap().id(), FeedbackId(4));
        assert!(selection.feedback_for(ElementId(12)).is_none());
        assert_eq!(selection.overrides().count(), 2);
    }
}
