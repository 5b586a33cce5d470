//! Structural validation of a quiz tree.
//!
//! Runs after construction and after every edit, before the edit is
//! committed. Any failure leaves the caller's tree untouched.

use std::collections::{BTreeMap, BTreeSet};

use crate::block::BlockElement;
use crate::condition::{Condition, ConditionPart, PartKind};
use crate::error::StructureViolation;
use crate::model::{is_valid_grade, ElementId};
use crate::tree::{depth_error, QuizTree};

impl QuizTree {
    /// Check every invariant of the tree.
    pub(crate) fn validate(&self) -> Result<(), StructureViolation> {
        let main = self.require_block(self.main)?;
        if main.parent.is_some() {
            return Err(StructureViolation::NestedMainBlock(main.id));
        }
        if main.condition.is_some() {
            return Err(StructureViolation::GatedMainBlock(main.id));
        }

        self.check_reachability()?;

        for block in self.blocks.values() {
            if !block.is_main() && block.elements.is_empty() {
                return Err(StructureViolation::EmptyBlock(block.id));
            }
            for element in &block.elements {
                if !is_valid_grade(element.max_grade) {
                    return Err(StructureViolation::InvalidGrade {
                        what: format!("element {}", element.id),
                        value: element.max_grade,
                    });
                }
            }
        }

        let index: BTreeMap<ElementId, &BlockElement> = self
            .blocks
            .values()
            .flat_map(|b| b.elements.iter())
            .map(|e| (e.id, e))
            .collect();

        for block in self.blocks.values() {
            let Some(condition) = &block.condition else {
                continue;
            };
            check_condition(condition, &index)?;
            let subtree = self.subtree_elements(block.id);
            if let Some(element) = condition.targets().find(|t| subtree.contains(t)) {
                return Err(StructureViolation::SelfReferentialCondition {
                    block: block.id,
                    element,
                });
            }
        }

        for feedback in &self.feedback {
            if let Some(condition) = &feedback.condition {
                check_condition(condition, &index)?;
            }
            for element in &feedback.uses {
                match index.get(element) {
                    None => {
                        return Err(StructureViolation::DanglingFeedbackUse {
                            feedback: feedback.id,
                            element: *element,
                        })
                    }
                    Some(e) if !e.is_question() => {
                        return Err(StructureViolation::NonQuestionFeedbackUse {
                            feedback: feedback.id,
                            element: *element,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(())
    }

    /// Walk from the main block; every other block must be reached exactly
    /// once and within the depth limit.
    fn check_reachability(&self) -> Result<(), StructureViolation> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![(self.main, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(depth_error(id, depth, self.max_depth));
            }
            if !visited.insert(id) {
                return Err(StructureViolation::Cycle(id));
            }
            let block = self.require_block(id)?;
            for child in block.elements.iter().filter_map(|e| e.child_block()) {
                stack.push((child, depth + 1));
            }
        }

        for block in self.blocks.values() {
            if visited.contains(&block.id) {
                continue;
            }
            return Err(match block.parent {
                None => StructureViolation::Detached(block.id),
                Some(_) => StructureViolation::Cycle(block.id),
            });
        }
        Ok(())
    }
}

fn check_condition(
    condition: &Condition,
    index: &BTreeMap<ElementId, &BlockElement>,
) -> Result<(), StructureViolation> {
    for part in &condition.parts {
        check_part(part, index)?;
    }
    Ok(())
}

fn check_part(
    part: &ConditionPart,
    index: &BTreeMap<ElementId, &BlockElement>,
) -> Result<(), StructureViolation> {
    if let PartKind::Grade { threshold, .. } = &part.kind {
        if !threshold.is_finite() {
            return Err(StructureViolation::InvalidGrade {
                what: format!("condition part {}", part.id),
                value: *threshold,
            });
        }
    }
    if part.targets().is_empty() {
        return Err(StructureViolation::EmptyPartTargets(part.id));
    }
    for target in part.targets() {
        match index.get(target) {
            None => {
                return Err(StructureViolation::DanglingTarget {
                    part: part.id,
                    element: *target,
                })
            }
            Some(element) if !element.is_question() => {
                return Err(StructureViolation::NonQuestionTarget {
                    part: part.id,
                    element: *target,
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}
