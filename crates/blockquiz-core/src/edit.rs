//! Editing operations on a quiz tree.
//!
//! Every edit runs against a working copy. Slots are renumbered, parent links
//! recomputed and the whole tree re-validated before the copy replaces the
//! original, so a rejected edit leaves the tree exactly as it was.
//!
//! A block element whose max grade matched its sub-block's total before an
//! edit keeps matching it afterwards, up through every ancestor. Links that
//! were deliberately set to another value, or that the edit itself
//! regraded, are left alone.

use std::collections::{BTreeMap, BTreeSet};

use crate::block::{Block, BlockElement};
use crate::condition::Condition;
use crate::error::StructureViolation;
use crate::feedback::{FeedbackBlock, NewFeedback};
use crate::model::{
    is_valid_grade, BlockId, ConditionId, ElementId, ElementTarget, FeedbackId, PartId, QuestionId,
};
use crate::tree::{link_parents, QuizTree};

/// A block to insert, together with its first questions.
///
/// A non-main block may never be empty, so at least one question is needed.
#[derive(Debug, Clone, Default)]
pub struct NewBlock {
    pub name: String,
    pub condition: Option<Condition>,
    /// `(question, max grade)` pairs in display order.
    pub questions: Vec<(QuestionId, f64)>,
}

impl QuizTree {
    /// Insert a question at a 1-based slot of a block.
    pub fn insert_question(
        &mut self,
        block: BlockId,
        slot: usize,
        question: QuestionId,
        max_grade: f64,
    ) -> Result<ElementId, StructureViolation> {
        self.commit("insert question", |tree| {
            check_grade("new element", max_grade)?;
            let id = tree.next_element_id();
            let target = tree.block_mut(block)?;
            let index = insertion_index(target, slot)?;
            target.elements.insert(
                index,
                BlockElement {
                    id,
                    target: ElementTarget::Question(question),
                    max_grade,
                    slot,
                },
            );
            Ok(id)
        })
    }

    /// Append a question after the last element of a block.
    pub fn append_question(
        &mut self,
        block: BlockId,
        question: QuestionId,
        max_grade: f64,
    ) -> Result<ElementId, StructureViolation> {
        let slot = self.require_block(block)?.elements.len() + 1;
        self.insert_question(block, slot, question, max_grade)
    }

    /// Insert a new sub-block at a 1-based slot of `parent`.
    ///
    /// The element linking the sub-block carries the sum of its questions'
    /// max grades.
    pub fn insert_block(
        &mut self,
        parent: BlockId,
        slot: usize,
        new: NewBlock,
    ) -> Result<BlockId, StructureViolation> {
        self.commit("insert block", |tree| {
            let block_id = tree.next_block_id();
            if new.questions.is_empty() {
                return Err(StructureViolation::EmptyBlock(block_id));
            }

            let condition = new.condition.map(|c| tree.attach_condition(c));
            let mut block = Block::new(block_id, new.name, condition);
            let mut next_element = tree.next_element_id().0;
            let mut max_grade = 0.0;
            for (question, grade) in new.questions {
                check_grade("new element", grade)?;
                block.elements.push(BlockElement {
                    id: ElementId(next_element),
                    target: ElementTarget::Question(question),
                    max_grade: grade,
                    slot: 0,
                });
                next_element += 1;
                max_grade += grade;
            }
            tree.blocks.insert(block_id, block);

            let target = tree.block_mut(parent)?;
            let index = insertion_index(target, slot)?;
            target.elements.insert(
                index,
                BlockElement {
                    id: ElementId(next_element),
                    target: ElementTarget::Block(block_id),
                    max_grade,
                    slot,
                },
            );
            Ok(block_id)
        })
    }

    /// Remove an element. Removing a sub-block element removes the whole
    /// sub-block with its elements and condition.
    ///
    /// Fails if the element is the last one of a gated block, or if any
    /// condition or feedback still refers to a removed question.
    pub fn remove_element(&mut self, element: ElementId) -> Result<(), StructureViolation> {
        self.commit("remove element", |tree| {
            let parent_id = tree.owner_of(element)?;
            let parent = tree.block_mut(parent_id)?;
            if !parent.is_main() && parent.elements.len() == 1 {
                return Err(StructureViolation::LastElement {
                    block: parent_id,
                    element,
                });
            }
            let index = parent
                .position_of(element)
                .ok_or(StructureViolation::UnknownElement(element))?;
            let removed = parent.elements.remove(index);

            if let Some(child) = removed.child_block() {
                let mut doomed = tree.descendant_blocks(child);
                doomed.insert(child);
                for id in doomed {
                    tree.blocks.remove(&id);
                }
            }
            Ok(())
        })
    }

    /// Move an element to a 1-based slot of a block, possibly the same one.
    pub fn move_element(
        &mut self,
        element: ElementId,
        to_block: BlockId,
        slot: usize,
    ) -> Result<(), StructureViolation> {
        self.commit("move element", |tree| {
            let from_id = tree.owner_of(element)?;
            tree.require_block(to_block)?;

            let from = tree.require_block(from_id)?;
            let moving = from
                .element(element)
                .and_then(|e| e.child_block())
                .map(|child| (child, tree.descendant_blocks(child)));
            if let Some((child, below)) = moving {
                if child == to_block || below.contains(&to_block) {
                    return Err(StructureViolation::MoveIntoOwnSubtree(element));
                }
            }
            if from_id != to_block && !from.is_main() && from.elements.len() == 1 {
                return Err(StructureViolation::LastElement {
                    block: from_id,
                    element,
                });
            }

            let from = tree.block_mut(from_id)?;
            let index = from
                .position_of(element)
                .ok_or(StructureViolation::UnknownElement(element))?;
            let moved = from.elements.remove(index);

            let to = tree.block_mut(to_block)?;
            let index = insertion_index(to, slot)?;
            to.elements.insert(index, moved);
            Ok(())
        })
    }

    /// Replace the condition gating a block. `None` ungates it.
    pub fn set_condition(
        &mut self,
        block: BlockId,
        condition: Option<Condition>,
    ) -> Result<(), StructureViolation> {
        self.commit("set condition", |tree| {
            let condition = condition.map(|c| tree.attach_condition(c));
            let target = tree.block_mut(block)?;
            if target.is_main() && condition.is_some() {
                return Err(StructureViolation::GatedMainBlock(block));
            }
            target.condition = condition;
            Ok(())
        })
    }

    pub fn set_block_name(
        &mut self,
        block: BlockId,
        name: impl Into<String>,
    ) -> Result<(), StructureViolation> {
        let name = name.into();
        self.commit("rename block", |tree| {
            tree.block_mut(block)?.name = name;
            Ok(())
        })
    }

    pub fn set_max_grade(
        &mut self,
        element: ElementId,
        max_grade: f64,
    ) -> Result<(), StructureViolation> {
        self.commit("set max grade", |tree| {
            check_grade(&format!("element {element}"), max_grade)?;
            let owner = tree.owner_of(element)?;
            let block = tree.block_mut(owner)?;
            let index = block
                .position_of(element)
                .ok_or(StructureViolation::UnknownElement(element))?;
            block.elements[index].max_grade = max_grade;
            Ok(())
        })
    }

    pub fn add_feedback(&mut self, new: NewFeedback) -> Result<FeedbackId, StructureViolation> {
        self.commit("add feedback", |tree| {
            let id = FeedbackId(tree.feedback.iter().map(|f| f.id.0).max().unwrap_or(0) + 1);
            let condition = new.condition.map(|c| tree.attach_condition(c));
            tree.feedback.push(FeedbackBlock {
                id,
                name: new.name,
                text: new.text,
                domain: new.domain,
                condition,
                uses: new.uses,
            });
            Ok(id)
        })
    }

    pub fn remove_feedback(&mut self, id: FeedbackId) -> Result<(), StructureViolation> {
        self.commit("remove feedback", |tree| {
            let index = tree
                .feedback
                .iter()
                .position(|f| f.id == id)
                .ok_or(StructureViolation::UnknownFeedback(id))?;
            tree.feedback.remove(index);
            Ok(())
        })
    }

    pub fn set_feedback_condition(
        &mut self,
        id: FeedbackId,
        condition: Option<Condition>,
    ) -> Result<(), StructureViolation> {
        self.commit("set feedback condition", |tree| {
            let condition = condition.map(|c| tree.attach_condition(c));
            let feedback = tree
                .feedback
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or(StructureViolation::UnknownFeedback(id))?;
            feedback.condition = condition;
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn commit<T>(
        &mut self,
        action: &'static str,
        edit: impl FnOnce(&mut QuizTree) -> Result<T, StructureViolation>,
    ) -> Result<T, StructureViolation> {
        let tracked = self.synced_links();
        let mut working = self.clone();
        let outcome = edit(&mut working).and_then(|value| {
            for block in working.blocks.values_mut() {
                block.renumber();
            }
            link_parents(&mut working.blocks)?;
            working.sync_link_grades(&tracked);
            working.feedback.sort_by_key(|f| f.id);
            working.validate()?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                *self = working;
                tracing::info!(quiz = %self.quiz.id, action, "committed quiz edit");
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(quiz = %self.quiz.id, action, error = %e, "rejected quiz edit");
                Err(e)
            }
        }
    }

    /// Block elements whose max grade equals their sub-block's total.
    fn synced_links(&self) -> BTreeMap<ElementId, f64> {
        self.blocks
            .values()
            .flat_map(|b| b.elements.iter())
            .filter(|e| {
                e.child_block()
                    .and_then(|child| self.blocks.get(&child))
                    .is_some_and(|child| {
                        (child.max_grade() - e.max_grade).abs() <= self.grade_epsilon
                    })
            })
            .map(|e| (e.id, e.max_grade))
            .collect()
    }

    /// Bring tracked links up to date with their sub-block totals, deepest
    /// blocks first so each parent sees its children's new totals.
    fn sync_link_grades(&mut self, tracked: &BTreeMap<ElementId, f64>) {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![(self.main, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.push((id, true));
            if let Some(block) = self.blocks.get(&id) {
                let children = block.elements.iter().filter_map(|e| e.child_block());
                stack.extend(children.map(|child| (child, false)));
            }
        }

        for id in order {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            let updates: Vec<(usize, f64)> = block
                .elements
                .iter()
                .enumerate()
                .filter_map(|(index, e)| {
                    let before = tracked.get(&e.id)?;
                    let total = self.blocks.get(&e.child_block()?)?.max_grade();
                    (*before == e.max_grade && total != e.max_grade).then_some((index, total))
                })
                .collect();
            if let Some(block) = self.blocks.get_mut(&id) {
                for (index, total) in updates {
                    let element = &mut block.elements[index];
                    tracing::debug!(
                        element = %element.id,
                        from = element.max_grade,
                        to = total,
                        "synced block max grade"
                    );
                    element.max_grade = total;
                }
            }
        }
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, StructureViolation> {
        self.blocks
            .get_mut(&id)
            .ok_or(StructureViolation::UnknownBlock(id))
    }

    fn owner_of(&self, element: ElementId) -> Result<BlockId, StructureViolation> {
        self.parent_of(element)
            .map(|b| b.id)
            .ok_or(StructureViolation::UnknownElement(element))
    }

    fn next_block_id(&self) -> BlockId {
        BlockId(self.blocks.keys().last().map_or(0, |id| id.0) + 1)
    }

    fn next_element_id(&self) -> ElementId {
        let max = self
            .blocks
            .values()
            .flat_map(|b| b.elements.iter())
            .map(|e| e.id.0)
            .max()
            .unwrap_or(0);
        ElementId(max + 1)
    }

    fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.blocks
            .values()
            .filter_map(|b| b.condition.as_ref())
            .chain(self.feedback.iter().filter_map(|f| f.condition.as_ref()))
    }

    /// Give a freshly built condition and its parts ids unused in this tree.
    fn attach_condition(&self, mut condition: Condition) -> Condition {
        let condition_id = self.conditions().map(|c| c.id.0).max().unwrap_or(0) + 1;
        let mut part_id = self
            .conditions()
            .flat_map(|c| c.parts.iter())
            .map(|p| p.id.0)
            .max()
            .unwrap_or(0);
        condition.id = ConditionId(condition_id);
        for part in &mut condition.parts {
            part_id += 1;
            part.id = PartId(part_id);
        }
        condition
    }
}

fn insertion_index(block: &Block, slot: usize) -> Result<usize, StructureViolation> {
    let max = block.elements.len() + 1;
    if slot == 0 || slot > max {
        return Err(StructureViolation::SlotOutOfRange {
            block: block.id,
            slot,
            max,
        });
    }
    Ok(slot - 1)
}

fn check_grade(what: &str, value: f64) -> Result<(), StructureViolation> {
    if is_valid_grade(value) {
        Ok(())
    } else {
        Err(StructureViolation::InvalidGrade {
            what: what.to_string(),
            value,
        })
    }
}
