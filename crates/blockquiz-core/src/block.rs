//! Blocks and their slot-positioned elements.
//!
//! Blocks are owned by a [`QuizTree`]; their fields are read-only from the
//! outside and change only through the tree's edit operations, which keep
//! slots dense and every block under exactly one parent.

use crate::condition::Condition;
use crate::error::{QuizResult, StructureViolation};
use crate::model::{BlockId, ElementId, ElementTarget, QuestionId};
use crate::traits::AttemptContext;
use crate::tree::QuizTree;

/// A slot-positioned reference from a block to a question or a child block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockElement {
    pub id: ElementId,
    pub target: ElementTarget,
    pub max_grade: f64,
    /// 1-based position within the parent block.
    pub slot: usize,
}

impl BlockElement {
    pub fn question(&self) -> Option<QuestionId> {
        match self.target {
            ElementTarget::Question(id) => Some(id),
            ElementTarget::Block(_) => None,
        }
    }

    pub fn child_block(&self) -> Option<BlockId> {
        match self.target {
            ElementTarget::Question(_) => None,
            ElementTarget::Block(id) => Some(id),
        }
    }

    pub fn is_question(&self) -> bool {
        self.question().is_some()
    }
}

/// A named, ordered container of questions and sub-blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) name: String,
    pub(crate) elements: Vec<BlockElement>,
    pub(crate) condition: Option<Condition>,
    /// The element that references this block; `None` for the main block.
    pub(crate) parent: Option<ElementId>,
}

impl Block {
    pub(crate) fn new(id: BlockId, name: impl Into<String>, condition: Option<Condition>) -> Self {
        Self {
            id,
            name: name.into(),
            elements: Vec::new(),
            condition,
            parent: None,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Elements in slot order.
    pub fn elements(&self) -> &[BlockElement] {
        &self.elements
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn is_main(&self) -> bool {
        self.parent.is_none()
    }

    pub fn element(&self, id: ElementId) -> Option<&BlockElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Returns `true` if the attempt may see this block's elements.
    ///
    /// The main block is always unlocked; a block without a condition is
    /// ungated.
    pub fn is_unlocked(&self, ctx: &AttemptContext<'_>) -> QuizResult<bool> {
        if self.is_main() {
            return Ok(true);
        }
        let unlocked = match &self.condition {
            Some(condition) => condition.is_satisfied(ctx)?,
            None => true,
        };
        tracing::debug!(block = %self.id, attempt = %ctx.attempt(), unlocked, "evaluated block gate");
        Ok(unlocked)
    }

    /// Own elements in slot order if unlocked, otherwise nothing.
    ///
    /// Child blocks are not evaluated here.
    pub fn visible_elements(&self, ctx: &AttemptContext<'_>) -> QuizResult<&[BlockElement]> {
        if self.is_unlocked(ctx)? {
            Ok(&self.elements)
        } else {
            Ok(&[])
        }
    }

    /// Sum of the elements' declared max grades, independent of any attempt.
    pub fn max_grade(&self) -> f64 {
        self.elements.iter().map(|e| e.max_grade).sum()
    }

    /// Grade achieved in this block.
    ///
    /// Question elements contribute their recorded grade, child blocks their
    /// own achieved grade when unlocked and 0 when locked. Every contribution
    /// is clamped to `0..=max_grade` of its element.
    pub fn achieved_grade(&self, tree: &QuizTree, ctx: &AttemptContext<'_>) -> QuizResult<f64> {
        self.achieved_grade_at(tree, ctx, 0)
    }

    fn achieved_grade_at(
        &self,
        tree: &QuizTree,
        ctx: &AttemptContext<'_>,
        depth: usize,
    ) -> QuizResult<f64> {
        if depth > tree.max_depth() {
            return Err(StructureViolation::DepthExceeded {
                block: self.id,
                depth,
                limit: tree.max_depth(),
            }
            .into());
        }

        let mut total = 0.0;
        for element in &self.elements {
            let achieved = match element.target {
                ElementTarget::Question(_) => ctx.grade(element.id)?,
                ElementTarget::Block(child_id) => {
                    let child = tree.require_block(child_id)?;
                    if child.is_unlocked(ctx)? {
                        child.achieved_grade_at(tree, ctx, depth + 1)?
                    } else {
                        0.0
                    }
                }
            };
            total += achieved.clamp(0.0, element.max_grade);
        }
        Ok(total)
    }

    /// Renumber slots to a dense 1..=N sequence.
    pub(crate) fn renumber(&mut self) {
        for (index, element) in self.elements.iter_mut().enumerate() {
            element.slot = index + 1;
        }
    }

    pub(crate) fn position_of(&self, id: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }
}
