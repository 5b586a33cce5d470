//! The block tree of one quiz.
//!
//! A [`QuizTree`] owns every block, element, condition and feedback block of
//! a quiz. It is built from persisted rows, validated once at construction,
//! and then answers attempt-time questions: which blocks are unlocked, which
//! elements are visible, what grade was achieved, which feedback applies.

use std::collections::{BTreeMap, BTreeSet};

use crate::block::{Block, BlockElement};
use crate::condition::{Condition, ConditionPart, PartKind, PartTarget};
use crate::config::EngineConfig;
use crate::error::{QuizError, QuizResult, StructureViolation};
use crate::feedback::{select_feedback, FeedbackBlock, FeedbackSelection};
use crate::model::{BlockId, ConditionId, ElementId, FeedbackId, QuizId};
use crate::rows::{
    BlockRow, ConditionRow, ElementRow, FeedbackRow, PartOperator, PartRow, QuizHeader, QuizRows,
};
use crate::traits::{AttemptContext, QuizSource};

/// The owned block tree of a quiz, rooted at its main block.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizTree {
    pub(crate) quiz: QuizHeader,
    pub(crate) main: BlockId,
    pub(crate) blocks: BTreeMap<BlockId, Block>,
    /// Sorted by id.
    pub(crate) feedback: Vec<FeedbackBlock>,
    pub(crate) max_depth: usize,
    pub(crate) grade_epsilon: f64,
}

impl QuizTree {
    /// Build a tree from persisted rows with the default configuration.
    pub fn build_from(rows: &QuizRows) -> Result<Self, StructureViolation> {
        Self::build_with(rows, &EngineConfig::default())
    }

    /// Build a tree from persisted rows.
    ///
    /// Every structural invariant is checked here, so traversal never meets
    /// a cycle or a dangling reference.
    pub fn build_with(rows: &QuizRows, config: &EngineConfig) -> Result<Self, StructureViolation> {
        check_unique("block", rows.blocks.iter().map(|r| r.id.0))?;
        check_unique("element", rows.elements.iter().map(|r| r.id.0))?;
        check_unique("condition", rows.conditions.iter().map(|r| r.id.0))?;
        check_unique("condition part", rows.parts.iter().map(|r| r.id.0))?;
        check_unique("feedback", rows.feedback.iter().map(|r| r.id.0))?;

        let mut conditions: BTreeMap<ConditionId, Condition> = rows
            .conditions
            .iter()
            .map(|row| {
                (
                    row.id,
                    Condition {
                        id: row.id,
                        use_and: row.use_and,
                        parts: Vec::new(),
                    },
                )
            })
            .collect();

        let mut part_rows: Vec<&PartRow> = rows.parts.iter().collect();
        part_rows.sort_by_key(|row| row.id);
        for row in part_rows {
            let condition =
                conditions
                    .get_mut(&row.condition)
                    .ok_or(StructureViolation::DanglingPart {
                        part: row.id,
                        condition: row.condition,
                    })?;
            condition.parts.push(part_from_row(row)?);
        }

        let known: BTreeSet<ConditionId> = conditions.keys().copied().collect();
        let mut claim = |owner: String, id: ConditionId| match conditions.remove(&id) {
            Some(condition) => Ok(condition),
            None if known.contains(&id) => Err(StructureViolation::SharedCondition(id)),
            None => Err(StructureViolation::DanglingCondition {
                owner,
                condition: id,
            }),
        };

        let mut blocks = BTreeMap::new();
        for row in &rows.blocks {
            let condition = row
                .condition
                .map(|id| claim(format!("block {}", row.id), id))
                .transpose()?;
            blocks.insert(row.id, Block::new(row.id, row.name.clone(), condition));
        }

        let mut element_rows: Vec<&ElementRow> = rows.elements.iter().collect();
        element_rows.sort_by_key(|row| (row.block, row.slot, row.id));
        for row in element_rows {
            let block = blocks
                .get_mut(&row.block)
                .ok_or(StructureViolation::DanglingParent {
                    element: row.id,
                    block: row.block,
                })?;
            block.elements.push(BlockElement {
                id: row.id,
                target: row.target,
                max_grade: row.max_grade,
                slot: row.slot,
            });
        }

        let mut feedback = Vec::with_capacity(rows.feedback.len());
        for row in &rows.feedback {
            let condition = row
                .condition
                .map(|id| claim(format!("feedback {}", row.id), id))
                .transpose()?;
            feedback.push(FeedbackBlock {
                id: row.id,
                name: row.name.clone(),
                text: row.text.clone(),
                domain: row.domain.clone(),
                condition,
                uses: row.uses.clone(),
            });
        }
        feedback.sort_by_key(|f| f.id);

        if let Some(orphan) = conditions.keys().next() {
            return Err(StructureViolation::OrphanCondition(*orphan));
        }

        for block in blocks.values_mut() {
            block.renumber();
        }
        link_parents(&mut blocks)?;

        let roots: Vec<BlockId> = blocks
            .values()
            .filter(|b| b.parent.is_none())
            .map(|b| b.id)
            .collect();
        let main = match roots.as_slice() {
            [] => return Err(StructureViolation::MissingMainBlock),
            [main] => *main,
            [first, second, ..] => {
                return Err(StructureViolation::MultipleMainBlocks(*first, *second))
            }
        };

        let tree = Self {
            quiz: rows.quiz.clone(),
            main,
            blocks,
            feedback,
            max_depth: config.max_depth,
            grade_epsilon: config.grade_epsilon,
        };
        tree.validate()?;

        tracing::debug!(
            quiz = %tree.quiz.id,
            blocks = tree.blocks.len(),
            feedback = tree.feedback.len(),
            "built quiz tree"
        );
        Ok(tree)
    }

    /// Load and build a quiz through the host's bulk loader.
    pub fn load(
        source: &dyn QuizSource,
        quiz: QuizId,
        config: &EngineConfig,
    ) -> QuizResult<Self> {
        let rows = source.load_rows(quiz).map_err(QuizError::Host)?;
        Ok(Self::build_with(&rows, config)?)
    }

    /// Flatten the tree back into persisted rows.
    pub fn dump(&self) -> QuizRows {
        let mut rows = QuizRows {
            quiz: self.quiz.clone(),
            blocks: Vec::new(),
            elements: Vec::new(),
            conditions: Vec::new(),
            parts: Vec::new(),
            feedback: Vec::new(),
        };

        for block in self.blocks.values() {
            rows.blocks.push(BlockRow {
                id: block.id,
                name: block.name.clone(),
                condition: block.condition.as_ref().map(|c| c.id),
            });
            if let Some(condition) = &block.condition {
                push_condition(&mut rows, condition);
            }
            for element in &block.elements {
                rows.elements.push(ElementRow {
                    id: element.id,
                    block: block.id,
                    slot: element.slot,
                    max_grade: element.max_grade,
                    target: element.target,
                });
            }
        }

        for feedback in &self.feedback {
            rows.feedback.push(FeedbackRow {
                id: feedback.id,
                name: feedback.name.clone(),
                text: feedback.text.clone(),
                domain: feedback.domain.clone(),
                condition: feedback.condition.as_ref().map(|c| c.id),
                uses: feedback.uses.clone(),
            });
            if let Some(condition) = &feedback.condition {
                push_condition(&mut rows, condition);
            }
        }

        rows
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn quiz(&self) -> &QuizHeader {
        &self.quiz
    }

    pub fn main_id(&self) -> BlockId {
        self.main
    }

    pub fn main_block(&self) -> &Block {
        // Present: construction and every edit validate the main block.
        &self.blocks[&self.main]
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub(crate) fn require_block(&self, id: BlockId) -> Result<&Block, StructureViolation> {
        self.blocks
            .get(&id)
            .ok_or(StructureViolation::UnknownBlock(id))
    }

    /// All blocks in id order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn element(&self, id: ElementId) -> Option<&BlockElement> {
        self.blocks.values().find_map(|b| b.element(id))
    }

    /// The block that owns an element.
    pub fn parent_of(&self, id: ElementId) -> Option<&Block> {
        self.blocks.values().find(|b| b.element(id).is_some())
    }

    /// Feedback blocks in id order.
    pub fn feedback(&self) -> &[FeedbackBlock] {
        &self.feedback
    }

    pub fn feedback_block(&self, id: FeedbackId) -> Option<&FeedbackBlock> {
        self.feedback.iter().find(|f| f.id == id)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Tolerance used when comparing grade totals.
    pub fn grade_epsilon(&self) -> f64 {
        self.grade_epsilon
    }

    pub fn question_count(&self) -> usize {
        self.blocks
            .values()
            .flat_map(|b| b.elements.iter())
            .filter(|e| e.is_question())
            .count()
    }

    /// Distinct feedback domain tags, sorted.
    pub fn domains(&self) -> Vec<&str> {
        let domains: BTreeSet<&str> = self.feedback.iter().filter_map(|f| f.domain()).collect();
        domains.into_iter().collect()
    }

    /// Ids of every element in the subtree of a block, its own included.
    pub fn subtree_elements(&self, id: BlockId) -> BTreeSet<ElementId> {
        let mut found = BTreeSet::new();
        let mut stack = vec![id];
        let mut seen = BTreeSet::new();
        while let Some(block_id) = stack.pop() {
            if !seen.insert(block_id) {
                continue;
            }
            let Some(block) = self.blocks.get(&block_id) else {
                continue;
            };
            for element in &block.elements {
                found.insert(element.id);
                if let Some(child) = element.child_block() {
                    stack.push(child);
                }
            }
        }
        found
    }

    /// Ids of every block below the given one, excluding itself.
    pub fn descendant_blocks(&self, id: BlockId) -> BTreeSet<BlockId> {
        let mut found = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(block_id) = stack.pop() {
            let Some(block) = self.blocks.get(&block_id) else {
                continue;
            };
            for child in block.elements.iter().filter_map(|e| e.child_block()) {
                if found.insert(child) {
                    stack.push(child);
                }
            }
        }
        found
    }

    // -----------------------------------------------------------------------
    // Attempt evaluation
    // -----------------------------------------------------------------------

    /// Depth-first, pre-order walk over the unlocked blocks of an attempt.
    ///
    /// Locked blocks and everything below them are skipped. Every call starts
    /// a fresh walk.
    pub fn traverse<'t>(&'t self, ctx: &AttemptContext<'t>) -> Traversal<'t> {
        Traversal {
            tree: self,
            ctx: *ctx,
            stack: vec![(self.main, 0)],
            done: false,
        }
    }

    /// Visible question elements in display order, sub-blocks expanded in
    /// place.
    pub fn visible_questions<'t>(
        &'t self,
        ctx: &AttemptContext<'_>,
    ) -> QuizResult<Vec<&'t BlockElement>> {
        let mut out = Vec::new();
        self.collect_questions(self.main_block(), ctx, 0, &mut out)?;
        Ok(out)
    }

    fn collect_questions<'t>(
        &'t self,
        block: &'t Block,
        ctx: &AttemptContext<'_>,
        depth: usize,
        out: &mut Vec<&'t BlockElement>,
    ) -> QuizResult<()> {
        if depth > self.max_depth {
            return Err(depth_error(block.id, depth, self.max_depth).into());
        }
        for element in &block.elements {
            match element.child_block() {
                None => out.push(element),
                Some(child_id) => {
                    let child = self.require_block(child_id)?;
                    if child.is_unlocked(ctx)? {
                        self.collect_questions(child, ctx, depth + 1, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Grade achieved over the whole quiz.
    pub fn total_achieved_grade(&self, ctx: &AttemptContext<'_>) -> QuizResult<f64> {
        self.main_block().achieved_grade(self, ctx)
    }

    /// Declared maximum grade of the quiz.
    pub fn total_max_grade(&self) -> f64 {
        self.main_block().max_grade()
    }

    /// Feedback that applies to an attempt, global or for one domain.
    pub fn select_feedback(
        &self,
        ctx: &AttemptContext<'_>,
        domain: Option<&str>,
    ) -> QuizResult<FeedbackSelection<'_>> {
        select_feedback(&self.feedback, ctx, domain)
    }

    /// Global feedback followed by each domain's feedback, domains sorted.
    pub fn select_all_feedback(
        &self,
        ctx: &AttemptContext<'_>,
    ) -> QuizResult<Vec<(Option<&str>, FeedbackSelection<'_>)>> {
        let mut scopes = vec![None];
        scopes.extend(self.domains().into_iter().map(Some));
        scopes
            .into_iter()
            .map(|domain| Ok((domain, self.select_feedback(ctx, domain)?)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// One unlocked block reached during traversal.
#[derive(Debug, Clone, Copy)]
pub struct TraversalStep<'t> {
    pub block: &'t Block,
    /// Nesting depth; the main block is 0.
    pub depth: usize,
    /// The block's visible elements in slot order.
    pub elements: &'t [BlockElement],
}

impl<'t> TraversalStep<'t> {
    /// The question elements of this step.
    pub fn questions(&self) -> impl Iterator<Item = &'t BlockElement> {
        let elements: &'t [BlockElement] = self.elements;
        elements.iter().filter(|e| e.is_question())
    }
}

/// Lazy iterator returned by [`QuizTree::traverse`].
///
/// Yields an error at most once and then stops.
pub struct Traversal<'t> {
    tree: &'t QuizTree,
    ctx: AttemptContext<'t>,
    stack: Vec<(BlockId, usize)>,
    done: bool,
}

impl<'t> Traversal<'t> {
    fn visit(&mut self, id: BlockId, depth: usize) -> QuizResult<Option<TraversalStep<'t>>> {
        let tree = self.tree;
        if depth > tree.max_depth {
            return Err(depth_error(id, depth, tree.max_depth).into());
        }
        let block = tree.require_block(id)?;
        if !block.is_unlocked(&self.ctx)? {
            return Ok(None);
        }
        for element in block.elements.iter().rev() {
            if let Some(child) = element.child_block() {
                self.stack.push((child, depth + 1));
            }
        }
        Ok(Some(TraversalStep {
            block,
            depth,
            elements: &block.elements,
        }))
    }
}

impl<'t> Iterator for Traversal<'t> {
    type Item = QuizResult<TraversalStep<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some((id, depth)) = self.stack.pop() {
            match self.visit(id, depth) {
                Ok(Some(step)) => return Some(Ok(step)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn check_unique(
    kind: &'static str,
    ids: impl Iterator<Item = u64>,
) -> Result<(), StructureViolation> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(StructureViolation::DuplicateId { kind, id });
        }
    }
    Ok(())
}

fn part_from_row(row: &PartRow) -> Result<ConditionPart, StructureViolation> {
    let kind = match row.operator.comparator() {
        Some(comparator) => PartKind::Grade {
            comparator,
            threshold: row.grade,
            target: PartTarget::from_ids(row.targets.clone()),
        },
        None => match row.targets.as_slice() {
            [] => return Err(StructureViolation::EmptyPartTargets(row.id)),
            [target] => PartKind::WasDisplayed { target: *target },
            _ => return Err(StructureViolation::AmbiguousDisplayTarget(row.id)),
        },
    };
    Ok(ConditionPart { id: row.id, kind })
}

fn push_condition(rows: &mut QuizRows, condition: &Condition) {
    rows.conditions.push(ConditionRow {
        id: condition.id,
        use_and: condition.use_and,
    });
    for part in &condition.parts {
        let (operator, grade) = match &part.kind {
            PartKind::Grade {
                comparator,
                threshold,
                ..
            } => (PartOperator::from(*comparator), *threshold),
            PartKind::WasDisplayed { .. } => (PartOperator::WasDisplayed, 0.0),
        };
        rows.parts.push(PartRow {
            id: part.id,
            condition: condition.id,
            operator,
            grade,
            targets: part.targets().to_vec(),
        });
    }
}

/// Recompute every block's parent link from the elements referencing it.
pub(crate) fn link_parents(
    blocks: &mut BTreeMap<BlockId, Block>,
) -> Result<(), StructureViolation> {
    let mut seen_elements = BTreeSet::new();
    let mut links = Vec::new();
    for block in blocks.values() {
        for element in &block.elements {
            if !seen_elements.insert(element.id) {
                return Err(StructureViolation::DuplicateId {
                    kind: "element",
                    id: element.id.0,
                });
            }
            if let Some(child) = element.child_block() {
                if !blocks.contains_key(&child) {
                    return Err(StructureViolation::DanglingBlock {
                        element: element.id,
                        block: child,
                    });
                }
                links.push((child, element.id));
            }
        }
    }

    for block in blocks.values_mut() {
        block.parent = None;
    }
    for (child, element) in links {
        if let Some(block) = blocks.get_mut(&child) {
            match block.parent {
                Some(first) => {
                    return Err(StructureViolation::MultipleParents {
                        block: child,
                        first,
                        second: element,
                    })
                }
                None => block.parent = Some(element),
            }
        }
    }
    Ok(())
}

pub(crate) fn depth_error(block: BlockId, depth: usize, limit: usize) -> StructureViolation {
    StructureViolation::DepthExceeded {
        block,
        depth,
        limit,
    }
}
