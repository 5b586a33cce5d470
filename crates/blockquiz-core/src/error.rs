//! Engine error types.
//!
//! Structural problems are reported with the ids involved so the editing UI
//! can tell the author which invariant an edit would break. Failures of the
//! host's storage are carried through untouched.

use thiserror::Error;

use crate::model::{BlockId, ConditionId, ElementId, FeedbackId, PartId};

/// A broken tree invariant, detected while building or editing a quiz.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureViolation {
    #[error("quiz has no main block")]
    MissingMainBlock,

    #[error("quiz has more than one main block: {0} and {1}")]
    MultipleMainBlocks(BlockId, BlockId),

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u64 },

    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    #[error("unknown feedback {0}")]
    UnknownFeedback(FeedbackId),

    #[error("element {element} points at unknown block {block}")]
    DanglingBlock { element: ElementId, block: BlockId },

    #[error("element {element} belongs to unknown block {block}")]
    DanglingParent { element: ElementId, block: BlockId },

    #[error("{owner} references unknown condition {condition}")]
    DanglingCondition {
        owner: String,
        condition: ConditionId,
    },

    #[error("condition part {part} belongs to unknown condition {condition}")]
    DanglingPart { part: PartId, condition: ConditionId },

    #[error("condition {0} is not attached to any block or feedback")]
    OrphanCondition(ConditionId),

    #[error("condition {0} is attached to more than one owner")]
    SharedCondition(ConditionId),

    #[error("block {block} is referenced by elements {first} and {second}")]
    MultipleParents {
        block: BlockId,
        first: ElementId,
        second: ElementId,
    },

    #[error("block {0} is part of a cycle")]
    Cycle(BlockId),

    #[error("block {0} has no parent and is not the main block")]
    Detached(BlockId),

    #[error("main block {0} cannot be nested inside another block")]
    NestedMainBlock(BlockId),

    #[error("main block {0} cannot be gated by a condition")]
    GatedMainBlock(BlockId),

    #[error("block {0} has no elements")]
    EmptyBlock(BlockId),

    #[error("cannot remove element {element}: it is the last element of gated block {block}")]
    LastElement { block: BlockId, element: ElementId },

    #[error("condition part {0} has no target elements")]
    EmptyPartTargets(PartId),

    #[error("display check {0} must target exactly one element")]
    AmbiguousDisplayTarget(PartId),

    #[error("condition part {part} targets unknown element {element}")]
    DanglingTarget { part: PartId, element: ElementId },

    #[error("condition part {part} targets element {element}, which is not a question")]
    NonQuestionTarget { part: PartId, element: ElementId },

    #[error("condition of block {block} targets element {element} inside its own subtree")]
    SelfReferentialCondition { block: BlockId, element: ElementId },

    #[error("feedback {feedback} uses unknown element {element}")]
    DanglingFeedbackUse {
        feedback: FeedbackId,
        element: ElementId,
    },

    #[error("feedback {feedback} uses element {element}, which is not a question")]
    NonQuestionFeedbackUse {
        feedback: FeedbackId,
        element: ElementId,
    },

    #[error("block {block} is nested {depth} levels deep, the limit is {limit}")]
    DepthExceeded {
        block: BlockId,
        depth: usize,
        limit: usize,
    },

    #[error("slot {slot} is out of range for block {block} (1..={max})")]
    SlotOutOfRange {
        block: BlockId,
        slot: usize,
        max: usize,
    },

    #[error("cannot move element {0} into its own subtree")]
    MoveIntoOwnSubtree(ElementId),

    #[error("{what} has invalid grade {value}")]
    InvalidGrade { what: String, value: f64 },
}

/// Errors surfaced by evaluation entry points.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The tree is inconsistent. Construction should have rejected it, so
    /// hitting this during evaluation indicates a bug.
    #[error("structural invariant violated: {0}")]
    Structure(#[from] StructureViolation),

    /// A host collaborator (loader, grade store, display log) failed.
    #[error("host data error: {0:#}")]
    Host(anyhow::Error),
}

impl QuizError {
    /// Returns the violated invariant, if this is a structural error.
    pub fn violation(&self) -> Option<&StructureViolation> {
        match self {
            QuizError::Structure(v) => Some(v),
            QuizError::Host(_) => None,
        }
    }

    /// Returns `true` if the host's storage failed.
    pub fn is_host_error(&self) -> bool {
        matches!(self, QuizError::Host(_))
    }
}

pub type QuizResult<T> = Result<T, QuizError>;
