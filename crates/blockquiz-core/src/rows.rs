//! Flat persisted rows for a quiz.
//!
//! This is the relational shape the host stores and the bulk loader returns.
//! [`crate::tree::QuizTree::build_from`] turns it into an owned tree and
//! [`crate::tree::QuizTree::dump`] turns a tree back into rows.

use serde::{Deserialize, Serialize};

use crate::model::{
    BlockId, Comparator, ConditionId, ElementId, ElementTarget, FeedbackId, PartId, QuizId,
};

/// All rows belonging to one quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRows {
    pub quiz: QuizHeader,
    #[serde(default)]
    pub blocks: Vec<BlockRow>,
    #[serde(default)]
    pub elements: Vec<ElementRow>,
    #[serde(default)]
    pub conditions: Vec<ConditionRow>,
    #[serde(default)]
    pub parts: Vec<PartRow>,
    #[serde(default)]
    pub feedback: Vec<FeedbackRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizHeader {
    pub id: QuizId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRow {
    pub id: BlockId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRow {
    pub id: ElementId,
    pub block: BlockId,
    pub slot: usize,
    pub max_grade: f64,
    pub target: ElementTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRow {
    pub id: ConditionId,
    #[serde(default = "default_true")]
    pub use_and: bool,
}

fn default_true() -> bool {
    true
}

/// Stored operator of a condition part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartOperator {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "was_displayed")]
    WasDisplayed,
}

impl PartOperator {
    /// The numeric comparator, or `None` for display checks.
    pub fn comparator(self) -> Option<Comparator> {
        match self {
            PartOperator::Less => Some(Comparator::Less),
            PartOperator::LessOrEqual => Some(Comparator::LessOrEqual),
            PartOperator::Greater => Some(Comparator::Greater),
            PartOperator::GreaterOrEqual => Some(Comparator::GreaterOrEqual),
            PartOperator::Equal => Some(Comparator::Equal),
            PartOperator::NotEqual => Some(Comparator::NotEqual),
            PartOperator::WasDisplayed => None,
        }
    }
}

impl From<Comparator> for PartOperator {
    fn from(comparator: Comparator) -> Self {
        match comparator {
            Comparator::Less => PartOperator::Less,
            Comparator::LessOrEqual => PartOperator::LessOrEqual,
            Comparator::Greater => PartOperator::Greater,
            Comparator::GreaterOrEqual => PartOperator::GreaterOrEqual,
            Comparator::Equal => PartOperator::Equal,
            Comparator::NotEqual => PartOperator::NotEqual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRow {
    pub id: PartId,
    pub condition: ConditionId,
    pub operator: PartOperator,
    /// Threshold for grade comparisons; ignored by display checks.
    #[serde(default)]
    pub grade: f64,
    pub targets: Vec<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRow {
    pub id: FeedbackId,
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionId>,
    #[serde(default)]
    pub uses: Vec<ElementId>,
}
