//! Row builders shared by unit tests.

use crate::model::{
    BlockId, Comparator, ConditionId, ElementId, ElementTarget, PartId, QuestionId, QuizId,
};
use crate::rows::{
    BlockRow, ConditionRow, ElementRow, FeedbackRow, PartOperator, PartRow, QuizHeader, QuizRows,
};

pub fn empty_rows() -> QuizRows {
    QuizRows {
        quiz: QuizHeader {
            id: QuizId(1),
            name: "Fractions".into(),
            description: String::new(),
        },
        blocks: vec![],
        elements: vec![],
        conditions: vec![],
        parts: vec![],
        feedback: vec![],
    }
}

pub fn block(id: u64, name: &str, condition: Option<u64>) -> BlockRow {
    BlockRow {
        id: BlockId(id),
        name: name.into(),
        condition: condition.map(ConditionId),
    }
}

pub fn question(id: u64, block: u64, slot: usize, max_grade: f64, question: u64) -> ElementRow {
    ElementRow {
        id: ElementId(id),
        block: BlockId(block),
        slot,
        max_grade,
        target: ElementTarget::Question(QuestionId(question)),
    }
}

pub fn link(id: u64, block: u64, slot: usize, max_grade: f64, child: u64) -> ElementRow {
    ElementRow {
        id: ElementId(id),
        block: BlockId(block),
        slot,
        max_grade,
        target: ElementTarget::Block(BlockId(child)),
    }
}

/// A single-part AND condition on one element's grade.
pub fn gate(
    rows: &mut QuizRows,
    condition: u64,
    part: u64,
    comparator: Comparator,
    threshold: f64,
    target: u64,
) {
    rows.conditions.push(ConditionRow {
        id: ConditionId(condition),
        use_and: true,
    });
    rows.parts.push(PartRow {
        id: PartId(part),
        condition: ConditionId(condition),
        operator: PartOperator::from(comparator),
        grade: threshold,
        targets: vec![ElementId(target)],
    });
}

pub fn feedback(id: u64, name: &str, domain: Option<&str>, uses: &[u64]) -> FeedbackRow {
    FeedbackRow {
        id: crate::model::FeedbackId(id),
        name: name.into(),
        text: format!("{name} text"),
        domain: domain.map(String::from),
        condition: None,
        uses: uses.iter().copied().map(ElementId).collect(),
    }
}

/// Root holds Q1 (element 1, max 10) then block B2 (element 2, max 5);
/// B2 is gated on Q1 >= 5 and holds Q2 (element 3, max 5).
pub fn gated_rows() -> QuizRows {
    let mut rows = empty_rows();
    rows.blocks = vec![block(1, "Root", None), block(2, "B2", Some(1))];
    rows.elements = vec![
        question(1, 1, 1, 10.0, 101),
        link(2, 1, 2, 5.0, 2),
        question(3, 2, 1, 5.0, 102),
    ];
    gate(&mut rows, 1, 1, Comparator::GreaterOrEqual, 5.0, 1);
    rows
}

/// [`gated_rows`] plus B3 inside B2 (element 4, max 2), gated on Q2 >= 1
/// and holding only Q3 (element 5, max 2).
pub fn nested_rows() -> QuizRows {
    let mut rows = gated_rows();
    rows.blocks.push(block(3, "B3", Some(2)));
    rows.elements.push(link(4, 2, 2, 2.0, 3));
    rows.elements.push(question(5, 3, 1, 2.0, 103));
    gate(&mut rows, 2, 2, Comparator::GreaterOrEqual, 1.0, 3);
    rows
}
