//! Attempt report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::Block;
use crate::error::QuizResult;
use crate::model::{AttemptId, BlockId, ElementId, FeedbackId, QuestionId, QuizId};
use crate::traits::AttemptContext;
use crate::tree::QuizTree;

/// The evaluated state of one attempt on one quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub quiz: QuizSummary,
    pub attempt: AttemptId,
    /// Every block in display order, locked ones included.
    pub blocks: Vec<BlockOutcome>,
    /// Questions shown to the learner, in display order.
    pub visible_questions: Vec<VisibleQuestion>,
    pub achieved_grade: f64,
    pub max_grade: f64,
    /// Applicable feedback, global first, then per domain.
    pub feedback: Vec<FeedbackOutcome>,
    /// Question elements whose feedback is replaced by a feedback block.
    pub overrides: Vec<FeedbackOverride>,
}

/// Summary of a quiz (without its structure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub name: String,
    pub block_count: usize,
    pub question_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockOutcome {
    pub id: BlockId,
    pub name: String,
    pub depth: usize,
    /// The block's own condition holds.
    pub unlocked: bool,
    /// The block and all its ancestors are unlocked.
    pub visible: bool,
    pub achieved_grade: f64,
    pub max_grade: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibleQuestion {
    pub element: ElementId,
    pub question: QuestionId,
    pub block: BlockId,
    pub max_grade: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub id: FeedbackId,
    pub name: String,
    pub domain: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackOverride {
    pub element: ElementId,
    pub feedback: FeedbackId,
    pub domain: Option<String>,
}

impl AttemptReport {
    /// Evaluate an attempt against a quiz tree.
    pub fn compute(tree: &QuizTree, ctx: &AttemptContext<'_>) -> QuizResult<Self> {
        let mut blocks = Vec::new();
        collect_outcomes(tree, tree.main_block(), 0, true, ctx, &mut blocks)?;

        let visible_questions = tree
            .visible_questions(ctx)?
            .into_iter()
            .filter_map(|element| {
                let question = element.question()?;
                let block = tree.parent_of(element.id)?.id();
                Some(VisibleQuestion {
                    element: element.id,
                    question,
                    block,
                    max_grade: element.max_grade,
                })
            })
            .collect();

        let mut feedback = Vec::new();
        let mut overrides = Vec::new();
        for (domain, selection) in tree.select_all_feedback(ctx)? {
            feedback.extend(selection.blocks().iter().map(|f| FeedbackOutcome {
                id: f.id(),
                name: f.name().to_string(),
                domain: f.domain().map(String::from),
                text: f.text().to_string(),
            }));
            overrides.extend(selection.overrides().map(|(element, f)| FeedbackOverride {
                element,
                feedback: f.id(),
                domain: domain.map(String::from),
            }));
        }

        let report = AttemptReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            quiz: QuizSummary {
                id: tree.quiz().id,
                name: tree.quiz().name.clone(),
                block_count: tree.blocks().count(),
                question_count: tree.question_count(),
            },
            attempt: ctx.attempt(),
            blocks,
            visible_questions,
            achieved_grade: tree.total_achieved_grade(ctx)?,
            max_grade: tree.total_max_grade(),
            feedback,
            overrides,
        };

        tracing::debug!(
            quiz = %report.quiz.id,
            attempt = %report.attempt,
            achieved = report.achieved_grade,
            max = report.max_grade,
            "computed attempt report"
        );
        Ok(report)
    }

    /// Achieved grade as a fraction of the maximum, 0 when the quiz has none.
    pub fn percentage(&self) -> f64 {
        if self.max_grade > 0.0 {
            self.achieved_grade / self.max_grade
        } else {
            0.0
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: AttemptReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**{}** (attempt {}): {} / {} ({:.1}%)\n\n",
            self.quiz.name,
            self.attempt,
            self.achieved_grade,
            self.max_grade,
            self.percentage() * 100.0
        ));

        md.push_str("| Block | Depth | Status | Grade |\n");
        md.push_str("|-------|-------|--------|-------|\n");
        for b in &self.blocks {
            let status = match (b.visible, b.unlocked) {
                (true, _) => "open",
                (false, true) => "hidden",
                (false, false) => "locked",
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} / {} |\n",
                b.name, b.depth, status, b.achieved_grade, b.max_grade
            ));
        }

        if !self.feedback.is_empty() {
            md.push_str("\n### Feedback\n\n");
            for f in &self.feedback {
                match &f.domain {
                    Some(domain) => md.push_str(&format!("- **{}** [{}]: {}\n", f.name, domain, f.text)),
                    None => md.push_str(&format!("- **{}**: {}\n", f.name, f.text)),
                }
            }
        }

        md
    }
}

fn collect_outcomes(
    tree: &QuizTree,
    block: &Block,
    depth: usize,
    reachable: bool,
    ctx: &AttemptContext<'_>,
    out: &mut Vec<BlockOutcome>,
) -> QuizResult<()> {
    let unlocked = block.is_unlocked(ctx)?;
    let visible = reachable && unlocked;
    out.push(BlockOutcome {
        id: block.id(),
        name: block.name().to_string(),
        depth,
        unlocked,
        visible,
        achieved_grade: if visible {
            block.achieved_grade(tree, ctx)?
        } else {
            0.0
        },
        max_grade: block.max_grade(),
    });

    for child in block.elements().iter().filter_map(|e| e.child_block()) {
        if let Some(child) = tree.block(child) {
            collect_outcomes(tree, child, depth + 1, visible, ctx, out)?;
        }
    }
    Ok(())
}
