//! TOML quiz and attempt file parser.
//!
//! Loads quiz definitions into persisted rows, attempt files into an
//! in-memory grade store, and lints built trees for authoring mistakes that
//! are legal but almost certainly unintended.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{AttemptId, BlockId, ElementId, ElementTarget};
use crate::rows::{BlockRow, ConditionRow, ElementRow, FeedbackRow, PartRow, QuizHeader, QuizRows};
use crate::store::MemoryGradeStore;
use crate::tree::QuizTree;

/// Intermediate TOML structure for quiz files.
#[derive(Debug, Deserialize)]
struct TomlQuizFile {
    quiz: QuizHeader,
    #[serde(default)]
    blocks: Vec<BlockRow>,
    #[serde(default)]
    elements: Vec<TomlElement>,
    #[serde(default)]
    conditions: Vec<ConditionRow>,
    #[serde(default)]
    parts: Vec<PartRow>,
    #[serde(default)]
    feedback: Vec<FeedbackRow>,
}

/// Elements may omit their slot (file order is used) and their max grade
/// (1 for questions, the sub-block's total for blocks).
#[derive(Debug, Deserialize)]
struct TomlElement {
    id: ElementId,
    block: BlockId,
    #[serde(default)]
    slot: Option<usize>,
    #[serde(default)]
    max_grade: Option<f64>,
    target: ElementTarget,
}

const DEFAULT_QUESTION_GRADE: f64 = 1.0;

/// Parse a single TOML quiz file into rows.
pub fn parse_quiz(path: &Path) -> Result<QuizRows> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    parse_quiz_str(&content, path)
}

/// Parse a TOML string into rows (useful for testing).
pub fn parse_quiz_str(content: &str, source_path: &Path) -> Result<QuizRows> {
    let parsed: TomlQuizFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mut next_slot: HashMap<BlockId, usize> = HashMap::new();
    let mut slotted = Vec::with_capacity(parsed.elements.len());
    for element in parsed.elements {
        let counter = next_slot.entry(element.block).or_insert(0);
        *counter += 1;
        let slot = element.slot.unwrap_or(*counter);
        slotted.push((element, slot));
    }

    let explicit: HashMap<ElementId, f64> = slotted
        .iter()
        .filter_map(|(e, _)| e.max_grade.map(|g| (e.id, g)))
        .collect();
    let mut resolver = GradeResolver {
        elements: slotted
            .iter()
            .map(|(e, _)| (e.block, e.id, e.target))
            .collect(),
        explicit,
        block_totals: HashMap::new(),
    };

    let elements = slotted
        .iter()
        .map(|(e, slot)| {
            let max_grade = match (e.max_grade, e.target) {
                (Some(grade), _) => grade,
                (None, ElementTarget::Question(_)) => DEFAULT_QUESTION_GRADE,
                (None, ElementTarget::Block(child)) => resolver
                    .block_total(child, &mut BTreeSet::new())
                    .with_context(|| {
                        format!("cannot infer max_grade of element {}", e.id)
                    })?,
            };
            Ok(ElementRow {
                id: e.id,
                block: e.block,
                slot: *slot,
                max_grade,
                target: e.target,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuizRows {
        quiz: parsed.quiz,
        blocks: parsed.blocks,
        elements,
        conditions: parsed.conditions,
        parts: parsed.parts,
        feedback: parsed.feedback,
    })
}

/// Infers the max grade of block elements that leave it out.
struct GradeResolver {
    elements: Vec<(BlockId, ElementId, ElementTarget)>,
    explicit: HashMap<ElementId, f64>,
    block_totals: HashMap<BlockId, f64>,
}

impl GradeResolver {
    fn block_total(&mut self, block: BlockId, visiting: &mut BTreeSet<BlockId>) -> Result<f64> {
        if let Some(total) = self.block_totals.get(&block) {
            return Ok(*total);
        }
        anyhow::ensure!(visiting.insert(block), "block {block} contains itself");

        let children: Vec<(ElementId, ElementTarget)> = self
            .elements
            .iter()
            .filter(|(owner, _, _)| *owner == block)
            .map(|(_, id, target)| (*id, *target))
            .collect();
        let mut total = 0.0;
        for (id, target) in children {
            total += match (self.explicit.get(&id), target) {
                (Some(grade), _) => *grade,
                (None, ElementTarget::Question(_)) => DEFAULT_QUESTION_GRADE,
                (None, ElementTarget::Block(child)) => self.block_total(child, visiting)?,
            };
        }

        visiting.remove(&block);
        self.block_totals.insert(block, total);
        Ok(total)
    }
}

/// Recursively load all `.toml` quiz files from a directory.
pub fn load_quiz_directory(dir: &Path) -> Result<Vec<QuizRows>> {
    let mut quizzes = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            quizzes.extend(load_quiz_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_quiz(&path) {
                Ok(rows) => quizzes.push(rows),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(quizzes)
}

/// Serialize rows as a TOML quiz file.
pub fn write_quiz(rows: &QuizRows) -> Result<String> {
    toml::to_string_pretty(rows).context("failed to serialize quiz")
}

// ---------------------------------------------------------------------------
// Attempt files
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TomlAttempt {
    attempt: AttemptId,
    #[serde(default)]
    displayed: Vec<ElementId>,
    #[serde(default)]
    grades: Vec<TomlGrade>,
}

#[derive(Debug, Deserialize)]
struct TomlGrade {
    element: ElementId,
    grade: f64,
}

/// The recorded state of one attempt.
#[derive(Debug, Clone)]
pub struct AttemptData {
    pub attempt: AttemptId,
    pub store: MemoryGradeStore,
}

pub fn parse_attempt(path: &Path) -> Result<AttemptData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read attempt file: {}", path.display()))?;
    parse_attempt_str(&content, path)
}

pub fn parse_attempt_str(content: &str, source_path: &Path) -> Result<AttemptData> {
    let parsed: TomlAttempt = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let mut store = MemoryGradeStore::new();
    for grade in parsed.grades {
        anyhow::ensure!(
            grade.grade.is_finite(),
            "grade for element {} is not a number",
            grade.element
        );
        store.record_grade(parsed.attempt, grade.element, grade.grade);
    }
    for element in parsed.displayed {
        store.mark_displayed(parsed.attempt, element);
    }

    Ok(AttemptData {
        attempt: parsed.attempt,
        store,
    })
}

// ---------------------------------------------------------------------------
// Lints
// ---------------------------------------------------------------------------

/// A warning from quiz validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The block concerned (if applicable).
    pub block: Option<BlockId>,
    /// Warning message.
    pub message: String,
}

/// Lint a structurally valid quiz for likely authoring mistakes.
///
/// Grade totals are compared with the tree's configured epsilon.
pub fn validate_quiz(tree: &QuizTree) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let epsilon = tree.grade_epsilon();

    // Check block elements whose max grade disagrees with the sub-block
    for block in tree.blocks() {
        for element in block.elements() {
            if let Some(child) = element.child_block().and_then(|id| tree.block(id)) {
                if (child.max_grade() - element.max_grade).abs() > epsilon {
                    warnings.push(ValidationWarning {
                        block: Some(child.id()),
                        message: format!(
                            "element {} declares max grade {} but block '{}' totals {}",
                            element.id,
                            element.max_grade,
                            child.name(),
                            child.max_grade()
                        ),
                    });
                }
            } else if element.max_grade == 0.0 {
                warnings.push(ValidationWarning {
                    block: Some(block.id()),
                    message: format!("question element {} has max grade 0", element.id),
                });
            }
        }
    }

    // Check for duplicate block names
    let mut seen_names = BTreeSet::new();
    for block in tree.blocks() {
        if !seen_names.insert(block.name()) {
            warnings.push(ValidationWarning {
                block: Some(block.id()),
                message: format!("duplicate block name: {}", block.name()),
            });
        }
    }

    // Check for conditions that wait on questions shown after the block
    let layout = display_layout(tree);
    for block in tree.blocks() {
        let (Some(condition), Some(start)) = (block.condition(), layout.block_start.get(&block.id()))
        else {
            continue;
        };
        for target in condition.targets() {
            if layout.position.get(&target).is_some_and(|pos| pos >= start) {
                warnings.push(ValidationWarning {
                    block: Some(block.id()),
                    message: format!(
                        "condition of block '{}' depends on element {target}, which is displayed after the block",
                        block.name()
                    ),
                });
            }
        }
    }

    // Check for empty feedback text
    for feedback in tree.feedback() {
        if feedback.text().trim().is_empty() {
            warnings.push(ValidationWarning {
                block: None,
                message: format!("feedback '{}' has no text", feedback.name()),
            });
        }
    }

    warnings
}

/// Display positions of every question with all blocks unlocked.
struct DisplayLayout {
    position: BTreeMap<ElementId, usize>,
    block_start: BTreeMap<BlockId, usize>,
}

fn display_layout(tree: &QuizTree) -> DisplayLayout {
    fn walk(tree: &QuizTree, block: BlockId, layout: &mut DisplayLayout, depth: usize) {
        let Some(block) = tree.block(block) else {
            return;
        };
        if depth > tree.max_depth() {
            return;
        }
        layout.block_start.insert(block.id(), layout.position.len());
        for element in block.elements() {
            match element.child_block() {
                Some(child) => walk(tree, child, layout, depth + 1),
                None => {
                    let next = layout.position.len();
                    layout.position.insert(element.id, next);
                }
            }
        }
    }

    let mut layout = DisplayLayout {
        position: BTreeMap::new(),
        block_start: BTreeMap::new(),
    };
    walk(tree, tree.main_id(), &mut layout, 0);
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[quiz]
id = 1
name = "Fractions"
description = "Adaptive fractions practice"

[[blocks]]
id = 1
name = "Main"

[[blocks]]
id = 2
name = "Remedial"
condition = 1

[[elements]]
id = 1
block = 1
max_grade = 10.0
target = { question = 101 }

[[elements]]
id = 2
block = 1
target = { block = 2 }

[[elements]]
id = 3
block = 2
max_grade = 5.0
target = { question = 102 }

[[elements]]
id = 4
block = 2
target = { question = 103 }

[[conditions]]
id = 1
use_and = true

[[parts]]
id = 1
condition = 1
operator = "<"
grade = 5.0
targets = [1]

[[feedback]]
id = 1
name = "Well done"
text = "You mastered fractions."
"#;

    #[test]
    fn parse_valid_toml() {
        let rows = parse_quiz_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(rows.quiz.name, "Fractions");
        assert_eq!(rows.blocks.len(), 2);
        assert_eq!(rows.elements.len(), 4);
        assert_eq!(rows.parts[0].targets, vec![ElementId(1)]);
        assert_eq!(rows.feedback[0].name, "Well done");
    }

    #[test]
    fn infers_slots_and_max_grades() {
        let rows = parse_quiz_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        let by_id: HashMap<ElementId, &ElementRow> =
            rows.elements.iter().map(|e| (e.id, e)).collect();
        assert_eq!(by_id[&ElementId(2)].slot, 2);
        assert_eq!(by_id[&ElementId(4)].slot, 2);
        assert_eq!(by_id[&ElementId(4)].max_grade, DEFAULT_QUESTION_GRADE);
        assert_eq!(by_id[&ElementId(2)].max_grade, 6.0);
    }

    #[test]
    fn parsed_rows_build_a_tree() {
        let rows = parse_quiz_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        let tree = QuizTree::build_from(&rows).unwrap();
        assert_eq!(tree.total_max_grade(), 16.0);
        assert!(validate_quiz(&tree).is_empty());
    }

    #[test]
    fn write_then_parse_preserves_rows() {
        let rows = parse_quiz_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        let text = write_quiz(&rows).unwrap();
        let again = parse_quiz_str(&text, &PathBuf::from("written.toml")).unwrap();
        assert_eq!(rows, again);
    }

    #[test]
    fn self_containing_block_cannot_infer_grade() {
        let toml = r#"
[quiz]
id = 1
name = "Loop"

[[blocks]]
id = 1
name = "Main"

[[elements]]
id = 1
block = 1
target = { block = 1 }
"#;
        let err = parse_quiz_str(toml, &PathBuf::from("loop.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("contains itself"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        let result = parse_quiz_str(bad, &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn parse_attempt_file() {
        let toml = r#"
attempt = 42
displayed = [1, 3]

[[grades]]
element = 1
grade = 4.5
"#;
        let data = parse_attempt_str(toml, &PathBuf::from("attempt.toml")).unwrap();
        assert_eq!(data.attempt, AttemptId(42));
        assert_eq!(data.store.grade_count(), 1);

        use crate::traits::{DisplayLog, GradeStore};
        assert_eq!(
            data.store
                .achieved_grade(AttemptId(42), ElementId(1))
                .unwrap(),
            Some(4.5)
        );
        assert!(data.store.was_displayed(AttemptId(42), ElementId(3)).unwrap());
    }

    #[test]
    fn lint_condition_on_later_question() {
        let toml = r#"
[quiz]
id = 1
name = "Backwards"

[[blocks]]
id = 1
name = "Main"

[[blocks]]
id = 2
name = "Early"
condition = 1

[[elements]]
id = 1
block = 1
target = { block = 2 }

[[elements]]
id = 2
block = 2
target = { question = 1 }

[[elements]]
id = 3
block = 1
target = { question = 2 }

[[conditions]]
id = 1

[[parts]]
id = 1
condition = 1
operator = ">="
grade = 1.0
targets = [3]

[[feedback]]
id = 1
name = "Empty"
"#;
        let rows = parse_quiz_str(toml, &PathBuf::from("test.toml")).unwrap();
        let tree = QuizTree::build_from(&rows).unwrap();
        let warnings = validate_quiz(&tree);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("displayed after the block")));
        assert!(warnings.iter().any(|w| w.message.contains("has no text")));
    }

    #[test]
    fn lint_mismatched_block_grade() {
        let toml = VALID_TOML.replace(
            "id = 2\nblock = 1\ntarget = { block = 2 }",
            "id = 2\nblock = 1\nmax_grade = 9.0\ntarget = { block = 2 }",
        );
        let rows = parse_quiz_str(&toml, &PathBuf::from("test.toml")).unwrap();
        let tree = QuizTree::build_from(&rows).unwrap();
        let warnings = validate_quiz(&tree);
        assert!(warnings.iter().any(|w| w.message.contains("declares max grade 9")));
    }

    #[test]
    fn lint_mismatch_uses_configured_epsilon() {
        // Block 2 totals 6
        let toml = VALID_TOML.replace(
            "id = 2\nblock = 1\ntarget = { block = 2 }",
            "id = 2\nblock = 1\nmax_grade = 5.5\ntarget = { block = 2 }",
        );
        let rows = parse_quiz_str(&toml, &PathBuf::from("test.toml")).unwrap();
        let strict = QuizTree::build_from(&rows).unwrap();
        assert!(validate_quiz(&strict)
            .iter()
            .any(|w| w.message.contains("declares max grade 5.5")));

        let config = EngineConfig {
            grade_epsilon: 1.0,
            ..EngineConfig::default()
        };
        let lenient = QuizTree::build_with(&rows, &config).unwrap();
        assert_eq!(lenient.grade_epsilon(), 1.0);
        assert!(validate_quiz(&lenient).is_empty());
    }

    #[test]
    fn load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fractions.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let quizzes = load_quiz_directory(dir.path()).unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].quiz.name, "Fractions");
    }
}
