//! The `blockquiz validate` command.

use std::path::PathBuf;

use anyhow::Result;
use blockquiz_core::config::load_config_from;
use blockquiz_core::parser::{load_quiz_directory, parse_quiz, validate_quiz};
use blockquiz_core::tree::QuizTree;

pub fn execute(quiz_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let quizzes = if quiz_path.is_dir() {
        load_quiz_directory(&quiz_path)?
    } else {
        vec![parse_quiz(&quiz_path)?]
    };

    let mut total_warnings = 0;
    let mut invalid = 0;

    tracing::debug!(count = quizzes.len(), "validating quizzes");
    for rows in &quizzes {
        let tree = match QuizTree::build_with(rows, &config) {
            Ok(tree) => tree,
            Err(violation) => {
                println!("Quiz: {} (id {})", rows.quiz.name, rows.quiz.id);
                println!("  ERROR: {violation}");
                invalid += 1;
                continue;
            }
        };

        println!(
            "Quiz: {} ({} blocks, {} questions, max grade {})",
            tree.quiz().name,
            tree.blocks().count(),
            tree.question_count(),
            tree.total_max_grade()
        );

        let warnings = validate_quiz(&tree);
        for w in &warnings {
            let prefix = w
                .block
                .map(|id| format!("  [block {id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} quiz(zes) failed structural validation");
    }

    if total_warnings == 0 {
        println!("All quizzes valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
