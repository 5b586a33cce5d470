//! The `blockquiz outline` command.

use std::path::PathBuf;

use anyhow::Result;
use blockquiz_core::block::Block;
use blockquiz_core::config::load_config_from;
use blockquiz_core::model::ElementTarget;
use blockquiz_core::parser::parse_quiz;
use blockquiz_core::tree::QuizTree;

pub fn execute(quiz_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let rows = parse_quiz(&quiz_path)?;
    let tree = QuizTree::build_with(&rows, &config)?;

    println!("{} (max grade {})", tree.quiz().name, tree.total_max_grade());
    print_block(&tree, tree.main_block(), 1);

    if !tree.feedback().is_empty() {
        println!("\nFeedback:");
        for f in tree.feedback() {
            let scope = f.domain().unwrap_or("global");
            let when = f
                .condition()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "always".to_string());
            println!("  #{} {} [{scope}] when {when}", f.id(), f.name());
        }
    }

    Ok(())
}

fn print_block(tree: &QuizTree, block: &Block, depth: usize) {
    let indent = "  ".repeat(depth);
    for element in block.elements() {
        match element.target {
            ElementTarget::Question(question) => {
                println!(
                    "{indent}{}. question {question} (element #{}, max {})",
                    element.slot, element.id, element.max_grade
                );
            }
            ElementTarget::Block(child) => {
                let Some(child) = tree.block(child) else {
                    continue;
                };
                let gate = child
                    .condition()
                    .map(|c| format!(" if {c}"))
                    .unwrap_or_default();
                println!(
                    "{indent}{}. block '{}' (element #{}, max {}){gate}",
                    element.slot,
                    child.name(),
                    element.id,
                    element.max_grade
                );
                print_block(tree, child, depth + 1);
            }
        }
    }
}
