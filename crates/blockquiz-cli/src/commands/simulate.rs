//! The `blockquiz simulate` command.

use std::path::PathBuf;

use anyhow::Result;
use blockquiz_core::config::load_config_from;
use blockquiz_core::parser::{parse_attempt, parse_quiz};
use blockquiz_core::report::AttemptReport;
use blockquiz_core::traits::AttemptContext;
use blockquiz_core::tree::QuizTree;

pub fn execute(
    quiz_path: PathBuf,
    attempt_path: PathBuf,
    domain: Option<String>,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let rows = parse_quiz(&quiz_path)?;
    let tree = QuizTree::build_with(&rows, &config)?;
    let attempt = parse_attempt(&attempt_path)?;
    tracing::debug!(quiz = %tree.quiz().id, attempt = %attempt.attempt, "evaluating attempt");

    let ctx = AttemptContext::from_store(attempt.attempt, &attempt.store)
        .with_epsilon(config.grade_epsilon);
    let mut report = AttemptReport::compute(&tree, &ctx)?;

    // Keep global feedback plus the requested domain's
    if let Some(domain) = &domain {
        report
            .feedback
            .retain(|f| f.domain.is_none() || f.domain.as_ref() == Some(domain));
        report
            .overrides
            .retain(|o| o.domain.is_none() || o.domain.as_ref() == Some(domain));
    }

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "markdown" => println!("{}", report.to_markdown()),
        "text" => print_text(&report),
        other => anyhow::bail!("unknown format: {other} (expected text, json or markdown)"),
    }

    Ok(())
}

fn print_text(report: &AttemptReport) {
    use comfy_table::{Cell, Table};

    println!("Quiz: {} / attempt {}", report.quiz.name, report.attempt);

    let mut table = Table::new();
    table.set_header(vec!["Block", "Depth", "Status", "Grade", "Max"]);
    for b in &report.blocks {
        let status = match (b.visible, b.unlocked) {
            (true, _) => "open",
            (false, true) => "hidden",
            (false, false) => "locked",
        };
        table.add_row(vec![
            Cell::new(format!("{}{}", "  ".repeat(b.depth), b.name)),
            Cell::new(b.depth),
            Cell::new(status),
            Cell::new(b.achieved_grade),
            Cell::new(b.max_grade),
        ]);
    }
    println!("{table}");

    let questions: Vec<String> = report
        .visible_questions
        .iter()
        .map(|q| q.question.to_string())
        .collect();
    println!("Visible questions: {}", questions.join(", "));
    println!(
        "Total: {} / {} ({:.1}%)",
        report.achieved_grade,
        report.max_grade,
        report.percentage() * 100.0
    );

    if !report.feedback.is_empty() {
        println!("\nFeedback:");
        for f in &report.feedback {
            match &f.domain {
                Some(domain) => println!("  {} [{domain}]: {}", f.name, f.text),
                None => println!("  {}: {}", f.name, f.text),
            }
        }
    }
    for o in &report.overrides {
        println!("  element {} uses feedback #{}", o.element, o.feedback);
    }
}
