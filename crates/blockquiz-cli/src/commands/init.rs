//! The `blockquiz init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_once(Path::new("blockquiz.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("quizzes")?;
    write_once(Path::new("quizzes/example.toml"), EXAMPLE_QUIZ)?;

    std::fs::create_dir_all("attempts")?;
    write_once(Path::new("attempts/example.toml"), EXAMPLE_ATTEMPT)?;

    println!("\nNext steps:");
    println!("  1. Run: blockquiz validate --quiz quizzes/example.toml");
    println!("  2. Run: blockquiz outline --quiz quizzes/example.toml");
    println!(
        "  3. Run: blockquiz simulate --quiz quizzes/example.toml --attempt attempts/example.toml"
    );

    Ok(())
}

fn write_once(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# blockquiz configuration

# Tolerance used when comparing achieved grades against thresholds
grade_epsilon = 0.000001

# Deepest allowed block nesting below the main block
max_depth = 32
"#;

const EXAMPLE_QUIZ: &str = r#"[quiz]
id = 1
name = "Example Quiz"
description = "One question, and a review block for learners who miss it"

[[blocks]]
id = 1
name = "Main"

[[blocks]]
id = 2
name = "Review"
condition = 1

[[elements]]
id = 1
block = 1
max_grade = 10.0
target = { question = 1 }

[[elements]]
id = 2
block = 1
target = { block = 2 }

[[elements]]
id = 3
block = 2
max_grade = 5.0
target = { question = 2 }

[[conditions]]
id = 1

[[parts]]
id = 1
condition = 1
operator = "<"
grade = 5.0
targets = [1]

[[feedback]]
id = 1
name = "Review done"
text = "Good, the review block covered what was missed."
uses = [3]
"#;

const EXAMPLE_ATTEMPT: &str = r#"attempt = 1
displayed = [1]

[[grades]]
element = 1
grade = 4.0
"#;
