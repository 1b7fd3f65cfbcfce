use crate::planner::ResearchPlan;
use colored::Colorize;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

pub fn banner() {
    let rule = "─".repeat(60);
    println!("{}", rule.blue());
    println!("{}", "Deep Research Agent".bold().blue());
    println!("Let me help you conduct thorough research on any topic.");
    println!("{}", rule.blue());
}

/// Asks for the research question until something non-blank is entered.
pub fn prompt_query() -> std::io::Result<String> {
    let query: String = Input::new()
        .with_prompt("What would you like to research?".green().bold().to_string())
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("please enter a research question")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(query.trim().to_string())
}

pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn progress(len: usize, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Shortens `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

const INSTRUCTION_WIDTH: usize = 60;
const OUTCOME_WIDTH: usize = 40;

/// Renders the plan steps as a table with aligned Step, Instruction and Expected Outcome columns.
pub fn plan_table(plan: &ResearchPlan) -> String {
    let rows: Vec<(String, String, String)> = plan
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            (
                (i + 1).to_string(),
                truncate(&step.instruction, INSTRUCTION_WIDTH),
                truncate(&step.expected_outcome, OUTCOME_WIDTH),
            )
        })
        .collect();

    let width = |header: &str, column: fn(&(String, String, String)) -> &String| {
        rows.iter()
            .map(|row| column(row).chars().count())
            .chain([header.chars().count()])
            .max()
            .unwrap_or_default()
    };
    let widths = [
        width("Step", |row| &row.0),
        width("Instruction", |row| &row.1),
        width("Expected Outcome", |row| &row.2),
    ];

    let line = |cells: [&str; 3]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };

    let mut table = line(["Step", "Instruction", "Expected Outcome"]);
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    table.push_str(&format!("|-{}-|\n", rule.join("-|-")));
    for (step, instruction, outcome) in &rows {
        table.push_str(&line([step.as_str(), instruction.as_str(), outcome.as_str()]));
    }
    table
}

pub fn display_plan(plan: &ResearchPlan, plan_path: &Path) {
    println!();
    println!("{}", "Research Plan".bold().blue().underline());
    println!("{}\n{}\n", "Research Query:".bold().blue(), plan.query);
    println!("{}\n{}\n", "Reasoning:".bold().green(), plan.reasoning);
    println!("{} {}\n", "Run ID:".bold().yellow(), plan.run_id);

    println!("{}", "Research Steps".bold().magenta());
    print!("{}", plan_table(plan));

    println!("\n{} {}", "Plan saved to:".bold().cyan(), plan_path.display());
}

pub fn confirm_plan() -> std::io::Result<bool> {
    Confirm::new()
        .with_prompt("Approve the plan and start researching?".bold().blue().to_string())
        .default(true)
        .interact()
}

pub fn display_report(report: &str) {
    println!("\n{}\n", "Research Report".bold().blue().underline());
    println!("{}", report);
}

pub fn display_declined(run_dir: &Path) {
    println!(
        "{} the plan is kept in {}",
        "Research cancelled,".yellow(),
        run_dir.display()
    );
}
