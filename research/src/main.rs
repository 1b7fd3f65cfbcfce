mod cli;
mod config;
mod error;
mod logging;
mod planner;
mod report;
mod research;
mod search;
mod storage;
#[cfg(test)]
mod testing;
mod ui;

use clap::Parser;
use colored::Colorize;
use error::Result;
use research::{Approval, Orchestrator, Outcome};
use std::path::PathBuf;
use std::process::ExitCode;

async fn run(cli: cli::Cli, env_file: Option<PathBuf>) -> Result<()> {
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }
    let settings = config::Settings::load(&cli)?;
    tracing::debug!(model = %settings.model, search_model = %settings.search_model, "settings loaded");

    ui::banner();
    let query = match cli.query.as_deref().map(str::trim) {
        Some(query) if !query.is_empty() => query.to_string(),
        _ => tokio::task::spawn_blocking(ui::prompt_query)
            .await
            .map_err(agent::Error::from)??,
    };

    let orchestrator = Orchestrator::new(&settings)
        .approval(if cli.yes {
            Approval::Auto
        } else {
            Approval::Interactive
        })
        .plan_only(cli.plan_only);

    match orchestrator.run(&query).await? {
        Outcome::Declined { run_dir } => ui::display_declined(&run_dir),
        Outcome::PlanOnly { run_dir } => {
            println!("{} {}", "Plan created in".cyan(), run_dir.display())
        }
        Outcome::Completed { run_dir, report } => {
            println!("\n{} {}", "Research report saved to:".bold().cyan(), report.display());
            println!("{} {}", "All artifacts saved in:".cyan(), run_dir.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_file = match config::load_env_file() {
        Ok(path) => path,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            return ExitCode::FAILURE;
        }
    };
    let cli = cli::Cli::parse();

    if let Err(err) = logging::init_tracing(cli.verbose) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    match run(cli, env_file).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "research run failed");
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
