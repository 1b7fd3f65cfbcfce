use crate::config::Settings;
use crate::error::Result;
use crate::planner::{Planner, ResearchPlan};
use crate::report::Reporter;
use crate::search::Searcher;
use crate::storage::RunDir;
use crate::ui;
use agent::llm;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub enum Approval {
    /// Ask on the terminal before searching
    Interactive,
    Auto,
    /// Let a function decide, e.g. a fixed answer in tests
    With(fn(&ResearchPlan) -> bool),
}

#[derive(Debug)]
pub enum Outcome {
    PlanOnly { run_dir: PathBuf },
    Declined { run_dir: PathBuf },
    Completed { run_dir: PathBuf, report: PathBuf },
}

/// Drives one research run: plan, approval, web searches, report.
pub struct Orchestrator {
    planner: Planner,
    searcher: Searcher,
    reporter: Reporter,
    data_dir: PathBuf,
    approval: Approval,
    plan_only: bool,
}

impl Orchestrator {
    pub fn new(settings: &Settings) -> Self {
        let model: Arc<dyn llm::LLM + Send + Sync> = llm::OpenAI::with_api_key(
            settings.model.clone(),
            &settings.api_key,
            settings.api_base.as_deref(),
        );
        let search_model: Arc<dyn llm::LLM + Send + Sync> = llm::OpenAI::with_api_key(
            settings.search_model.clone(),
            &settings.api_key,
            settings.api_base.as_deref(),
        );

        Self::with_llms(model, search_model, settings)
    }

    pub fn with_llms(
        model: Arc<dyn llm::LLM + Send + Sync>,
        search_model: Arc<dyn llm::LLM + Send + Sync>,
        settings: &Settings,
    ) -> Self {
        Self {
            planner: Planner::new(model.clone()),
            searcher: Searcher::new(model.clone(), search_model, settings.web_search.clone())
                .concurrency(settings.concurrency),
            reporter: Reporter::new(model),
            data_dir: settings.data_dir.clone(),
            approval: Approval::Interactive,
            plan_only: false,
        }
    }

    pub fn approval(mut self, approval: Approval) -> Self {
        self.approval = approval;
        self
    }

    pub fn plan_only(mut self, plan_only: bool) -> Self {
        self.plan_only = plan_only;
        self
    }

    pub async fn run(&self, query: &str) -> Result<Outcome> {
        let run_dir = RunDir::create_today(&self.data_dir)?;
        info!(run_id = run_dir.run_id(), query, "starting research run");

        let spinner = ui::spinner("Creating research plan...");
        let plan = self.planner.create_plan(query, &run_dir).await;
        spinner.finish_and_clear();
        let plan = plan?;

        let plan_path = plan.save(&run_dir)?;
        ui::display_plan(&plan, &plan_path);

        if self.plan_only {
            return Ok(Outcome::PlanOnly {
                run_dir: run_dir.path().to_path_buf(),
            });
        }

        let approved = match self.approval {
            Approval::Auto => true,
            Approval::Interactive => tokio::task::spawn_blocking(ui::confirm_plan)
                .await
                .map_err(agent::Error::from)??,
            Approval::With(approve) => approve(&plan),
        };
        if !approved {
            info!(run_id = run_dir.run_id(), "plan declined");
            return Ok(Outcome::Declined {
                run_dir: run_dir.path().to_path_buf(),
            });
        }

        let bar = ui::progress(plan.steps.len(), "Researching...");
        let results = self
            .searcher
            .execute_plan(&plan, &run_dir, |result| {
                bar.set_message(format!(
                    "finished step {}: {}",
                    result.step_number,
                    ui::truncate(&result.step_instruction, 50)
                ));
                bar.inc(1);
            })
            .await;
        bar.finish_and_clear();
        let results = results?;

        let spinner = ui::spinner("Generating research report...");
        let report = self.reporter.generate_and_save(&plan, &results, &run_dir).await;
        spinner.finish_and_clear();
        let (report, report_path) = report?;

        ui::display_report(&report);

        Ok(Outcome::Completed {
            run_dir: run_dir.path().to_path_buf(),
            report: report_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::storage;
    use crate::testing::{FnLLM, last_user, text};
    use agent::llm::{CompletionResponse, Message};
    use agent::tools::ToolCall;
    use clap::Parser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(data_dir: &std::path::Path) -> Settings {
        let cli = Cli::parse_from([
            "deep-research",
            "--data-dir",
            data_dir.to_str().unwrap(),
            "--concurrency",
            "2",
        ]);
        Settings::from_parts(&cli, Some("sk-test".to_string()), None).unwrap()
    }

    /// Plays planner, query writer and report writer depending on the system prompt.
    fn model() -> Arc<FnLLM> {
        FnLLM::new(|request| {
            let system = match request.messages.first() {
                Some(Message::System(prompt)) => prompt.clone(),
                _ => String::new(),
            };
            if system.contains("research planner") {
                Ok(CompletionResponse {
                    tool_calls: vec![ToolCall {
                        id: "call1".to_string(),
                        name: "submit_plan".to_string(),
                        args: serde_json::json!({
                            "reasoning": "two angles",
                            "steps": [
                                { "instruction": "borrow checker history", "expected_outcome": "timeline" },
                                { "instruction": "polonius status", "expected_outcome": "status" }
                            ]
                        })
                        .to_string(),
                    }],
                    ..Default::default()
                })
            } else if system.contains("search queries") {
                let instruction = last_user(request)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .replace("Research instruction: ", "");
                Ok(text(&instruction))
            } else {
                Ok(text("# Borrow checking\n\nReport body."))
            }
        })
    }

    #[tokio::test]
    async fn test_full_run() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let search = FnLLM::new(|request| Ok(text(&format!("found {}", last_user(request)))));

        let outcome = Orchestrator::with_llms(model(), search, &settings(tmp.path()))
            .approval(Approval::Auto)
            .run("how did the borrow checker evolve")
            .await?;

        let (run_dir, report) = match outcome {
            Outcome::Completed { run_dir, report } => (run_dir, report),
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(report, run_dir.join(storage::REPORT_FILE));
        assert_eq!(
            std::fs::read_to_string(&report)?,
            "# Borrow checking\n\nReport body."
        );
        for file in [storage::PLAN_FILE, storage::PLANNER_LOG_FILE, storage::SUMMARY_FILE] {
            assert!(run_dir.join(file).is_file(), "missing {}", file);
        }
        let summary =
            std::fs::read_to_string(run_dir.join(storage::SEARCH_RESULTS_DIR).join("step_2_summary.txt"))?;
        assert!(summary.contains("SUMMARY:\nfound polonius status"));
        Ok(())
    }

    #[tokio::test]
    async fn test_plan_only_skips_search() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let search = FnLLM::new(|_| panic!("search must not run"));

        let outcome = Orchestrator::with_llms(model(), search, &settings(tmp.path()))
            .plan_only(true)
            .run("how did the borrow checker evolve")
            .await?;

        let run_dir = match outcome {
            Outcome::PlanOnly { run_dir } => run_dir,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(run_dir.join(storage::PLAN_FILE).is_file());
        assert!(!run_dir.join(storage::SEARCH_RESULTS_DIR).exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_declined_plan_stops_before_search() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let searches = Arc::new(AtomicUsize::new(0));
        let counter = searches.clone();
        let search = FnLLM::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(text("should not be searched"))
        });

        let outcome = Orchestrator::with_llms(model(), search, &settings(tmp.path()))
            .approval(Approval::With(|plan| plan.steps.is_empty()))
            .run("how did the borrow checker evolve")
            .await?;

        let run_dir = match outcome {
            Outcome::Declined { run_dir } => run_dir,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(run_dir.join(storage::PLAN_FILE).is_file());
        assert!(!run_dir.join(storage::SEARCH_RESULTS_DIR).exists());
        assert!(!run_dir.join(storage::REPORT_FILE).exists());
        assert_eq!(searches.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_approved_by_function_runs_search() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let search = FnLLM::new(|request| Ok(text(&format!("found {}", last_user(request)))));

        let outcome = Orchestrator::with_llms(model(), search, &settings(tmp.path()))
            .approval(Approval::With(|plan| plan.steps.len() == 2))
            .run("how did the borrow checker evolve")
            .await?;

        assert!(matches!(outcome, Outcome::Completed { .. }));
        Ok(())
    }
}
