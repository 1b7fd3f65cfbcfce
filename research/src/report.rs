use crate::error::{Error, Result};
use crate::planner::ResearchPlan;
use crate::search::SearchResult;
use crate::storage::{self, RunDir};
use agent::llm::{self, Citation, CompletionRequest, Message};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const REPORT_PROMPT: &str = include_str!("prompts/report.md");
const REPORT_MAX_TOKENS: u32 = 4000;

#[derive(Debug, Clone, PartialEq)]
pub struct StepData {
    pub step_number: usize,
    pub instruction: String,
    pub search_query: String,
    pub summary: String,
}

/// Everything the report writer gets to see about a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchData {
    pub query: String,
    pub reasoning: String,
    pub steps: Vec<StepData>,
    pub citations: Vec<Citation>,
}

impl ResearchData {
    /// Citations are deduplicated in first-seen order; ones without a url are dropped.
    pub fn collect(plan: &ResearchPlan, results: &[SearchResult]) -> Self {
        let mut citations: Vec<Citation> = Vec::new();
        for citation in results.iter().flat_map(|r| &r.citations) {
            if !citation.url.is_empty() && !citations.contains(citation) {
                citations.push(citation.clone());
            }
        }

        Self {
            query: plan.query.clone(),
            reasoning: plan.reasoning.clone(),
            steps: results
                .iter()
                .map(|r| StepData {
                    step_number: r.step_number,
                    instruction: r.step_instruction.clone(),
                    search_query: r.search_query.clone(),
                    summary: r.summary.clone(),
                })
                .collect(),
            citations,
        }
    }

    pub fn context(&self) -> String {
        let mut context = format!(
            "RESEARCH QUERY: {}\n\nRESEARCH REASONING: {}\n\nRESEARCH STEPS AND FINDINGS:\n",
            self.query, self.reasoning
        );

        for step in &self.steps {
            let _ = write!(
                context,
                "\nSTEP {}: {}\nSEARCH QUERY: {}\nSUMMARY: {}\n---\n",
                step.step_number, step.instruction, step.search_query, step.summary
            );
        }

        if !self.citations.is_empty() {
            context.push_str("\nCITATIONS:\n");
            for citation in &self.citations {
                let title = if citation.title.is_empty() {
                    "No title"
                } else {
                    citation.title.as_str()
                };
                let _ = writeln!(context, "- {}: {}", title, citation.url);
            }
        }

        context
    }
}

pub struct Reporter {
    llm: Arc<dyn llm::LLM + Send + Sync>,
}

impl Reporter {
    pub fn new(llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        Self { llm }
    }

    pub async fn generate_report(
        &self,
        plan: &ResearchPlan,
        results: &[SearchResult],
    ) -> Result<String> {
        let data = ResearchData::collect(plan, results);
        info!(
            steps = data.steps.len(),
            citations = data.citations.len(),
            "generating research report"
        );

        let messages = [
            Message::System(REPORT_PROMPT.to_string()),
            Message::User(data.context()),
        ];
        let response = self
            .llm
            .completion(CompletionRequest::new(&messages).max_tokens(REPORT_MAX_TOKENS))
            .await?;

        if response.content.trim().is_empty() {
            return Err(Error::Agent(agent::Error::LLMResponseError(
                "report is empty".to_string(),
            )));
        }
        Ok(response.content)
    }

    pub fn save_report(&self, report: &str, run_dir: &RunDir) -> Result<PathBuf> {
        let path = storage::save_text(report, &run_dir.file(storage::REPORT_FILE))?;
        info!(path = %path.display(), "research report saved");
        Ok(path)
    }

    pub async fn generate_and_save(
        &self,
        plan: &ResearchPlan,
        results: &[SearchResult],
        run_dir: &RunDir,
    ) -> Result<(String, PathBuf)> {
        let report = self.generate_report(plan, results).await?;
        let path = self.save_report(&report, run_dir)?;
        Ok((report, path))
    }
}
