use crate::error::Result;
use crate::planner::{ResearchPlan, ResearchStep};
use crate::storage::{self, RunDir};
use agent::llm::{self, Citation, CompletionRequest, Message, WebSearch};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const SEARCH_QUERY_PROMPT: &str = include_str!("prompts/search_query.md");
const QUERY_MAX_TOKENS: u32 = 50;

/// Result of the web search for one research step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub step_number: usize,
    pub step_instruction: String,
    pub search_query: String,
    pub summary: String,
    pub citations: Vec<Citation>,
    pub raw_response: Value,
}

impl SearchResult {
    /// Plain text digest written next to the json result.
    pub fn digest(&self) -> String {
        let mut out = format!(
            "RESEARCH STEP {}: {}\n\nSEARCH QUERY: {}\n\nSUMMARY:\n{}\n\nCITATIONS:\n",
            self.step_number, self.step_instruction, self.search_query, self.summary
        );
        for citation in &self.citations {
            let _ = writeln!(out, "- {}: {}", citation.title, citation.url);
        }
        out
    }

    fn save(&self, dir: &Path) -> Result<()> {
        storage::save_json(self, &dir.join(format!("step_{}_result.json", self.step_number)))?;
        storage::save_text(
            &self.digest(),
            &dir.join(format!("step_{}_summary.txt", self.step_number)),
        )?;
        Ok(())
    }
}

/// Text of the search answer, or a description of what went wrong. Empty when
/// the search produced neither.
pub fn extract_summary(raw: &Value) -> String {
    if let Some(content) = raw
        .get("content")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
    {
        return content.to_string();
    }

    match raw.get("error").and_then(Value::as_str) {
        Some(error) => {
            let mut summary = format!("Error in search: {}", error);
            if let Some(details) = raw.get("error_message").and_then(Value::as_str) {
                let _ = write!(summary, "\nDetails: {}", details);
            }
            summary
        }
        None => String::new(),
    }
}

pub fn extract_citations(raw: &Value) -> Vec<Citation> {
    raw.get("citations")
        .cloned()
        .and_then(|citations| serde_json::from_value::<Vec<Citation>>(citations).ok())
        .unwrap_or_default()
        .into_iter()
        .filter(|citation| !citation.url.is_empty())
        .collect()
}

fn unavailable_summary(query: &str) -> String {
    format!(
        "Unable to retrieve results for the search query: '{}'. This could be due to API limitations or connectivity issues. You may want to try refining the search query or checking your internet connection.",
        query
    )
}

fn clean_query(raw: &str, step: &ResearchStep) -> String {
    let query = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    if query.is_empty() {
        step.instruction.clone()
    } else {
        query.to_string()
    }
}

#[derive(Clone)]
pub struct Searcher {
    query_llm: Arc<dyn llm::LLM + Send + Sync>,
    search_llm: Arc<dyn llm::LLM + Send + Sync>,
    web_search: WebSearch,
    concurrency: usize,
}

impl Searcher {
    pub fn new(
        query_llm: Arc<dyn llm::LLM + Send + Sync>,
        search_llm: Arc<dyn llm::LLM + Send + Sync>,
        web_search: WebSearch,
    ) -> Self {
        Self {
            query_llm,
            search_llm,
            web_search,
            concurrency: 1,
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn generate_search_query(&self, step: &ResearchStep) -> Result<String> {
        let messages = [
            Message::System(SEARCH_QUERY_PROMPT.to_string()),
            Message::User(format!(
                "Research instruction: {}\nExpected outcome: {}\n\nCreate a concise search query:",
                step.instruction, step.expected_outcome
            )),
        ];

        let response = self
            .query_llm
            .completion(CompletionRequest::new(&messages).max_tokens(QUERY_MAX_TOKENS))
            .await?;

        Ok(clean_query(&response.content, step))
    }

    /// Runs the web search. Provider failures are returned as `{"error": ...}`
    /// so a single failed step does not end the run.
    pub async fn search_web(&self, query: &str) -> Value {
        let messages = [Message::User(query.to_string())];

        match self
            .search_llm
            .completion(CompletionRequest::new(&messages).web_search(&self.web_search))
            .await
        {
            Ok(response) => {
                debug!(query, citations = response.citations.len(), "search finished");
                json!({
                    "model": response.model,
                    "content": response.content,
                    "citations": response.citations,
                })
            }
            Err(err) => {
                warn!(query, error = %err, "web search failed");
                json!({ "error": err.to_string() })
            }
        }
    }

    pub async fn execute_step(&self, step: &ResearchStep, step_number: usize) -> Result<SearchResult> {
        let search_query = self.generate_search_query(step).await?;
        info!(step = step_number, query = %search_query, "searching");

        let raw_response = self.search_web(&search_query).await;

        let mut summary = extract_summary(&raw_response);
        if summary.is_empty() {
            summary = unavailable_summary(&search_query);
        }

        Ok(SearchResult {
            step_number,
            step_instruction: step.instruction.clone(),
            search_query,
            summary,
            citations: extract_citations(&raw_response),
            raw_response,
        })
    }

    /// Searches every step of the plan, at most `concurrency` at a time, saving
    /// each result as it arrives. Results come back ordered by step number.
    pub async fn execute_plan<F>(
        &self,
        plan: &ResearchPlan,
        run_dir: &RunDir,
        mut on_result: F,
    ) -> Result<Vec<SearchResult>>
    where
        F: FnMut(&SearchResult),
    {
        let search_dir = run_dir.search_results_dir()?;
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (i, step) in plan.steps.iter().enumerate() {
            let searcher = self.clone();
            let step = step.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|err| agent::Error::AgentWorkflowError(err.to_string()))?;
                searcher.execute_step(&step, i + 1).await
            });
        }

        let mut results = Vec::with_capacity(plan.steps.len());
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(agent::Error::from)??;
            result.save(&search_dir)?;
            on_result(&result);
            results.push(result);
        }
        results.sort_by_key(|result| result.step_number);

        storage::save_text(
            &combined_summary(plan, &results),
            &run_dir.file(storage::SUMMARY_FILE),
        )?;

        Ok(results)
    }
}

fn combined_summary(plan: &ResearchPlan, results: &[SearchResult]) -> String {
    let mut out = format!(
        "RESEARCH SUMMARY FOR: {}\n\nREASONING: {}\n\n",
        plan.query, plan.reasoning
    );
    for result in results {
        let _ = write!(
            out,
            "STEP {}: {}\n\nSUMMARY:\n{}\n\n---\n\n",
            result.step_number, result.step_instruction, result.summary
        );
    }
    out
}
