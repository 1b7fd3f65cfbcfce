use crate::error::{Error, Result};
use crate::storage::{self, RunDir};
use agent::callbacks::{Callback, MessageLogger};
use agent::llm::{self, Message};
use agent::tools::{FunctionalTool, ToolCall, ToolDefinition};
use agent::{AgentBuilder, ToolInvoked};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const PLANNER_PROMPT: &str = include_str!("prompts/planner.md");
const SUBMIT_PLAN: &str = "submit_plan";
const PLAN_REJECTED: &str = "plan_rejected";
const MAX_PLANNER_STEPS: usize = 6;

/// A single step in the research plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchStep {
    /// Detailed instruction of what needs to be researched
    pub instruction: String,
    /// What information or insights this step should yield
    pub expected_outcome: String,
}

/// What the model submits; query and run id are attached afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct PlanDraft {
    /// The planner's reasoning about how to approach the research
    reasoning: String,
    /// The ordered steps to conduct the research
    steps: Vec<ResearchStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub query: String,
    pub run_id: String,
    pub reasoning: String,
    pub steps: Vec<ResearchStep>,
}

impl ResearchPlan {
    pub fn save(&self, run_dir: &RunDir) -> Result<std::path::PathBuf> {
        storage::save_json(self, &run_dir.file(storage::PLAN_FILE))
    }
}

struct SubmitPlan;

#[async_trait]
impl FunctionalTool for SubmitPlan {
    fn definition(&self) -> agent::Result<ToolDefinition> {
        ToolDefinition::new::<PlanDraft>(
            SUBMIT_PLAN,
            "submit the finished research plan, this ends the planning session",
        )
    }

    async fn invoke_fn(&mut self, call: &ToolCall) -> agent::Result<Message> {
        // invalid plans are answered under another name so the session keeps going
        let rejection = |reason: String| Message::Tool {
            id: call.id.clone(),
            name: PLAN_REJECTED.to_string(),
            result: format!("{} Fix the plan and call {} again.", reason, SUBMIT_PLAN),
        };

        match call.args::<PlanDraft>() {
            Ok(draft) if draft.steps.is_empty() => Ok(rejection(
                "The plan must contain at least one step.".to_string(),
            )),
            Ok(draft) => Ok(call.respond(serde_json::to_string(&draft)?)),
            Err(err) => {
                warn!(error = %err, "planner submitted malformed plan");
                Ok(rejection(format!("The plan could not be parsed: {}.", err)))
            }
        }
    }
}

/// Reminds the model to use the tool when it answers in plain text.
struct RequireSubmission;

#[async_trait]
impl Callback for RequireSubmission {
    async fn call(&mut self, mut messages: Vec<Message>) -> agent::Result<Vec<Message>> {
        if matches!(messages.last(), Some(Message::Assistant(_, calls)) if calls.is_empty()) {
            messages.push(Message::User(format!(
                "Submit the research plan by calling the {} tool.",
                SUBMIT_PLAN
            )));
        }
        Ok(messages)
    }
}

pub struct Planner {
    llm: Arc<dyn llm::LLM + Send + Sync>,
}

impl Planner {
    pub fn new(llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        Self { llm }
    }

    /// Creates a research plan for `query`; the planning transcript is kept in the run directory.
    pub async fn create_plan(&self, query: &str, run_dir: &RunDir) -> Result<ResearchPlan> {
        let log = std::fs::File::create(run_dir.file(storage::PLANNER_LOG_FILE))?;

        let history = AgentBuilder::new()
            .system_prompt(PLANNER_PROMPT.to_string())
            .user_prompt(query.to_string())
            .llm(self.llm.clone())
            .tool(Box::new(SubmitPlan))
            .callback(Box::new(RequireSubmission))
            .callback(MessageLogger::new("Planner", log)?)
            .stop_condition(Box::new(ToolInvoked(SUBMIT_PLAN)))
            .max_steps(MAX_PLANNER_STEPS)
            .build()?
            .run()
            .await?;

        let draft: PlanDraft = match history.last() {
            Some(Message::Tool { result, .. }) => serde_json::from_str(result)?,
            _ => {
                return Err(agent::Error::AgentWorkflowError(
                    "planner stopped without submitting a plan".to_string(),
                )
                .into());
            }
        };

        if draft.steps.is_empty() {
            return Err(Error::EmptyPlan);
        }

        info!(steps = draft.steps.len(), run_id = run_dir.run_id(), "research plan created");

        Ok(ResearchPlan {
            query: query.to_string(),
            run_id: run_dir.run_id().to_string(),
            reasoning: draft.reasoning,
            steps: draft.steps,
        })
    }
}
