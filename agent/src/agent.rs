use crate::callbacks;
use crate::llm;
use crate::llm::Message;
use crate::tools;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub trait StopCondition {
    fn done(&self, history: &[llm::Message]) -> bool;
}

/// Stops once the last message in the history is the result of the named tool.
pub struct ToolInvoked(pub &'static str);

impl StopCondition for ToolInvoked {
    fn done(&self, history: &[llm::Message]) -> bool {
        matches!(history.last(), Some(Message::Tool { name, .. }) if name == self.0)
    }
}

type Tool = Box<dyn tools::Tool + Send>;
type Callback = Box<dyn callbacks::Callback + Send>;

const DEFAULT_MAX_STEPS: usize = 25;

pub struct Agent {
    llm: Arc<dyn llm::LLM + Send + Sync>,
    system_prompt: Option<String>,
    user_prompt: Option<String>,
    tools: HashMap<String, Tool>,
    callbacks: Vec<Callback>,
    tool_defs: Vec<tools::ToolDefinition>,
    stop_condition: Box<dyn StopCondition + Send>,
    max_steps: usize,
}

impl Agent {
    async fn execute_tool_call(
        &mut self,
        tool_call: &tools::ToolCall,
        messages: Vec<llm::Message>,
    ) -> Result<Vec<llm::Message>> {
        let tool = self
            .tools
            .get_mut(&tool_call.name)
            .ok_or(Error::ToolDoesNotExist(tool_call.name.clone()))?;

        debug!(tool = %tool_call.name, id = %tool_call.id, "invoking tool");
        tool.invoke(tool_call, messages).await
    }

    /// Seeds the history with the configured prompts and runs until the stop condition holds.
    pub async fn run(self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::System(prompt.clone()));
        }
        if let Some(prompt) = &self.user_prompt {
            messages.push(Message::User(prompt.clone()));
        }
        self.run_with(messages).await
    }

    pub async fn run_with(mut self, mut messages: Vec<llm::Message>) -> Result<Vec<Message>> {
        let mut steps = 0;

        while !self.stop_condition.done(&messages) {
            if steps == self.max_steps {
                return Err(Error::AgentWorkflowError(format!(
                    "stop condition not reached after {} steps",
                    self.max_steps
                )));
            }
            steps += 1;

            let request = llm::CompletionRequest::new(&messages).tools(&self.tool_defs);
            let next = self.llm.completion(request).await?;

            messages.push(llm::Message::Assistant(
                next.content,
                next.tool_calls.clone(),
            ));

            for tool_call in &next.tool_calls {
                messages = self.execute_tool_call(tool_call, messages).await?;
            }

            for callback in &mut self.callbacks {
                messages = callback.call(messages).await?;
            }
        }

        info!(steps, messages = messages.len(), "agent finished");
        Ok(messages)
    }
}

pub struct AgentBuilder {
    llm: Option<Arc<dyn llm::LLM + Send + Sync>>,
    system_prompt: Option<String>,
    user_prompt: Option<String>,
    tools: Vec<Tool>,
    callbacks: Vec<Callback>,
    stop_condition: Option<Box<dyn StopCondition + Send>>,
    max_steps: usize,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            system_prompt: None,
            user_prompt: None,
            tools: Vec::new(),
            callbacks: Vec::new(),
            stop_condition: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn llm(mut self, llm: Arc<dyn llm::LLM + Send + Sync>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn system_prompt(mut self, prompt: String) -> Self {
        self.system_prompt = Some(prompt);
        self
    }

    pub fn user_prompt(mut self, prompt: String) -> Self {
        self.user_prompt = Some(prompt);
        self
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn callback(mut self, callback: Callback) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn stop_condition(mut self, cond: Box<dyn StopCondition + Send>) -> Self {
        self.stop_condition = Some(cond);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let mut tool_defs = Vec::new();
        let mut tools = HashMap::new();

        for tool in self.tools {
            let def = tool.definition()?;
            tools.insert(def.name.clone(), tool);
            tool_defs.push(def);
        }

        Ok(Agent {
            llm: self
                .llm
                .ok_or(Error::MissingArg("llm is required for agent".to_string()))?,
            system_prompt: self.system_prompt,
            user_prompt: self.user_prompt,
            tools,
            tool_defs,
            callbacks: self.callbacks,
            stop_condition: self.stop_condition.ok_or(Error::MissingArg(
                "stop_condition is required for agent".to_string(),
            ))?,
            max_steps: self.max_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::llm::{CompletionRequest, CompletionResponse, LLM, Message};
    use crate::tools::{FunctionalTool, ToolCall, ToolDefinition};
    use crate::{AgentBuilder, Error, Result, StopCondition, ToolInvoked};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct MockLLM;

    #[async_trait]
    impl LLM for MockLLM {
        async fn completion<'a>(
            &self,
            request: CompletionRequest<'a>,
        ) -> Result<CompletionResponse> {
            match request.messages.last() {
                Some(Message::User(_)) => Ok(CompletionResponse {
                    content: "tool call".to_string(),
                    tool_calls: vec![ToolCall {
                        id: "call1".to_string(),
                        name: "double".to_string(),
                        args: "{\"arg\":123}".to_string(),
                    }],
                    ..Default::default()
                }),
                Some(Message::Tool { .. }) => Ok(CompletionResponse {
                    content: "tool call recieved".to_string(),
                    ..Default::default()
                }),
                Some(Message::Assistant(_, _)) => Ok(CompletionResponse {
                    content: "completed".to_string(),
                    ..Default::default()
                }),
                _ => panic!("unexpected message sequence"),
            }
        }
    }

    /// Always calls a tool the agent was never given.
    struct StrayToolLLM;

    #[async_trait]
    impl LLM for StrayToolLLM {
        async fn completion<'a>(&self, _: CompletionRequest<'a>) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                tool_calls: vec![ToolCall {
                    id: "call1".to_string(),
                    name: "missing".to_string(),
                    args: "{}".to_string(),
                }],
                ..Default::default()
            })
        }
    }

    struct DoubleTool;

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct DoubleArgs {
        arg: i32,
    }

    #[async_trait]
    impl FunctionalTool for DoubleTool {
        fn definition(&self) -> Result<ToolDefinition> {
            ToolDefinition::new::<DoubleArgs>("double", "double")
        }

        async fn invoke_fn(&mut self, tool_call: &ToolCall) -> Result<Message> {
            let args: DoubleArgs = tool_call.args()?;
            Ok(tool_call.respond(format!("2 * {} = {}", args.arg, 2 * args.arg)))
        }
    }

    struct SimpleStop;

    impl StopCondition for SimpleStop {
        fn done(&self, history: &[Message]) -> bool {
            if let Some(Message::Assistant(content, _)) = history.last() {
                content == "completed"
            } else {
                false
            }
        }
    }

    #[tokio::test]
    async fn test_agent() -> Result<()> {
        let agent = AgentBuilder::new()
            .llm(Arc::new(MockLLM))
            .user_prompt("do stuff".to_string())
            .tool(Box::new(DoubleTool))
            .stop_condition(Box::new(SimpleStop))
            .build()?;

        let history = agent.run().await?;

        assert_eq!(history.len(), 5);

        assert!(matches!(&history[0], Message::User (content) if content == "do stuff"));
        assert!(matches!(&history[1], Message::Assistant (_, tool_calls) if tool_calls.len() == 1));
        assert!(matches!(&history[2], Message::Tool {  result,.. } if result == "2 * 123 = 246"));
        assert!(
            matches!(&history[3], Message::Assistant (content, _) if content== "tool call recieved")
        );
        assert!(matches!(&history[4], Message::Assistant (content, _) if content== "completed"));

        Ok(())
    }

    #[tokio::test]
    async fn test_tool_invoked_stop() -> Result<()> {
        let agent = AgentBuilder::new()
            .llm(Arc::new(MockLLM))
            .system_prompt("be helpful".to_string())
            .user_prompt("do stuff".to_string())
            .tool(Box::new(DoubleTool))
            .stop_condition(Box::new(ToolInvoked("double")))
            .build()?;

        let history = agent.run().await?;

        assert_eq!(history.len(), 4);
        assert!(matches!(&history[0], Message::System(content) if content == "be helpful"));
        assert!(matches!(&history[3], Message::Tool { name, .. } if name == "double"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_tool() -> Result<()> {
        let agent = AgentBuilder::new()
            .llm(Arc::new(StrayToolLLM))
            .user_prompt("do stuff".to_string())
            .stop_condition(Box::new(SimpleStop))
            .build()?;

        let err = agent.run().await.err();
        assert!(matches!(err, Some(Error::ToolDoesNotExist(name)) if name == "missing"));
        Ok(())
    }

    #[tokio::test]
    async fn test_step_limit() -> Result<()> {
        let agent = AgentBuilder::new()
            .llm(Arc::new(MockLLM))
            .tool(Box::new(DoubleTool))
            .stop_condition(Box::new(ToolInvoked("never")))
            .max_steps(3)
            .build()?;

        let err = agent
            .run_with(vec![Message::User("do stuff".to_string())])
            .await
            .err();
        assert!(matches!(err, Some(Error::AgentWorkflowError(_))));
        Ok(())
    }

    #[test]
    fn test_build_requires_llm() {
        let err = AgentBuilder::new()
            .stop_condition(Box::new(SimpleStop))
            .build()
            .err();
        assert!(matches!(err, Some(Error::MissingArg(_))));
    }
}
