use crate::llm::Message;
use crate::{Error, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;

#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub desc: String,
    pub params: serde_json::Value,
}

impl ToolDefinition {
    /// Parameters are the json schema of `P` with nested types inlined, since
    /// function parameters cannot carry a definitions table.
    pub fn new<P: JsonSchema>(name: &str, desc: &str) -> Result<Self> {
        let schema = SchemaSettings::draft07()
            .with(|settings| settings.inline_subschemas = true)
            .into_generator()
            .into_root_schema_for::<P>();
        let params = serde_json::to_value(&schema.schema)?;
        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            params,
        })
    }
}

#[derive(Clone, Debug, Hash)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: String,
}

impl ToolCall {
    pub fn args<O: for<'de> serde::Deserialize<'de>>(&self) -> Result<O> {
        serde_json::from_str(&self.args).map_err(|source| Error::InvalidToolArgs {
            tool: self.name.clone(),
            source,
        })
    }

    /// Tool result message answering this call.
    pub fn respond(&self, result: impl Into<String>) -> Message {
        Message::Tool {
            id: self.id.clone(),
            name: self.name.clone(),
            result: result.into(),
        }
    }
}

impl std::fmt::Display for ToolCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "- {} ({})\n\t- `{}`", self.name, self.id, self.args)
    }
}

/// A tool that receives the whole history and may rewrite it.
#[async_trait]
pub trait Tool {
    fn definition(&self) -> Result<ToolDefinition>;

    async fn invoke(&mut self, args: &ToolCall, messages: Vec<Message>) -> Result<Vec<Message>>;
}

/// A tool that only answers its call with a single message.
#[async_trait]
pub trait FunctionalTool {
    fn definition(&self) -> Result<ToolDefinition>;

    async fn invoke_fn(&mut self, args: &ToolCall) -> Result<Message>;
}

#[async_trait]
impl<T> Tool for T
where
    T: FunctionalTool + Send + Sync,
{
    fn definition(&self) -> Result<ToolDefinition> {
        FunctionalTool::definition(self)
    }

    async fn invoke(
        &mut self,
        args: &ToolCall,
        mut messages: Vec<Message>,
    ) -> Result<Vec<Message>> {
        let result = self.invoke_fn(args).await?;
        messages.push(result);
        Ok(messages)
    }
}
