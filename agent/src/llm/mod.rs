use crate::Result;
use crate::tools::ToolCall;
pub use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};

mod openai;
pub use openai::OpenAI;

#[derive(Clone, Debug, Hash)]
pub enum Message {
    User(String),
    Assistant(String, Vec<ToolCall>),
    System(String),
    Tool {
        id: String,
        name: String,
        result: String,
    },
}

impl Message {
    /// Rough token estimate, about four characters per token.
    pub fn ntokens(&self) -> usize {
        let chars = match self {
            Message::User(content) | Message::System(content) => content.chars().count(),
            Message::Assistant(content, calls) => {
                content.chars().count()
                    + calls
                        .iter()
                        .map(|c| c.name.chars().count() + c.args.chars().count())
                        .sum::<usize>()
            }
            Message::Tool { result, .. } => result.chars().count(),
        };
        chars.div_ceil(4)
    }

    pub fn get_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::System(content) => write!(f, "**System**\n\n{}\n\n", content),
            Message::User(content) => write!(f, "**User**\n\n{}\n\n", content),
            Message::Assistant(content, calls) => {
                write!(f, "**Assistant**\n\n{}\n\n", content)?;
                for call in calls {
                    write!(f, "{}", call)?;
                }
                if !calls.is_empty() {
                    writeln!(f)?;
                }
                Ok(())
            }
            Message::Tool { id, name, result } => {
                write!(f, "**Tool** {} ({})\n\n{}\n\n", name, id, result)
            }
        }
    }
}

/// A source the model cited while answering with web search enabled.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
    pub start_index: u32,
    pub end_index: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchContextSize {
    Low,
    #[default]
    Medium,
    High,
}

/// Approximate location used to localize web search results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLocation {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
}

impl UserLocation {
    pub fn is_empty(&self) -> bool {
        self.city.is_none()
            && self.region.is_none()
            && self.country.is_none()
            && self.timezone.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct WebSearch {
    pub context_size: SearchContextSize,
    pub user_location: Option<UserLocation>,
}

pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    pub web_search: Option<&'a WebSearch>,
    pub max_tokens: Option<u32>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        Self {
            messages,
            tools: &[],
            web_search: None,
            max_tokens: None,
        }
    }

    pub fn tools(mut self, tools: &'a [ToolDefinition]) -> Self {
        self.tools = tools;
        self
    }

    pub fn web_search(mut self, web_search: &'a WebSearch) -> Self {
        self.web_search = Some(web_search);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompletionResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub citations: Vec<Citation>,
    pub model: String,
}

#[async_trait]
pub trait LLM {
    async fn completion<'a>(&self, request: CompletionRequest<'a>) -> Result<CompletionResponse>;
}
