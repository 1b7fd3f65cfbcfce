use crate::llm;
use crate::{Error, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
        ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionCall, FunctionObjectArgs, Role, WebSearchOptions,
    },
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub struct OpenAI {
    model: String,
    client: Client<OpenAIConfig>,
}

impl OpenAI {
    pub fn with_api_key(model: String, api_key: &str, api_base: Option<&str>) -> Arc<Self> {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Arc::new(Self {
            model,
            client: Client::with_config(config),
        })
    }
}

impl TryFrom<&llm::Message> for ChatCompletionRequestMessage {
    type Error = Error;

    fn try_from(msg: &llm::Message) -> Result<Self> {
        match msg {
            llm::Message::User(msg) => Ok(ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::System(msg) => Ok(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.clone()),
                    name: None,
                },
            )),
            llm::Message::Tool { id, result, .. } => Ok(ChatCompletionRequestMessage::Tool(
                ChatCompletionRequestToolMessage {
                    content: ChatCompletionRequestToolMessageContent::Text(result.clone()),
                    tool_call_id: id.clone(),
                },
            )),
            llm::Message::Assistant(msg, tool_calls) => {
                let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
                assistant.content(ChatCompletionRequestAssistantMessageContent::Text(
                    msg.clone(),
                ));
                // the api rejects an empty tool_calls array
                if !tool_calls.is_empty() {
                    assistant.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.args.clone(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                Ok(ChatCompletionRequestMessage::Assistant(assistant.build()?))
            }
        }
    }
}

impl TryFrom<&llm::ToolDefinition> for ChatCompletionTool {
    type Error = Error;

    fn try_from(tool: &llm::ToolDefinition) -> Result<Self> {
        let res = ChatCompletionToolArgs::default()
            .function(
                FunctionObjectArgs::default()
                    .name(tool.name.clone())
                    .description(tool.desc.clone())
                    .parameters(tool.params.clone())
                    .build()?,
            )
            .build()?;

        Ok(res)
    }
}

impl TryFrom<&llm::WebSearch> for WebSearchOptions {
    type Error = Error;

    fn try_from(search: &llm::WebSearch) -> Result<Self> {
        let mut options = json!({ "search_context_size": search.context_size });
        if let Some(location) = search.user_location.as_ref().filter(|l| !l.is_empty()) {
            options["user_location"] = json!({
                "type": "approximate",
                "approximate": location,
            });
        }
        Ok(serde_json::from_value(options)?)
    }
}

/// Pulls `url_citation` annotations out of a raw response message.
fn extract_citations(message: &Value) -> Vec<llm::Citation> {
    message
        .get("annotations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|annotation| annotation.get("type").and_then(Value::as_str) == Some("url_citation"))
        .filter_map(|annotation| annotation.get("url_citation"))
        .map(|citation| llm::Citation {
            url: str_field(citation, "url"),
            title: str_field(citation, "title"),
            start_index: u32_field(citation, "start_index"),
            end_index: u32_field(citation, "end_index"),
        })
        .collect()
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn u32_field(value: &Value, key: &str) -> u32 {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or_default()
}

#[async_trait]
impl llm::LLM for OpenAI {
    async fn completion<'a>(
        &self,
        request: llm::CompletionRequest<'a>,
    ) -> Result<llm::CompletionResponse> {
        let mut completion = CreateChatCompletionRequestArgs::default();
        completion.model(&self.model).messages(
            request
                .messages
                .iter()
                .map(ChatCompletionRequestMessage::try_from)
                .collect::<Result<Vec<_>>>()?,
        );

        if !request.tools.is_empty() {
            completion.tools(
                request
                    .tools
                    .iter()
                    .map(ChatCompletionTool::try_from)
                    .collect::<Result<Vec<_>>>()?,
            );
        }

        if let Some(search) = request.web_search {
            completion.web_search_options(WebSearchOptions::try_from(search)?);
        }

        if let Some(max_tokens) = request.max_tokens {
            completion.max_completion_tokens(max_tokens);
        }

        let completion = completion.build()?;

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            web_search = request.web_search.is_some(),
            "sending chat completion"
        );

        // raw body: the typed response message drops `annotations`
        let body: Value = self.client.chat().create_byot(completion).await?;
        parse_response(body)
    }
}

/// Converts a raw chat completion body into a `CompletionResponse`.
fn parse_response(body: Value) -> Result<llm::CompletionResponse> {
    let citations = extract_citations(&body["choices"][0]["message"]);
    let res: CreateChatCompletionResponse = serde_json::from_value(body)?;

    let choice = res
        .choices
        .first()
        .ok_or(Error::LLMResponseError("choices is empty".to_string()))?;

    if choice.message.role != Role::Assistant {
        return Err(Error::LLMResponseError(
            "expected role to be assistant".to_string(),
        ));
    }

    let tool_calls = choice
        .message
        .tool_calls
        .iter()
        .flat_map(|calls| {
            calls.iter().map(|call| llm::ToolCall {
                id: call.id.clone(),
                name: call.function.name.clone(),
                args: call.function.arguments.clone(),
            })
        })
        .collect::<Vec<_>>();

    let content = match (&choice.message.content, tool_calls.is_empty()) {
        (Some(content), _) => content.clone(),
        (None, false) => String::new(),
        (None, true) => {
            return Err(Error::LLMResponseError("content is empty".to_string()));
        }
    };

    Ok(llm::CompletionResponse {
        content,
        tool_calls,
        citations,
        model: res.model,
    })
}
