use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FinishReason as OpenAiFinishReason,
    FunctionCall, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;

use crate::{
    ChatBackend, ChatBackendError, ChatRequest, ChatResponse, FinishReason, Role, ToolCall,
};

/// Default `async-openai`-backed adapter. Translates the abstract chat
/// contract into the OpenAI chat-completions tool-calling protocol and
/// translates results back into the canonical `ChatResponse` shape.
pub struct OpenAiChatBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatBackend {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        OpenAiChatBackend {
            client: Client::with_config(config),
            model,
        }
    }

    fn translate_tool(tool: &crate::ToolDefinition) -> Result<ChatCompletionTool, ChatBackendError> {
        let function = FunctionObjectArgs::default()
            .name(tool.name.clone())
            .description(tool.description.clone())
            .parameters(tool.json_schema.clone())
            .build()
            .map_err(|e| ChatBackendError::Translation(e.to_string()))?;

        ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(function)
            .build()
            .map_err(|e| ChatBackendError::Translation(e.to_string()))
    }

    fn translate_message(
        message: &crate::ChatMessage,
    ) -> Result<ChatCompletionRequestMessage, ChatBackendError> {
        let translated = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(message.text.clone())
                .build()
                .map_err(|e| ChatBackendError::Translation(e.to_string()))?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.text.clone())
                .build()
                .map_err(|e| ChatBackendError::Translation(e.to_string()))?
                .into(),
            Role::Tool => {
                let tool_call_id = message.tool_call_id.clone().ok_or_else(|| {
                    ChatBackendError::Translation("tool message missing tool_call_id".to_string())
                })?;
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(tool_call_id)
                    .content(message.text.clone())
                    .build()
                    .map_err(|e| ChatBackendError::Translation(e.to_string()))?
                    .into()
            }
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(message.text.clone());
                if !message.tool_calls.is_empty() {
                    let tool_calls = message
                        .tool_calls
                        .iter()
                        .map(|call| async_openai::types::ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(tool_calls);
                }
                builder
                    .build()
                    .map_err(|e| ChatBackendError::Translation(e.to_string()))?
                    .into()
            }
        };
        Ok(translated)
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    #[instrument(skip(self, request))]
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, ChatBackendError> {
        let messages = request
            .messages
            .iter()
            .map(Self::translate_message)
            .collect::<Result<Vec<_>, _>>()?;

        let tools = request
            .tools
            .iter()
            .map(Self::translate_tool)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.model.clone())
            .messages(messages)
            .max_completion_tokens(request.max_output_tokens);
        if !tools.is_empty() {
            builder.tools(tools);
        }

        let api_request = builder
            .build()
            .map_err(|e| ChatBackendError::Translation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e| ChatBackendError::Vendor(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatBackendError::Translation("no choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let arguments = serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| json!({ "raw": call.function.arguments }));
                ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                }
            })
            .collect();

        let finish_reason = match choice.finish_reason {
            Some(OpenAiFinishReason::ToolCalls) => FinishReason::ToolCalls,
            Some(OpenAiFinishReason::Length) => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        let text_blocks = choice
            .message
            .content
            .map(|text| vec![text])
            .unwrap_or_default();

        Ok(ChatResponse {
            text_blocks,
            tool_calls,
            finish_reason,
            // The OpenAI chat-completions protocol has no opaque
            // reasoning-trace field to thread through; adapters for vendors
            // that do (e.g. a "thinking" token) populate this instead.
            opaque_vendor_fields: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatMessage, ToolDefinition};
    use serde_json::json;

    #[test]
    fn translate_message_round_trips_system_and_user() {
        let system = ChatMessage::system("hello system");
        let translated = OpenAiChatBackend::translate_message(&system).unwrap();
        assert!(matches!(translated, ChatCompletionRequestMessage::System(_)));

        let user = ChatMessage::user("hello user");
        let translated = OpenAiChatBackend::translate_message(&user).unwrap();
        assert!(matches!(translated, ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn translate_message_requires_tool_call_id_on_tool_messages() {
        let mut tool_message = ChatMessage::tool_result("call-1", "result text");
        tool_message.tool_call_id = None;
        let err = OpenAiChatBackend::translate_message(&tool_message).unwrap_err();
        assert!(matches!(err, ChatBackendError::Translation(_)));
    }

    #[test]
    fn translate_message_carries_tool_calls_on_assistant_messages() {
        let message = ChatMessage {
            role: Role::Assistant,
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "call-1".to_string(),
                name: "analyze_excel".to_string(),
                arguments: json!({}),
            }],
            tool_call_id: None,
            opaque_vendor_fields: None,
        };
        let translated = OpenAiChatBackend::translate_message(&message).unwrap();
        assert!(matches!(translated, ChatCompletionRequestMessage::Assistant(_)));
    }

    #[test]
    fn translate_tool_carries_name_and_schema() {
        let tool = ToolDefinition {
            name: "web_search".to_string(),
            description: "search the web".to_string(),
            json_schema: json!({ "type": "object" }),
        };
        let translated = OpenAiChatBackend::translate_tool(&tool).unwrap();
        assert_eq!(translated.function.name, "web_search");
    }
}
