// Copyright (c) 2024 FinstateSync. All rights reserved.
// Licensed under the Microsoft Reference Source License (MS-RSL).
// See LICENSE file for complete terms and conditions.

//! # finstate-sync LLM
//!
//! Vendor-agnostic chat-completion contract, with a concrete `async-openai`
//! adapter bound behind it. The orchestrator speaks only the abstract
//! `ChatMessage`/`ToolDefinition`/`ChatRequest`/`ChatResponse` shapes defined
//! here; a different vendor adapter can be substituted without the
//! orchestrator noticing, the way the teacher keeps its own protocol-glue
//! (MCP translation) behind its own crate boundary.

mod openai;

pub use openai::OpenAiChatBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One invocation of a tool, as requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A single message in the conversation history. `opaque_vendor_fields`
/// carries whatever a vendor requires re-sent verbatim on subsequent turns
/// (e.g. a reasoning trace token on an assistant message with tool calls) —
/// the orchestrator never inspects it, only threads it through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Set on a `Tool` message to tie its result back to the originating call.
    #[serde(default)]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub opaque_vendor_fields: Option<Value>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            text: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            opaque_vendor_fields: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            text: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            opaque_vendor_fields: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Tool,
            text: text.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            opaque_vendor_fields: None,
        }
    }
}

/// One tool's JSON-schema input contract, published to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub json_schema: Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_output_tokens: u32,
    /// Vendor-specific "thinking"/reasoning mode; ignored by adapters that
    /// don't support it.
    pub thinking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text_blocks: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub opaque_vendor_fields: Option<Value>,
}

impl ChatResponse {
    /// Per spec.md §4.5.2: the tool loop exits when the response carries no
    /// tool calls, i.e. finish reason is "stop"/"end_turn".
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatBackendError {
    #[error("vendor API error: {0}")]
    Vendor(String),

    #[error("failed to translate vendor response: {0}")]
    Translation(String),
}

/// The seam the orchestrator is coded against. A concrete adapter translates
/// the abstract contract into whatever chat/tool-calling protocol the chosen
/// model vendor exposes.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, ChatBackendError>;
}
