//! Event types from the agent's stream-json output.
//!
//! One JSON object per line arrives on the subprocess stdout when the agent
//! runs with `--output-format stream-json`. Events are decoded into closed
//! sum types so the formatter can match them exhaustively.

use serde::{Deserialize, Serialize};

/// A content block inside an assistant or user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain model text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool invocation request.
    ToolUse {
        /// Unique identifier for this tool use.
        id: String,
        /// Name of the tool being invoked.
        name: String,
        /// Tool input parameters.
        input: serde_json::Value,
    },
    /// Feedback from a completed tool call.
    ToolResult {
        /// Identifier matching the original tool use.
        tool_use_id: String,
        /// Result content from tool execution.
        content: String,
    },
    /// Catch-all for block types this version does not know about.
    #[serde(other)]
    Unknown,
}

/// Message payload carried by assistant and user events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Content blocks in array order.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// Events emitted by the agent subprocess, one per stream line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Announces a new underlying agent session.
    System {
        /// Session identifier.
        session_id: String,
        /// Available tools for this session.
        #[serde(default)]
        tools: Vec<String>,
        /// Model backing the session.
        model: String,
    },
    /// Model output, zero or more content blocks.
    Assistant {
        /// Message content.
        message: Message,
    },
    /// Tool-result feedback returned to the model.
    User {
        /// Message content (tool-result blocks).
        message: Message,
    },
    /// Terminal event for one subprocess turn.
    Result {
        /// Result subtype (e.g. "success", "error_max_turns").
        subtype: String,
        /// Whether the turn ended in an error.
        #[serde(default)]
        is_error: bool,
        /// Total turn duration in milliseconds.
        #[serde(default)]
        duration_ms: u64,
        /// Final result text, when the agent reports one.
        #[serde(default)]
        result: Option<String>,
    },
    /// Catch-all for event types this version does not know about.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Returns true if this is a terminal event for the subprocess turn.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. })
    }
}
