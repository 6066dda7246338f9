//! Human-readable formatting of decoded stream events.
//!
//! The formatted text is what lands in the iteration log and on the live
//! console, styled with `owo-colors`. Formatting is a pure function of the
//! event; anything with no visible output maps to `None`.

use owo_colors::OwoColorize;

use super::events::{ContentBlock, StreamEvent};

/// Maximum characters of a tool result shown before truncation.
const RESULT_PREVIEW_LEN: usize = 200;

/// Format one decoded event as a terminal-ready line, or `None` when the
/// event produces no visible output.
#[must_use]
pub fn format_event(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::System {
            session_id, model, ..
        } => Some(format!(
            "{}",
            format!("[session] {session_id} model={model}").dimmed()
        )),
        StreamEvent::Assistant { message } => format_assistant_content(&message.content),
        StreamEvent::User { message } => format_tool_results(&message.content),
        StreamEvent::Result {
            subtype,
            is_error,
            duration_ms,
            ..
        } => Some(format_result(subtype, *is_error, *duration_ms)),
        StreamEvent::Unknown => None,
    }
}

fn format_assistant_content(content: &[ContentBlock]) -> Option<String> {
    let mut lines = Vec::new();

    for block in content {
        match block {
            ContentBlock::Text { text } => lines.push(text.clone()),
            ContentBlock::ToolUse { name, input, .. } => {
                lines.push(format!("{}", format!("[tool] {name}").cyan()));
                let pretty = serde_json::to_string_pretty(input)
                    .unwrap_or_else(|_| input.to_string());
                lines.push(format!("{}", pretty.dimmed()));
            }
            ContentBlock::ToolResult { .. } | ContentBlock::Unknown => {}
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn format_tool_results(content: &[ContentBlock]) -> Option<String> {
    let mut lines = Vec::new();

    for block in content {
        if let ContentBlock::ToolResult { content, .. } = block {
            let preview = preview(content, RESULT_PREVIEW_LEN);
            lines.push(format!("{}", format!("[result] {preview}").green()));
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn format_result(subtype: &str, is_error: bool, duration_ms: u64) -> String {
    let line = format!("[done] {subtype} ({duration_ms}ms)");
    if is_error {
        format!("{}", line.red())
    } else {
        format!("{}", line.green())
    }
}

/// Length-capped preview with an ellipsis beyond `max_chars`.
fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let capped: String = s.chars().take(max_chars).collect();
        format!("{capped}...")
    }
}
