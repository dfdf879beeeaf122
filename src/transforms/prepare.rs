//! Prepare outbound chat requests for Qwen backends.
//!
//! Two adjustments before a request leaves the proxy:
//! - Replace recognized web-search tool declarations with the `web_search`
//!   definition Qwen models are trained on
//! - Append a reminder to the system prompt so the model knows the tool
//!   is available

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::tool_names::is_search_alias;
use crate::constants::{
    SYSTEM_REMINDER, WEB_SEARCH_DESCRIPTION, WEB_SEARCH_QUERY_DESCRIPTION, WEB_SEARCH_TOOL_NAME,
};

/// Prepare a chat request body for a Qwen backend.
///
/// Best-effort on malformed input: anything that doesn't match the expected
/// shape passes through untouched.
pub fn prepare_qwen_request(mut body: Value) -> Value {
    normalize_search_tools(&mut body);
    append_system_reminder(&mut body);
    body
}

/// Rewrite recognized web-search tool declarations to the canonical
/// definition. Other tools, and other fields of a matching tool, are kept.
fn normalize_search_tools(body: &mut Value) {
    let Some(tools) = body.get_mut("tools").and_then(|t| t.as_array_mut()) else {
        return;
    };

    for tool in tools {
        let matches = tool
            .pointer("/function/name")
            .and_then(|n| n.as_str())
            .is_some_and(is_search_alias);

        if matches
            && let Some(function) = tool.get_mut("function").and_then(|f| f.as_object_mut())
        {
            function.insert("name".to_string(), WEB_SEARCH_TOOL_NAME.into());
            function.insert("description".to_string(), WEB_SEARCH_DESCRIPTION.into());
            function.insert("parameters".to_string(), web_search_parameters());
        }
    }
}

/// The fixed parameter schema for the canonical web_search definition.
fn web_search_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": WEB_SEARCH_QUERY_DESCRIPTION
            }
        },
        "required": ["query"]
    })
}

/// Shapes the upstream API accepts for `system`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum SystemPrompt {
    Text(String),
    Blocks(Vec<Value>),
    Block(SystemBlock),
}

/// A single `{type, text}` content block; extra fields ride along.
#[derive(Debug, Deserialize, Serialize)]
struct SystemBlock {
    text: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl SystemPrompt {
    fn append(&mut self, reminder: &str) {
        match self {
            SystemPrompt::Text(text) => text.push_str(reminder),
            SystemPrompt::Blocks(blocks) => {
                blocks.push(json!({"type": "text", "text": reminder}));
            }
            SystemPrompt::Block(block) => block.text.push_str(reminder),
        }
    }
}

/// Append the web-search reminder to whatever shape `system` arrived in.
/// Absent or unrecognized shapes are a silent no-op.
fn append_system_reminder(body: &mut Value) {
    let Some(system) = body.get_mut("system") else {
        return;
    };

    let Ok(mut prompt) = serde_json::from_value::<SystemPrompt>(system.clone()) else {
        return;
    };

    prompt.append(SYSTEM_REMINDER);
    if let Ok(updated) = serde_json::to_value(&prompt) {
        *system = updated;
    }
}
