//! Canonical naming for the Qwen web-search tool.
//!
//! Clients speaking the Claude CLI dialect declare the tool as `WebSearch`;
//! Qwen backends are standardized on `web_search`. Both spellings are
//! recognized and mapped to the canonical form.

use serde_json::Value;

use crate::constants::{WEB_SEARCH_CLIENT_ALIAS, WEB_SEARCH_TOOL_NAME};

/// Whether a tool name is one of the recognized web-search spellings.
pub fn is_search_alias(name: &str) -> bool {
    name == WEB_SEARCH_TOOL_NAME || name == WEB_SEARCH_CLIENT_ALIAS
}

/// Rewrite every recognized alias in a `tool_calls` array to the canonical
/// name. Entries without a string `function.name` are left alone.
/// Returns the number of rewritten calls.
pub fn canonicalize_tool_calls(tool_calls: &mut [Value]) -> usize {
    let mut rewritten = 0;

    for call in tool_calls {
        let matches = call
            .pointer("/function/name")
            .and_then(|n| n.as_str())
            .is_some_and(is_search_alias);

        if matches
            && let Some(function) = call.get_mut("function").and_then(|f| f.as_object_mut())
        {
            function.insert(
                "name".to_string(),
                Value::String(WEB_SEARCH_TOOL_NAME.to_string()),
            );
            rewritten += 1;
        }
    }

    rewritten
}
