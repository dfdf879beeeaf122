/// Tool name Claude-dialect clients declare for web search
pub const WEB_SEARCH_CLIENT_ALIAS: &str = "WebSearch";

/// Canonical tool name Qwen models are trained to call
pub const WEB_SEARCH_TOOL_NAME: &str = "web_search";

/// Tool description Qwen backends expect for web_search
pub const WEB_SEARCH_DESCRIPTION: &str =
    "Search the web for real-time information using Qwen's search engine.";

/// Description of the single required `query` parameter
pub const WEB_SEARCH_QUERY_DESCRIPTION: &str = "The search query to look up on the web.";

/// Reminder appended to the system prompt so the model actually uses the tool
pub const SYSTEM_REMINDER: &str = "\n[System Reminder]: You have access to a `web_search` tool. Use it if you need real-time information from the web. If you decide to search, call the `web_search` tool.";
