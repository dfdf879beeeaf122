//! Compatibility adapter between Claude-dialect clients and Qwen backends.
//!
//! Qwen models are trained on a `web_search` tool, while Claude CLI clients
//! declare it as `WebSearch`. This crate rewrites outbound requests so the
//! backend accepts and prefers the tool (canonical definition plus a system
//! reminder), and rewrites responses, buffered JSON and SSE streams alike, so
//! the canonical name reaches the client.
//!
//! The surrounding proxy calls two entry points:
//! - [`prepare_qwen_request`] on the outbound request body
//! - [`rewrite_qwen_response`] on the inbound response
//!
//! Everything the adapter does not recognize passes through unchanged; a
//! rewrite failure never blocks a response.

pub mod constants;
pub mod error;
pub mod transforms;

pub use error::AdapterError;
pub use transforms::{
    SseRewriter, prepare_qwen_request, rewrite_qwen_response, stream_canonicalize_tool_names,
};
