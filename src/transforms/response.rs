//! Rewrite inbound Qwen responses before they return to the client.
//!
//! Dispatch is on the response content type: buffered JSON bodies are parsed
//! and their tool-call names canonicalized, SSE bodies are rewritten line by
//! line as they stream, and anything else passes through untouched.

use axum::{
    body::{Body, to_bytes},
    http::header::{self, HeaderValue},
    response::Response,
};
use serde_json::Value;

use super::streaming::stream_canonicalize_tool_names;
use super::tool_names::canonicalize_tool_calls;
use crate::error::AdapterError;

/// Rewrite a backend response so the client sees canonical tool names.
///
/// Status, status text, and headers are preserved on every path. Only a
/// failure to read the upstream body is an error; parse failures fall back
/// to forwarding the original bytes.
pub async fn rewrite_qwen_response(res: Response) -> Result<Response, AdapterError> {
    let content_type = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.contains("application/json") {
        return rewrite_json_response(res).await;
    }

    if content_type.contains("text/event-stream") {
        let (parts, body) = res.into_parts();
        let transformed = stream_canonicalize_tool_names(body.into_data_stream());
        return Ok(Response::from_parts(parts, Body::from_stream(transformed)));
    }

    Ok(res)
}

/// Buffer a JSON chat completion, canonicalize
/// `choices[0].message.tool_calls`, and re-serialize. Re-serialization
/// happens whether or not a rewrite occurred, so the output path is the
/// same either way; `Content-Length` is updated to match the new body.
async fn rewrite_json_response(res: Response) -> Result<Response, AdapterError> {
    let (mut parts, body) = res.into_parts();
    let bytes = to_bytes(body, usize::MAX).await?;

    let Ok(mut document) = serde_json::from_slice::<Value>(&bytes) else {
        return Ok(Response::from_parts(parts, Body::from(bytes)));
    };

    if let Some(tool_calls) = document
        .pointer_mut("/choices/0/message/tool_calls")
        .and_then(|tc| tc.as_array_mut())
    {
        let rewritten = canonicalize_tool_calls(tool_calls);
        if rewritten > 0 {
            tracing::debug!(rewritten, "canonicalized tool calls in buffered response");
        }
    }

    let serialized = serde_json::to_vec(&document).unwrap_or_else(|_| bytes.to_vec());
    if parts.headers.contains_key(header::CONTENT_LENGTH) {
        parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(serialized.len()));
    }

    Ok(Response::from_parts(parts, Body::from(serialized)))
}
