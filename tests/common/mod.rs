#![allow(dead_code)]

pub mod mock_mcp_server;
pub mod mock_provider_server;
pub mod test_app;

use serde_json::Value;

/// Split an SSE body into its `data:` payloads, keeping the raw sentinel
pub fn parse_sse_frames(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|block| {
            let block = block.trim();
            block.strip_prefix("data: ").map(|data| data.to_string())
        })
        .collect()
}

/// Parse every JSON frame, dropping the `[DONE]` sentinel
pub fn parse_json_frames(body: &str) -> Vec<Value> {
    parse_sse_frames(body)
        .into_iter()
        .filter(|frame| frame != "[DONE]")
        .filter_map(|frame| serde_json::from_str(&frame).ok())
        .collect()
}
