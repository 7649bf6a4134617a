//! Pending-elicitation registry.
//!
//! When a tool asks the end user a mid-execution question, the relay parks a
//! oneshot here under an opaque request id and streams the question to the
//! client. The answer arrives out of band (a later HTTP call) and resolves
//! the entry; unanswered entries are rejected after a fixed timeout.
//!
//! Entries are one-shot: `none -> pending -> resolved | rejected`. The
//! registry is owned by the application context and handed to the relay
//! explicitly, so tests control its lifetime.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::mcp::error::{McpError, McpResult};

const REQUEST_ID_SUFFIX_LEN: usize = 9;
const REQUEST_ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub struct ElicitationRegistry {
    pending: DashMap<String, oneshot::Sender<Value>>,
}

impl Default for ElicitationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ElicitationRegistry {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Park a new pending entry and return its id plus the response receiver.
    ///
    /// Ids combine a millisecond timestamp with a random suffix so that
    /// concurrent requests cannot collide on keys.
    pub fn register(&self) -> (String, oneshot::Receiver<Value>) {
        loop {
            let request_id = format!(
                "elicit_{}_{}",
                Utc::now().timestamp_millis(),
                random_suffix()
            );
            if self.pending.contains_key(&request_id) {
                continue;
            }
            let (tx, rx) = oneshot::channel();
            self.pending.insert(request_id.clone(), tx);
            return (request_id, rx);
        }
    }

    /// Resolve a pending entry with the caller-supplied payload.
    ///
    /// Returns false when no entry exists for the id (already resolved,
    /// timed out, or never created).
    pub fn resolve(&self, request_id: &str, response: Value) -> bool {
        match self.pending.remove(request_id) {
            Some((_, tx)) => {
                let _ = tx.send(response);
                true
            }
            None => false,
        }
    }

    /// Drop a pending entry without resolving it
    pub fn discard(&self, request_id: &str) {
        self.pending.remove(request_id);
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Await the response for a registered entry, rejecting after `timeout`.
    ///
    /// On timeout (or a dropped sender) the entry is removed, so later
    /// lookups of the same id fail.
    pub async fn wait(
        &self,
        request_id: &str,
        rx: oneshot::Receiver<Value>,
        timeout: Duration,
    ) -> McpResult<Value> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.discard(request_id);
                Err(McpError::ToolExecution(
                    "elicitation response channel closed".to_string(),
                ))
            }
            Err(_) => {
                self.discard(request_id);
                Err(McpError::ElicitationTimeout)
            }
        }
    }
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..REQUEST_ID_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..REQUEST_ID_CHARSET.len());
            REQUEST_ID_CHARSET[idx] as char
        })
        .collect()
}
