//! Scripted locator for testing
//!
//! Answers every RPC method with a configured reply and records each call.
//! Methods without a scripted reply succeed with `responseCode = 0`.

use super::document::{ConfigDocument, Document};
use super::transport::RpcTransport;
use super::versions::REQUIRED_MODULE_VERSIONS;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Reply the mock gives for one method
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(Document),
    /// Transport failure
    Unreachable,
    /// JSON-RPC error member
    RpcError(String),
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub query: Document,
}

/// Mock transport for unit and integration tests
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    replies: HashMap<String, MockReply>,
    calls: Vec<RecordedCall>,
    session_counter: u64,
}

/// Session id handed out by a scripted login
pub const MOCK_SESSION_ID: &str = "mock-session";

impl MockTransport {
    /// Create a mock with no scripted replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock of a compatible locator with the given configuration
    ///
    /// Login succeeds for any credentials, `aboutModules` reports exactly the
    /// required versions and `configList` returns `config`.
    pub fn locator(config: &ConfigDocument) -> Self {
        let mock = Self::new();
        mock.respond(
            "sessionLogin",
            Document::new()
                .with("responseCode", 0)
                .with("sessionId", MOCK_SESSION_ID),
        );
        let modules: Vec<Value> = REQUIRED_MODULE_VERSIONS
            .iter()
            .map(|(name, v)| {
                json!({"moduleName": name, "moduleVersion": {"major": v.major, "minor": v.minor}})
            })
            .collect();
        mock.respond(
            "aboutModules",
            Document::new()
                .with("responseCode", 0)
                .with("moduleVersions", modules),
        );
        mock.set_config(config);
        mock
    }

    /// Script the reply for `method`
    pub fn respond(&self, method: &str, response: Document) {
        self.reply(method, MockReply::Respond(response));
    }

    pub fn reply(&self, method: &str, reply: MockReply) {
        self.inner.lock().replies.insert(method.to_string(), reply);
    }

    /// Script `configList` to return `config`
    pub fn set_config(&self, config: &ConfigDocument) {
        self.respond(
            "configList",
            Document::new()
                .with("responseCode", 0)
                .with("configEntries", config.to_entries()),
        );
    }

    /// All calls so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    /// Calls made to `method`
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Sessions handed out by `sessionLogin` so far
    pub fn sessions_created(&self) -> u64 {
        self.inner.lock().session_counter
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }
}

impl RpcTransport for MockTransport {
    fn invoke(&mut self, method: &str, query: Document) -> Result<Document> {
        let mut inner = self.inner.lock();
        inner.calls.push(RecordedCall {
            method: method.to_string(),
            query,
        });

        let reply = inner.replies.get(method).cloned();
        match reply {
            Some(MockReply::Respond(doc)) => {
                if method == "sessionLogin" && doc.has("sessionId") {
                    inner.session_counter += 1;
                }
                Ok(doc)
            }
            Some(MockReply::Unreachable) => {
                Err(Error::Unreachable(format!("mock: {} unreachable", method)))
            }
            Some(MockReply::RpcError(reason)) => Err(Error::Rpc {
                method: method.to_string(),
                reason,
            }),
            None => Ok(Document::new().with("responseCode", 0)),
        }
    }
}
