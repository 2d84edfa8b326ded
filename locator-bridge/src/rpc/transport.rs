//! RPC transport to the locator
//!
//! The locator speaks JSON-RPC 2.0 over HTTP POST. Each call carries one
//! query document and yields one response document:
//!
//! ```text
//! → {"jsonrpc": "2.0", "method": m, "params": {"query": q}, "id": n}
//! ← {"jsonrpc": "2.0", "result": {"response": r}, "id": n}
//! ```

use super::document::Document;
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;

/// Carries RPC calls to the locator
pub trait RpcTransport: Send {
    /// Invoke `method` with `query`, returning the response document
    fn invoke(&mut self, method: &str, query: Document) -> Result<Document>;
}

/// JSON-RPC over HTTP
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    url: String,
    next_id: u64,
}

impl HttpTransport {
    /// Create a transport for `http://<host>:<port>/`
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, format!("http://{}:{}/", host, port)))
    }

    /// Use a pre-configured HTTP client
    pub fn with_client(client: Client, url: String) -> Self {
        Self {
            client,
            url,
            next_id: 1,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Build the JSON-RPC envelope for one call
pub fn request_envelope(method: &str, query: Document, id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": { "query": query.into_value() },
        "id": id,
    })
}

/// Parse the body of a JSON-RPC reply into its response document
pub fn parse_reply(method: &str, body: &str) -> Result<Document> {
    let reply: Value = serde_json::from_str(body)?;
    response_document(method, reply)
}

/// Extract the response document from a JSON-RPC reply
pub fn response_document(method: &str, reply: Value) -> Result<Document> {
    if let Some(error) = reply.get("error") {
        return Err(Error::Rpc {
            method: method.to_string(),
            reason: error.to_string(),
        });
    }
    match reply.get("result").and_then(|r| r.get("response")) {
        Some(response) => Document::from_value(response.clone()),
        None => Err(Error::Rpc {
            method: method.to_string(),
            reason: "reply carries no result.response".to_string(),
        }),
    }
}

impl RpcTransport for HttpTransport {
    fn invoke(&mut self, method: &str, query: Document) -> Result<Document> {
        let id = self.next_id;
        self.next_id += 1;
        let body = request_envelope(method, query, id);
        log::trace!("RPC → {} (id {})", method, id);

        let response = self.client.post(&self.url).json(&body).send()?;
        if !response.status().is_success() {
            return Err(Error::Rpc {
                method: method.to_string(),
                reason: format!("HTTP status {}", response.status()),
            });
        }

        let body = response.text().map_err(|e| Error::Rpc {
            method: method.to_string(),
            reason: format!("cannot read reply: {}", e),
        })?;
        parse_reply(method, &body)
    }
}
