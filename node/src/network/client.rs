// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;

use ratify_kernel::client::{ParticipantClient, RpcError, StateReply, VoteReply};
use ratify_kernel::{Operation, ParticipantState};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Talks to a participant node over HTTP.
#[derive(Debug, Clone)]
pub struct HttpParticipant {
    base_url: String,
    client: Client,
}

impl HttpParticipant {
    pub fn new(url: &str, client: Client) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Shared client with the per-call timeout applied to every request.
    pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
        Client::builder().timeout(timeout).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, RpcError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await.map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.json::<serde_json::Value>().await.unwrap_or_default();
            let message = body
                .get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            let state = body.get("state").and_then(|s| ParticipantState::deserialize(s).ok());
            return Err(RpcError::Rejected {
                status: status.as_u16(),
                message,
                state,
            });
        }

        resp.json().await.map_err(|e| {
            if e.is_timeout() {
                RpcError::Timeout
            } else {
                RpcError::Malformed(e.to_string())
            }
        })
    }
}

fn classify(e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::Timeout
    } else {
        RpcError::Unreachable(e.to_string())
    }
}

impl ParticipantClient for HttpParticipant {
    fn address(&self) -> &str {
        &self.base_url
    }

    async fn prepare(&self, txid: &str, op: &Operation) -> Result<VoteReply, RpcError> {
        self.post("/prepare", &json!({ "txid": txid, "op": op })).await
    }

    async fn can_commit(&self, txid: &str, op: &Operation) -> Result<VoteReply, RpcError> {
        self.post("/can_commit", &json!({ "txid": txid, "op": op })).await
    }

    async fn precommit(&self, txid: &str) -> Result<StateReply, RpcError> {
        self.post("/precommit", &json!({ "txid": txid })).await
    }

    async fn commit(&self, txid: &str) -> Result<StateReply, RpcError> {
        self.post("/commit", &json!({ "txid": txid })).await
    }

    async fn abort(&self, txid: &str) -> Result<StateReply, RpcError> {
        self.post("/abort", &json!({ "txid": txid })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = HttpParticipant::new("http://127.0.0.1:8001/", Client::new());
        assert_eq!(client.address(), "http://127.0.0.1:8001");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpParticipant::new(&format!("http://{}", addr), HttpParticipant::build_client(Duration::from_millis(500)).unwrap());
        let err = client.abort("TX1").await.unwrap_err();
        assert!(err.is_transient(), "{:?}", err);
    }
}
