#![doc = "reqwest-backed GraphTransport: bearer-authenticated Graph calls and raw range uploads."]
//
//! # Graph client (CLI <-> Core)
//!
//! Bridges the core's [`GraphTransport`] seam to real HTTP. Every Graph request
//! carries the bearer token and a fresh `client-request-id`; upload chunks go
//! to the pre-authorized session URL without an `Authorization` header.
//! Non-2xx statuses are not errors here: the core decides what a status means.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use up_print_core::contract::{ByteRange, GraphResponse, GraphTransport, TransportError};

pub struct GraphClient {
    http: Client,
    access_token: String,
}

impl GraphClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, TransportError> {
        let http = Client::builder()
            .user_agent(concat!("up-print/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self {
            http,
            access_token: access_token.into(),
        })
    }

    fn authorized(&self, builder: RequestBuilder, timeout: Duration) -> RequestBuilder {
        let client_request_id = Uuid::new_v4().to_string();
        debug!(client_request_id = %client_request_id, "Attaching Graph request headers");
        builder
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .header("client-request-id", client_request_id)
            .timeout(timeout)
    }

    async fn send(&self, method: &str, url: &str, builder: RequestBuilder, timeout: Duration) -> Result<GraphResponse, TransportError> {
        let response = builder.send().await.map_err(|e| {
            error!(method, url, error = %e, "Graph request failed before a response arrived");
            classify(e, timeout)
        })?;
        let graph_response = snapshot(response).await.map_err(|e| classify(e, timeout))?;
        debug!(method, url, status = graph_response.status, "Graph response received");
        Ok(graph_response)
    }
}

#[async_trait]
impl GraphTransport for GraphClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<GraphResponse, TransportError> {
        let builder = self.authorized(self.http.get(url), timeout);
        self.send("GET", url, builder, timeout).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<GraphResponse, TransportError> {
        let builder = self.authorized(self.http.post(url), timeout).json(body);
        self.send("POST", url, builder, timeout).await
    }

    async fn put_range(
        &self,
        url: &str,
        range: ByteRange,
        chunk: Vec<u8>,
        timeout: Duration,
    ) -> Result<GraphResponse, TransportError> {
        let builder = self
            .http
            .put(url)
            .header("Content-Length", chunk.len().to_string())
            .header("Content-Range", range.content_range())
            .timeout(timeout)
            .body(chunk);
        self.send("PUT", url, builder, timeout).await
    }
}

fn classify(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(timeout)
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

async fn snapshot(response: Response) -> Result<GraphResponse, reqwest::Error> {
    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();
    let body = response.text().await?;
    let snapshot = GraphResponse {
        status,
        headers,
        body,
    };
    if status >= 400 {
        debug!(
            status,
            request_id = snapshot.header("request-id").unwrap_or_default(),
            "Graph returned an error status"
        );
    }
    Ok(snapshot)
}
