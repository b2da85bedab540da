//! Single-bridge HTTP client.
//!
//! Only `get`/`put` are exposed — the bridge's CLIP API needs nothing else
//! for streaming. Every reply is classified before it reaches the caller;
//! a `Transport` error on a `get` is retried once here, after a 5s
//! single-shot reconnect delay, before it is surfaced to the caller.

use crate::error::{Error, Event, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Single-shot reconnect delay after a failed `get`.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// `http://{address}/api/{username}/{route}`.
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(address: &str, username: &str) -> Self {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("reqwest client build must not fail with these options");

        BridgeClient {
            http,
            base_url: format!("http://{address}/api/{username}/"),
        }
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// `GET route`. `route = ""` is the connection probe.
    ///
    /// - Network error -> [`Error::Transport`], after one 5s-delayed retry.
    /// - Non-JSON body -> [`Error::Protocol`].
    /// - Array-typed top-level body (bridge error envelope) -> [`Error::AuthFailure`].
    pub async fn get(&self, route: &str) -> Result<Value> {
        match self.get_once(route).await {
            Err(Error::Transport(msg)) => {
                warn!(route, error = %msg, "bridge GET failed, retrying once after 5s");
                tokio::time::sleep(RECONNECT_DELAY).await;
                self.get_once(route).await
            }
            other => other,
        }
    }

    async fn get_once(&self, route: &str) -> Result<Value> {
        let url = self.url(route);
        debug!(%url, "bridge GET");

        let resp = self.http.get(&url).send().await.map_err(|e| {
            warn!(%url, error = %e, "bridge GET transport error");
            Error::Transport(e.to_string())
        })?;

        let body: Value = resp.json().await.map_err(|e| {
            Error::Protocol(format!("non-JSON response from {url}: {e}"))
        })?;

        if body.is_array() {
            warn!(%url, "bridge GET returned error envelope");
            return Err(Error::AuthFailure);
        }

        Ok(body)
    }

    /// `PUT route` with `body`. The bridge always replies with a
    /// JSON array; this inspects the first element:
    ///
    /// - `{"error": {"description": ...}}` -> [`Error::BridgeError`].
    /// - `{"success": {...}}` -> `Ok`, additionally returning
    ///   [`Event::StreamActiveChanged`] if the success key is
    ///   `/groups/{groupId}/stream/active`.
    pub async fn put(&self, route: &str, body: Value) -> Result<Option<Event>> {
        let url = self.url(route);
        debug!(%url, %body, "bridge PUT");

        let resp = self.http.put(&url).json(&body).send().await.map_err(|e| {
            warn!(%url, error = %e, "bridge PUT transport error");
            Error::Transport(e.to_string())
        })?;

        let items: Vec<Value> = resp.json().await.map_err(|e| {
            Error::Protocol(format!("non-JSON response from {url}: {e}"))
        })?;

        let Some(first) = items.first() else {
            return Err(Error::Protocol(format!("empty PUT response from {url}")));
        };

        if let Some(desc) = first.pointer("/error/description").and_then(Value::as_str) {
            return Err(Error::BridgeError(desc.to_string()));
        }

        if let Some(success) = first.get("success").and_then(Value::as_object) {
            for (key, value) in success {
                if key.ends_with("/stream/active") {
                    if let Some(active) = value.as_bool() {
                        return Ok(Some(Event::StreamActiveChanged(active)));
                    }
                }
            }
            return Ok(None);
        }

        Err(Error::Protocol(format!("PUT reply had neither success nor error: {first}")))
    }

    /// `GET ""` — the connection/auth probe.
    pub async fn probe(&self) -> Result<Value> {
        self.get("").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BridgeClient {
        BridgeClient::new(server.address().to_string().as_str(), "testuser")
    }

    #[tokio::test(start_paused = true)]
    async fn get_retries_once_after_5s_then_surfaces_transport_error() {
        // Nothing listens on this port: every attempt fails immediately with
        // a connection error. Pausing tokio's clock makes the 5s reconnect
        // delay between the two attempts resolve instantly instead of
        // actually waiting.
        let client = BridgeClient::new("127.0.0.1:1", "testuser");
        let result = client.get("lights").await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn get_returns_object_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/lights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"1": {"name": "Lamp"}})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client.get("lights").await.unwrap();
        assert_eq!(body["1"]["name"], "Lamp");
    }

    #[tokio::test]
    async fn get_array_body_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"error": {"type": 1, "address": "/", "description": "unauthorized user"}}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.get("").await;
        assert!(matches!(result, Err(Error::AuthFailure)));
    }

    #[tokio::test]
    async fn put_success_reports_stream_active_event() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/testuser/groups/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"success": {"/groups/1/stream/active": true}}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let event = client.put("groups/1", serde_json::json!({"stream": {"active": true}})).await.unwrap();
        assert_eq!(event, Some(Event::StreamActiveChanged(true)));
    }

    #[tokio::test]
    async fn put_error_surfaces_bridge_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/testuser/lights/1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"error": {"type": 201, "address": "/lights/1/state", "description": "device is set to off"}}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client.put("lights/1/state", serde_json::json!({"on": true})).await;
        match result {
            Err(Error::BridgeError(desc)) => assert_eq!(desc, "device is set to off"),
            other => panic!("expected BridgeError, got {other:?}"),
        }
    }
}
