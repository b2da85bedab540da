//! State machine coordinating the control plane over a [`BridgeClient`].

use super::client::BridgeClient;
use crate::error::{Error, Event, Result};
use crate::light::BridgeLightValues;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Re-fetch cadence while waiting for another client to release a group.
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Minimum number of claim/release cycles to attempt before giving up.
const MAX_CLAIM_CYCLES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Enumerating,
    AuthFailed,
    Ready,
    StreamReady,
}

pub struct LightAttrs {
    pub model_id: String,
    pub name: String,
    pub values: BridgeLightValues,
}

pub struct GroupAttrs {
    pub name: String,
    pub light_ids: Vec<u32>,
}

pub struct Enumeration {
    pub lights: HashMap<u32, LightAttrs>,
    pub groups: HashMap<u32, GroupAttrs>,
}

/// Whether the configured entertainment group is free to claim, already
/// streaming under our own username, or held by a different client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamClaimState {
    Inactive,
    ActiveOwnedByUs,
    ActiveOwnedByOther,
}

/// Drives one bridge session end-to-end.
pub struct BridgeSession {
    client: BridgeClient,
    username: String,
    group_id: u32,
    state: SessionState,
}

impl BridgeSession {
    pub fn new(address: &str, username: &str, group_id: u32) -> Self {
        BridgeSession {
            client: BridgeClient::new(address, username),
            username: username.to_string(),
            group_id,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `Connecting -> Enumerating` on success, `-> AuthFailed` on an auth
    /// error. [`BridgeClient::get`] already retries once after a 5s delay on
    /// a transport error, so this only needs to classify the final outcome.
    pub async fn connect(&mut self) -> Result<()> {
        match self.client.probe().await {
            Ok(_) => {
                self.state = SessionState::Enumerating;
                Ok(())
            }
            Err(Error::AuthFailure) => {
                self.state = SessionState::AuthFailed;
                Err(Error::AuthFailure)
            }
            Err(e) => Err(e),
        }
    }

    /// `{lights: id -> attrs, groups: id -> attrs}`.
    pub async fn enumerate(&mut self) -> Result<Enumeration> {
        let lights_body = self.client.get("lights").await?;
        let groups_body = self.client.get("groups").await?;

        let lights = parse_lights(&lights_body)?;
        let groups = parse_groups(&groups_body)?;

        self.state = SessionState::Ready;
        Ok(Enumeration { lights, groups })
    }

    /// Re-fetches `lights` and returns each id's fresh values, for the caller
    /// to feed into [`crate::light::PhilipsHueLight::refresh_original_state`].
    pub async fn capture_originals(&mut self) -> Result<HashMap<u32, BridgeLightValues>> {
        let lights_body = self.client.get("lights").await?;
        let lights = parse_lights(&lights_body)?;
        Ok(lights.into_iter().map(|(id, attrs)| (id, attrs.values)).collect())
    }

    /// PUTs `{stream: {active}}` to the configured group and self-loops until
    /// the bridge confirms the target state, handling the "someone else owns
    /// the stream" contention case.
    ///
    /// Gives up with [`Error::StreamUnavailable`] after [`MAX_CLAIM_CYCLES`]
    /// unconfirmed cycles.
    pub async fn set_stream_group_active(&mut self, active: bool, start_streaming: bool) -> Result<()> {
        for cycle in 0..MAX_CLAIM_CYCLES {
            let (current_active, _) = self.fetch_group_stream_state().await?;

            if current_active == active {
                if start_streaming {
                    self.state = SessionState::StreamReady;
                }
                return Ok(());
            }

            info!(cycle, target = active, "claiming entertainment group");
            self.put_stream_active(active).await?;

            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
        }

        Err(Error::StreamUnavailable)
    }

    /// Releases a claim held by this session before re-claiming: a prior
    /// session of ours left the group reporting `active=true` but this
    /// session is not streaming
    /// yet, so it must first flip to `false` and confirm before re-claiming.
    pub async fn release_then_reclaim(&mut self) -> Result<()> {
        self.put_stream_active(false).await?;

        for _ in 0..MAX_CLAIM_CYCLES {
            tokio::time::sleep(GROUP_POLL_INTERVAL).await;
            let (active, _) = self.fetch_group_stream_state().await?;
            if !active {
                self.put_stream_active(true).await?;
                return Ok(());
            }
        }

        Err(Error::StreamUnavailable)
    }

    /// Classifies the configured entertainment group's current claim state,
    /// comparing the bridge-reported `stream.owner` against our own
    /// `username` — mirrors `LedDevicePhilipsHue::checkGroupStreamState`'s
    /// `streamOwner == username` guard, so a group another client is
    /// legitimately streaming to is never force-released.
    pub async fn stream_claim_state(&mut self) -> Result<StreamClaimState> {
        let (active, owner) = self.fetch_group_stream_state().await?;
        Ok(if !active {
            StreamClaimState::Inactive
        } else if owner.as_deref() == Some(self.username.as_str()) {
            StreamClaimState::ActiveOwnedByUs
        } else {
            StreamClaimState::ActiveOwnedByOther
        })
    }

    /// `(stream.active, stream.owner)` for the configured group.
    async fn fetch_group_stream_state(&mut self) -> Result<(bool, Option<String>)> {
        let route = format!("groups/{}", self.group_id);
        let body = self.client.get(&route).await?;
        let active = body.pointer("/stream/active").and_then(Value::as_bool).unwrap_or(false);
        let owner = body.pointer("/stream/owner").and_then(Value::as_str).map(str::to_string);
        Ok((active, owner))
    }

    async fn put_stream_active(&mut self, active: bool) -> Result<Option<Event>> {
        let route = format!("groups/{}", self.group_id);
        self.client.put(&route, serde_json::json!({ "stream": { "active": active } })).await
    }

    /// For each `(light_id, original_state)` pair, PUTs the saved state back.
    pub async fn restore_originals(&mut self, originals: &[(u32, Value)]) -> Result<()> {
        for (id, body) in originals {
            let route = format!("lights/{id}/state");
            if let Err(e) = self.client.put(&route, body.clone()).await {
                warn!(light_id = id, error = %e, "failed to restore original state");
            }
        }
        Ok(())
    }

    /// Direct pass-through PUT for the REST Sink.
    pub async fn set_light_state(&mut self, light_id: u32, body: Value) -> Result<Option<Event>> {
        let route = format!("lights/{light_id}/state");
        self.client.put(&route, body).await
    }
}

fn parse_lights(body: &Value) -> Result<HashMap<u32, LightAttrs>> {
    let obj = body.as_object().ok_or_else(|| Error::Protocol("lights body not an object".into()))?;
    let mut out = HashMap::new();

    for (id_str, entry) in obj {
        let id: u32 = id_str.parse().map_err(|_| Error::Protocol(format!("non-numeric light id {id_str}")))?;
        let model_id = entry.get("modelid").and_then(Value::as_str).unwrap_or("").to_string();
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("").to_string();
        let state_value = entry.get("state").cloned().unwrap_or(Value::Null);
        let values: BridgeLightValues = serde_json::from_value(serde_json::json!({ "state": state_value }))
            .map_err(|e| Error::Protocol(format!("light {id_str} state: {e}")))?;

        out.insert(id, LightAttrs { model_id, name, values });
    }

    Ok(out)
}

fn parse_groups(body: &Value) -> Result<HashMap<u32, GroupAttrs>> {
    let obj = body.as_object().ok_or_else(|| Error::Protocol("groups body not an object".into()))?;
    let mut out = HashMap::new();

    for (id_str, entry) in obj {
        let id: u32 = id_str.parse().map_err(|_| Error::Protocol(format!("non-numeric group id {id_str}")))?;
        let name = entry.get("name").and_then(Value::as_str).unwrap_or("").to_string();
        let light_ids = entry
            .get("lights")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .filter_map(|s| s.parse::<u32>().ok())
                    .collect()
            })
            .unwrap_or_default();

        out.insert(id, GroupAttrs { name, light_ids });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn session_for(server: &MockServer, group_id: u32) -> BridgeSession {
        BridgeSession::new(server.address().to_string().as_str(), "testuser", group_id)
    }

    #[tokio::test]
    async fn connect_then_enumerate_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/lights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "1": {"modelid": "LCT015", "name": "Lamp", "state": {"on": true, "xy": [0.4, 0.5], "bri": 200, "transitiontime": 4}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "5": {"name": "Living Room", "lights": ["1"]}
            })))
            .mount(&server)
            .await;

        let mut session = session_for(&server, 5).await;
        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Enumerating);

        let enumeration = session.enumerate().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(enumeration.lights.len(), 1);
        assert_eq!(enumeration.groups[&5].name, "Living Room");
    }

    #[tokio::test]
    async fn connect_auth_failure_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"error": {"type": 1, "address": "/", "description": "unauthorized user"}}
            ])))
            .mount(&server)
            .await;

        let mut session = session_for(&server, 1).await;
        let result = session.connect().await;
        assert!(matches!(result, Err(Error::AuthFailure)));
        assert_eq!(session.state(), SessionState::AuthFailed);
    }

    #[tokio::test]
    async fn contention_releases_before_reclaiming_when_we_own_the_claim() {
        // First GET reports active=true owned by "testuser" (us); release +
        // confirm false, then claim again.
        let server = MockServer::start().await;

        // Sequenced responses: a counter-backed GET handler.
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        let call = Arc::new(AtomicUsize::new(0));

        let call_clone = call.clone();
        Mock::given(method("GET"))
            .and(path("/api/testuser/groups/9"))
            .respond_with(move |_: &wiremock::Request| {
                let n = call_clone.fetch_add(1, Ordering::SeqCst);
                let active = n == 0; // first poll: true, subsequent: false
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"stream": {"active": active, "owner": "testuser"}}))
            })
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/api/testuser/groups/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"success": {"/groups/9/stream/active": true}}
            ])))
            .mount(&server)
            .await;

        let mut session = session_for(&server, 9).await;
        assert_eq!(session.stream_claim_state().await.unwrap(), StreamClaimState::ActiveOwnedByUs);
        session.release_then_reclaim().await.unwrap();
    }

    #[tokio::test]
    async fn active_claim_owned_by_someone_else_is_not_force_released() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/groups/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "stream": {"active": true, "owner": "someone-else"}
            })))
            .mount(&server)
            .await;

        let mut session = session_for(&server, 9).await;
        assert_eq!(session.stream_claim_state().await.unwrap(), StreamClaimState::ActiveOwnedByOther);
    }

    #[tokio::test]
    async fn inactive_group_has_no_claim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/testuser/groups/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "stream": {"active": false}
            })))
            .mount(&server)
            .await;

        let mut session = session_for(&server, 9).await;
        assert_eq!(session.stream_claim_state().await.unwrap(), StreamClaimState::Inactive);
    }

    #[tokio::test]
    async fn teardown_restores_each_lights_captured_state() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/api/testuser/lights/1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"success": {"/lights/1/state/on": true}}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/testuser/lights/2/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"success": {"/lights/2/state/on": false}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = session_for(&server, 0).await;
        let originals = vec![
            (1, serde_json::json!({"on": true, "xy": [0.4, 0.5], "bri": 200})),
            (2, serde_json::json!({"on": false})),
        ];
        session.restore_originals(&originals).await.unwrap();
    }
}
