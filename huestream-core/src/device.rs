//! The outward contract this crate offers a host LED harness:
//! `init`/`write`/`switchOn`/`switchOff`, plus the `enableStateChanged`
//! event. Glues the Bridge Session, the Light Model vector and whichever
//! Sink the configuration selects.

use crate::bridge::{BridgeSession, Enumeration, StreamClaimState};
use crate::config::Config;
use crate::error::{Error, Event, Result};
use crate::light::PhilipsHueLight;
use crate::sink::rest::{RestSink, RestSinkOptions};
use crate::sink::stream::{StreamSink, StreamSinkOptions};
use crate::sink::RgbFrame;
use crate::stream::StreamingEngine;
use std::sync::{Arc, Mutex};
use tracing::info;

enum Mode {
    Rest(RestSink),
    Stream(StreamSink),
}

/// A running Hue Entertainment device, bound to one bridge and one set of
/// lights.
pub struct HueDevice {
    config: Config,
    session: BridgeSession,
    lights: Arc<Mutex<Vec<PhilipsHueLight>>>,
    mode: Mode,
    engine: Option<StreamingEngine>,
    enabled: bool,
}

impl HueDevice {
    /// `init(config)`: connects, enumerates, builds the Light Model in LED
    /// order, and selects the REST or streaming variant based on `groupId`
    /// (0 disables the group/streaming path).
    pub async fn init(config: Config) -> Result<(Self, Vec<Event>)> {
        let mut session = BridgeSession::new(&config.output, &config.username, config.group_id);
        session.connect().await?;
        let enumeration = session.enumerate().await?;

        let streaming = config.group_id != 0;
        let ordered_ids = if streaming {
            ordered_group_member_ids(&enumeration, config.group_id)?
        } else {
            config.light_ids.clone()
        };

        let mut events = Vec::new();
        let mut lights = Vec::with_capacity(ordered_ids.len());

        for (led_index, id) in ordered_ids.iter().copied().enumerate() {
            let attrs = enumeration
                .lights
                .get(&id)
                .ok_or_else(|| Error::Config(format!("configured light id {id} not present on bridge")))?;

            let (light, event) =
                PhilipsHueLight::create(id, attrs.model_id.clone(), attrs.name.clone(), &attrs.values, led_index)?;
            if let Some(event) = event {
                events.push(event);
            }
            lights.push(light);
        }

        events.extend(config.out_of_range_light_ids());

        let mode = if streaming {
            Mode::Stream(StreamSink::new(StreamSinkOptions {
                brightness_factor: config.brightness_factor,
                brightness_min: config.brightness_min,
                brightness_max: config.brightness_max,
            }))
        } else {
            Mode::Rest(RestSink::new(RestSinkOptions {
                switch_off_on_black: config.switch_off_on_black,
                transition_time: config.transitiontime,
                brightness_factor: config.brightness_factor,
                brightness_min: config.brightness_min,
                brightness_max: config.brightness_max,
            }))
        };

        let device = HueDevice {
            config,
            session,
            lights: Arc::new(Mutex::new(lights)),
            mode,
            engine: None,
            enabled: false,
        };

        Ok((device, events))
    }

    /// `write(frame) -> 0 or negative error`. `frame[i]` is the sRGB
    /// triple (each channel `0..=255`) for the light whose `led_index == i`.
    pub async fn write(&mut self, frame: &RgbFrame) -> std::result::Result<i32, i32> {
        let result = match &self.mode {
            Mode::Rest(sink) => {
                // The REST variant never spawns a StreamingEngine, so the
                // model is uncontended here; take it out of the mutex for
                // the duration of the await (a guard cannot be held across
                // one) and put it back when done.
                let mut lights = std::mem::take(&mut *self.lights.lock().expect("light model mutex poisoned"));
                let result = sink.write(&mut lights, frame, &mut self.session).await;
                *self.lights.lock().expect("light model mutex poisoned") = lights;
                result
            }
            Mode::Stream(sink) => {
                let mut guard = self.lights.lock().expect("light model mutex poisoned");
                sink.write(&mut guard, frame)
            }
        };

        result.map(|()| 0).map_err(|e| e.as_status_code())
    }

    /// `switchOn() -> 0`: for the streaming variant, claims the
    /// entertainment group and spawns the Streaming Engine worker. Only a
    /// claim this session itself owns from a prior run is released and
    /// reclaimed; a group already active under a different owner is left
    /// alone and goes through the normal claim path instead.
    pub async fn switch_on(&mut self) -> Result<Event> {
        if let Mode::Stream(_) = &self.mode {
            match self.session.stream_claim_state().await? {
                StreamClaimState::ActiveOwnedByUs => {
                    self.session.release_then_reclaim().await?;
                }
                StreamClaimState::ActiveOwnedByOther | StreamClaimState::Inactive => {
                    self.session.set_stream_group_active(true, true).await?;
                }
            }

            let lights = self.lights.clone();
            let psk = crate::config::decode_psk(&self.config.clientkey)?;
            let address = self.config.output.clone();
            let username = self.config.username.clone();
            let stream_frequency = self.config.stream_frequency;

            info!(address = %address, stream_frequency, "starting streaming engine");
            self.engine = Some(StreamingEngine::spawn(address, username, psk, lights, stream_frequency, || {
                info!("streaming engine worker exited");
            }));
        }

        self.enabled = true;
        Ok(Event::EnableStateChanged(true))
    }

    /// `switchOff() -> 0`: stops the Streaming Engine (if running),
    /// deactivates the entertainment group, and restores every light's
    /// captured original state.
    pub async fn switch_off(&mut self) -> Result<Event> {
        if let Some(engine) = self.engine.take() {
            engine.stop();
        }

        if let Mode::Stream(_) = &self.mode {
            self.session.set_stream_group_active(false, false).await?;
        }

        let originals: Vec<(u32, serde_json::Value)> = {
            let guard = self.lights.lock().expect("light model mutex poisoned");
            guard
                .iter()
                .map(|l| (l.id, serde_json::to_value(l.original_state()).expect("OriginalState always serializes")))
                .collect()
        };
        self.session.restore_originals(&originals).await?;

        self.enabled = false;
        Ok(Event::EnableStateChanged(false))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

fn ordered_group_member_ids(enumeration: &Enumeration, group_id: u32) -> Result<Vec<u32>> {
    enumeration
        .groups
        .get(&group_id)
        .map(|g| g.light_ids.clone())
        .ok_or_else(|| Error::Config(format!("configured group id {group_id} not present on bridge")))
}
