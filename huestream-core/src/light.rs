//! Per-bulb state.

use crate::color::{self, CiColor, CiColorTriangle};
use crate::error::{Error, Event, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON shape a bridge `GET /lights` entry carries under `state`, to the
/// extent this crate consumes it.
#[derive(Debug, Deserialize)]
pub struct BridgeLightState {
    pub on: Option<bool>,
    pub xy: Option<[f64; 2]>,
    pub bri: Option<u32>,
    pub transitiontime: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct BridgeLightValues {
    pub state: BridgeLightState,
}

/// Snapshot of a light's state captured at session start, replayed verbatim
/// on teardown. Carries at minimum `on`; `xy`/`bri`/`transitiontime` are only
/// present when the light was on at capture time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OriginalState {
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u32>,
}

/// `Unbound -> Created -> Live -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightLifecycle {
    Created,
    Live,
    Closed,
}

/// One bulb: its bridge identity, gamut, current and captured state.
#[derive(Debug, Clone)]
pub struct PhilipsHueLight {
    pub id: u32,
    pub led_index: usize,
    pub model_id: String,
    pub name: String,
    gamut: CiColorTriangle,
    on: bool,
    transition_time: u32,
    color: CiColor,
    original_state: OriginalState,
    lifecycle: LightLifecycle,
}

impl PhilipsHueLight {
    /// Constructs a light from bridge-reported attributes, resolving its
    /// gamut from `model_id` and capturing `original_state` from
    /// `bridge_values.state`.
    ///
    /// Fails with [`Error::Config`] if `state.on` is absent — spec requires
    /// this field at minimum. Returns an [`Event::UnknownModel`] alongside a
    /// successful construction when `model_id` matches none of the three
    /// gamut membership sets.
    pub fn create(
        id: u32,
        model_id: impl Into<String>,
        name: impl Into<String>,
        bridge_values: &BridgeLightValues,
        led_index: usize,
    ) -> Result<(Self, Option<Event>)> {
        let model_id = model_id.into();
        let on = bridge_values
            .state
            .on
            .ok_or_else(|| Error::Config(format!("light {id}: state.on missing")))?;

        let (gamut, unknown_event) = match color::gamut_for_model(&model_id) {
            Some(g) => (g, None),
            None => (color::GAMUT_UNKNOWN, Some(Event::UnknownModel(model_id.clone()))),
        };

        let original_state = if on {
            OriginalState {
                on,
                xy: bridge_values.state.xy,
                bri: bridge_values.state.bri.map(|b| b as f64 / 254.0),
                transitiontime: bridge_values.state.transitiontime,
            }
        } else {
            OriginalState { on, xy: None, bri: None, transitiontime: None }
        };

        let light = PhilipsHueLight {
            id,
            led_index,
            model_id,
            name: name.into(),
            gamut,
            on,
            transition_time: bridge_values.state.transitiontime.unwrap_or(0),
            color: gamut.color_black(),
            original_state,
            lifecycle: LightLifecycle::Created,
        };

        Ok((light, unknown_event))
    }

    pub fn gamut(&self) -> &CiColorTriangle {
        &self.gamut
    }

    pub fn color_black(&self) -> CiColor {
        self.gamut.color_black()
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn color(&self) -> CiColor {
        self.color
    }

    pub fn transition_time(&self) -> u32 {
        self.transition_time
    }

    pub fn original_state(&self) -> &OriginalState {
        &self.original_state
    }

    pub fn lifecycle(&self) -> LightLifecycle {
        self.lifecycle
    }

    pub fn mark_live(&mut self) {
        self.lifecycle = LightLifecycle::Live;
    }

    pub fn mark_closed(&mut self) {
        self.lifecycle = LightLifecycle::Closed;
    }

    /// Refreshes `original_state` from fresh bridge values, used by the
    /// streaming path when resuming after a disable/enable cycle.
    pub fn refresh_original_state(&mut self, bridge_values: &BridgeLightValues) {
        let on = bridge_values.state.on.unwrap_or(self.original_state.on);
        self.original_state = if on {
            OriginalState {
                on,
                xy: bridge_values.state.xy,
                bri: bridge_values.state.bri.map(|b| b as f64 / 254.0),
                transitiontime: bridge_values.state.transitiontime,
            }
        } else {
            OriginalState { on, xy: None, bri: None, transitiontime: None }
        };
    }

    /// Emits `{"on": bool}` only when the value actually changes.
    pub fn set_on(&mut self, on: bool) -> Option<Value> {
        if self.on == on {
            return None;
        }
        self.on = on;
        Some(serde_json::json!({ "on": on }))
    }

    /// Emits `{"transitiontime": u}` only when the value actually changes.
    pub fn set_transition_time(&mut self, centiseconds: u32) -> Option<Value> {
        if self.transition_time == centiseconds {
            return None;
        }
        self.transition_time = centiseconds;
        Some(serde_json::json!({ "transitiontime": centiseconds }))
    }

    /// Applies brightness shaping `bri <- clamp(factor * bri, min, max)`
    /// (itself further clamped to `[0,1]`), updates `self.color`, and — when
    /// `is_stream` is false — returns the REST PUT body `{xy, bri}` with
    /// `bri` mapped to `0..254` and floored to `>= 1` unless the input
    /// brightness was exactly 0.
    ///
    /// When `is_stream` is true, no PUT body is produced; the caller (the
    /// Streaming Engine) reads `self.color` directly on its own cadence.
    pub fn set_color(
        &mut self,
        mut c: CiColor,
        is_stream: bool,
        factor: f64,
        min: f64,
        max: f64,
    ) -> Option<Value> {
        let shaped_bri = (factor * c.bri).clamp(min, max).clamp(0.0, 1.0);
        c.bri = shaped_bri;

        if c == self.color {
            return None;
        }
        self.color = c;

        if is_stream {
            return None;
        }

        let bri_254 = if c.bri <= 0.0 {
            0
        } else {
            (c.bri * 254.0).floor().max(1.0) as u32
        };

        Some(serde_json::json!({ "xy": [c.x, c.y], "bri": bri_254 }))
    }
}
