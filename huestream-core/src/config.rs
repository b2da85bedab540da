//! The configuration object this core consumes. Unknown keys are
//! ignored — callers may layer their own keys into the same document.

use crate::error::Error;
use serde::Deserialize;

fn default_group_id() -> u32 {
    0
}

fn default_transitiontime() -> u32 {
    0
}

fn default_switch_off_on_black() -> bool {
    true
}

fn default_brightness_factor() -> f64 {
    1.0
}

fn default_brightness_min() -> f64 {
    0.0
}

fn default_brightness_max() -> f64 {
    1.0
}

fn default_stream_frequency() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub output: String,
    pub username: String,
    pub clientkey: String,
    #[serde(default = "default_group_id", rename = "groupId")]
    pub group_id: u32,
    #[serde(default, rename = "lightIds")]
    pub light_ids: Vec<u32>,
    #[serde(default = "default_transitiontime")]
    pub transitiontime: u32,
    #[serde(default = "default_switch_off_on_black", rename = "switchOffOnBlack")]
    pub switch_off_on_black: bool,
    #[serde(default = "default_brightness_factor", rename = "brightnessFactor")]
    pub brightness_factor: f64,
    #[serde(default = "default_brightness_min", rename = "brightnessMin")]
    pub brightness_min: f64,
    #[serde(default = "default_brightness_max", rename = "brightnessMax")]
    pub brightness_max: f64,
    #[serde(default = "default_stream_frequency", rename = "streamFrequency")]
    pub stream_frequency: u32,
}

/// `100ms * N` — the REST variant's aggregate rate budget.
pub fn rest_latch_time_ms(num_lights: usize) -> u64 {
    100 * num_lights as u64
}

/// Decoded PSK bytes for the DTLS-PSK handshake.
pub fn decode_psk(clientkey_hex: &str) -> Result<Vec<u8>, Error> {
    hex::decode(clientkey_hex).map_err(|e| Error::Config(format!("invalid clientkey hex: {e}")))
}

impl Config {
    pub fn parse(value: serde_json::Value) -> Result<Self, Error> {
        let cfg: Config = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("invalid configuration: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.output.is_empty() {
            return Err(Error::Config("missing `output` (bridge address)".into()));
        }
        if self.username.is_empty() {
            return Err(Error::Config("missing `username`".into()));
        }
        if self.clientkey.is_empty() {
            return Err(Error::Config("missing `clientkey`".into()));
        }
        decode_psk(&self.clientkey)?;

        for &id in &self.light_ids {
            if id > 255 {
                tracing::warn!(light_id = id, "configured light id exceeds 255, stream frame will truncate it");
            }
        }

        Ok(())
    }

    /// Surfaces [`crate::error::Event::LightIdOutOfRange`] for any configured
    /// id that would silently truncate in the 1-byte stream frame field.
    pub fn out_of_range_light_ids(&self) -> Vec<crate::error::Event> {
        self.light_ids
            .iter()
            .filter(|&&id| id > 255)
            .map(|&id| crate::error::Event::LightIdOutOfRange(id))
            .collect()
    }
}
