//! Stream Sink: diffs an RGB frame against the Light Model and updates
//! `color` in place — no PUT is emitted, the Streaming Engine reads the
//! updated values on its own cadence.

use crate::color;
use crate::error::{Error, Result};
use crate::light::PhilipsHueLight;
use crate::sink::RgbFrame;

pub struct StreamSinkOptions {
    pub brightness_factor: f64,
    pub brightness_min: f64,
    pub brightness_max: f64,
}

pub struct StreamSink {
    options: StreamSinkOptions,
}

impl StreamSink {
    pub fn new(options: StreamSinkOptions) -> Self {
        StreamSink { options }
    }

    /// Resolves each light's xy+brightness from its RGB sample, then calls
    /// `setColor(xy, true, ...)` instead of issuing a PUT. Frame channels
    /// are sRGB in `0..=255`.
    pub fn write(&self, lights: &mut [PhilipsHueLight], frame: &RgbFrame) -> Result<()> {
        if lights.is_empty() {
            return Err(Error::NotReady);
        }
        if frame.len() < lights.len() {
            return Err(Error::Misconfigured);
        }

        for light in lights.iter_mut() {
            let (r, g, b) = frame[light.led_index];
            let xy = color::srgb_to_cie(r / 255.0, g / 255.0, b / 255.0, light.gamut());
            light.set_color(xy, true, self.options.brightness_factor, self.options.brightness_min, self.options.brightness_max);
        }

        Ok(())
    }
}
