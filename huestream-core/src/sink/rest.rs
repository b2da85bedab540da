//! REST Sink: diffs an RGB frame against the Light
//! Model and emits minimal PUTs through the Bridge Session.

use crate::bridge::BridgeSession;
use crate::color;
use crate::error::{Error, Result};
use crate::light::PhilipsHueLight;
use crate::sink::RgbFrame;

/// Per-frame tunables carried straight from [`crate::config::Config`].
pub struct RestSinkOptions {
    pub switch_off_on_black: bool,
    pub transition_time: u32,
    pub brightness_factor: f64,
    pub brightness_min: f64,
    pub brightness_max: f64,
}

/// Consumes RGB frames and PUTs only the fields that changed.
pub struct RestSink {
    options: RestSinkOptions,
}

impl RestSink {
    pub fn new(options: RestSinkOptions) -> Self {
        RestSink { options }
    }

    /// Diffs one frame against the Light Model and PUTs only what changed.
    /// `lights` is indexed by `led_index`; `frame[i]` corresponds to
    /// `lights[i]`. Frame channels are sRGB in `0..=255`.
    pub async fn write(
        &self,
        lights: &mut [PhilipsHueLight],
        frame: &RgbFrame,
        session: &mut BridgeSession,
    ) -> Result<()> {
        if lights.is_empty() {
            return Err(Error::NotReady);
        }
        if frame.len() < lights.len() {
            return Err(Error::Misconfigured);
        }

        for light in lights.iter_mut() {
            let (r, g, b) = frame[light.led_index];
            let xy = color::srgb_to_cie(r / 255.0, g / 255.0, b / 255.0, light.gamut());

            if self.options.switch_off_on_black && xy.bri == 0.0 {
                if let Some(body) = light.set_on(false) {
                    session.set_light_state(light.id, body).await?;
                }
                continue;
            }

            if let Some(body) = light.set_on(true) {
                session.set_light_state(light.id, body).await?;
            }
            if let Some(body) = light.set_transition_time(self.options.transition_time) {
                session.set_light_state(light.id, body).await?;
            }
            if let Some(body) = light.set_color(
                xy,
                false,
                self.options.brightness_factor,
                self.options.brightness_min,
                self.options.brightness_max,
            ) {
                session.set_light_state(light.id, body).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{BridgeLightState, BridgeLightValues};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn light(id: u32, led_index: usize, on: bool) -> PhilipsHueLight {
        let values = BridgeLightValues {
            state: BridgeLightState {
                on: Some(on),
                xy: if on { Some([0.4, 0.5]) } else { None },
                bri: if on { Some(200) } else { None },
                transitiontime: if on { Some(0) } else { None },
            },
        };
        PhilipsHueLight::create(id, "LCT001", "Lamp", &values, led_index).unwrap().0
    }

    fn default_options() -> RestSinkOptions {
        RestSinkOptions {
            switch_off_on_black: true,
            transition_time: 4,
            brightness_factor: 1.0,
            brightness_min: 0.0,
            brightness_max: 1.0,
        }
    }

    #[tokio::test]
    async fn empty_model_is_not_ready() {
        let server = MockServer::start().await;
        let mut session = BridgeSession::new(server.address().to_string().as_str(), "u", 1);
        let sink = RestSink::new(default_options());
        let result = sink.write(&mut [], &[], &mut session).await;
        assert!(matches!(result, Err(Error::NotReady)));
    }

    #[tokio::test]
    async fn short_frame_is_misconfigured() {
        let server = MockServer::start().await;
        let mut session = BridgeSession::new(server.address().to_string().as_str(), "u", 1);
        let sink = RestSink::new(default_options());
        let mut lights = vec![light(1, 0, false)];
        let result = sink.write(&mut lights, &[], &mut session).await;
        assert!(matches!(result, Err(Error::Misconfigured)));
    }

    #[tokio::test]
    async fn black_frame_switches_off_once() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/u/lights/1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"success": {"/lights/1/state/on": false}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut session = BridgeSession::new(server.address().to_string().as_str(), "u", 1);
        let sink = RestSink::new(default_options());
        let mut lights = vec![light(1, 0, true)];

        sink.write(&mut lights, &[(0.0, 0.0, 0.0)], &mut session).await.unwrap();
        // Second identical frame must issue zero PUTs (mock `.expect(1)` enforces this).
        sink.write(&mut lights, &[(0.0, 0.0, 0.0)], &mut session).await.unwrap();
    }

    #[tokio::test]
    async fn color_change_between_frames_puts_only_the_diff() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/u/lights/1/state"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"success": {"/lights/1/state/xy": [0.0, 0.0]}}
            ])))
            .mount(&server)
            .await;

        let mut session = BridgeSession::new(server.address().to_string().as_str(), "u", 1);
        let sink = RestSink::new(default_options());
        let mut lights = vec![light(1, 0, false)];

        // First frame: red, light was off — on, transitiontime and color all change.
        sink.write(&mut lights, &[(255.0, 0.0, 0.0)], &mut session).await.unwrap();
        assert!(lights[0].is_on());
        assert_eq!(lights[0].transition_time(), 4);
        let after_red = lights[0].color();

        // Second frame: green — only the color differs; on/transitiontime stay put.
        sink.write(&mut lights, &[(0.0, 255.0, 0.0)], &mut session).await.unwrap();
        assert_ne!(lights[0].color(), after_red);
        assert!(lights[0].is_on());
        assert_eq!(lights[0].transition_time(), 4);
    }
}
