use anyhow::{Context, Result};
use clap::Parser;
use huestream_core::{Config, Event, HueDevice};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

/// Minimal reference harness for huestream-core: loads a config file,
/// brings a device up, feeds it a demo color-cycle pattern, and tears it
/// down cleanly on Ctrl+C. Real ambient-light renderers live elsewhere and
/// talk to the core through the same `write()` call this harness uses.
#[derive(Parser)]
#[command(name = "huestream-cli")]
#[command(about = "Reference harness for huestream-core", long_about = None)]
struct Cli {
    /// Path to a JSON config file (see huestream-core::Config).
    #[arg(short, long, default_value = "huestream.json")]
    config: PathBuf,

    /// Number of frame slots in the demo pattern. Extra slots beyond the
    /// configured lights are harmless; `write()` only reads what it needs.
    #[arg(long, default_value_t = 16)]
    channels: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("reading config file {}", cli.config.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw).context("config file is not valid JSON")?;
    let config = Config::parse(value).context("invalid configuration")?;

    let (mut device, events) = HueDevice::init(config).await.context("failed to initialize device")?;
    for event in events {
        log_event(&event);
    }

    let event = device.switch_on().await.context("failed to switch device on")?;
    log_event(&event);

    info!("streaming demo pattern, press Ctrl+C to stop");
    let result = run_demo_loop(&mut device, cli.channels).await;

    let event = device.switch_off().await.context("failed to switch device off")?;
    log_event(&event);

    result
}

fn log_event(event: &Event) {
    match event {
        Event::EnableStateChanged(on) => info!(on, "enable state changed"),
        Event::UnknownModel(model) => tracing::warn!(model, "light reported an unrecognized model id"),
        Event::LightIdOutOfRange(id) => tracing::warn!(id, "configured light id exceeds the stream frame's 1-byte range"),
        Event::StreamActiveChanged(active) => info!(active, "entertainment group stream flag changed"),
    }
}

/// A slow hue rotation shared across every channel, offset per channel so
/// the strip visibly chases rather than flashing in lockstep.
async fn run_demo_loop(device: &mut HueDevice, channels: usize) -> Result<()> {
    let mut ticker = interval(Duration::from_millis(50));
    let mut phase: f64 = 0.0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }

        let frame: Vec<(f64, f64, f64)> = (0..channels)
            .map(|i| {
                let offset = phase + i as f64 * (std::f64::consts::TAU / channels.max(1) as f64);
                hue_to_rgb255(offset)
            })
            .collect();

        if let Err(status) = device.write(&frame).await {
            tracing::warn!(status, "frame write failed");
        }

        phase += 0.05;
    }
}

fn hue_to_rgb255(hue_radians: f64) -> (f64, f64, f64) {
    let hue = hue_radians.rem_euclid(std::f64::consts::TAU) / std::f64::consts::TAU;
    let (r, g, b) = hsv_to_rgb(hue, 1.0, 1.0);
    (r * 255.0, g * 255.0, b * 255.0)
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
