//! The Streaming Engine worker: a dedicated OS thread that runs the
//! DTLS-PSK session, paces frames at `streamFrequency` Hz, and carries its
//! own bounded timeout-retry budget independent of the control task.
//!
//! A tick loop racing a deadline against a stop signal, reading the shared
//! Light Model vector directly under a mutex each tick rather than being
//! fed frames over a channel.

use crate::light::PhilipsHueLight;
use crate::stream::dtls::{HueStreamer, StreamWriteError};
use crate::stream::protocol::{self, FrameLight};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Timeout-retry budget for one streaming session.
const INITIAL_RETRY_BUDGET: u32 = 5;

/// Signal sent to the worker thread to request a graceful stop.
enum Command {
    Stop,
}

/// Handle to a running Streaming Engine worker thread.
pub struct StreamingEngine {
    command_tx: std::sync::mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl StreamingEngine {
    /// Spawns the worker thread: connects the DTLS session, then loops
    /// ticking at `config.stream_frequency` Hz until stopped or the retry
    /// budget is exhausted.
    pub fn spawn(
        address: String,
        username: String,
        psk: Vec<u8>,
        lights: Arc<Mutex<Vec<PhilipsHueLight>>>,
        stream_frequency: u32,
        on_teardown: impl FnOnce() + Send + 'static,
    ) -> Self {
        let (command_tx, command_rx) = std::sync::mpsc::channel();

        let handle = thread::spawn(move || {
            let streamer = match HueStreamer::connect(&address, &username, &psk) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "streaming engine failed to establish DTLS session");
                    on_teardown();
                    return;
                }
            };

            run_tick_loop(streamer, lights, stream_frequency, &command_rx);
            on_teardown();
        });

        StreamingEngine { command_tx, handle: Some(handle) }
    }

    /// Requests the worker stop after its current tick and joins it.
    pub fn stop(mut self) {
        let _ = self.command_tx.send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_tick_loop(
    mut streamer: HueStreamer,
    lights: Arc<Mutex<Vec<PhilipsHueLight>>>,
    stream_frequency: u32,
    command_rx: &std::sync::mpsc::Receiver<Command>,
) {
    let tick_budget_ms = tick_budget_ms(stream_frequency);
    let mut retry_budget = INITIAL_RETRY_BUDGET;

    loop {
        if matches!(command_rx.try_recv(), Ok(Command::Stop)) {
            break;
        }

        let tick_start = Instant::now();

        // Critical section: read colors into the frame buffer and write,
        // so the control task cannot resize the Light Model mid-encode.
        let frame = {
            let guard = lights.lock().expect("light model mutex poisoned");
            let frame_lights: Vec<FrameLight> =
                guard.iter().map(|l| FrameLight { id: l.id, color: l.color() }).collect();
            protocol::build_frame(&frame_lights)
        };

        match streamer.write_all(&frame) {
            Ok(()) => {
                retry_budget = INITIAL_RETRY_BUDGET;
            }
            Err(StreamWriteError::Timeout) => {
                warn!(retry_budget, "streaming engine write timed out");
                if retry_budget == 0 {
                    info!("streaming engine retry budget exhausted, terminating");
                    break;
                }
                retry_budget -= 1;
                continue;
            }
            Err(StreamWriteError::PeerCloseNotify) => {
                info!("peer sent close-notify, tearing down stream");
                break;
            }
            Err(StreamWriteError::Other(msg)) => {
                warn!(error = %msg, "streaming engine write failed fatally, terminating");
                break;
            }
        }

        let elapsed_ms = tick_start.elapsed().as_millis() as u64;
        let sleep_ms = tick_budget_ms.saturating_sub(elapsed_ms);
        if sleep_ms > 0 {
            thread::sleep(Duration::from_millis(sleep_ms));
        }
    }

    let _ = streamer.shutdown();
}

/// Milliseconds per tick at `stream_frequency` Hz, floored at 1 Hz.
fn tick_budget_ms(stream_frequency: u32) -> u64 {
    1000 / stream_frequency.max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_budget_matches_default_50hz() {
        assert_eq!(tick_budget_ms(50), 20);
    }

    #[test]
    fn tick_budget_scales_with_frequency() {
        assert_eq!(tick_budget_ms(25), 40);
    }
}
