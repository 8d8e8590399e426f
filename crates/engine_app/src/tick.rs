//! Frame loop.
//!
//! Every frame:
//!
//! 1. Advance simulation time by the real frame time scaled by `time_scale`.
//! 2. Emit a `TickMessage` to every subscribed system.
//! 3. Flush queued messages that are due at the new simulation time.
//! 4. Emit an `EndOfFrameMessage`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use engine_message::{FrameTime, Message};
use engine_system::EntityManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for the frame loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target frames per second.
    pub tick_rate: f64,
    /// Maximum number of frames to run (0 = unlimited).
    pub max_frames: u64,
    /// Simulation seconds per real second.
    pub time_scale: f64,
    /// Sleep between frames to hold the tick rate.
    pub realtime: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_frames: 0,
            time_scale: 1.0,
            realtime: true,
        }
    }
}

/// Emit the tick message for one frame, flush the queued messages due at the
/// frame's simulation time, then emit the end-of-frame message.
///
/// Returns the number of handlers the tick message reached.
pub fn emit_tick_messages(manager: &EntityManager, time: &FrameTime) -> usize {
    let delivered = manager.emit_message(&Message::tick(time));
    let flushed = manager.emit_queued_messages(time.simulation_time);
    manager.emit_message(&Message::end_of_frame(time));
    debug!(
        frame = time.frame,
        simulation_time = time.simulation_time,
        delivered,
        flushed,
        "frame"
    );
    delivered
}

/// Drives an [`EntityManager`] at a fixed frame rate.
#[derive(Debug)]
pub struct FrameLoop {
    manager: Arc<EntityManager>,
    config: TickConfig,
    frame: u64,
    simulation_time: f64,
}

impl FrameLoop {
    /// Create a frame loop for `manager`.
    #[must_use]
    pub fn new(manager: Arc<EntityManager>, config: TickConfig) -> Self {
        Self {
            manager,
            config,
            frame: 0,
            simulation_time: 0.0,
        }
    }

    /// Returns the number of frames run so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Returns the current simulation time in seconds.
    #[must_use]
    pub fn simulation_time(&self) -> f64 {
        self.simulation_time
    }

    /// Run one frame that took `delta_real` seconds of real time.
    pub fn step(&mut self, delta_real: f64) {
        let delta_sim_time = delta_real * self.config.time_scale;
        self.simulation_time += delta_sim_time;
        self.frame += 1;
        emit_tick_messages(
            &self.manager,
            &FrameTime {
                delta_sim_time,
                delta_real_time: delta_real,
                simulation_time: self.simulation_time,
                time_scale: self.config.time_scale,
                frame: self.frame,
            },
        );
    }

    /// Run frames until `max_frames` is reached, or forever.
    pub fn run(&mut self) {
        let frame_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);

        info!(
            tick_rate = self.config.tick_rate,
            max_frames = self.config.max_frames,
            time_scale = self.config.time_scale,
            "starting frame loop"
        );

        loop {
            let start = Instant::now();
            self.step(frame_duration.as_secs_f64());

            if self.config.max_frames > 0 && self.frame >= self.config.max_frames {
                info!(
                    frames = self.frame,
                    simulation_time = self.simulation_time,
                    "frame loop complete"
                );
                break;
            }

            if !self.config.realtime {
                continue;
            }
            let elapsed = start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            } else {
                warn!(
                    frame = self.frame,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = frame_duration.as_millis() as u64,
                    "frame exceeded time budget"
                );
            }
        }
    }
}
