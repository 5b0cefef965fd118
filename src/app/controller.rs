use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use super::telemetry::EventLog;
use super::Logger;
use crate::dispatch::{decide, Intent};
use crate::gpio::InputSampler;
use crate::supervisor::{Launcher, PlaybackState, Supervisor};

/// What the controller did in response to one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    None,
    RequestedShutdown,
    StartedViewer,
    StartedPlayer {
        stopped_viewer: bool,
        stopped_player: bool,
    },
    /// The running children were stopped but the player did not spawn.
    PlayerFailed {
        stopped_viewer: bool,
        stopped_player: bool,
    },
}

/// Outcome of applying one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub intent: Intent,
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub action: Action,
}

/// Where the video files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLibrary {
    pub video_dir: PathBuf,
    pub video_extension: String,
}

/// Sample → decide → act, once per cycle.
///
/// Mutual exclusion between viewer and player is kept here: whatever is running
/// is stopped before the player starts, and the viewer only starts when neither
/// role reports running.
pub struct Controller<S: InputSampler, L: Launcher> {
    sampler: S,
    supervisor: Supervisor<L>,
    library: VideoLibrary,
    logger: Logger,
    events: EventLog,
    cycles: u64,
    shutdown_requests: u64,
}

impl<S: InputSampler, L: Launcher> Controller<S, L> {
    pub fn new(sampler: S, supervisor: Supervisor<L>, library: VideoLibrary, logger: Logger) -> Self {
        Self {
            sampler,
            supervisor,
            library,
            logger,
            events: EventLog::disabled(),
            cycles: 0,
            shutdown_requests: 0,
        }
    }

    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn supervisor_mut(&mut self) -> &mut Supervisor<L> {
        &mut self.supervisor
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn shutdown_requests(&self) -> u64 {
        self.shutdown_requests
    }

    /// Read the buttons once and act on the result.
    pub fn poll_once(&mut self) -> Transition {
        let samples = self.sampler.sample();
        let intent = decide(&samples);
        self.apply(intent)
    }

    pub fn apply(&mut self, intent: Intent) -> Transition {
        self.cycles += 1;
        let from = self.supervisor.playback();

        let action = match intent {
            Intent::Shutdown => {
                // Fire and forget; polling continues until the OS takes us down.
                self.supervisor.request_shutdown();
                self.shutdown_requests += 1;
                Action::RequestedShutdown
            }
            Intent::PlayVideo(video) => {
                let stopped_viewer = self.supervisor.is_idle_viewer_running();
                if stopped_viewer {
                    self.supervisor.stop_idle_viewer();
                }
                let stopped_player = self.supervisor.is_video_player_running();
                if stopped_player {
                    self.supervisor.stop_video_player();
                }
                // No same-video short-circuit: a held button restarts the player every cycle.
                let path = video.path_in(&self.library.video_dir, &self.library.video_extension);
                if self.supervisor.start_video_player(video, &path) {
                    Action::StartedPlayer {
                        stopped_viewer,
                        stopped_player,
                    }
                } else {
                    Action::PlayerFailed {
                        stopped_viewer,
                        stopped_player,
                    }
                }
            }
            Intent::Idle => {
                let idle = !self.supervisor.is_idle_viewer_running()
                    && !self.supervisor.is_video_player_running();
                // A viewer that cannot spawn is retried every cycle but reported as a no-op.
                if idle && self.supervisor.start_idle_viewer() {
                    Action::StartedViewer
                } else {
                    Action::None
                }
            }
        };

        let to = self.supervisor.playback();
        let transition = Transition {
            intent,
            from,
            to,
            action,
        };
        if action != Action::None {
            self.logger
                .debug(format!("{intent}: {from} -> {to} ({action:?})"));
            if let Err(err) = self.events.record(&transition) {
                self.logger.warn(format!("event log write failed: {err}"));
            }
        }
        transition
    }

    /// Poll until `running` clears. A zero interval busy-polls.
    pub fn run(&mut self, running: &AtomicBool, poll_interval: Duration) {
        while running.load(Ordering::SeqCst) {
            self.supervisor.reap_detached();
            self.poll_once();
            if !poll_interval.is_zero() {
                thread::sleep(poll_interval);
            }
        }
    }

    /// Stop whatever is playing and give the pins back.
    pub fn shutdown(&mut self) {
        self.supervisor.stop_all();
        self.sampler.release();
        self.logger.info(format!(
            "controller stopped after {} cycles ({} shutdown requests)",
            self.cycles, self.shutdown_requests
        ));
    }
}
