//! Ownership of the two foreground child processes (idle viewer, video player)
//! plus the fire-and-forget shutdown command.
//!
//! The supervisor never stops one role on behalf of the other; the controller
//! loop stops whatever is running before it starts something new.

use crate::app::Logger;
use crate::dispatch::VideoId;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod fake;
mod process;

pub use process::SystemLauncher;

/// Program plus fixed arguments; the per-launch path is appended last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Everything needed to spawn one child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Pipe stdin so the child can be sent a quit key later.
    pub control_input: bool,
}

/// A spawned child as seen by the supervisor.
pub trait ChildProcess {
    fn id(&self) -> u32;

    /// Non-blocking status poll: `None` while running, `Some(code)` once exited.
    /// Death by signal reports the negated signal number.
    fn exit_code(&mut self) -> io::Result<Option<i32>>;

    /// Write the quit key to the control input.
    fn send_quit(&mut self) -> io::Result<()>;

    /// Ask the child to terminate (SIGTERM).
    fn terminate(&mut self) -> io::Result<()>;

    /// Wait for exit. `None` waits without bound; on timeout returns `Ok(None)`.
    fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Option<i32>>;

    /// Forcefully kill (SIGKILL) and reap.
    fn kill(&mut self) -> io::Result<()>;
}

/// Spawns children; the seam between the supervisor and the OS.
pub trait Launcher {
    fn launch(&mut self, spec: &LaunchSpec) -> io::Result<Box<dyn ChildProcess>>;
}

/// Running check: anything other than a clean exit code 0 counts as alive, so
/// a child that exited non-zero still reads as running. The strict check is
/// `exit_code.is_none()`.
pub fn is_alive_quirky(exit_code: Option<i32>) -> bool {
    exit_code != Some(0)
}

/// What is currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "video")]
pub enum PlaybackState {
    Nothing,
    ShowingIdleImage,
    PlayingVideo(VideoId),
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Nothing => f.write_str("nothing"),
            PlaybackState::ShowingIdleImage => f.write_str("idle image"),
            PlaybackState::PlayingVideo(id) => write!(f, "video {id}"),
        }
    }
}

/// Static settings the supervisor needs to build command lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub viewer: CommandLine,
    pub player: CommandLine,
    pub shutdown: CommandLine,
    pub title_image: PathBuf,
    /// Bound on the wait after SIGTERM before escalating to SIGKILL; `None` waits forever.
    pub stop_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Viewer,
    Player,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "idle viewer",
            Role::Player => "video player",
        }
    }
}

struct Slot {
    child: Box<dyn ChildProcess>,
    video: Option<VideoId>,
}

/// Owns both foreground handles plus any detached shutdown commands.
pub struct Supervisor<L: Launcher> {
    launcher: L,
    config: SupervisorConfig,
    logger: Logger,
    viewer: Option<Slot>,
    player: Option<Slot>,
    // Set after a failed spawn; cleared by the next successful one.
    viewer_failing: bool,
    player_failing: bool,
    detached: Vec<Box<dyn ChildProcess>>,
}

impl<L: Launcher> Supervisor<L> {
    pub fn new(launcher: L, config: SupervisorConfig, logger: Logger) -> Self {
        Self {
            launcher,
            config,
            logger,
            viewer: None,
            player: None,
            viewer_failing: false,
            player_failing: false,
            detached: Vec::new(),
        }
    }

    /// Returns whether the viewer was spawned.
    pub fn start_idle_viewer(&mut self) -> bool {
        let mut args = self.config.viewer.args.clone();
        args.push(path_arg(&self.config.title_image));
        let spec = LaunchSpec {
            program: self.config.viewer.program.clone(),
            args,
            control_input: false,
        };
        self.start(Role::Viewer, spec, None)
    }

    pub fn is_idle_viewer_running(&mut self) -> bool {
        self.is_running(Role::Viewer)
    }

    pub fn stop_idle_viewer(&mut self) {
        self.stop(Role::Viewer);
    }

    /// Returns whether the player was spawned.
    pub fn start_video_player(&mut self, video: VideoId, path: &Path) -> bool {
        let mut args = self.config.player.args.clone();
        args.push(path_arg(path));
        let spec = LaunchSpec {
            program: self.config.player.program.clone(),
            args,
            control_input: true,
        };
        self.start(Role::Player, spec, Some(video))
    }

    pub fn is_video_player_running(&mut self) -> bool {
        self.is_running(Role::Player)
    }

    pub fn stop_video_player(&mut self) {
        self.stop(Role::Player);
    }

    /// Stop both roles; used on the way out.
    pub fn stop_all(&mut self) {
        self.stop(Role::Player);
        self.stop(Role::Viewer);
    }

    pub fn playback(&mut self) -> PlaybackState {
        if self.is_video_player_running() {
            if let Some(video) = self.player.as_ref().and_then(|slot| slot.video) {
                return PlaybackState::PlayingVideo(video);
            }
        }
        if self.is_idle_viewer_running() {
            return PlaybackState::ShowingIdleImage;
        }
        PlaybackState::Nothing
    }

    /// Launch the halt command and return immediately; the child is reaped later.
    pub fn request_shutdown(&mut self) {
        let spec = LaunchSpec {
            program: self.config.shutdown.program.clone(),
            args: self.config.shutdown.args.clone(),
            control_input: false,
        };
        match self.launcher.launch(&spec) {
            Ok(child) => {
                self.logger.info(format!(
                    "shutdown requested: {} {} (pid {})",
                    spec.program,
                    spec.args.join(" "),
                    child.id()
                ));
                self.detached.push(child);
            }
            Err(err) => {
                self.logger
                    .warn(format!("shutdown command {} failed to start: {err}", spec.program));
            }
        }
    }

    /// Collect exited shutdown commands so they do not linger as zombies.
    pub fn reap_detached(&mut self) {
        self.detached
            .retain_mut(|child| matches!(child.exit_code(), Ok(None)));
    }

    pub fn detached_count(&self) -> usize {
        self.detached.len()
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<Slot> {
        match role {
            Role::Viewer => &mut self.viewer,
            Role::Player => &mut self.player,
        }
    }

    fn failing_mut(&mut self, role: Role) -> &mut bool {
        match role {
            Role::Viewer => &mut self.viewer_failing,
            Role::Player => &mut self.player_failing,
        }
    }

    fn start(&mut self, role: Role, spec: LaunchSpec, video: Option<VideoId>) -> bool {
        if self.slot_mut(role).is_some() {
            self.logger
                .debug(format!("{}: replacing previous handle", role.as_str()));
        }
        match self.launcher.launch(&spec) {
            Ok(child) => {
                self.logger.info(format!(
                    "{} started: {} {} (pid {})",
                    role.as_str(),
                    spec.program,
                    spec.args.join(" "),
                    child.id()
                ));
                *self.slot_mut(role) = Some(Slot { child, video });
                *self.failing_mut(role) = false;
                true
            }
            Err(err) => {
                // Left empty so the next cycle tries again. Only the first
                // failure in a row is a warning.
                let msg = format!("{} failed to start ({}): {err}", role.as_str(), spec.program);
                if std::mem::replace(self.failing_mut(role), true) {
                    self.logger.debug(msg);
                } else {
                    self.logger.warn(format!("{msg}; retrying quietly"));
                }
                *self.slot_mut(role) = None;
                false
            }
        }
    }

    fn is_running(&mut self, role: Role) -> bool {
        let Some(slot) = self.slot_mut(role).as_mut() else {
            return false;
        };
        match slot.child.exit_code() {
            Ok(code) => is_alive_quirky(code),
            Err(_) => false,
        }
    }

    fn stop(&mut self, role: Role) {
        let Some(mut slot) = self.slot_mut(role).take() else {
            return;
        };
        let logger = &self.logger;
        let name = role.as_str();
        let pid = slot.child.id();

        if let Err(err) = slot.child.send_quit() {
            logger.debug(format!("{name} (pid {pid}): quit key not delivered: {err}"));
        }
        if let Err(err) = slot.child.terminate() {
            logger.debug(format!("{name} (pid {pid}): terminate failed: {err}"));
        }
        match slot.child.wait(self.config.stop_timeout) {
            Ok(Some(code)) => logger.debug(format!("{name} (pid {pid}) exited with {code}")),
            Ok(None) => {
                logger.warn(format!(
                    "{name} (pid {pid}) ignored terminate; killing"
                ));
                if let Err(err) = slot.child.kill() {
                    logger.debug(format!("{name} (pid {pid}): kill failed: {err}"));
                }
            }
            Err(err) => logger.debug(format!("{name} (pid {pid}): wait failed: {err}")),
        }
        logger.info(format!("{name} stopped"));
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeAction, FakeLauncher};
    use super::*;
    use crate::app::LogLevel;

    fn config() -> SupervisorConfig {
        SupervisorConfig {
            viewer: CommandLine::new("fbi", &["--noverbose"]),
            player: CommandLine::new("omxplayer", &["-b"]),
            shutdown: CommandLine::new("sudo", &["halt"]),
            title_image: PathBuf::from("/home/pi/Pictures/title.jpg"),
            stop_timeout: Some(Duration::from_secs(2)),
        }
    }

    fn supervisor() -> (Supervisor<FakeLauncher>, FakeLauncher) {
        let launcher = FakeLauncher::new();
        let sup = Supervisor::new(launcher.clone(), config(), Logger::quiet());
        (sup, launcher)
    }

    fn video(idx: usize) -> VideoId {
        VideoId::from_index(idx).unwrap()
    }

    #[test]
    fn quirky_predicate_only_treats_zero_as_stopped() {
        assert!(is_alive_quirky(None));
        assert!(is_alive_quirky(Some(1)));
        assert!(is_alive_quirky(Some(-15)));
        assert!(!is_alive_quirky(Some(0)));
    }

    #[test]
    fn absent_handles_read_as_not_running() {
        let (mut sup, _) = supervisor();
        assert!(!sup.is_idle_viewer_running());
        assert!(!sup.is_video_player_running());
        assert_eq!(sup.playback(), PlaybackState::Nothing);
    }

    #[test]
    fn viewer_launch_uses_title_image_without_control_input() {
        let (mut sup, launcher) = supervisor();
        sup.start_idle_viewer();
        let spec = launcher.launches().pop().unwrap();
        assert_eq!(spec.program, "fbi");
        assert_eq!(spec.args, vec!["--noverbose", "/home/pi/Pictures/title.jpg"]);
        assert!(!spec.control_input);
        assert!(sup.is_idle_viewer_running());
        assert_eq!(sup.playback(), PlaybackState::ShowingIdleImage);
    }

    #[test]
    fn player_launch_has_control_input() {
        let (mut sup, launcher) = supervisor();
        sup.start_video_player(video(3), Path::new("/home/pi/Videos/3.mp4"));
        let spec = launcher.launches().pop().unwrap();
        assert_eq!(spec.program, "omxplayer");
        assert_eq!(spec.args, vec!["-b", "/home/pi/Videos/3.mp4"]);
        assert!(spec.control_input);
        assert_eq!(sup.playback(), PlaybackState::PlayingVideo(video(3)));
    }

    #[test]
    fn stop_sends_quit_then_terminate_then_wait() {
        let (mut sup, launcher) = supervisor();
        sup.start_video_player(video(1), Path::new("/v/1.mp4"));
        sup.stop_video_player();
        assert_eq!(
            launcher.actions(),
            vec![
                FakeAction::Launched(0),
                FakeAction::QuitSent(0),
                FakeAction::Terminated(0),
                FakeAction::Waited(0),
            ]
        );
        assert!(!sup.is_video_player_running());
    }

    #[test]
    fn stop_clears_state_even_when_every_step_fails() {
        let (mut sup, launcher) = supervisor();
        launcher.fail_stops(true);
        sup.start_idle_viewer();
        sup.stop_idle_viewer();
        assert!(!sup.is_idle_viewer_running());
        assert_eq!(sup.playback(), PlaybackState::Nothing);
    }

    #[test]
    fn stop_without_handle_is_a_no_op() {
        let (mut sup, launcher) = supervisor();
        sup.stop_idle_viewer();
        sup.stop_video_player();
        assert!(launcher.actions().is_empty());
    }

    #[test]
    fn stubborn_child_is_killed_after_timeout() {
        let (mut sup, launcher) = supervisor();
        launcher.ignore_terminate(true);
        sup.start_video_player(video(2), Path::new("/v/2.mp4"));
        sup.stop_video_player();
        assert!(launcher.actions().contains(&FakeAction::Killed(0)));
        assert_eq!(launcher.live_count(), 0);
    }

    #[test]
    fn spawn_failure_leaves_slot_empty() {
        let (mut sup, launcher) = supervisor();
        launcher.fail_spawns_of("fbi");
        assert!(!sup.start_idle_viewer());
        assert!(!sup.is_idle_viewer_running());
        assert!(launcher.launches().is_empty());
    }

    #[test]
    fn repeated_spawn_failures_warn_once_until_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("videoctrl.log");
        let launcher = FakeLauncher::new();
        let logger = Logger::new(LogLevel::Info, Some(path.to_string_lossy().into_owned()));
        let mut sup = Supervisor::new(launcher.clone(), config(), logger);
        let warnings = || {
            std::fs::read_to_string(&path)
                .unwrap()
                .lines()
                .filter(|line| line.contains("[Warn] idle viewer failed to start"))
                .count()
        };

        launcher.fail_spawns_of("fbi");
        for _ in 0..5 {
            assert!(!sup.start_idle_viewer());
        }
        assert_eq!(warnings(), 1);

        launcher.allow_spawns_of("fbi");
        assert!(sup.start_idle_viewer());
        sup.stop_idle_viewer();
        launcher.fail_spawns_of("fbi");
        assert!(!sup.start_idle_viewer());
        assert_eq!(warnings(), 2);
    }

    #[test]
    fn clean_exit_reads_as_stopped_but_nonzero_exit_reads_as_running() {
        let (mut sup, launcher) = supervisor();
        sup.start_video_player(video(1), Path::new("/v/1.mp4"));
        launcher.exit_child(0, 0);
        assert!(!sup.is_video_player_running());

        sup.start_video_player(video(1), Path::new("/v/1.mp4"));
        launcher.exit_child(1, 1);
        assert!(sup.is_video_player_running());
    }

    #[test]
    fn failing_status_poll_reads_as_not_running() {
        let (mut sup, launcher) = supervisor();
        sup.start_idle_viewer();
        launcher.fail_polls(true);
        assert!(!sup.is_idle_viewer_running());
    }

    #[test]
    fn shutdown_command_is_detached_and_reaped() {
        let (mut sup, launcher) = supervisor();
        sup.request_shutdown();
        let spec = launcher.launches().pop().unwrap();
        assert_eq!(spec.program, "sudo");
        assert_eq!(spec.args, vec!["halt"]);
        assert_eq!(sup.detached_count(), 1);
        assert!(!launcher.actions().contains(&FakeAction::Waited(0)));

        sup.reap_detached();
        assert_eq!(sup.detached_count(), 1);
        launcher.exit_child(0, 0);
        sup.reap_detached();
        assert_eq!(sup.detached_count(), 0);
    }

    #[test]
    fn stop_all_stops_both_roles() {
        let (mut sup, launcher) = supervisor();
        sup.start_idle_viewer();
        sup.start_video_player(video(1), Path::new("/v/1.mp4"));
        sup.stop_all();
        assert_eq!(launcher.live_count(), 0);
        assert_eq!(sup.playback(), PlaybackState::Nothing);
    }
}
