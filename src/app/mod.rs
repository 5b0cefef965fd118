use crate::{
    cli::RunOptions,
    config::{self, Config},
    dispatch::PinAssignment,
    gpio::GpioSampler,
    supervisor::{CommandLine, Supervisor, SupervisorConfig, SystemLauncher},
    Error, Result,
};
use std::{path::PathBuf, str::FromStr, time::Duration};

pub mod controller;
mod lifecycle;
mod logger;
pub mod telemetry;

use controller::{Controller, VideoLibrary};
use lifecycle::{create_shutdown_flag, print_farewell};
pub use logger::{LogLevel, Logger};
use telemetry::EventLog;

/// Config for the daemon: file values with CLI overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub pins: Vec<u8>,
    pub video_dir: PathBuf,
    pub video_extension: String,
    pub title_image: PathBuf,
    pub viewer: CommandLine,
    pub player: CommandLine,
    pub shutdown: CommandLine,
    pub poll_interval: Duration,
    pub stop_timeout: Option<Duration>,
    pub event_log: Option<String>,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
}

impl AppConfig {
    pub fn from_sources(file: Config, opts: RunOptions) -> Result<Self> {
        let merged = Config {
            pins: opts.pins.unwrap_or(file.pins),
            video_dir: opts.video_dir.unwrap_or(file.video_dir),
            title_image: opts.title_image.unwrap_or(file.title_image),
            poll_interval: opts.poll_interval.unwrap_or(file.poll_interval),
            ..file
        };
        config::validate(&merged)?;

        let log_level = match opts.log_level.as_deref() {
            Some(raw) => LogLevel::from_str(raw).map_err(|_| {
                Error::InvalidArgs(format!("unknown log level '{raw}'"))
            })?,
            None => LogLevel::default(),
        };

        let (shutdown_program, shutdown_args) = merged
            .shutdown_command
            .split_first()
            .map(|(program, args)| (program.clone(), args.to_vec()))
            .ok_or_else(|| Error::InvalidArgs("shutdown_command must name a program".into()))?;

        Ok(Self {
            pins: merged.pins,
            video_dir: PathBuf::from(merged.video_dir),
            video_extension: merged.video_extension,
            title_image: PathBuf::from(merged.title_image),
            viewer: CommandLine {
                program: merged.viewer_command,
                args: merged.viewer_args,
            },
            player: CommandLine {
                program: merged.player_command,
                args: merged.player_args,
            },
            shutdown: CommandLine {
                program: shutdown_program,
                args: shutdown_args,
            },
            poll_interval: merged.poll_interval,
            stop_timeout: (!merged.stop_timeout.is_zero()).then_some(merged.stop_timeout),
            event_log: merged.event_log,
            log_level,
            log_file: opts.log_file,
        })
    }

    pub fn assignment(&self) -> Result<PinAssignment> {
        PinAssignment::new(self.pins.clone())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            viewer: self.viewer.clone(),
            player: self.player.clone(),
            shutdown: self.shutdown.clone(),
            title_image: self.title_image.clone(),
            stop_timeout: self.stop_timeout,
        }
    }

    pub fn video_library(&self) -> VideoLibrary {
        VideoLibrary {
            video_dir: self.video_dir.clone(),
            video_extension: self.video_extension.clone(),
        }
    }
}

pub struct App {
    config: AppConfig,
    logger: Logger,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let logger = Logger::new(config.log_level, config.log_file.clone());
        Self { config, logger }
    }

    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = match opts.config_file.as_deref() {
            Some(path) => Config::load_from_path(std::path::Path::new(path))?,
            None => Config::load_or_default()?,
        };
        let merged = AppConfig::from_sources(cfg_file, opts)?;
        Ok(Self::new(merged))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entry point for the daemon: claim the pins, then poll until interrupted.
    pub fn run(&self) -> Result<()> {
        let assignment = self.config.assignment()?;
        let running = create_shutdown_flag()?;

        let sampler = GpioSampler::new(&assignment)?;
        let events = EventLog::open(self.config.event_log.as_deref())?;
        let supervisor = Supervisor::new(
            SystemLauncher,
            self.config.supervisor_config(),
            self.logger.clone(),
        );
        self.logger.info(format!(
            "daemon start (shutdown pin {}, {} video pins, poll every {})",
            assignment.shutdown_pin(),
            assignment.video_pins().count(),
            humantime::format_duration(self.config.poll_interval)
        ));

        let mut controller = Controller::new(
            sampler,
            supervisor,
            self.config.video_library(),
            self.logger.clone(),
        )
        .with_event_log(events);
        controller.run(&running, self.config.poll_interval);

        self.logger.info("interrupt received; cleaning up");
        controller.shutdown();
        print_farewell();
        Ok(())
    }

    /// Validate settings and describe the button map without touching GPIO.
    pub fn check(&self) -> Result<String> {
        let assignment = self.config.assignment()?;
        let library = self.config.video_library();
        let mut report = format!(
            "shutdown: GPIO {} -> {}\n",
            assignment.shutdown_pin(),
            self.config.shutdown.program
        );
        for (video, pin) in assignment.video_pins() {
            let path = video.path_in(&library.video_dir, &library.video_extension);
            let note = if path.exists() { "" } else { " (missing)" };
            report.push_str(&format!(
                "video {video}: GPIO {pin} -> {}{note}\n",
                path.display()
            ));
        }
        let note = if self.config.title_image.exists() {
            ""
        } else {
            " (missing)"
        };
        report.push_str(&format!(
            "idle: {}{note}\n",
            self.config.title_image.display()
        ));
        Ok(report)
    }
}
