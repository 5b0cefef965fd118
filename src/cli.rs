use crate::config::{parse_duration, parse_pin_list};
use crate::{Error, Result};
use std::time::Duration;

/// Options shared by `run` and `check`; values are `None` when not provided on CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub config_file: Option<String>,
    pub pins: Option<Vec<u8>>,
    pub video_dir: Option<String>,
    pub title_image: Option<String>,
    pub poll_interval: Option<Duration>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Check(RunOptions),
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            None => Ok(Command::Run(RunOptions::default())),
            Some("run") => Ok(Command::Run(parse_run_options(&mut iter)?)),
            Some("check") => Ok(Command::Check(parse_run_options(&mut iter)?)),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // `run` may be omitted; re-parse from the first flag.
                let mut iter = args.iter();
                Ok(Command::Run(parse_run_options(&mut iter)?))
            }
            Some(cmd) => Err(Error::InvalidArgs(format!(
                "unknown command '{cmd}', try --help"
            ))),
        }
    }

    pub fn help() -> &'static str {
        concat!(
            "videoctrl - GPIO button video player controller\n",
            "\n",
            "USAGE:\n",
            "  videoctrl [run] [OPTIONS]\n",
            "  videoctrl check [OPTIONS]\n",
            "  videoctrl --help\n",
            "  videoctrl --version\n",
            "\n",
            "COMMANDS:\n",
            "  run               Poll the buttons and drive the player (default)\n",
            "  check             Validate the configuration and print the button map\n",
            "\n",
            "OPTIONS:\n",
            "  --config <path>          Config file (default: ~/.videoctrl/config.toml)\n",
            "  --pins <list>            BCM pins, shutdown first (e.g. 26,19,13,6,5)\n",
            "  --video-dir <path>       Directory holding 1.mp4, 2.mp4, ...\n",
            "  --title-image <path>     Image shown while idle\n",
            "  --poll-interval <dur>    Delay between polls (e.g. 20ms, 0ms for busy polling)\n",
            "  --log-level <level>      error|warn|info|debug|trace (default: info)\n",
            "  --log-file <path>        Also append log lines to this file\n",
            "  -h, --help               Show this help\n",
            "  -V, --version            Show version\n",
        )
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }
}

fn parse_run_options(iter: &mut std::slice::Iter<String>) -> Result<RunOptions> {
    let mut opts = RunOptions::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--config" => {
                opts.config_file = Some(take_value(flag, iter)?);
            }
            "--pins" => {
                let raw = take_value(flag, iter)?;
                opts.pins = Some(
                    parse_pin_list(&raw)
                        .map_err(|e| Error::InvalidArgs(format!("--pins: {e}")))?,
                );
            }
            "--video-dir" => {
                opts.video_dir = Some(take_value(flag, iter)?);
            }
            "--title-image" => {
                opts.title_image = Some(take_value(flag, iter)?);
            }
            "--poll-interval" => {
                let raw = take_value(flag, iter)?;
                opts.poll_interval = Some(
                    parse_duration(&raw)
                        .map_err(|e| Error::InvalidArgs(format!("--poll-interval: {e}")))?,
                );
            }
            "--log-level" => {
                opts.log_level = Some(take_value(flag, iter)?);
            }
            "--log-file" => {
                opts.log_file = Some(take_value(flag, iter)?);
            }
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown flag '{other}', try --help"
                )));
            }
        }
    }

    Ok(opts)
}

fn take_value(flag: &str, iter: &mut std::slice::Iter<String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| Error::InvalidArgs(format!("expected a value after {flag}")))
}
