use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{error::ErrorKind, value_parser, CommandFactory, Parser};
use lazy_static::lazy_static;
use regex::Regex;

use pews::{parse_timestamp, Simulation, DEFAULT_BASE_URL};

const USAGE_SHORT: &str = r#"
This program polls the KMA earthquake early-warning (PEWS) feeds once per second and prints each change in the broadcast phase. Earthquake parameters are printed while an earthquake is in progress.

See --help for more details.

ALWAYS HAVE A SECOND SOURCE OF EARTHQUAKE ALERTS!
"#;

const USAGE_LONG: &str = r#"
This program polls the KMA earthquake early-warning (PEWS) feeds once per second and prints each change in the broadcast phase. Earthquake parameters are printed while an earthquake is in progress.

Replay a past earthquake with --simulate. The KMA publishes replays of notable events under their earthquake ID. For the 2021-12-14 Jeju earthquake:

    pewsdec --simulate 2021007178 \
        --start 20211214081905 --duration 420

Arguments which follow "--" will be used to spawn a child process whenever a new earthquake is announced, or when its information is revised.

    pewsdec -- ./on-earthquake.sh

The child process receives the following environment variables which describe the event:

  PEWSDEC_MSG='{"phase":2,...}' (the status message, as JSON)
  PEWSDEC_PHASE="Alert" (or Info)
  PEWSDEC_PHASE_NUM="2" (or 3)
  PEWSDEC_EQ_ID="2021007178"
  PEWSDEC_MAGNITUDE="4.9"
  PEWSDEC_DEPTH="17" (km)
  PEWSDEC_LATITUDE="33.09"
  PEWSDEC_LONGITUDE="126.19"
  PEWSDEC_TIME="1639469939" (UNIX timestamp, as published)
  PEWSDEC_MAX_INTENSITY="5"
  PEWSDEC_REGIONS="제주" (space-delimited)
  PEWSDEC_EPICENTER="제주 서귀포시 서남서쪽 41km 해역"
  PEWSDEC_IS_SIMULATION="Y" (or empty)

Child processes are not waited on. They may run past the end of the event.

ALWAYS HAVE A SECOND SOURCE OF EARTHQUAKE ALERTS!
"#;

const ADVANCED: &str = "Advanced Options";
const SIMULATION: &str = "Simulation";

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even phase changes
    #[arg(short, long)]
    pub quiet: bool,

    /// Print messages as JSON, one per line
    #[arg(long)]
    pub json: bool,

    /// Print the station list and exit
    #[arg(long)]
    pub list_stations: bool,

    /// Poll only once, then exit
    #[arg(long)]
    pub once: bool,

    /// Replay the earthquake with this ID
    ///
    /// Earthquake IDs look like "2021007178".
    #[arg(long, requires = "start")]
    #[arg(value_parser = parse_earthquake_id)]
    #[arg(help_heading = SIMULATION)]
    pub simulate: Option<String>,

    /// Replay start time (UTC), like 20211214081905
    #[arg(long, requires = "simulate")]
    #[arg(value_parser = parse_start_time)]
    #[arg(help_heading = SIMULATION)]
    pub start: Option<DateTime<Utc>>,

    /// Replay duration (seconds)
    #[arg(long, default_value_t = 600)]
    #[arg(help_heading = SIMULATION)]
    pub duration: u32,

    /// Feed server base URL
    #[arg(long, default_value_t = DEFAULT_BASE_URL.to_string())]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub base_url: String,

    /// Polling interval (milliseconds)
    #[arg(long, default_value_t = 1000)]
    #[arg(value_parser = value_parser!(u64).range(100..))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub interval_ms: u64,

    /// HTTP request timeout (milliseconds)
    #[arg(long, default_value_t = 5000)]
    #[arg(value_parser = value_parser!(u64).range(100..))]
    #[arg(hide_short_help = true)]
    #[arg(help_heading = ADVANCED)]
    pub timeout_ms: u64,

    /// Spawn child process on each new event. Optional.
    ///
    /// Arguments are provided VERBATIM to the child process
    /// without shell interpretation.
    #[arg(last = true)]
    pub child: Vec<String>,
}

impl Args {
    /// Simulation requested on the command line, if any
    pub fn simulation(&self) -> Option<Simulation> {
        match (&self.simulate, self.start) {
            (Some(id), Some(start)) => Some(Simulation::new(
                start,
                id.as_str(),
                chrono::Duration::seconds(self.duration as i64),
            )),
            _ => None,
        }
    }

    /// Polling interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// Earthquake IDs are "20" followed by a 26-bit decimal number
fn parse_earthquake_id(s: &str) -> Result<String, String> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^20[0-9]{1,8}$").expect("bad earthquake ID regexp");
    }

    if RE.is_match(s) {
        Ok(s.to_owned())
    } else {
        Err(format!("\"{}\" is not an earthquake ID, like 2021007178", s))
    }
}

fn parse_start_time(s: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(s).map_err(|e| format!("expected YYYYMMDDHHMMSS: {}", e))
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}
