//! Spawns child process for an earthquake

use std::ffi::OsStr;
use std::io;
use std::process::{Child, Command, Stdio};

use chrono::{DateTime, Utc};
use log::warn;
use pews::{EarthquakeInfo, StatusMessage};

/// Spawn a child process to handle the given earthquake
///
/// The child process will receive information about the
/// earthquake via the environment. Its standard input is
/// closed.
///
/// This method will attempt to start an executable named
/// `cmd` with the given `args`. The `msg`, which must carry
/// the earthquake information `eq`, is transformed into many
/// different environment variables.
pub fn spawn<C, A, B>(
    cmd: C,
    args: A,
    msg: &StatusMessage,
    eq: &EarthquakeInfo,
    is_simulation: bool,
) -> io::Result<Child>
where
    C: AsRef<OsStr>,
    B: AsRef<OsStr>,
    A: IntoIterator<Item = B>,
{
    let msg_json = serde_json::to_string(msg).unwrap_or_else(|err| {
        warn!("unable to serialize status message: {}", err);
        String::new()
    });

    let origin_ts = eq
        .occurred_at_datetime()
        .map(time_to_unix_str)
        .unwrap_or_default();

    let regions: Vec<&str> = eq.max_intensity_area().iter().map(|r| r.as_str()).collect();
    let phase = msg.phase();

    Command::new(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .args(args)
        .env(childenv::PEWSDEC_MSG, msg_json)
        .env(childenv::PEWSDEC_PHASE, phase.as_str())
        .env(childenv::PEWSDEC_PHASE_NUM, phase.code().to_string())
        .env(childenv::PEWSDEC_EQ_ID, eq.earthquake_id())
        .env(
            childenv::PEWSDEC_MAGNITUDE,
            format!("{:.1}", eq.magnitude_f32()),
        )
        .env(childenv::PEWSDEC_DEPTH, eq.depth().to_string())
        .env(
            childenv::PEWSDEC_LATITUDE,
            format!("{:.2}", eq.latitude_deg()),
        )
        .env(
            childenv::PEWSDEC_LONGITUDE,
            format!("{:.2}", eq.longitude_deg()),
        )
        .env(childenv::PEWSDEC_TIME, origin_ts)
        .env(
            childenv::PEWSDEC_MAX_INTENSITY,
            eq.max_intensity().to_string(),
        )
        .env(childenv::PEWSDEC_REGIONS, regions.join(" "))
        .env(childenv::PEWSDEC_EPICENTER, eq.epicenter_name())
        .env(childenv::PEWSDEC_IS_SIMULATION, bool_to_env(is_simulation))
        .spawn()
}

mod childenv {
    /// The complete status message, as JSON
    ///
    /// Field names are camelCase, like `earthquakeInfo`.
    pub const PEWSDEC_MSG: &str = "PEWSDEC_MSG";

    /// Broadcast phase
    ///
    /// Either "`Alert`" (early warning) or "`Info`"
    /// (earthquake information).
    pub const PEWSDEC_PHASE: &str = "PEWSDEC_PHASE";

    /// Broadcast phase, numeric
    ///
    /// |       |                     |
    /// |-------|---------------------|
    /// | "`1`" | Normal              |
    /// | "`2`" | Alert               |
    /// | "`3`" | Info                |
    /// | "`4`" | UpdateInfo          |
    pub const PEWSDEC_PHASE_NUM: &str = "PEWSDEC_PHASE_NUM";

    /// Earthquake ID, like `2021007178`
    pub const PEWSDEC_EQ_ID: &str = "PEWSDEC_EQ_ID";

    /// Magnitude, with one decimal place
    pub const PEWSDEC_MAGNITUDE: &str = "PEWSDEC_MAGNITUDE";

    /// Depth, in kilometers
    pub const PEWSDEC_DEPTH: &str = "PEWSDEC_DEPTH";

    /// Epicenter latitude, in degrees north
    pub const PEWSDEC_LATITUDE: &str = "PEWSDEC_LATITUDE";

    /// Epicenter longitude, in degrees east
    pub const PEWSDEC_LONGITUDE: &str = "PEWSDEC_LONGITUDE";

    /// Origin time (UNIX timestamp, in seconds)
    ///
    /// This is the time as published by the feed, including
    /// its nine-hour offset. It will be empty if the time
    /// cannot be represented.
    pub const PEWSDEC_TIME: &str = "PEWSDEC_TIME";

    /// Maximum observed intensity
    pub const PEWSDEC_MAX_INTENSITY: &str = "PEWSDEC_MAX_INTENSITY";

    /// Regions which experience the maximum intensity
    ///
    /// Space-delimited list of Korean region names, like
    ///
    /// ```txt
    /// 서울 경기
    /// ```
    ///
    /// Empty if not applicable.
    pub const PEWSDEC_REGIONS: &str = "PEWSDEC_REGIONS";

    /// Human-readable epicenter description
    pub const PEWSDEC_EPICENTER: &str = "PEWSDEC_EPICENTER";

    /// True if the event is a replay
    ///
    /// This variable is set to `Y` if the message was received
    /// from the simulation feed. Otherwise, it is set to the
    /// empty string. Replays are NOT LIVE.
    pub const PEWSDEC_IS_SIMULATION: &str = "PEWSDEC_IS_SIMULATION";
}

// convert DateTime to UTC unix timestamp in seconds, as string
fn time_to_unix_str(tm: DateTime<Utc>) -> String {
    format!("{}", tm.format("%s"))
}

// convert true → "Y", false → ""
//
// this is useful for environment variables since empty values
// are usually treated as false
fn bool_to_env(val: bool) -> &'static str {
    if val {
        "Y"
    } else {
        ""
    }
}
