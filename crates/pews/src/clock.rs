//! Feed timestamps and event replay
//!
//! Every feed URL names the one-second snapshot it wants. The
//! [`FeedClock`] produces these timestamps. Normally it tracks
//! the wall clock, one second behind. When a [`Simulation`] is
//! armed, it instead replays a past event: the virtual clock
//! starts at the event's start time and advances in lock-step
//! with the wall clock until the simulation's duration runs
//! out. After that the clock silently returns to real time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use log::info;

use crate::message::FeedLayout;

/// Format of feed timestamps, like `20211214081905`
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// A source of wall-clock time
pub trait TimeSource {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// The operating system's realtime clock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Replay of a past earthquake
///
/// ```
/// use chrono::Duration;
/// use pews::{parse_timestamp, Simulation};
///
/// // 2021 Jeju earthquake
/// let sim = Simulation::new(
///     parse_timestamp("20211214081905").unwrap(),
///     "2021007178",
///     Duration::minutes(7),
/// );
/// assert_eq!("2021007178", sim.earthquake_id());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Simulation {
    start_time: DateTime<Utc>,
    earthquake_id: String,
    duration: Duration,
}

impl Simulation {
    /// Replay `earthquake_id` from `start_time` for `duration`
    pub fn new<S>(start_time: DateTime<Utc>, earthquake_id: S, duration: Duration) -> Self
    where
        S: Into<String>,
    {
        Self {
            start_time,
            earthquake_id: earthquake_id.into(),
            duration,
        }
    }

    /// Feed time at which the replay begins
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Earthquake being replayed
    pub fn earthquake_id(&self) -> &str {
        &self.earthquake_id
    }

    /// How long the replay lasts, in wall-clock time
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

// A simulation and the wall-clock time it was armed
#[derive(Clone, Debug, PartialEq, Eq)]
struct Armed {
    simulation: Simulation,
    armed_at: DateTime<Utc>,
}

/// A feed time, captured at one instant
///
/// A `FeedTime` carries everything needed to fetch and
/// decode one polling cycle: the snapshot timestamp, and
/// whether that snapshot belongs to a simulation. Taking a
/// single `FeedTime` per cycle guarantees that the URL and
/// the decoder agree even if the simulation expires midway.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FeedTime {
    time: DateTime<Utc>,
    earthquake_id: Option<String>,
}

impl FeedTime {
    /// Snapshot time
    pub fn datetime(&self) -> DateTime<Utc> {
        self.time
    }

    /// Snapshot time, formatted like `20211214081905`
    pub fn timestamp(&self) -> String {
        self.time.format(TIMESTAMP_FORMAT).to_string()
    }

    /// ID of the simulated earthquake, if any
    pub fn simulation_id(&self) -> Option<&str> {
        self.earthquake_id.as_deref()
    }

    /// True if this time belongs to a simulation
    pub fn is_simulation(&self) -> bool {
        self.earthquake_id.is_some()
    }

    /// Status message layout for this time
    pub fn layout(&self) -> FeedLayout {
        if self.is_simulation() {
            FeedLayout::Simulation
        } else {
            FeedLayout::RealTime
        }
    }
}

/// Clock for feed requests
///
/// The clock holds at most one armed [`Simulation`]. Arming a
/// new simulation replaces the old one. The simulation
/// expires on its own once more than its duration has passed
/// since it was armed; expiry is detected the next time the
/// clock is read.
///
/// `FeedClock` is `Sync`. Share it between polling tasks
/// with an `Arc`.
///
/// ```
/// use pews::FeedClock;
///
/// let clock = FeedClock::new();
/// assert!(!clock.is_simulating());
/// assert_eq!(14, clock.timestamp().len());
/// ```
#[derive(Debug, Default)]
pub struct FeedClock<T = SystemTimeSource> {
    source: T,
    simulation: Mutex<Option<Armed>>,
}

impl FeedClock<SystemTimeSource> {
    /// Real-time clock backed by the system clock
    pub fn new() -> Self {
        Self::with_time_source(SystemTimeSource)
    }
}

impl<T> FeedClock<T>
where
    T: TimeSource,
{
    /// Real-time clock backed by `source`
    pub fn with_time_source(source: T) -> Self {
        Self {
            source,
            simulation: Mutex::new(None),
        }
    }

    /// Start replaying `simulation`
    ///
    /// Any simulation already in progress is discarded.
    pub fn arm(&self, simulation: Simulation) {
        let armed_at = self.source.now();
        info!(
            "simulating earthquake {} from {} for {}s",
            simulation.earthquake_id(),
            simulation.start_time().format(TIMESTAMP_FORMAT),
            simulation.duration().num_seconds()
        );
        *self.lock() = Some(Armed {
            simulation,
            armed_at,
        });
    }

    /// Stop any simulation in progress
    pub fn disarm(&self) {
        if self.lock().take().is_some() {
            info!("simulation stopped");
        }
    }

    /// Capture the current feed time
    ///
    /// In real time, this is the current time minus one
    /// second: the newest snapshot which is certain to have
    /// been published. During a simulation, it is the
    /// simulation's start time plus the whole seconds elapsed
    /// since arming, minus one.
    pub fn snapshot(&self) -> FeedTime {
        let now = self.source.now();
        let mut state = self.lock();

        if let Some(armed) = state.as_ref() {
            let elapsed = now.timestamp() - armed.armed_at.timestamp();
            if elapsed > armed.simulation.duration.num_seconds() {
                info!(
                    "simulation of earthquake {} ended",
                    armed.simulation.earthquake_id
                );
                *state = None;
            } else {
                return FeedTime {
                    time: armed.simulation.start_time + Duration::seconds(elapsed - 1),
                    earthquake_id: Some(armed.simulation.earthquake_id.clone()),
                };
            }
        }

        FeedTime {
            time: now - Duration::seconds(1),
            earthquake_id: None,
        }
    }

    /// Current feed timestamp, like `20211214081905`
    pub fn timestamp(&self) -> String {
        self.snapshot().timestamp()
    }

    /// True if a simulation is armed and unexpired
    pub fn is_simulating(&self) -> bool {
        self.snapshot().is_simulation()
    }

    /// ID of the earthquake being simulated, if any
    pub fn earthquake_id(&self) -> Option<String> {
        self.snapshot().earthquake_id
    }

    /// Time source
    pub fn time_source(&self) -> &T {
        &self.source
    }

    fn lock(&self) -> MutexGuard<'_, Option<Armed>> {
        self.simulation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parse a feed timestamp, like `20211214081905`, as UTC
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let naive = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::rc::Rc;

    // A clock which only moves when told to
    #[derive(Clone, Debug)]
    struct ManualTime(Rc<Cell<DateTime<Utc>>>);

    impl ManualTime {
        fn at(ts: &str) -> Self {
            Self(Rc::new(Cell::new(parse_timestamp(ts).unwrap())))
        }

        fn advance(&self, secs: i64) {
            self.0.set(self.0.get() + Duration::seconds(secs));
        }
    }

    impl TimeSource for ManualTime {
        fn now(&self) -> DateTime<Utc> {
            self.0.get()
        }
    }

    fn jeju() -> Simulation {
        Simulation::new(
            parse_timestamp("20211214081905").unwrap(),
            "2021007178",
            Duration::minutes(7),
        )
    }

    #[test]
    fn test_parse_timestamp() {
        let tm = parse_timestamp("20211214081905").unwrap();
        assert_eq!(Utc.with_ymd_and_hms(2021, 12, 14, 8, 19, 5).unwrap(), tm);
        assert!(parse_timestamp("2021-12-14").is_err());
        assert!(parse_timestamp("20211314081905").is_err());
    }

    #[test]
    fn test_real_time() {
        let wall = ManualTime::at("20230214081904");
        let clock = FeedClock::with_time_source(wall.clone());

        let tm = clock.snapshot();
        assert_eq!("20230214081903", tm.timestamp());
        assert!(!tm.is_simulation());
        assert_eq!(None, tm.simulation_id());
        assert_eq!(FeedLayout::RealTime, tm.layout());

        wall.advance(60);
        assert_eq!("20230214082003", clock.timestamp());
        assert!(!clock.is_simulating());
        assert_eq!(None, clock.earthquake_id());
    }

    #[test]
    fn test_simulation() {
        let wall = ManualTime::at("20230214081904");
        let clock = FeedClock::with_time_source(wall.clone());
        clock.arm(jeju());

        let tm = clock.snapshot();
        assert_eq!("20211214081904", tm.timestamp());
        assert_eq!(Some("2021007178"), tm.simulation_id());
        assert_eq!(FeedLayout::Simulation, tm.layout());
        assert!(clock.is_simulating());
        assert_eq!(Some("2021007178".to_owned()), clock.earthquake_id());

        // virtual time advances with wall time
        let mut last = clock.timestamp();
        for _ in 0..10 {
            wall.advance(1);
            let next = clock.timestamp();
            assert!(next > last);
            last = next;
        }
        assert_eq!("20211214081914", last);
    }

    #[test]
    fn test_simulation_expiry() {
        let wall = ManualTime::at("20230214081904");
        let clock = FeedClock::with_time_source(wall.clone());
        clock.arm(jeju());

        // exactly the duration: still simulating
        wall.advance(7 * 60);
        let tm = clock.snapshot();
        assert!(tm.is_simulation());
        assert_eq!("20211214082604", tm.timestamp());

        // one second more: back to real time, for good
        wall.advance(1);
        let tm = clock.snapshot();
        assert!(!tm.is_simulation());
        assert_eq!("20230214082604", tm.timestamp());
        assert!(!clock.is_simulating());

        wall.advance(-60);
        assert!(!clock.is_simulating());
    }

    #[test]
    fn test_rearm() {
        let wall = ManualTime::at("20230214081904");
        let clock = FeedClock::with_time_source(wall.clone());
        clock.arm(jeju());
        wall.advance(30);

        // last write wins, and the elapsed time restarts
        clock.arm(Simulation::new(
            parse_timestamp("20160912194432").unwrap(),
            "2016001234",
            Duration::seconds(10),
        ));
        let tm = clock.snapshot();
        assert_eq!(Some("2016001234"), tm.simulation_id());
        assert_eq!("20160912194431", tm.timestamp());

        clock.disarm();
        assert!(!clock.is_simulating());
        assert_eq!("20230214081933", clock.timestamp());
    }

    #[test]
    fn test_shared_between_threads() {
        use std::sync::Arc;

        let clock = Arc::new(FeedClock::new());
        clock.arm(jeju());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || clock.snapshot())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_simulation());
        }
    }
}
