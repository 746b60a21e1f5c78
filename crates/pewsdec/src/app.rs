//! State machine logic for child processes
//!
//! The state machine has two states:
//!
//! 1. `Waiting`: No earthquake in progress
//!
//! 2. `Alerting`: An earthquake is in progress, and child
//!     processes are spawned for each new or revised event
//!
//! ```txt
//!   start
//!   ||                                            ||== revised info ==||
//!   \/                                            ||                  ||
//! +-------------+                          +--------------+           ||
//! |   Waiting   | == Alert | Info ======>  |   Alerting   | <=========||
//! +-------------+                          +--------------+
//!   ||      /\                                  ||
//!   ||      ||=========== Normal, EOF ==========||
//!   ||
//!   \/
//!   EOF
//! ```
//!
//! Phase changes are printed in either state. The `Alerting`
//! state also prints, and spawns a child process for, every
//! message whose earthquake information differs from the last.
//! An `UpdateInfo` message, which carries no earthquake
//! information, does not end the `Alerting` state.
//!
//! The `Waiting` state will exit when the input iterator is exhausted.

use std::process::Child;

use log::{debug, error, warn};
use pews::{EarthquakeInfo, Phase, StatusMessage};

use crate::cli::Args;
use crate::spawner;

/// Run the application
///
/// Runs the `pewsdec` state machine with the given command-line
/// `args` and an `input` iterator which returns each status
/// message until it is exhausted.
pub fn run<I>(args: &Args, input: &mut I)
where
    I: Iterator<Item = StatusMessage>,
{
    let cfg = Config {
        child_args: args.child.iter().map(String::as_str).collect(),
        quiet: args.quiet,
        json: args.json,
    };

    let mut children = Children::default();
    let mut waiting = State::<Waiting>::new();
    while let Some(alerting) = waiting.until_earthquake(&cfg, &mut children, input) {
        waiting = alerting.until_normal(&cfg, &mut children, input);
    }

    children.reap();
}

/// Configuration
#[derive(Clone, Debug)]
struct Config<'args> {
    child_args: Vec<&'args str>,
    quiet: bool,
    json: bool,
}

#[derive(Debug)]
struct State<S> {
    state: S,
}

#[derive(Debug)]
struct Waiting {
    phase: Option<Phase>,
    events: usize,
}

#[derive(Debug)]
struct Alerting {
    next: Option<StatusMessage>,
    phase: Phase,
    last: Option<EarthquakeInfo>,
    events: usize,
}

impl<S> State<S> {
    /// Create initial state
    pub fn new() -> State<Waiting> {
        State {
            state: Waiting {
                phase: None,
                events: 0,
            },
        }
    }
}

impl State<Waiting> {
    /// Look for an earthquake
    ///
    /// Consumes messages from `input` until one carries
    /// earthquake information or the iterator is exhausted.
    pub fn until_earthquake<I>(
        mut self,
        config: &Config<'_>,
        children: &mut Children,
        input: &mut I,
    ) -> Option<State<Alerting>>
    where
        I: Iterator<Item = StatusMessage>,
    {
        if self.state.events > 0 {
            debug!("earthquake over after {} events", self.state.events);
        }

        for msg in input {
            children.reap();

            if msg.earthquake_info().is_some() {
                // → Alerting
                return Some(msg.into());
            }

            if self.state.phase != Some(msg.phase()) {
                self.state.phase = Some(msg.phase());
                report(config, &msg);
            }
        }

        None
    }
}

impl State<Alerting> {
    /// Look for the end of the earthquake
    ///
    /// Consumes messages from `input` until the phase returns
    /// to `Normal` or the iterator is exhausted.
    pub fn until_normal<I>(
        mut self,
        config: &Config<'_>,
        children: &mut Children,
        input: &mut I,
    ) -> State<Waiting>
    where
        I: Iterator<Item = StatusMessage>,
    {
        while let Some(msg) = self.state.next.take().or_else(|| input.next()) {
            children.reap();

            let phase_changed = self.state.phase != msg.phase();
            self.state.phase = msg.phase();

            let eq = match msg.earthquake_info() {
                Some(eq) => eq,
                None => {
                    if phase_changed {
                        report(config, &msg);
                    }
                    if msg.phase() == Phase::Normal {
                        break; // → Waiting
                    }
                    continue;
                }
            };

            if !phase_changed && self.state.last.as_ref() == Some(eq) {
                continue;
            }

            self.state.last = Some(eq.clone());
            self.state.events += 1;
            report(config, &msg);

            if config.child_args.is_empty() {
                debug!("no child process to spawn");
                continue;
            }

            // only the live feed carries the last earthquake ID
            let is_simulation = msg.last_earthquake_id().is_none();
            match spawner::spawn(
                config.child_args[0],
                &config.child_args[1..],
                &msg,
                eq,
                is_simulation,
            ) {
                Ok(child) => {
                    debug!("spawned child process PID {}", child.id());
                    children.push(child);
                }
                Err(err) => {
                    error!("unable to spawn child process: {}", err);
                }
            }
        }

        // → Waiting
        self.into()
    }
}

impl From<StatusMessage> for State<Alerting> {
    fn from(message: StatusMessage) -> Self {
        debug!("new state: alerting");
        Self {
            state: Alerting {
                phase: Phase::Normal,
                next: Some(message),
                last: None,
                events: 0,
            },
        }
    }
}

impl From<State<Alerting>> for State<Waiting> {
    fn from(state: State<Alerting>) -> Self {
        debug!("new state: waiting");
        Self {
            state: Waiting {
                phase: Some(state.state.phase),
                events: state.state.events,
            },
        }
    }
}

/// Child processes which have not yet exited
#[derive(Debug, Default)]
struct Children {
    running: Vec<Child>,
}

impl Children {
    fn push(&mut self, child: Child) {
        self.running.push(child);
    }

    // collect the exit status of finished children
    fn reap(&mut self) {
        self.running.retain_mut(|child| match child.try_wait() {
            Ok(Some(exit)) => {
                if exit.success() {
                    debug!("child process {} exited successfully", child.id());
                } else {
                    warn!(
                        "child process exited abnormally with status {}",
                        exit.code().unwrap_or(1)
                    );
                }
                false
            }
            Ok(None) => true,
            Err(err) => {
                error!("unable to await child process exit: {}", err);
                false
            }
        });
    }
}

// Print a status message, per the output options
fn report(config: &Config<'_>, msg: &StatusMessage) {
    if config.quiet {
        return;
    }

    if config.json {
        match serde_json::to_string(msg) {
            Ok(json) => println!("{}", json),
            Err(err) => error!("unable to serialize status message: {}", err),
        }
    } else {
        println!("{}", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pews::FeedLayout;

    // write `value` MSB-first at bit `offset`
    fn set_bits(buf: &mut [u8], offset: usize, width: usize, value: u64) {
        for i in 0..width {
            let bit = (value >> (width - 1 - i)) & 1;
            let pos = offset + i;
            buf[pos / 8] |= (bit as u8) << (7 - pos % 8);
        }
    }

    // real-time message for zero stations
    fn message(status: u64, eq: Option<(u64, u64)>) -> StatusMessage {
        let mut bytes = vec![0u8; 4];
        set_bits(&mut bytes, 1, 2, status);
        set_bits(&mut bytes, 6, 26, 1);

        if let Some((id_field, magnitude)) = eq {
            let mut block = vec![0u8; EarthquakeInfo::BLOCK_BITS / 8];
            set_bits(&mut block, 20, 7, magnitude);
            set_bits(&mut block, 69, 26, id_field);
            bytes.extend_from_slice(&block);
        }

        StatusMessage::decode(&bytes, 0, FeedLayout::RealTime)
            .expect("valid message")
            .expect("non-empty message")
    }

    fn normal() -> StatusMessage {
        message(0b00, None)
    }

    fn alert(id_field: u64, magnitude: u64) -> StatusMessage {
        message(0b10, Some((id_field, magnitude)))
    }

    fn info(id_field: u64, magnitude: u64) -> StatusMessage {
        message(0b11, Some((id_field, magnitude)))
    }

    fn quiet() -> Config<'static> {
        Config {
            child_args: vec![],
            quiet: true,
            json: false,
        }
    }

    #[test]
    fn test_message_helpers() {
        let msg = alert(21_007_178, 49);
        assert_eq!(Phase::Alert, msg.phase());
        let eq = msg.earthquake_info().expect("earthquake info");
        assert_eq!("2021007178", eq.earthquake_id());
        assert_eq!(49, eq.magnitude());

        assert_eq!(Phase::UpdateInfo, message(0b01, None).phase());
        assert!(normal().earthquake_info().is_none());
    }

    #[test]
    fn test_waiting() {
        let cfg = quiet();
        let mut children = Children::default();
        let mut input = vec![normal(), message(0b01, None), normal(), alert(1, 30), normal()]
            .into_iter();

        let alerting = State::<Waiting>::new()
            .until_earthquake(&cfg, &mut children, &mut input)
            .expect("earthquake");
        assert_eq!(Some(alert(1, 30)), alerting.state.next);
        assert_eq!(1, input.len());

        let mut input = vec![normal(), normal()].into_iter();
        assert!(State::<Waiting>::new()
            .until_earthquake(&cfg, &mut children, &mut input)
            .is_none());
        assert_eq!(0, input.len());
    }

    #[test]
    fn test_alerting() {
        let cfg = quiet();
        let mut children = Children::default();
        let mut input = vec![
            alert(1, 30),
            alert(1, 32),
            info(1, 32),
            info(1, 32),
            message(0b01, None),
            normal(),
            normal(),
        ]
        .into_iter();

        // initial alert, revised alert, and info
        let waiting =
            State::<Alerting>::from(alert(1, 30)).until_normal(&cfg, &mut children, &mut input);
        assert_eq!(3, waiting.state.events);
        assert_eq!(Some(Phase::Normal), waiting.state.phase);
        assert_eq!(1, input.len());
    }

    #[test]
    fn test_alerting_until_eof() {
        let cfg = quiet();
        let mut children = Children::default();
        let mut input = vec![message(0b01, None), info(2, 40), info(3, 40)].into_iter();

        // stays alerting through UpdateInfo
        let waiting =
            State::<Alerting>::from(alert(1, 30)).until_normal(&cfg, &mut children, &mut input);
        assert_eq!(3, waiting.state.events);
        assert_eq!(Some(Phase::Info), waiting.state.phase);
        assert_eq!(0, input.len());

        assert!(waiting
            .until_earthquake(&cfg, &mut children, &mut input)
            .is_none());
    }
}
