//! Periodic polling of the PEWS feeds

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use pews::{Feed, FeedErr, Fetch, Station, StatusMessage, TimeSource};

/// Polls the feeds and yields each status message
///
/// Each call to `next()` waits for the next polling tick,
/// then fetches a status message. Cycles which fail, or for
/// which no snapshot is published, are logged and skipped.
/// The station list is loaded on the first cycle and again
/// whenever a status message requests it.
///
/// The iterator ends after `cycles` polling cycles. If
/// `cycles` is `None`, it never ends.
#[derive(Debug)]
pub struct Poller<F, T>
where
    F: Fetch,
    T: TimeSource,
{
    feed: Feed<F, T>,
    stations: Vec<Station>,
    reload_stations: bool,
    interval: Duration,
    next_tick: Option<Instant>,
    cycles: Option<usize>,
}

impl<F, T> Poller<F, T>
where
    F: Fetch,
    T: TimeSource,
{
    /// Poll `feed` every `interval`
    pub fn new(feed: Feed<F, T>, interval: Duration, cycles: Option<usize>) -> Self {
        Self {
            feed,
            stations: Vec::new(),
            reload_stations: true,
            interval,
            next_tick: None,
            cycles,
        }
    }

    /// Current station list
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Fetch one status message
    ///
    /// Reloads the station list first, if needed.
    pub fn cycle(&mut self) -> Result<Option<StatusMessage>, FeedErr<F::Error>> {
        if self.reload_stations || self.stations.is_empty() {
            let stations = self.feed.station_list()?;
            if stations.is_empty() {
                debug!(
                    "station list unavailable; keeping {} stations",
                    self.stations.len()
                );
            } else {
                info!("loaded {} stations", stations.len());
                self.stations = stations;
                self.reload_stations = false;
            }
        }

        let msg = self.feed.station_data(self.stations.len())?;
        if let Some(msg) = &msg {
            if msg.station_update_needed() {
                debug!("station list update requested");
                self.reload_stations = true;
            }
        }

        Ok(msg)
    }

    // sleep until the next tick
    fn wait(&mut self) {
        let now = Instant::now();
        let tick = match self.next_tick {
            Some(tick) if tick > now => {
                thread::sleep(tick - now);
                tick
            }
            Some(_) | None => now,
        };
        self.next_tick = Some(tick + self.interval);
    }
}

impl<F, T> Iterator for Poller<F, T>
where
    F: Fetch,
    T: TimeSource,
{
    type Item = StatusMessage;

    fn next(&mut self) -> Option<StatusMessage> {
        loop {
            match self.cycles.as_mut() {
                Some(0) => return None,
                Some(remaining) => *remaining -= 1,
                None => {}
            }

            self.wait();
            match self.cycle() {
                Ok(Some(msg)) => return Some(msg),
                Ok(None) => {}
                Err(err) => warn!("{}", err),
            }
        }
    }
}
