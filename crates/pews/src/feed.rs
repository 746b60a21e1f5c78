//! Feed URLs and the fetch-then-decode cycle

use std::error::Error as StdError;
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::clock::{FeedClock, FeedTime, SystemTimeSource, TimeSource};
use crate::message::{DecodeErr, StatusMessage};
use crate::station::{decode_station_list, Station};

/// Where the feeds are published
pub const DEFAULT_BASE_URL: &str = "https://www.weather.go.kr/pews/data";

/// One of the two PEWS feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Station coordinates (`.s`)
    StationList,

    /// Earthquake status and station intensities (`.b`)
    StationData,
}

impl FeedKind {
    /// File extension of the feed
    pub fn extension(&self) -> &'static str {
        match self {
            FeedKind::StationList => "s",
            FeedKind::StationData => "b",
        }
    }
}

/// Build the URL of a feed snapshot
///
/// Live snapshots are published at `{base}/{timestamp}.{ext}`.
/// Simulation snapshots are published per-event, at
/// `{base}/{earthquake_id}/{timestamp}.{ext}`.
///
/// ```
/// use pews::{feed_url, FeedClock, FeedKind};
///
/// let clock = FeedClock::new();
/// let time = clock.snapshot();
/// let url = feed_url("https://example.com/pews/data/", FeedKind::StationData, &time);
/// assert_eq!(
///     format!("https://example.com/pews/data/{}.b", time.timestamp()),
///     url
/// );
/// ```
pub fn feed_url(base: &str, kind: FeedKind, time: &FeedTime) -> String {
    let base = base.trim_end_matches('/');
    match time.simulation_id() {
        Some(id) => format!(
            "{}/{}/{}.{}",
            base,
            id,
            time.timestamp(),
            kind.extension()
        ),
        None => format!("{}/{}.{}", base, time.timestamp(), kind.extension()),
    }
}

/// Retrieves feed snapshots
///
/// Implementations perform an HTTP GET (or equivalent) of the
/// given `url`. A successful response returns its body. A
/// response which completes, but with a non-success status,
/// returns `Ok(None)`: there is no data this cycle. Only
/// transport failures are errors.
///
/// Retries and timeouts, if any, are the implementation's
/// concern.
pub trait Fetch {
    /// Transport failure
    type Error: StdError + 'static;

    /// Fetch the body at `url`
    fn fetch(&mut self, url: &str) -> Result<Option<Vec<u8>>, Self::Error>;
}

impl<F> Fetch for &mut F
where
    F: Fetch + ?Sized,
{
    type Error = F::Error;

    fn fetch(&mut self, url: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).fetch(url)
    }
}

/// Error polling a feed
#[derive(Error, Debug)]
pub enum FeedErr<E>
where
    E: StdError + 'static,
{
    /// The fetch failed
    #[error("unable to fetch {url}: {source}")]
    Transport {
        /// Requested URL
        url: String,

        /// Transport error
        #[source]
        source: E,
    },

    /// The fetched payload could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeErr),
}

/// Fetches and decodes the PEWS feeds
///
/// A `Feed` pairs a [`Fetch`] implementation with a shared
/// [`FeedClock`]. Each call takes one snapshot of the clock,
/// builds the URL for it, fetches, and decodes.
///
/// The station list must be fetched first: status messages
/// can only be decoded with the number of stations known.
#[derive(Debug)]
pub struct Feed<F, T = SystemTimeSource> {
    fetcher: F,
    clock: Arc<FeedClock<T>>,
    base_url: String,
}

impl<F, T> Feed<F, T>
where
    F: Fetch,
    T: TimeSource,
{
    /// Poll feeds with `fetcher`, at times given by `clock`
    pub fn new(fetcher: F, clock: Arc<FeedClock<T>>) -> Self {
        Self {
            fetcher,
            clock,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Use a different feed server
    pub fn with_base_url<S>(mut self, base_url: S) -> Self
    where
        S: Into<String>,
    {
        self.base_url = base_url.into();
        self
    }

    /// Feed server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Clock used for feed timestamps
    pub fn clock(&self) -> &Arc<FeedClock<T>> {
        &self.clock
    }

    /// Fetcher
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch and decode the station list
    ///
    /// Returns an empty list if the server has no snapshot
    /// for the current time.
    pub fn station_list(&mut self) -> Result<Vec<Station>, FeedErr<F::Error>> {
        let time = self.clock.snapshot();
        match self.get(FeedKind::StationList, &time)? {
            Some(bytes) => {
                let stations = decode_station_list(&bytes);
                debug!("station list: {} stations", stations.len());
                Ok(stations)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Fetch and decode a status message
    ///
    /// `station_count` is the length of the current station
    /// list. Returns `None` if the server has no snapshot for
    /// the current time.
    pub fn station_data(
        &mut self,
        station_count: usize,
    ) -> Result<Option<StatusMessage>, FeedErr<F::Error>> {
        let time = self.clock.snapshot();
        match self.get(FeedKind::StationData, &time)? {
            Some(bytes) => {
                let msg = StatusMessage::decode(&bytes, station_count, time.layout())?;
                if let Some(msg) = &msg {
                    debug!("status message: {}", msg);
                }
                Ok(msg)
            }
            None => Ok(None),
        }
    }

    fn get(
        &mut self,
        kind: FeedKind,
        time: &FeedTime,
    ) -> Result<Option<Vec<u8>>, FeedErr<F::Error>> {
        let url = feed_url(&self.base_url, kind, time);
        debug!("GET {}", url);

        let body = self
            .fetcher
            .fetch(&url)
            .map_err(|source| FeedErr::Transport {
                url: url.clone(),
                source,
            })?;
        if body.is_none() {
            debug!("no snapshot at {}", url);
        }
        Ok(body)
    }
}
