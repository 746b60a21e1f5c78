//! # pews: KMA Earthquake Early-Warning Feed Decoder
//!
//! This crate decodes the binary feeds behind the Korea
//! Meteorological Administration's public earthquake early-warning
//! service (PEWS). There are two feeds:
//!
//! * the **station list** (`.s`), which gives the coordinates of
//!   every observing station; and
//!
//! * the **station data** (`.b`), a status message published once per
//!   second. It contains the shaking intensity measured at each station
//!   and, while an earthquake is in progress, the earthquake's
//!   parameters.
//!
//! Both feeds are tightly bit-packed and are not byte-aligned.
//!
//! ## Disclaimer
//!
//! This crate is dual-licensed MIT and Apache 2.0. Read these licenses
//! carefully as they may affect your rights.
//!
//! This crate is not affiliated with the KMA and has not been certified
//! for any purpose. The author **strongly discourages** its use in any
//! safety-critical applications. Always have at least two methods
//! available for receiving earthquake alerts.
//!
//! ## Example
//!
//! Fetching is up to you. Implement [`Fetch`] with the HTTP client of
//! your choice, then poll a [`Feed`] once per second:
//!
//! ```
//! use std::sync::Arc;
//!
//! use pews::{Feed, FeedClock, Fetch, Phase};
//!
//! # #[derive(Debug)]
//! # struct Offline;
//! # impl std::fmt::Display for Offline {
//! #     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//! #         f.write_str("offline")
//! #     }
//! # }
//! # impl std::error::Error for Offline {}
//! struct MyHttpClient;
//!
//! impl Fetch for MyHttpClient {
//!     type Error = Offline;
//!
//!     fn fetch(&mut self, url: &str) -> Result<Option<Vec<u8>>, Offline> {
//!         // GET `url`. Return Ok(None) on a non-200 status.
//!         # let _ = url;
//!         Ok(None)
//!     }
//! }
//!
//! let clock = Arc::new(FeedClock::new());
//! let mut feed = Feed::new(MyHttpClient, clock);
//!
//! let stations = feed.station_list().expect("transport error");
//! if let Some(msg) = feed.station_data(stations.len()).expect("transport error") {
//!     match msg.phase() {
//!         Phase::Alert | Phase::Info => {
//!             let eq = msg.earthquake_info().unwrap();
//!             println!("earthquake! {}", eq);
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! The decoders may also be used directly on payloads you obtain
//! some other way:
//!
//! ```
//! use pews::{decode_station_list, FeedLayout, StatusMessage};
//!
//! # let station_list_bytes: Vec<u8> = vec![0x4b, 0x69, 0xa0];
//! # let station_data_bytes: Vec<u8> = vec![0, 0, 0, 1, 0x50];
//! let stations = decode_station_list(&station_list_bytes);
//! let msg = StatusMessage::decode(&station_data_bytes, stations.len(), FeedLayout::RealTime)
//!     .expect("malformed message");
//! # assert_eq!(1, stations.len());
//! # assert_eq!(&[5], msg.unwrap().mmi());
//! ```
//!
//! ## Coordinates
//!
//! Coordinates are integer hundredths of a degree. Station and
//! epicenter positions can only be expressed within 30.00°–40.23° N
//! and 120.00°–130.23° E. Helper methods like
//! [`Station::latitude_deg()`] convert to degrees.
//!
//! ## Simulations
//!
//! The KMA publishes replays of notable past earthquakes. To poll a
//! replay, [arm](FeedClock::arm) a [`Simulation`] on the clock. The
//! feed URLs and the status message layout switch over automatically,
//! and switch back once the simulation's duration has elapsed.
//!
//! ## Crate features
//!
//! * `serde`: Derive `Serialize` for stations and status messages.
//!   Field names are camelCase, like `stationUpdateNeeded`.

mod bits;
mod clock;
mod codes;
mod feed;
mod message;
mod station;

pub use bits::{BitRangeErr, BitSlice};
pub use clock::{
    parse_timestamp, FeedClock, FeedTime, Simulation, SystemTimeSource, TimeSource,
    TIMESTAMP_FORMAT,
};
pub use codes::{Phase, Region};
pub use feed::{feed_url, Feed, FeedErr, FeedKind, Fetch, DEFAULT_BASE_URL};
pub use message::{DecodeErr, EarthquakeInfo, FeedLayout, Field, StatusMessage};
pub use station::{decode_station_list, Station, STATION_RECORD_BITS};
