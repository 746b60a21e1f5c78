//! Earthquake status messages

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, trace, warn};
use thiserror::Error;

use crate::bits::{BitRangeErr, BitSlice};
use crate::codes::{intensity_from_nibble, Phase, Region, INTENSITY_FALLBACK};
use crate::station::read_coordinates;

/// Header layout of a status message
///
/// The simulation feed omits the last earthquake ID from the
/// message header, so its header is shorter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedLayout {
    /// Live feed: 32-bit header
    RealTime,

    /// Replay of a past event: 8-bit header
    Simulation,
}

impl FeedLayout {
    /// Header width, in bits
    pub fn header_bits(&self) -> usize {
        match self {
            FeedLayout::RealTime => 32,
            FeedLayout::Simulation => 8,
        }
    }
}

/// A status message field which could not be read
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::IntoStaticStr,
)]
pub enum Field {
    #[strum(serialize = "message header")]
    Header,
    #[strum(serialize = "station intensities")]
    Intensities,
    #[strum(serialize = "earthquake information block")]
    EarthquakeBlock,
    #[strum(serialize = "epicenter coordinates")]
    Coordinates,
    #[strum(serialize = "magnitude")]
    Magnitude,
    #[strum(serialize = "depth")]
    Depth,
    #[strum(serialize = "origin time")]
    OccurredAt,
    #[strum(serialize = "earthquake ID")]
    EarthquakeId,
    #[strum(serialize = "maximum intensity")]
    MaxIntensity,
    #[strum(serialize = "maximum intensity area")]
    MaxIntensityArea,
    #[strum(serialize = "epicenter name")]
    EpicenterName,
}

/// Error decoding a status message
///
/// Status messages are decoded strictly: if the payload is
/// too short to contain a field, the whole message is
/// rejected and the offending field is reported.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeErr {
    /// The payload ends before the field does
    #[error("invalid status message: truncated {field}: {source}")]
    Truncated {
        /// Field that could not be read
        field: Field,

        /// Underlying range error
        #[source]
        source: BitRangeErr,
    },
}

impl DecodeErr {
    /// Field which could not be decoded
    pub fn field(&self) -> Field {
        match self {
            DecodeErr::Truncated { field, .. } => *field,
        }
    }
}

// attach the name of the field being read to a range error
trait FieldContext<T> {
    fn field(self, field: Field) -> Result<T, DecodeErr>;
}

impl<T> FieldContext<T> for Result<T, BitRangeErr> {
    #[inline]
    fn field(self, field: Field) -> Result<T, DecodeErr> {
        self.map_err(|source| DecodeErr::Truncated { field, source })
    }
}

/// A decoded earthquake status message
///
/// The status feed publishes one message per second. Every
/// message contains the shaking intensity at each station.
/// During the [`Alert`](Phase::Alert) and [`Info`](Phase::Info)
/// phases, it also contains [`EarthquakeInfo`].
///
/// ```
/// use pews::{FeedLayout, Phase, StatusMessage};
///
/// // update flag clear, phase 00, last earthquake field 123,
/// // then two stations at nibbles 2 and 0xb
/// let payload = [0b0000_0000, 0x00, 0x00, 0x7b, 0x2b];
/// let msg = StatusMessage::decode(&payload, 2, FeedLayout::RealTime)
///     .expect("valid message")
///     .expect("non-empty payload");
///
/// assert_eq!(Phase::Normal, msg.phase());
/// assert!(!msg.station_update_needed());
/// assert_eq!(Some("20123"), msg.last_earthquake_id());
/// assert_eq!(&[2, 10], msg.mmi());
/// assert!(msg.earthquake_info().is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct StatusMessage {
    station_update_needed: bool,
    phase: Phase,
    last_earthquake_id: Option<String>,
    mmi: Vec<u8>,
    earthquake_info: Option<EarthquakeInfo>,
}

impl StatusMessage {
    /// Decode a status message
    ///
    /// `station_count` is the number of stations in the most
    /// recent station list. One intensity value is decoded for
    /// each of them. The `layout` depends on whether the
    /// payload came from the live or the simulation feed.
    ///
    /// An empty payload means there is no message this cycle
    /// and decodes as `Ok(None)`.
    pub fn decode(
        bytes: &[u8],
        station_count: usize,
        layout: FeedLayout,
    ) -> Result<Option<Self>, DecodeErr> {
        if bytes.is_empty() {
            debug!("status message: empty payload");
            return Ok(None);
        }

        let bits = BitSlice::new(bytes);
        trace!(
            "status message: {} bytes, {} stations, {:?}",
            bytes.len(),
            station_count,
            layout
        );

        let header = bits.subrange(0, layout.header_bits()).field(Field::Header)?;
        let station_update_needed = header.bit(0).field(Field::Header)?;
        let phase = Phase::from_status_bits(header.read_uint(1, 2).field(Field::Header)? as u8);
        let last_earthquake_id = match layout {
            FeedLayout::RealTime => Some(earthquake_id_str(
                header.read_uint(6, 26).field(Field::Header)?,
            )),
            FeedLayout::Simulation => None,
        };

        let body = bits.skip(layout.header_bits()).field(Field::Header)?;
        let mmi = decode_intensities(&body, station_count)?;

        let earthquake_info = if phase.has_earthquake_info() {
            Some(EarthquakeInfo::decode(bytes, &body)?)
        } else {
            None
        };

        Ok(Some(Self {
            station_update_needed,
            phase,
            last_earthquake_id,
            mmi,
            earthquake_info,
        }))
    }

    /// True if clients should reload the station list
    pub fn station_update_needed(&self) -> bool {
        self.station_update_needed
    }

    /// Current broadcast phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// ID of the most recent earthquake
    ///
    /// Only the live feed carries this field. It is `None`
    /// for messages from the simulation feed.
    pub fn last_earthquake_id(&self) -> Option<&str> {
        self.last_earthquake_id.as_deref()
    }

    /// Intensity at each station, in station list order
    pub fn mmi(&self) -> &[u8] {
        &self.mmi
    }

    /// Highest intensity observed at any station
    pub fn peak_mmi(&self) -> Option<u8> {
        self.mmi.iter().copied().max()
    }

    /// Earthquake parameters
    ///
    /// Present only in the `Alert` and `Info` phases.
    pub fn earthquake_info(&self) -> Option<&EarthquakeInfo> {
        self.earthquake_info.as_ref()
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} stations, peak intensity {}",
            self.phase,
            self.mmi.len(),
            self.peak_mmi().unwrap_or(0)
        )?;
        if let Some(eq) = &self.earthquake_info {
            write!(f, ": {}", eq)?;
        }
        Ok(())
    }
}

/// Parameters of a detected earthquake
///
/// Decoded from the fixed-width block at the end of an
/// `Alert` or `Info` status message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct EarthquakeInfo {
    longitude: i32,
    latitude: i32,
    earthquake_id: String,
    magnitude: u8,
    depth: u16,
    occurred_at: String,
    max_intensity: u8,
    max_intensity_area: Vec<Region>,
    epicenter_name: String,
}

impl EarthquakeInfo {
    /// Width of the earthquake information block, in bits
    pub const BLOCK_BITS: usize = 600;

    /// Length of the epicenter name, in bytes
    pub const EPICENTER_NAME_BYTES: usize = 60;

    /// Origin time offset applied by the feed, in seconds
    const ORIGIN_TIME_OFFSET: u64 = 9 * 3600;

    /// Area mask value meaning "not applicable"
    const AREA_MASK_NONE: u64 = (1 << Self::AREA_MASK_BITS) - 1;

    const AREA_MASK_BITS: usize = 17;

    // decode from the end of the message `body`; the epicenter
    // name comes from the end of the raw `bytes`
    fn decode(bytes: &[u8], body: &BitSlice<'_>) -> Result<Self, DecodeErr> {
        let block = body.tail(Self::BLOCK_BITS).field(Field::EarthquakeBlock)?;

        let (longitude, latitude) = read_coordinates(&block).field(Field::Coordinates)?;
        let magnitude = block.read_uint(20, 7).field(Field::Magnitude)? as u8;
        let depth = block.read_uint(27, 9).field(Field::Depth)? as u16;
        let origin = block.read_uint(36, 33).field(Field::OccurredAt)?;
        let earthquake_id = earthquake_id_str(block.read_uint(69, 26).field(Field::EarthquakeId)?);
        let max_intensity = block.read_uint(95, 4).field(Field::MaxIntensity)? as u8;
        let area_mask = block
            .read_uint(99, Self::AREA_MASK_BITS)
            .field(Field::MaxIntensityArea)?;

        let epicenter_name = decode_epicenter_name(bytes)?;

        Ok(Self {
            longitude,
            latitude,
            earthquake_id,
            magnitude,
            depth,
            occurred_at: format!("{}000", origin + Self::ORIGIN_TIME_OFFSET),
            max_intensity,
            max_intensity_area: regions_from_mask(area_mask),
            epicenter_name,
        })
    }

    /// Epicenter longitude, in hundredths of a degree east
    pub fn longitude(&self) -> i32 {
        self.longitude
    }

    /// Epicenter latitude, in hundredths of a degree north
    pub fn latitude(&self) -> i32 {
        self.latitude
    }

    /// Epicenter longitude, in degrees east
    pub fn longitude_deg(&self) -> f64 {
        self.longitude as f64 / 100.0
    }

    /// Epicenter latitude, in degrees north
    pub fn latitude_deg(&self) -> f64 {
        self.latitude as f64 / 100.0
    }

    /// Earthquake ID, like "`2021007178`"
    pub fn earthquake_id(&self) -> &str {
        &self.earthquake_id
    }

    /// Magnitude, in tenths
    ///
    /// A value of `35` is magnitude 3.5.
    pub fn magnitude(&self) -> u8 {
        self.magnitude
    }

    /// Magnitude
    pub fn magnitude_f32(&self) -> f32 {
        self.magnitude as f32 / 10.0
    }

    /// Depth, in kilometers
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Origin time, as a millisecond timestamp string
    ///
    /// The feed's origin time plus nine hours, in UNIX seconds,
    /// followed by `000`. The extra digits are textual and
    /// carry no sub-second precision.
    pub fn occurred_at(&self) -> &str {
        &self.occurred_at
    }

    /// Origin time as a `DateTime`
    ///
    /// Interprets [`occurred_at()`](#method.occurred_at) as
    /// milliseconds since the UNIX epoch, including the nine
    /// hour offset applied by the feed. Returns `None` if the
    /// value is out of range for `DateTime`.
    pub fn occurred_at_datetime(&self) -> Option<DateTime<Utc>> {
        let millis: i64 = self.occurred_at.parse().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Maximum observed intensity
    pub fn max_intensity(&self) -> u8 {
        self.max_intensity
    }

    /// Regions which experience the maximum intensity
    ///
    /// Empty if the feed marks the area as not applicable.
    pub fn max_intensity_area(&self) -> &[Region] {
        &self.max_intensity_area
    }

    /// Human-readable epicenter description
    pub fn epicenter_name(&self) -> &str {
        &self.epicenter_name
    }
}

impl fmt::Display for EarthquakeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "M{:.1} depth {} km at {:.2}N {:.2}E ({}), max intensity {}",
            self.magnitude_f32(),
            self.depth,
            self.latitude_deg(),
            self.longitude_deg(),
            self.epicenter_name,
            self.max_intensity
        )?;
        if !self.max_intensity_area.is_empty() {
            let names: Vec<&str> = self.max_intensity_area.iter().map(Region::as_str).collect();
            write!(f, " in {}", names.join(" "))?;
        }
        write!(f, " [{}]", self.earthquake_id)
    }
}

// "20" followed by the decimal field value
fn earthquake_id_str(field: u64) -> String {
    format!("20{}", field)
}

// Decode one intensity nibble per station
fn decode_intensities(body: &BitSlice<'_>, station_count: usize) -> Result<Vec<u8>, DecodeErr> {
    let width = station_count.checked_mul(4).unwrap_or(usize::MAX);
    let nibbles = body.subrange(0, width).field(Field::Intensities)?;

    let mut unmapped = 0usize;
    let mut out = Vec::with_capacity(station_count);
    for nibble in nibbles.chunks(4) {
        let nibble = nibble.read_uint(0, 4).field(Field::Intensities)? as u8;
        out.push(intensity_from_nibble(nibble).unwrap_or_else(|| {
            unmapped += 1;
            INTENSITY_FALLBACK
        }));
    }

    if unmapped > 0 {
        warn!(
            "status message: {} station(s) sent an unmapped intensity code",
            unmapped
        );
    }

    Ok(out)
}

// Regions selected by the area mask
//
// The most-significant bit of the 17-bit mask is the first
// region. All ones means "not applicable."
fn regions_from_mask(mask: u64) -> Vec<Region> {
    if mask == EarthquakeInfo::AREA_MASK_NONE {
        return Vec::new();
    }

    (0..EarthquakeInfo::AREA_MASK_BITS)
        .filter(|pos| (mask >> (EarthquakeInfo::AREA_MASK_BITS - 1 - pos)) & 1 == 1)
        .filter_map(Region::from_mask_position)
        .collect()
}

// The epicenter name fills the last 60 bytes of the payload
fn decode_epicenter_name(bytes: &[u8]) -> Result<String, DecodeErr> {
    let start = bytes
        .len()
        .checked_sub(EarthquakeInfo::EPICENTER_NAME_BYTES)
        .ok_or(BitRangeErr::OutOfBounds {
            offset: 0,
            len: EarthquakeInfo::EPICENTER_NAME_BYTES * 8,
            available: bytes.len() * 8,
        })
        .field(Field::EpicenterName)?;

    let name = String::from_utf8_lossy(&bytes[start..]);
    Ok(name.trim_matches(|c| c == '\0' || c == ' ').to_owned())
}
