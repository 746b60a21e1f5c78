//! Observing stations and the station list feed

use std::fmt;

use log::trace;

use crate::bits::{BitRangeErr, BitSlice};

/// Bias removed from every encoded latitude field
pub(crate) const LATITUDE_BIAS: i32 = 3000;

/// Bias removed from every encoded longitude field
pub(crate) const LONGITUDE_BIAS: i32 = 12000;

/// Width of one coordinate field, in bits
pub(crate) const COORDINATE_BITS: usize = 10;

/// Width of one station record in the station list
pub const STATION_RECORD_BITS: usize = 2 * COORDINATE_BITS;

/// A seismic observing station
///
/// Coordinates are integer hundredths of a degree. The
/// feed can only express latitudes from 30.00° to 40.23°
/// and longitudes from 120.00° to 130.23°.
///
/// The order of stations in the station list is significant:
/// the intensity values of a
/// [`StatusMessage`](crate::StatusMessage) are matched to
/// stations by position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Station {
    longitude: i32,
    latitude: i32,
}

impl Station {
    /// New station from hundredths of a degree
    pub fn new(longitude: i32, latitude: i32) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Longitude, in hundredths of a degree east
    pub fn longitude(&self) -> i32 {
        self.longitude
    }

    /// Latitude, in hundredths of a degree north
    pub fn latitude(&self) -> i32 {
        self.latitude
    }

    /// Longitude, in degrees east
    pub fn longitude_deg(&self) -> f64 {
        self.longitude as f64 / 100.0
    }

    /// Latitude, in degrees north
    pub fn latitude_deg(&self) -> f64 {
        self.latitude as f64 / 100.0
    }

    /// Decode a 20-bit station record
    pub(crate) fn from_record(record: &BitSlice<'_>) -> Result<Self, BitRangeErr> {
        let (longitude, latitude) = read_coordinates(record)?;
        Ok(Self::new(longitude, latitude))
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}N {:.2}E", self.latitude_deg(), self.longitude_deg())
    }
}

/// Decode the station list feed
///
/// The feed is a sequence of 20-bit records. Each record
/// holds a 10-bit latitude followed by a 10-bit longitude.
/// Trailing bits which do not fill a complete record are
/// ignored, so short or empty input yields fewer (or no)
/// stations rather than an error.
///
/// ```
/// use pews::decode_station_list;
///
/// // lat field 0x3ff, lon field 0x000, then four bits of padding
/// let stations = decode_station_list(&[0xff, 0xc0, 0x00]);
/// assert_eq!(1, stations.len());
/// assert_eq!(4023, stations[0].latitude());
/// assert_eq!(12000, stations[0].longitude());
///
/// assert!(decode_station_list(&[]).is_empty());
/// ```
pub fn decode_station_list(bytes: &[u8]) -> Vec<Station> {
    let bits = BitSlice::new(bytes);
    trace!(
        "station list: {} bytes, {} complete records",
        bytes.len(),
        bits.len() / STATION_RECORD_BITS
    );

    bits.chunks(STATION_RECORD_BITS)
        .map_while(|record| Station::from_record(&record).ok())
        .collect()
}

// Read a biased (latitude, longitude) pair from the first
// 20 bits of `bits`; returns (longitude, latitude)
pub(crate) fn read_coordinates(bits: &BitSlice<'_>) -> Result<(i32, i32), BitRangeErr> {
    let latitude = bits.read_uint(0, COORDINATE_BITS)? as i32 + LATITUDE_BIAS;
    let longitude = bits.read_uint(COORDINATE_BITS, COORDINATE_BITS)? as i32 + LONGITUDE_BIAS;
    Ok((longitude, latitude))
}
