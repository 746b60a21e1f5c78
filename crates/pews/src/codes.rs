//! PEWS phase codes, regions, and intensity tables
//!
//! The tables in this module are positional: the value of a
//! bit field is an index into them. Their order is part of
//! the wire format and must never change.

use std::fmt;

use strum::EnumMessage;

/// Broadcast phase of the feed
///
/// Every status message carries a two-bit phase code. The
/// mapping from code to phase is **not** ordinal:
///
/// | Code | Phase                                     |
/// |------|-------------------------------------------|
/// | `00` | [`Normal`](Phase::Normal)                 |
/// | `01` | [`UpdateInfo`](Phase::UpdateInfo)         |
/// | `10` | [`Alert`](Phase::Alert)                   |
/// | `11` | [`Info`](Phase::Info)                     |
///
/// ```
/// use pews::Phase;
///
/// assert_eq!(Phase::Alert, Phase::from_status_bits(0b10));
/// assert_eq!(Phase::UpdateInfo, Phase::from_status_bits(0b01));
/// assert_eq!("Early warning", Phase::Alert.as_display_str());
/// assert!(Phase::Info.has_earthquake_info());
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum_macros::EnumMessage,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[repr(u8)]
pub enum Phase {
    /// No earthquake in progress
    #[strum(serialize = "Normal", detailed_message = "Normal")]
    Normal = 1,

    /// Earthquake detected; early warning issued
    ///
    /// The message carries automatically-determined
    /// [earthquake information](crate::EarthquakeInfo).
    #[strum(serialize = "Alert", detailed_message = "Early warning")]
    Alert = 2,

    /// Earthquake information confirmed by an analyst
    #[strum(serialize = "Info", detailed_message = "Earthquake information")]
    Info = 3,

    /// Previously-issued information has been revised
    #[strum(serialize = "UpdateInfo", detailed_message = "Revised information")]
    UpdateInfo = 4,
}

impl Phase {
    /// Decode the two-bit status code
    ///
    /// Only the two least-significant bits of `code` are
    /// considered.
    pub fn from_status_bits(code: u8) -> Self {
        match code & 0b11 {
            0b00 => Phase::Normal,
            0b01 => Phase::UpdateInfo,
            0b10 => Phase::Alert,
            0b11 => Phase::Info,
            _ => Phase::Normal,
        }
    }

    /// Upstream numeric phase
    ///
    /// Normal is `1`, Alert `2`, Info `3`, and UpdateInfo `4`.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Human-readable string representation
    pub fn as_display_str(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }

    /// Phase name, like "`Alert`"
    pub fn as_str(&self) -> &'static str {
        self.get_serializations()[0]
    }

    /// True if messages in this phase carry an earthquake block
    pub fn has_earthquake_info(&self) -> bool {
        matches!(self, Phase::Alert | Phase::Info)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Normal
    }
}

impl AsRef<str> for Phase {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_display_str().fmt(f)
    }
}

/// Province-level region of South Korea
///
/// The maximum-intensity area of an earthquake is sent as a
/// 17-bit mask. Bit *i*, counted from the start of the field,
/// selects the *i*-th region in [`Region::ALL`].
///
/// Regions display with their Korean name, which is also the
/// name the upstream service uses.
///
/// ```
/// use pews::Region;
///
/// assert_eq!(Some(Region::Jeju), Region::from_mask_position(16));
/// assert_eq!("제주", Region::Jeju.as_str());
/// assert_eq!("Jeju", Region::Jeju.as_english_str());
/// assert_eq!(Region::Seoul, "서울".parse().unwrap());
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum_macros::EnumMessage,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[repr(u8)]
pub enum Region {
    #[strum(serialize = "서울", detailed_message = "Seoul")]
    Seoul,
    #[strum(serialize = "부산", detailed_message = "Busan")]
    Busan,
    #[strum(serialize = "대구", detailed_message = "Daegu")]
    Daegu,
    #[strum(serialize = "인천", detailed_message = "Incheon")]
    Incheon,
    #[strum(serialize = "광주", detailed_message = "Gwangju")]
    Gwangju,
    #[strum(serialize = "대전", detailed_message = "Daejeon")]
    Daejeon,
    #[strum(serialize = "울산", detailed_message = "Ulsan")]
    Ulsan,
    #[strum(serialize = "세종", detailed_message = "Sejong")]
    Sejong,
    #[strum(serialize = "경기", detailed_message = "Gyeonggi")]
    Gyeonggi,
    #[strum(serialize = "강원", detailed_message = "Gangwon")]
    Gangwon,
    #[strum(serialize = "충북", detailed_message = "North Chungcheong")]
    NorthChungcheong,
    #[strum(serialize = "충남", detailed_message = "South Chungcheong")]
    SouthChungcheong,
    #[strum(serialize = "전북", detailed_message = "North Jeolla")]
    NorthJeolla,
    #[strum(serialize = "전남", detailed_message = "South Jeolla")]
    SouthJeolla,
    #[strum(serialize = "경북", detailed_message = "North Gyeongsang")]
    NorthGyeongsang,
    #[strum(serialize = "경남", detailed_message = "South Gyeongsang")]
    SouthGyeongsang,
    #[strum(serialize = "제주", detailed_message = "Jeju")]
    Jeju,
}

impl Region {
    /// All regions, in area-mask bit order
    pub const ALL: [Region; 17] = [
        Region::Seoul,
        Region::Busan,
        Region::Daegu,
        Region::Incheon,
        Region::Gwangju,
        Region::Daejeon,
        Region::Ulsan,
        Region::Sejong,
        Region::Gyeonggi,
        Region::Gangwon,
        Region::NorthChungcheong,
        Region::SouthChungcheong,
        Region::NorthJeolla,
        Region::SouthJeolla,
        Region::NorthGyeongsang,
        Region::SouthGyeongsang,
        Region::Jeju,
    ];

    /// Region for bit `pos` of the area mask
    pub fn from_mask_position(pos: usize) -> Option<Self> {
        Self::ALL.get(pos).copied()
    }

    /// Korean region name, like "`서울`"
    pub fn as_str(&self) -> &'static str {
        self.get_serializations()[0]
    }

    /// Romanized region name, like "`Seoul`"
    pub fn as_english_str(&self) -> &'static str {
        self.get_detailed_message().expect("missing definition")
    }
}

impl AsRef<str> for Region {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Serializes as the upstream numeric phase, like `2`
#[cfg(feature = "serde")]
impl serde::Serialize for Phase {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Region {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Per-station intensity, indexed by the four-bit station nibble
///
/// Nibbles 12 through 14 carry no measurement and read as
/// intensity 1. The upstream table has no entry for 15.
pub(crate) const INTENSITY_TABLE: [u8; 15] = [1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 1, 1, 1];

/// Intensity assigned to nibble values outside [`INTENSITY_TABLE`]
pub(crate) const INTENSITY_FALLBACK: u8 = 1;

/// Convert a station nibble to an intensity
///
/// Returns `None` for nibble values which have no table entry.
pub(crate) fn intensity_from_nibble(nibble: u8) -> Option<u8> {
    INTENSITY_TABLE.get(nibble as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    use strum::IntoEnumIterator;

    #[test]
    fn test_phase_codes() {
        assert_eq!(Phase::Normal, Phase::from_status_bits(0b00));
        assert_eq!(Phase::UpdateInfo, Phase::from_status_bits(0b01));
        assert_eq!(Phase::Alert, Phase::from_status_bits(0b10));
        assert_eq!(Phase::Info, Phase::from_status_bits(0b11));

        // high bits ignored
        assert_eq!(Phase::Alert, Phase::from_status_bits(0b1110));

        assert_eq!(1, Phase::Normal.code());
        assert_eq!(2, Phase::Alert.code());
        assert_eq!(3, Phase::Info.code());
        assert_eq!(4, Phase::UpdateInfo.code());

        assert_eq!(Phase::Normal, Phase::default());
    }

    #[test]
    fn test_phase_strings() {
        for phase in Phase::iter() {
            assert!(!phase.as_display_str().is_empty());
            assert_eq!(Ok(phase), phase.as_str().parse());
        }
        assert_eq!("Revised information", format!("{}", Phase::UpdateInfo));
        assert_eq!(
            vec![Phase::Alert, Phase::Info],
            Phase::iter()
                .filter(Phase::has_earthquake_info)
                .collect::<Vec<_>>()
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize() {
        assert_eq!("2", serde_json::to_string(&Phase::Alert).unwrap());
        assert_eq!("4", serde_json::to_string(&Phase::UpdateInfo).unwrap());
        assert_eq!("\"제주\"", serde_json::to_string(&Region::Jeju).unwrap());
    }

    #[test]
    fn test_region_order() {
        // declaration order, ALL, and the wire table must agree
        let declared: Vec<Region> = Region::iter().collect();
        assert_eq!(declared.as_slice(), &Region::ALL);

        let names: Vec<&str> = Region::ALL.iter().map(Region::as_str).collect();
        assert_eq!(
            names,
            vec![
                "서울", "부산", "대구", "인천", "광주", "대전", "울산", "세종", "경기", "강원",
                "충북", "충남", "전북", "전남", "경북", "경남", "제주"
            ]
        );

        for (i, region) in Region::ALL.iter().enumerate() {
            assert_eq!(Some(*region), Region::from_mask_position(i));
            assert_eq!(i, *region as usize);
            assert_eq!(Ok(*region), Region::try_from(region.as_str()));
        }
        assert_eq!(None, Region::from_mask_position(17));
        assert!(Region::try_from("Seoul").is_err());
    }

    #[test]
    fn test_intensity_table() {
        assert_eq!(Some(1), intensity_from_nibble(0));
        assert_eq!(Some(1), intensity_from_nibble(1));
        assert_eq!(Some(2), intensity_from_nibble(2));
        assert_eq!(Some(9), intensity_from_nibble(9));
        assert_eq!(Some(10), intensity_from_nibble(10));
        assert_eq!(Some(10), intensity_from_nibble(11));
        assert_eq!(Some(1), intensity_from_nibble(12));
        assert_eq!(Some(1), intensity_from_nibble(14));
        assert_eq!(None, intensity_from_nibble(15));
    }
}
