use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// User equivalent range error (filtered, rms) in metres, used to turn a
/// dilution of precision into an estimated position error.
const UERE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
/// A position in decimal degrees, positive north and east
pub struct Position {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

impl Position {
    /// Create a new position
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both coordinates are within range
    pub fn is_valid(&self) -> bool {
        self.lat.abs() <= 90.0 && self.lon.abs() <= 180.0
    }

    /// Whether the position is exactly on null island
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.lat, self.lon)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// GPS quality indicator reported in GGA sentences
pub enum LinkQuality {
    /// Fix not available
    NoFix = 0,
    /// Standard positioning service (non-differential) fix
    SPS = 1,
    /// Differential GPS fix
    DGPS = 2,
    /// Precise positioning service fix
    PPS = 3,
    /// Real time kinematic
    RTK = 4,
    /// Float RTK
    FloatRTK = 5,
    /// Estimated (dead reckoning)
    Estimate = 6,
    /// Manual input mode
    Manual = 7,
    /// Simulation mode
    Simulated = 8,
}

impl FromPrimitive for LinkQuality {
    fn from_i64(n: i64) -> Option<Self> {
        match n {
            0 => Some(Self::NoFix),
            1 => Some(Self::SPS),
            2 => Some(Self::DGPS),
            3 => Some(Self::PPS),
            4 => Some(Self::RTK),
            5 => Some(Self::FloatRTK),
            6 => Some(Self::Estimate),
            7 => Some(Self::Manual),
            8 => Some(Self::Simulated),
            _ => None,
        }
    }

    fn from_u64(n: u64) -> Option<Self> {
        i64::try_from(n).ok().and_then(Self::from_i64)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Dilution of precision triplet. Unitless, smaller is better.
pub struct Dop {
    /// Positional dilution of precision
    pub pdop: f32,
    /// Horizontal dilution of precision
    pub hdop: f32,
    /// Vertical dilution of precision
    pub vdop: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A satellite reported in view by a GSV sentence
pub struct Satellite {
    /// Pseudo-random noise code
    pub prn: u16,
    /// Azimuth from true north in degrees
    pub azimuth_deg: u16,
    /// Elevation in degrees
    pub elevation_deg: i16,
    /// Signal to noise ratio in dB
    pub snr_db: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Fix status flag carried by RMC sentences
pub enum FixFlag {
    /// `A`: the receiver has a fix
    Obtained,
    /// `V`: the receiver lost its fix
    Lost,
    /// Anything else
    #[default]
    Unknown,
}

impl FixFlag {
    /// Single character wire representation
    pub fn as_char(&self) -> char {
        match self {
            Self::Obtained => 'A',
            Self::Lost => 'V',
            Self::Unknown => ' ',
        }
    }
}

impl From<&str> for FixFlag {
    fn from(value: &str) -> Self {
        match value {
            "A" => Self::Obtained,
            "V" => Self::Lost,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
/// Estimated position error reported by Garmin PGRME sentences, in metres
pub struct EstimatedError {
    /// Horizontal position error
    pub horizontal: Option<f32>,
    /// Vertical position error
    pub vertical: Option<f32>,
    /// Overall spherical equivalent position error
    pub spherical: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
/// Everything a single decoded sentence contributed to the position fix.
///
/// Built fresh for every sentence and handed to the observer by value.
pub struct PositionUpdate {
    /// Position in decimal degrees
    pub position: Option<Position>,
    /// Altitude in metres
    pub altitude: Option<f32>,
    /// UTC timestamp of the fix
    pub timestamp: Option<DateTime<Utc>>,
    /// Ground speed in km/h
    pub speed: Option<f32>,
    /// Track made good in degrees true
    pub bearing: Option<f32>,
    /// Magnetic declination in degrees, west negative
    pub declination: Option<f32>,
    /// Fix quality
    pub link_quality: Option<LinkQuality>,
    /// Number of satellites in use or in view
    pub satellites: Option<u32>,
    /// Horizontal dilution of precision
    pub hdop: Option<f32>,
    /// Positional dilution of precision
    pub pdop: Option<f32>,
    /// Vertical dilution of precision
    pub vdop: Option<f32>,
    /// Sentence identifier that produced this update
    pub source: String,
    /// Fix status flag
    pub fix: FixFlag,
}

impl PositionUpdate {
    /// Create an empty update attributed to a sentence
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// Estimated horizontal position error in metres
    pub fn h_error(&self) -> Option<f32> {
        self.hdop.map(|hdop| hdop * UERE)
    }

    /// Estimated vertical position error in metres
    pub fn v_error(&self) -> Option<f32> {
        self.vdop.map(|vdop| vdop * UERE)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn position_validity() {
        assert!(Position::new(48.1, 11.5).is_valid());
        assert!(Position::new(-90.0, 180.0).is_valid());
        assert!(!Position::new(90.5, 0.0).is_valid());
        assert!(!Position::new(0.0, -180.1).is_valid());
        assert!(Position::default().is_zero());
    }

    #[test]
    fn link_quality_from_integer() {
        assert_eq!(LinkQuality::from_i32(0), Some(LinkQuality::NoFix));
        assert_eq!(LinkQuality::from_i32(4), Some(LinkQuality::RTK));
        assert_eq!(LinkQuality::from_u8(8), Some(LinkQuality::Simulated));
        assert_eq!(LinkQuality::from_i32(9), None);
        assert_eq!(LinkQuality::from_i32(-1), None);
    }

    #[test]
    fn fix_flag_chars() {
        assert_eq!(FixFlag::from("A").as_char(), 'A');
        assert_eq!(FixFlag::from("V").as_char(), 'V');
        assert_eq!(FixFlag::from("").as_char(), ' ');
        assert_eq!(FixFlag::from("X"), FixFlag::Unknown);
    }

    #[test]
    fn estimated_errors() {
        let mut update = PositionUpdate::new("GSA");
        assert_eq!(update.h_error(), None);
        update.hdop = Some(2.0);
        update.vdop = Some(1.0);
        assert_eq!(update.h_error(), Some(3.0));
        assert_eq!(update.v_error(), Some(1.5));
    }
}
