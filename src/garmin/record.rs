use std::path::Path;

use bitfield_struct::bitfield;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::GarminError;

use super::{
    frame::{split_frames, GarminFrame, DLE},
    CMD_ACK, CMD_POINT, CMD_RECORD_COUNT, CMD_TRACK, END_OF_TRANSFER,
};

/// Seconds from the Unix epoch to 1989-12-31T00:00:00Z
const GARMIN_EPOCH_OFFSET: i64 = 631_065_600;
/// Degrees per semicircle unit
const SEMICIRCLE: f64 = 180.0 / 2_147_483_648.0;
/// De-escaped length of a track point frame
const POINT_FRAME_LEN: usize = 30;
/// Frames shorter than this cannot carry a record
const MIN_FRAME_LEN: usize = 7;

#[bitfield(u32)]
/// Altitude word of a track point, LSB first
struct PackedHeight {
    #[bits(23)]
    fraction: u32,
    #[bits(8)]
    exponent: u8,
    #[bits(1)]
    __: u8,
}

impl PackedHeight {
    /// `(1 + fraction / 2^23) * 2^(exponent - 128)`; the sign bit is ignored
    fn metres(self) -> f32 {
        let mantissa = 1.0 + self.fraction() as f32 / (1u32 << 23) as f32;
        mantissa * 2f32.powi(i32::from(self.exponent()) - 128)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A recorded track point
pub struct TrackPoint {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Height in metres
    pub height_m: f32,
    /// Seconds since 1989-12-31T00:00:00Z
    pub time: u32,
    /// Whether this point starts a new segment
    pub is_new_segment: bool,
}

impl TrackPoint {
    /// Decode a de-escaped `0x22` frame of exactly 30 bytes
    pub fn from_frame(frame: &GarminFrame) -> Result<Self, GarminError> {
        let bytes = frame.as_bytes();
        if bytes.len() != POINT_FRAME_LEN {
            return Err(GarminError::InvalidRecord(format!(
                "track point frame has {} bytes, expected {}",
                bytes.len(),
                POINT_FRAME_LEN
            )));
        }
        if bytes[1] != CMD_POINT {
            return Err(GarminError::InvalidRecord(format!(
                "command {:#04x} is not a track point",
                bytes[1]
            )));
        }
        let word = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };
        Ok(Self {
            lat: word(3) as i32 as f64 * SEMICIRCLE,
            lon: word(7) as i32 as f64 * SEMICIRCLE,
            time: word(11),
            height_m: PackedHeight::from_bits(word(15)).metres(),
            is_new_segment: bytes[23] == 1,
        })
    }

    /// Recording time in UTC
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(GARMIN_EPOCH_OFFSET + i64::from(self.time), 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// A named track made of segments of points
pub struct Track {
    /// Track name, possibly empty
    pub name: String,
    /// Segments in recording order
    pub segments: Vec<Vec<TrackPoint>>,
}

impl Track {
    /// Empty track with a name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            segments: Vec::new(),
        }
    }

    /// Decode a de-escaped `0x63` track header frame
    pub fn from_frame(frame: &GarminFrame) -> Result<Self, GarminError> {
        let bytes = frame.as_bytes();
        if bytes.len() < 4 || bytes[1] != CMD_TRACK {
            return Err(GarminError::InvalidRecord(
                "frame does not hold a track header".to_string(),
            ));
        }
        let length = usize::from(bytes[2]);
        let name = if length == 4 {
            String::new()
        } else {
            bytes
                .get(5..=length + 1)
                .ok_or_else(|| {
                    GarminError::InvalidRecord(format!(
                        "track name of length {} overruns a {} byte frame",
                        length,
                        bytes.len()
                    ))
                })?
                .iter()
                .map(|&b| char::from(b))
                .collect()
        };
        Ok(Self::new(&name))
    }

    /// Append a point, opening a segment when the point asks for one or
    /// when there is none yet
    pub fn add_point(&mut self, point: TrackPoint) {
        match self.segments.last_mut() {
            Some(segment) if !point.is_new_segment => segment.push(point),
            _ => self.segments.push(vec![point]),
        }
    }

    /// All points across segments
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.segments.iter().flatten()
    }

    /// Number of points across segments
    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }
}

/// One decoded frame of a track transfer
#[derive(Debug, Clone, PartialEq)]
pub enum GarminRecord {
    /// Number of records the device is about to send
    RecordCount(u32),
    /// Acknowledgement
    Ack,
    /// Header opening a new track
    Track(Track),
    /// A point of the current track
    Point(TrackPoint),
    /// Transfer finished
    EndOfTransfer,
    /// Any other command, ignored
    Other(u8),
}

impl GarminRecord {
    /// Interpret a de-escaped frame
    pub fn decode(frame: &GarminFrame) -> Result<Self, GarminError> {
        let bytes = frame.as_bytes();
        if bytes.len() < MIN_FRAME_LEN || bytes[0] != DLE {
            return Err(GarminError::FrameCorrupt(format!(
                "{} byte frame {:02X?}",
                bytes.len(),
                bytes
            )));
        }
        Ok(match bytes[1] {
            CMD_RECORD_COUNT => Self::RecordCount(record_count(bytes)?),
            CMD_ACK => Self::Ack,
            CMD_POINT => Self::Point(TrackPoint::from_frame(frame)?),
            CMD_TRACK => Self::Track(Track::from_frame(frame)?),
            _ if bytes == END_OF_TRANSFER => Self::EndOfTransfer,
            other => Self::Other(other),
        })
    }
}

/// Little-endian count of `bytes[2]` bytes starting at offset 3
fn record_count(bytes: &[u8]) -> Result<u32, GarminError> {
    let length = usize::from(bytes[2]);
    let data = bytes.get(3..3 + length).ok_or_else(|| {
        GarminError::InvalidRecord(format!("record count of {} bytes overruns frame", length))
    })?;
    Ok(data
        .iter()
        .rev()
        .fold(0u32, |count, &byte| count << 8 | u32::from(byte)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Tracks decoded from one transfer, with record accounting
pub struct TrackBatch {
    /// Tracks in transfer order
    pub tracks: Vec<Track>,
    /// Record count announced by the device, if it announced one
    pub expected_records: Option<u32>,
    /// Track points received
    pub received_records: u32,
}

impl TrackBatch {
    /// The count mismatch, when the device announced a different number of
    /// records than were received
    pub fn count_mismatch(&self) -> Option<GarminError> {
        match self.expected_records {
            Some(expected) if expected != self.received_records => {
                Some(GarminError::RecordCountMismatch {
                    expected,
                    received: self.received_records,
                })
            }
            _ => None,
        }
    }

    /// Total points across all tracks
    pub fn point_count(&self) -> usize {
        self.tracks.iter().map(Track::point_count).sum()
    }
}

/// Decode the frames of a transfer into tracks.
///
/// Any corrupt frame or invalid record fails the whole batch. A count
/// mismatch is logged and reported through [`TrackBatch::count_mismatch`].
pub fn decode_tracks(frames: &[GarminFrame]) -> Result<TrackBatch, GarminError> {
    let mut batch = TrackBatch::default();
    let mut current: Option<Track> = None;
    let mut finished = false;
    for frame in frames {
        match GarminRecord::decode(frame)? {
            GarminRecord::RecordCount(count) => batch.expected_records = Some(count),
            GarminRecord::Ack => {}
            GarminRecord::Point(point) => {
                batch.received_records += 1;
                match current.as_mut() {
                    Some(track) => track.add_point(point),
                    None => log::warn!("Track point before any track header, skipped"),
                }
            }
            GarminRecord::Track(track) => {
                if let Some(done) = current.replace(track) {
                    batch.tracks.push(done);
                }
            }
            GarminRecord::EndOfTransfer => {
                batch.tracks.extend(current.take());
                finished = true;
                if let Some(err) = batch.count_mismatch() {
                    log::warn!("Transfer error: {}", err);
                }
            }
            GarminRecord::Other(command) => log::debug!("Ignoring command {:#04x}", command),
        }
    }
    if !finished {
        log::warn!("No end of transfer marker");
        batch.tracks.extend(current.take());
    }
    Ok(batch)
}

/// Decode a captured transfer
pub fn tracks_from_bytes(bytes: &[u8]) -> Result<TrackBatch, GarminError> {
    decode_tracks(&split_frames(bytes)?)
}

/// Decode a transfer captured to a file
pub fn tracks_from_file<P: AsRef<Path>>(path: P) -> Result<TrackBatch, GarminError> {
    log::info!("Reading tracks from {}", path.as_ref().display());
    let bytes = std::fs::read(path)?;
    tracks_from_bytes(&bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    /// Escape and frame a payload the way the device does
    fn frame(command: u8, data: &[u8]) -> GarminFrame {
        let mut body = vec![command, data.len() as u8];
        body.extend_from_slice(data);
        let sum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        body.push(sum.wrapping_neg());
        let mut raw = vec![DLE];
        for byte in body {
            raw.push(byte);
            if byte == DLE {
                raw.push(DLE);
            }
        }
        raw.extend_from_slice(&[DLE, 0x03]);
        GarminFrame::from_raw(&raw)
    }

    fn point_data(lat: i32, lon: i32, time: u32, height: u32, new_segment: bool) -> Vec<u8> {
        let mut data = Vec::with_capacity(24);
        data.extend_from_slice(&lat.to_le_bytes());
        data.extend_from_slice(&lon.to_le_bytes());
        data.extend_from_slice(&time.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.extend_from_slice(&[0; 4]);
        data.push(u8::from(new_segment));
        data.extend_from_slice(&[0; 3]);
        data
    }

    #[test]
    fn point_fields() {
        // 0x40490000: exponent 128, fraction 0x490000
        let data = point_data(1 << 30, -(1 << 30), 1000, 0x4049_0000, true);
        let point = TrackPoint::from_frame(&frame(CMD_POINT, &data)).unwrap();
        assert_eq!(point.lat, 90.0);
        assert_eq!(point.lon, -90.0);
        assert_eq!(point.time, 1000);
        assert!((point.height_m - 1.570_312_5).abs() < 1e-6);
        assert!(point.is_new_segment);
        assert_eq!(
            point.timestamp().unwrap().to_rfc3339(),
            "1989-12-31T00:16:40+00:00"
        );
    }

    #[test]
    fn height_exponent_bias() {
        assert_eq!(PackedHeight::from_bits(0x4000_0000).metres(), 1.0);
        assert_eq!(PackedHeight::from_bits(0x4080_0000).metres(), 2.0);
        assert_eq!(PackedHeight::from_bits(0xC080_0000).metres(), 2.0);
        assert_eq!(PackedHeight::from_bits(0x3F80_0000).metres(), 0.5);
    }

    #[test]
    fn point_with_escaped_byte() {
        let data = point_data(0x10, 0, 0x1010, 0x4000_0000, false);
        let point = TrackPoint::from_frame(&frame(CMD_POINT, &data)).unwrap();
        assert_eq!(point.time, 0x1010);
        assert!(!point.is_new_segment);
    }

    #[test]
    fn point_rejects_wrong_shape() {
        let short = frame(CMD_POINT, &[0; 10]);
        assert!(matches!(
            TrackPoint::from_frame(&short),
            Err(GarminError::InvalidRecord(_))
        ));
        let data = point_data(0, 0, 0, 0, false);
        assert!(TrackPoint::from_frame(&frame(CMD_TRACK, &data)).is_err());
    }

    #[test]
    fn track_names() {
        let mut data = vec![0x01, 0x0F];
        data.extend_from_slice(b"HIKE\0");
        let track = Track::from_frame(&frame(CMD_TRACK, &data)).unwrap();
        assert_eq!(track.name, "HIKE");
        let unnamed = Track::from_frame(&frame(CMD_TRACK, &[0x01, 0x0F, 0x00, 0x00])).unwrap();
        assert_eq!(unnamed.name, "");
    }

    #[test]
    fn segments() {
        let point = |new_segment| TrackPoint {
            lat: 0.0,
            lon: 0.0,
            height_m: 0.0,
            time: 0,
            is_new_segment: new_segment,
        };
        let mut track = Track::new("walk");
        track.add_point(point(false));
        track.add_point(point(false));
        track.add_point(point(true));
        assert_eq!(track.segments.len(), 2);
        assert_eq!(track.segments[0].len(), 2);
        assert_eq!(track.points().count(), 3);
    }

    #[test]
    fn record_count_little_endian() {
        let record = GarminRecord::decode(&frame(CMD_RECORD_COUNT, &[0x2C, 0x01])).unwrap();
        assert_eq!(record, GarminRecord::RecordCount(300));
    }

    #[test]
    fn three_points_declared_five() {
        let mut frames = vec![
            frame(CMD_RECORD_COUNT, &[5, 0]),
            frame(CMD_TRACK, &[0x01, 0x0F, 0x00, 0x00]),
        ];
        for i in 0..3 {
            frames.push(frame(CMD_POINT, &point_data(i, i, 0, 0x4000_0000, i == 0)));
        }
        frames.push(GarminFrame::from_raw(&END_OF_TRANSFER));
        let batch = decode_tracks(&frames).unwrap();
        assert_eq!(batch.tracks.len(), 1);
        assert_eq!(batch.point_count(), 3);
        assert!(matches!(
            batch.count_mismatch(),
            Some(GarminError::RecordCountMismatch {
                expected: 5,
                received: 3
            })
        ));
    }

    #[test]
    fn short_frame_fails_batch() {
        let frames = vec![
            frame(CMD_TRACK, &[0x01, 0x0F, 0x00, 0x00]),
            GarminFrame::from_raw(&[DLE, 0x06, DLE, 0x03]),
        ];
        assert!(matches!(
            decode_tracks(&frames),
            Err(GarminError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn missing_end_keeps_last_track() {
        let frames = vec![
            frame(CMD_TRACK, &[0x01, 0x0F, 0x00, 0x00]),
            frame(CMD_POINT, &point_data(0, 0, 0, 0, true)),
        ];
        let batch = decode_tracks(&frames).unwrap();
        assert_eq!(batch.tracks.len(), 1);
        assert_eq!(batch.count_mismatch().map(|e| e.to_string()), None);
    }
}
