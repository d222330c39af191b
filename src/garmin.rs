//! # Garmin track transfer
//! Framing, record decoding and the download state machine for the Garmin
//! binary protocol.
//!
//! Frames are `DLE`-delimited, with literal `DLE` bytes doubled inside the
//! payload. A download is a track request answered by a record count, track
//! headers and track points, and an end-of-transfer frame; the host asks for
//! each next record as soon as the previous one arrives.
mod frame;
mod record;
mod transfer;

pub use frame::{split_frames, GarminFrame, GarminFramer, DLE, ETX};
pub use record::{
    decode_tracks, tracks_from_bytes, tracks_from_file, GarminRecord, Track, TrackBatch,
    TrackPoint,
};
pub use transfer::{download_tracks, TrackTransfer, TransferConfig, TransferState};

/// Record count announcement
pub const CMD_RECORD_COUNT: u8 = 0x1B;
/// Acknowledge
pub const CMD_ACK: u8 = 0x06;
/// Track point
pub const CMD_POINT: u8 = 0x22;
/// Track header
pub const CMD_TRACK: u8 = 0x63;
/// End of transfer
pub const CMD_END: u8 = 0x0C;

/// Host request for all tracks
pub const TRACK_REQUEST: [u8; 8] = [0x10, 0x0A, 0x02, 0x06, 0x00, 0xEE, 0x10, 0x03];
/// Host acknowledgement asking for the next record
pub const NEXT_RECORD: [u8; 8] = [0x10, 0x06, 0x02, 0x22, 0x00, 0xD6, 0x10, 0x03];
/// Device frame closing a transfer
pub const END_OF_TRANSFER: [u8; 8] = [0x10, CMD_END, 0x02, 0x06, 0x00, 0xEC, 0x10, 0x03];
