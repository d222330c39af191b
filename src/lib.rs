#![deny(missing_docs)]
//! # Garmin GPS decoder
//! Decoders for positioning data read from a GPS receiver over a serial link.
//!
//! Handles NMEA-0183 sentences (reassembly, checksums, field decoding and
//! dispatch to typed signals, including the Garmin proprietary sentences)
//! and the Garmin binary protocol used to download recorded tracks.
//!
//! Both decoders are fed raw bytes; [`NmeaListener`] and [`download_tracks`]
//! drive them from a [`Transport`] such as a [`SerialTransport`].
mod error;
pub mod garmin;
pub mod nmea;
mod transport;
mod types;

pub use error::{ConfigError, GarminError, NmeaError, TransportError};
pub use garmin::{
    download_tracks, tracks_from_bytes, tracks_from_file, Track, TrackBatch, TrackPoint,
    TrackTransfer, TransferConfig, TransferState,
};
pub use nmea::{
    ListenerConfig, NmeaDecoder, NmeaDispatcher, NmeaListener, NmeaObserver, NmeaSignal,
    SentenceRegistry,
};
pub use transport::{available_ports, SerialTransport, Transport};
pub use types::{
    Dop, EstimatedError, FixFlag, LinkQuality, Position, PositionUpdate, Satellite,
};
