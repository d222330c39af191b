//! # NMEA-0183
//! Sentence reassembly, checksum validation, field decoding and dispatch.
//!
//! Raw bytes go into an [`NmeaDecoder`] (or a threaded [`NmeaListener`]);
//! complete sentences are checked, looked up in the [`SentenceRegistry`]
//! and decoded into a sequence of [`NmeaSignal`]s handed to an
//! [`NmeaObserver`].
mod checksum;
mod dispatcher;
mod fields;
mod listener;
mod reassembler;
mod registry;
mod sentences;
mod signal;

pub use checksum::{checksum, is_valid, split_fields, verify};
pub use dispatcher::NmeaDispatcher;
pub use fields::{
    parse_altitude, parse_bearing, parse_date_time, parse_date_time_parts, parse_declination,
    parse_fix, parse_float, parse_int, parse_lat, parse_link_quality, parse_lon, parse_num,
    parse_speed, parse_time,
};
pub use listener::{ListenerConfig, NmeaDecoder, NmeaListener};
pub use reassembler::SentenceReassembler;
pub use registry::{DecodeFn, SentenceDescriptor, SentenceFields, SentenceRegistry};
pub use signal::{NmeaObserver, NmeaSignal};
