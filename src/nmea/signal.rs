use std::sync::mpsc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Dop, EstimatedError, LinkQuality, Position, PositionUpdate, Satellite, TransportError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A decoded piece of information emitted while dispatching a sentence
pub enum NmeaSignal {
    /// The checksum-valid sentence text, before any type lookup
    RawSentence(String),
    /// Position in decimal degrees
    Position(Position),
    /// UTC date and time
    DateTime(DateTime<Utc>),
    /// Ground speed in km/h
    Speed(f32),
    /// Track made good in degrees
    Bearing(f32),
    /// Magnetic declination in degrees, west negative
    Declination(f32),
    /// The receiver reported a valid fix
    FixObtained,
    /// The receiver reported its fix as void
    FixLost,
    /// Altitude in metres
    Altitude(f32),
    /// GGA quality indicator
    LinkQuality(LinkQuality),
    /// Number of satellites in view or in use
    SatellitesInView(u32),
    /// One satellite record from a GSV sentence
    Satellite(Satellite),
    /// GSA fix type: 1 = no fix, 2 = 2D, 3 = 3D
    FixType(u8),
    /// Dilution of precision triplet
    Precision(Dop),
    /// Heading in degrees
    Heading(f32),
    /// Currently active horizontal datum
    MapDatum(String),
    /// Receiver-estimated position error
    EstimatedError(EstimatedError),
    /// Aggregate of everything the sentence contributed
    PositionUpdate(PositionUpdate),
}

/// Receives signals from the dispatcher and transport errors from a listener
pub trait NmeaObserver {
    /// Handle one decoded signal
    fn signal(&mut self, signal: NmeaSignal);

    /// Handle an error raised by the transport
    fn transport_error(&mut self, _error: &TransportError) {}
}

impl<F: FnMut(NmeaSignal)> NmeaObserver for F {
    fn signal(&mut self, signal: NmeaSignal) {
        self(signal)
    }
}

impl NmeaObserver for Vec<NmeaSignal> {
    fn signal(&mut self, signal: NmeaSignal) {
        self.push(signal)
    }
}

impl NmeaObserver for mpsc::Sender<NmeaSignal> {
    fn signal(&mut self, signal: NmeaSignal) {
        // receiver gone means nobody is listening any more
        let _ = self.send(signal);
    }
}
