use std::time::Duration;

use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
/// Errors raised while configuring a [`SentenceRegistry`](crate::SentenceRegistry)
pub enum ConfigError {
    /// The sentence identifier was empty
    #[error("Sentence identifier must not be empty")]
    EmptyId,
    /// The sentence identifier contained non-ASCII characters
    #[error("Sentence identifier {0:?} is not ASCII")]
    InvalidId(String),
    /// No decoder was supplied for the sentence
    #[error("No decoder supplied for sentence {0}")]
    MissingDecoder(String),
}

#[derive(Error, Clone, Debug, PartialEq)]
/// Errors raised while decoding a single NMEA sentence.
///
/// None of these are fatal: the dispatcher logs them, reports the sentence
/// as unrecognised and moves on to the next one.
pub enum NmeaError {
    /// The sentence carries no `*` checksum delimiter
    #[error("Sentence has no checksum")]
    MissingChecksum,
    /// The transmitted checksum does not match the computed one
    #[error("Checksum mismatch: computed {expected}, received {found}")]
    ChecksumMismatch {
        /// Checksum computed over the sentence body
        expected: String,
        /// Checksum transmitted after the `*`
        found: String,
    },
    /// No decoder is registered for the sentence identifier
    #[error("No decoder registered for sentence {0}")]
    UnrecognizedSentence(String),
    /// A field required by the decoder was empty or unparsable
    #[error("Malformed field {field} in {sentence} sentence")]
    MalformedField {
        /// Sentence identifier
        sentence: String,
        /// Zero-based field index
        field: usize,
    },
    /// The decoder failed unexpectedly
    #[error("Decoder fault: {0}")]
    DecoderFault(String),
}

#[derive(Error, Debug)]
/// Errors raised by the serial transport collaborator
pub enum TransportError {
    /// The port could not be opened
    #[error("Failed to open {port}: {source}")]
    Open {
        /// Port name
        port: String,
        /// Underlying serial port error
        #[source]
        source: serialport::Error,
    },
    /// Reading or writing failed
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The transport was closed by the remote end
    #[error("Transport closed")]
    Closed,
}

#[derive(Error, Debug)]
/// Errors raised by the Garmin track transfer and its decoders
pub enum GarminError {
    /// A frame failed a structural check; the whole batch is discarded
    #[error("Corrupt frame: {0}")]
    FrameCorrupt(String),
    /// A track or track point record could not be decoded
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    /// The device announced a different number of records than it sent
    #[error("Record count mismatch: expected {expected}, received {received}")]
    RecordCountMismatch {
        /// Records announced by the device
        expected: u32,
        /// Records actually decoded
        received: u32,
    },
    /// The device stopped sending for longer than the idle timeout
    #[error("Transfer timed out after {0:?} of silence")]
    TransferTimeout(Duration),
    /// The device never answered the track request
    #[error("No response to track request")]
    TransferNoResponse,
    /// The transfer has not reached the complete state
    #[error("Transfer is not complete (state: {0})")]
    NotComplete(String),
    /// The transport failed during the transfer
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A capture file could not be read
    #[error("Failed to read capture: {0}")]
    Io(#[from] std::io::Error),
}
