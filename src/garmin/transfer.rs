use std::{
    fmt::{self, Display, Formatter},
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{GarminError, Transport};

use super::{
    frame::GarminFramer,
    record::{tracks_from_bytes, GarminRecord, TrackBatch},
    END_OF_TRANSFER, NEXT_RECORD, TRACK_REQUEST,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Where a track transfer stands
pub enum TransferState {
    /// Nothing requested yet
    Idle,
    /// Track request sent, waiting for the device to answer
    AwaitingFirstByte,
    /// Records are arriving
    Receiving,
    /// End of transfer marker received
    Complete,
    /// The device went quiet mid-transfer
    TimedOut,
    /// The device never answered
    Aborted,
}

impl TransferState {
    /// Whether the transfer can make no further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::TimedOut | Self::Aborted)
    }
}

impl Display for TransferState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingFirstByte => "awaiting first byte",
            Self::Receiving => "receiving",
            Self::Complete => "complete",
            Self::TimedOut => "timed out",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Transfer timing
pub struct TransferConfig {
    /// How long the device has to answer the track request
    pub first_byte_timeout: Duration,
    /// Longest silence tolerated once records are arriving
    pub idle_timeout: Duration,
    /// Pause between empty reads
    pub poll_interval: Duration,
    /// Average bytes per record, for the progress estimate
    pub bytes_per_record: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            first_byte_timeout: Duration::from_millis(200),
            idle_timeout: Duration::from_millis(2000),
            poll_interval: Duration::from_millis(10),
            bytes_per_record: 30,
        }
    }
}

/// Track download state machine.
///
/// Performs no I/O: the caller sends what [`TrackTransfer::start`] and
/// [`TrackTransfer::receive`] return, feeds received bytes in, and calls
/// [`TrackTransfer::poll`] to let the timeouts fire.
#[derive(Debug, Clone)]
pub struct TrackTransfer {
    config: TransferConfig,
    state: TransferState,
    buffer: Vec<u8>,
    framer: GarminFramer,
    estimated_bytes: Option<usize>,
    requested_at: Option<Instant>,
    last_receipt: Option<Instant>,
}

impl TrackTransfer {
    /// Idle transfer
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config,
            state: TransferState::Idle,
            buffer: Vec::new(),
            framer: GarminFramer::new(),
            estimated_bytes: None,
            requested_at: None,
            last_receipt: None,
        }
    }

    /// Begin a transfer, returning the track request to send.
    ///
    /// Anything received by an earlier transfer is discarded.
    pub fn start(&mut self, now: Instant) -> &'static [u8] {
        self.buffer.clear();
        self.framer.clear();
        self.estimated_bytes = None;
        self.last_receipt = None;
        self.requested_at = Some(now);
        self.state = TransferState::AwaitingFirstByte;
        log::info!("Requesting tracks");
        &TRACK_REQUEST
    }

    /// Accept received bytes, returning the next-record request to send
    /// unless the transfer just completed.
    ///
    /// Timeouts are applied as of `now` first, so bytes arriving after a
    /// deadline are refused even when `poll` was not called in between.
    pub fn receive(&mut self, bytes: &[u8], now: Instant) -> Option<&'static [u8]> {
        match self.poll(now) {
            TransferState::AwaitingFirstByte => {
                log::info!("Device answered, receiving tracks");
                self.state = TransferState::Receiving;
            }
            TransferState::Receiving => {}
            state => {
                log::debug!("Ignoring {} bytes while {}", bytes.len(), state);
                return None;
            }
        }
        self.last_receipt = Some(now);
        self.buffer.extend_from_slice(bytes);
        if self.estimated_bytes.is_none() {
            self.estimate(bytes);
        }
        if self.buffer.ends_with(&END_OF_TRANSFER) {
            log::info!("Transfer complete, {} bytes", self.buffer.len());
            self.state = TransferState::Complete;
            return None;
        }
        Some(&NEXT_RECORD)
    }

    /// Look for the record count announcement to size the progress estimate
    fn estimate(&mut self, bytes: &[u8]) {
        self.framer.push(bytes);
        while let Some(frame) = self.framer.next_frame() {
            if let Ok(GarminRecord::RecordCount(count)) = GarminRecord::decode(&frame) {
                log::info!("Device announced {} records", count);
                self.estimated_bytes = Some(count as usize * self.config.bytes_per_record);
                self.framer.clear();
                break;
            }
        }
    }

    /// Apply timeouts as of `now` and return the resulting state
    pub fn poll(&mut self, now: Instant) -> TransferState {
        match self.state {
            TransferState::AwaitingFirstByte => {
                let waited = self
                    .requested_at
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or_default();
                if waited > self.config.first_byte_timeout {
                    log::warn!("No response to track request within {:?}", waited);
                    self.state = TransferState::Aborted;
                }
            }
            TransferState::Receiving => {
                let idle = self
                    .last_receipt
                    .map(|at| now.saturating_duration_since(at))
                    .unwrap_or_default();
                if idle > self.config.idle_timeout {
                    log::warn!("Transfer idle for {:?}, giving up", idle);
                    self.state = TransferState::TimedOut;
                }
            }
            _ => {}
        }
        self.state
    }

    /// Current state
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Estimated completion in percent, 0 until the record count is known
    pub fn progress(&self) -> f64 {
        match self.estimated_bytes {
            Some(0) => 100.0,
            Some(estimate) => (self.buffer.len() as f64 * 100.0 / estimate as f64).min(100.0),
            None => 0.0,
        }
    }

    /// Decode the completed transfer. Timed out or aborted transfers yield
    /// no data.
    pub fn finish(self) -> Result<TrackBatch, GarminError> {
        match self.state {
            TransferState::Complete => tracks_from_bytes(&self.buffer),
            TransferState::TimedOut => Err(GarminError::TransferTimeout(self.config.idle_timeout)),
            TransferState::Aborted => Err(GarminError::TransferNoResponse),
            state => Err(GarminError::NotComplete(state.to_string())),
        }
    }
}

/// Download all tracks over `transport`, reporting progress in percent.
pub fn download_tracks<T, F>(
    transport: &mut T,
    config: &TransferConfig,
    mut on_progress: F,
) -> Result<TrackBatch, GarminError>
where
    T: Transport + ?Sized,
    F: FnMut(f64),
{
    let mut transfer = TrackTransfer::new(config.clone());
    transport.write_all(transfer.start(Instant::now()))?;
    let mut buf = [0u8; 1024];
    loop {
        let n = transport.read(&mut buf)?;
        let now = Instant::now();
        if n > 0 {
            if let Some(reply) = transfer.receive(&buf[..n], now) {
                transport.write_all(reply)?;
            }
            on_progress(transfer.progress());
        }
        if transfer.poll(now).is_terminal() {
            break;
        }
        if n == 0 {
            thread::sleep(config.poll_interval);
        }
    }
    transfer.finish()
}
