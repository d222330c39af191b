use crate::GarminError;

/// Data link escape: starts every frame and is doubled inside payloads
pub const DLE: u8 = 0x10;
/// End of text: follows an unpaired [`DLE`] to close a frame
pub const ETX: u8 = 0x03;

/// A de-escaped frame: `[DLE, command, length, data.., checksum, DLE, ETX]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarminFrame {
    bytes: Vec<u8>,
}

impl GarminFrame {
    /// Build a frame from raw wire bytes, collapsing escaped [`DLE`] pairs
    pub fn from_raw(raw: &[u8]) -> Self {
        Self {
            bytes: unstuff(raw.to_vec()),
        }
    }

    /// Command code, the byte after the leading [`DLE`]
    pub fn command(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    /// The de-escaped bytes, start marker and terminator included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of de-escaped bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Remove the second byte of every escaped [`DLE`] pair.
///
/// The first byte and the trailing `DLE ETX` are left alone. Compacts in
/// place: `read` visits every byte, `write` only advances for kept ones.
fn unstuff(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.len() < 3 {
        return bytes;
    }
    let end = bytes.len() - 2;
    let mut write = 1;
    let mut pair_open = false;
    for read in 1..end {
        let byte = bytes[read];
        if byte == DLE && pair_open {
            pair_open = false;
            continue;
        }
        pair_open = byte == DLE;
        bytes[write] = byte;
        write += 1;
    }
    bytes.copy_within(end.., write);
    bytes.truncate(write + 2);
    bytes
}

/// Index of the [`ETX`] closing the frame that starts at `start`.
///
/// An `ETX` closes the frame only after an odd run of `DLE`s: escaped
/// `DLE`s come in pairs, the closing one is alone.
fn frame_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut count = 0usize;
    for (index, &byte) in bytes.iter().enumerate().skip(start + 1) {
        match byte {
            DLE => count += 1,
            ETX if count % 2 == 1 => return Some(index),
            ETX => {}
            _ => count = 0,
        }
    }
    None
}

/// Splits an incrementally received byte stream into frames.
#[derive(Debug, Clone, Default)]
pub struct GarminFramer {
    buffer: Vec<u8>,
}

impl GarminFramer {
    /// Framer with an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete frame, or `None` until more bytes arrive.
    ///
    /// Bytes before a frame's leading [`DLE`] are discarded.
    pub fn next_frame(&mut self) -> Option<GarminFrame> {
        let Some(start) = self.buffer.iter().position(|&b| b == DLE) else {
            self.buffer.clear();
            return None;
        };
        if start > 0 {
            log::trace!("Skipping {} bytes between frames", start);
            self.buffer.drain(..start);
        }
        let end = frame_end(&self.buffer, 0)?;
        let frame = GarminFrame::from_raw(&self.buffer[..=end]);
        self.buffer.drain(..=end);
        Some(frame)
    }

    /// Whether a started frame is waiting for its terminator
    pub fn has_partial(&self) -> bool {
        self.buffer.contains(&DLE)
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear()
    }
}

impl Iterator for GarminFramer {
    type Item = GarminFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}

/// Split a complete capture into frames.
///
/// A frame left open at the end of the data makes the capture corrupt.
pub fn split_frames(bytes: &[u8]) -> Result<Vec<GarminFrame>, GarminError> {
    let mut framer = GarminFramer::new();
    framer.push(bytes);
    let frames: Vec<_> = framer.by_ref().collect();
    if framer.has_partial() {
        return Err(GarminError::FrameCorrupt(
            "unterminated frame at end of data".to_string(),
        ));
    }
    Ok(frames)
}
