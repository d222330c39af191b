use std::{
    thread,
    time::{Duration, Instant},
};

use garmin_gps::{
    available_ports,
    nmea::{self, SentenceReassembler},
    SerialTransport, Transport, TransportError,
};

/// Pause after an empty read
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// Baud rates tried on each port, most common first
const BAUD_RATES: [u32; 2] = [9600, 4800];

/// Listen on `transport` for up to `window` and report whether a sentence
/// with a valid checksum arrived.
pub fn probe<T: Transport + ?Sized>(
    transport: &mut T,
    window: Duration,
) -> Result<bool, TransportError> {
    let deadline = Instant::now() + window;
    let mut reassembler = SentenceReassembler::new();
    let mut buf = [0u8; 256];
    while Instant::now() < deadline {
        let n = transport.read(&mut buf)?;
        if n == 0 {
            thread::sleep(IDLE_BACKOFF);
            continue;
        }
        let text = String::from_utf8_lossy(&buf[..n]);
        if reassembler
            .feed(&text)
            .iter()
            .any(|sentence| nmea::is_valid(sentence))
        {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Try every serial port at each known baud rate.
///
/// Returns the `(port, baud)` pairs a receiver answered on.
pub fn scan(
    window: Duration,
    timeout: Duration,
    first: bool,
) -> Result<Vec<(String, u32)>, TransportError> {
    let mut found = Vec::new();
    for port in available_ports()? {
        for baud in BAUD_RATES {
            log::info!("Probing {} at {} baud", port, baud);
            let mut transport = match SerialTransport::open(&port, baud, timeout) {
                Ok(transport) => transport,
                Err(e) => {
                    log::warn!("{}", e);
                    break;
                }
            };
            match probe(&mut transport, window) {
                Ok(true) => {
                    log::info!("Receiver found on {} at {} baud", port, baud);
                    found.push((port.clone(), baud));
                    if first {
                        return Ok(found);
                    }
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("{}: {}", port, e);
                    break;
                }
            }
        }
    }
    Ok(found)
}
