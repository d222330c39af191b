//! # Transport
//! Byte transport the decoders are driven from. [`SerialTransport`] wraps a
//! serial port; tests and capture replays supply their own [`Transport`].
use std::{
    io::{ErrorKind, Read, Write},
    time::Duration,
};

use serialport::SerialPort;

use crate::TransportError;

/// A bidirectional byte link to a receiver.
///
/// `read` returns `Ok(0)` when nothing arrived before the read timeout.
pub trait Transport: Send {
    /// Read whatever is available into `buf`
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
    /// Write all of `bytes`
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(bytes)
    }
}

/// Serial port transport. The port is released when the value is dropped.
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `port` at `baud` with the given read timeout
    pub fn open(port: &str, baud: u32, timeout: Duration) -> Result<Self, TransportError> {
        let handle = serialport::new(port, baud)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: port.to_string(),
                source,
            })?;
        log::info!("Opened {} at {} baud", port, baud);
        Ok(Self {
            name: port.to_string(),
            port: handle,
        })
    }

    /// Port name this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the port
    pub fn close(self) {
        drop(self)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::debug!("Closing {}", self.name);
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

/// Names of the serial ports present on this machine
pub fn available_ports() -> Result<Vec<String>, TransportError> {
    let ports = serialport::available_ports().map_err(|source| TransportError::Open {
        port: "<enumerate>".to_string(),
        source,
    })?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
