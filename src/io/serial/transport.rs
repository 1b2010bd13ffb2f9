// relaycard/src/io/serial/transport.rs
//
// Serial transport for the relay card.
//
// Owns the open port and performs one request/response exchange at a time:
// clear buffers, write the 4-byte request, then read 4-byte chunks until one
// starts with a response header (>= 0xF0) or the line goes quiet. Chunks that
// start below 0xF0 are noise or stale partial frames and are dropped; that
// scan is what re-aligns the reader with the card's framing.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::utils::SerialLineConfig;
use crate::error::{RelayError, Result};
use crate::io::codec::{Frame, FrameCodec, RelayCodec, FRAME_LEN};
use crate::logging::Logger;

/// Smallest leading byte accepted as a response header.
pub const RESPONSE_HEADER_MIN: u8 = 0xF0;

/// Pause after every exchange; the card drops commands sent back to back.
pub const DEFAULT_PACE: Duration = Duration::from_millis(100);

/// Default bound on noise chunks dropped within one exchange.
pub const DEFAULT_MAX_DISCARDED_CHUNKS: usize = 64;

// ============================================================================
// Link Abstraction
// ============================================================================

/// A byte link the transport can drive: a real serial port, or a scripted
/// stand-in. A read that times out or returns 0 bytes means "no more data".
pub trait SerialLink: Read + Write + Send {
    /// Discard anything pending in the input and output buffers.
    fn clear_buffers(&mut self) -> io::Result<()>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn clear_buffers(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Exchange options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportOptions {
    /// Reject responses whose checksum byte does not match. The card's
    /// checksum is not checked on receive unless this is set.
    pub verify_checksum: bool,
    /// Fail with `Desynchronized` after this many noise chunks (None = unbounded)
    pub max_discarded_chunks: Option<usize>,
    /// Sleep after each successful exchange
    pub pace: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            verify_checksum: false,
            max_discarded_chunks: Some(DEFAULT_MAX_DISCARDED_CHUNKS),
            pace: DEFAULT_PACE,
        }
    }
}

/// Owner of the connection to one relay card line.
pub struct SerialTransport {
    link: Option<Box<dyn SerialLink>>,
    port_name: Option<String>,
    line: SerialLineConfig,
    options: TransportOptions,
    log: Logger,
}

impl SerialTransport {
    pub fn new(options: TransportOptions, log: Logger) -> Self {
        Self {
            link: None,
            port_name: None,
            line: SerialLineConfig::conrad(),
            options,
            log,
        }
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Open `port` with the fixed line settings and clear both buffers.
    pub fn connect(&mut self, port: &str) -> Result<()> {
        let handle = self
            .line
            .builder(port)
            .open()
            .map_err(|e| RelayError::connection(format!("Failed to open {}: {}", port, e)))?;

        tlog!(
            self.log,
            "[transport] Opened {} at {} (read timeout {} ms)",
            port,
            self.line.describe(),
            self.line.read_timeout.as_millis()
        );

        self.attach(Box::new(handle))?;
        self.port_name = Some(port.to_string());
        Ok(())
    }

    /// Take ownership of an already-open link and clear its buffers.
    pub fn attach(&mut self, mut link: Box<dyn SerialLink>) -> Result<()> {
        link.clear_buffers()
            .map_err(|e| RelayError::connection(format!("Failed to clear buffers: {}", e)))?;
        self.link = Some(link);
        Ok(())
    }

    /// Send `request` and return the card's response frame.
    pub fn communicate(&mut self, request: &Frame) -> Result<Frame> {
        let link = self
            .link
            .as_mut()
            .ok_or_else(|| RelayError::connection("serial connection is not open"))?;

        link.clear_buffers()?;

        tlog!(self.log, "[REQUEST] {}", request);
        link.write_all(&RelayCodec::encode(request))?;
        link.flush()?;

        let mut discarded = 0usize;
        let (mut chunk, mut len) = read_chunk(link)?;
        while len > 0 && chunk[0] < RESPONSE_HEADER_MIN {
            if let Some(max) = self.options.max_discarded_chunks {
                if discarded >= max {
                    tlog!(
                        self.log,
                        "[transport] Giving up after discarding {} chunks",
                        discarded
                    );
                    return Err(RelayError::Desynchronized { discarded });
                }
            }
            tdebug!(self.log, "[transport] discarding: {:02x?}", &chunk[..len]);
            discarded += 1;
            (chunk, len) = read_chunk(link)?;
        }

        tdebug!(self.log, "[transport] last read: {:02x?}", &chunk[..len]);

        let response = RelayCodec::decode(&chunk[..len])?;
        if self.options.verify_checksum {
            response.verify_checksum()?;
        }

        tlog!(self.log, "[RESPONSE] {}", response);

        if !self.options.pace.is_zero() {
            std::thread::sleep(self.options.pace);
        }

        Ok(response)
    }

    /// Close the link if open. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.link.take().is_some() {
            tlog!(
                self.log,
                "[transport] Closed {}",
                self.port_name.as_deref().unwrap_or("link")
            );
        }
        self.port_name = None;
    }
}

/// Read up to one frame's worth of bytes, stopping early when the line goes
/// quiet. Returns the buffer and how many bytes were filled.
fn read_chunk<L: Read + ?Sized>(link: &mut L) -> Result<([u8; FRAME_LEN], usize)> {
    let mut buf = [0u8; FRAME_LEN];
    let mut filled = 0;
    while filled < FRAME_LEN {
        match link.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok((buf, filled))
}

// ============================================================================
// Tests
// ============================================================================
