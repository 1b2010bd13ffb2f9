// relaycard/src/io/client.rs
//
// High-level relay card operations. Every call is one or more blocking
// exchanges over the transport; each response must carry the response code
// of the request that produced it.

use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::io::codec::{CommandCode, Frame};
use crate::io::relay_state::RelayFlags;
use crate::io::serial::transport::{SerialLink, SerialTransport};
use crate::logging::Logger;

/// Channels switched by `pulse` (relays 6, 7 and 8).
pub const DEFAULT_PULSE_CHANNELS: [usize; 3] = [5, 6, 7];

/// How long `pulse` holds the channels on.
pub const DEFAULT_PULSE_HOLD: Duration = Duration::from_millis(500);

pub struct RelayCardClient {
    transport: SerialTransport,
    log: Logger,
}

impl RelayCardClient {
    pub fn new(transport: SerialTransport, log: Logger) -> Self {
        Self { transport, log }
    }

    pub fn connect(&mut self, port: &str) -> Result<()> {
        self.transport.connect(port)
    }

    pub fn attach(&mut self, link: Box<dyn SerialLink>) -> Result<()> {
        self.transport.attach(link)
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn shutdown(&mut self) {
        self.transport.shutdown();
    }

    /// Write the whole state byte (SETPORT) and return what the card confirms.
    pub fn set_all_relays(&mut self, card_id: u8, flags: RelayFlags) -> Result<RelayFlags> {
        self.exchange(CommandCode::SetPort, card_id, flags.to_byte())
    }

    pub fn enable_all_relays(&mut self, card_id: u8) -> Result<RelayFlags> {
        self.set_all_relays(card_id, RelayFlags::ALL_ON)
    }

    pub fn disable_all_relays(&mut self, card_id: u8) -> Result<RelayFlags> {
        self.set_all_relays(card_id, RelayFlags::ALL_OFF)
    }

    /// Switch one relay on (SETSINGLE), leaving the others as they are.
    pub fn enable_relay(&mut self, card_id: u8, index: usize) -> Result<RelayFlags> {
        let mask = RelayFlags::single(index)?;
        self.exchange(CommandCode::SetSingle, card_id, mask.to_byte())
    }

    /// Switch one relay off (DELSINGLE), leaving the others as they are.
    pub fn disable_relay(&mut self, card_id: u8, index: usize) -> Result<RelayFlags> {
        let mask = RelayFlags::single(index)?;
        self.exchange(CommandCode::DelSingle, card_id, mask.to_byte())
    }

    /// Invert one relay on the card (TOGGLE).
    pub fn toggle_relay(&mut self, card_id: u8, index: usize) -> Result<RelayFlags> {
        let mask = RelayFlags::single(index)?;
        self.exchange(CommandCode::Toggle, card_id, mask.to_byte())
    }

    /// Read the current state (GETPORT).
    pub fn query_state(&mut self, card_id: u8) -> Result<RelayFlags> {
        self.exchange(CommandCode::GetPort, card_id, 0)
    }

    /// Switch relays 6-8 on for half a second, then off again.
    pub fn pulse(&mut self, card_id: u8) -> Result<RelayFlags> {
        self.pulse_channels(card_id, &DEFAULT_PULSE_CHANNELS, DEFAULT_PULSE_HOLD)
    }

    /// Switch `indices` on, hold for `hold`, switch them off. Other channels
    /// keep the state read at the start. Returns the final confirmed state.
    pub fn pulse_channels(
        &mut self,
        card_id: u8,
        indices: &[usize],
        hold: Duration,
    ) -> Result<RelayFlags> {
        let before = self.query_state(card_id)?;
        let on = before.with_channels(indices, true)?;
        let off = before.with_channels(indices, false)?;

        tlog!(
            self.log,
            "[client] Pulse on card {} channels {:?} for {} ms",
            card_id,
            indices,
            hold.as_millis()
        );

        self.set_all_relays(card_id, on)?;
        std::thread::sleep(hold);
        self.set_all_relays(card_id, off)
    }

    fn exchange(&mut self, command: CommandCode, card_id: u8, data: u8) -> Result<RelayFlags> {
        let request = Frame::request(command, card_id, data);
        let response = self.transport.communicate(&request)?;
        check_response(command, &response)?;
        Ok(response.data_flags())
    }
}

/// Fails unless `response` is a response frame answering `command`.
fn check_response(command: CommandCode, response: &Frame) -> Result<()> {
    let expected = command.response_code();
    if !response.is_response() || response.command() != expected {
        return Err(RelayError::ProtocolMismatch {
            expected,
            received: response.command(),
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
