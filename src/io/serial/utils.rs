// relaycard/src/io/serial/utils.rs
//
// Serial line parameters for the relay card. The card speaks exactly one
// framing (8 data bits, no parity, 1 stop bit); only the rate and the read
// timeout are carried as values.

use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};

/// Line settings used to open the card's port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialLineConfig {
    pub baud_rate: u32,
    /// Per-read timeout. A read that times out counts as "no more data".
    pub read_timeout: Duration,
}

impl SerialLineConfig {
    /// 19200 8N1, no flow control, 1 s read timeout.
    pub fn conrad() -> Self {
        Self {
            baud_rate: 19_200,
            read_timeout: Duration::from_millis(1000),
        }
    }

    /// `19200 8N1` style summary for logs.
    pub fn describe(&self) -> String {
        format!("{} 8N1", self.baud_rate)
    }

    /// Builder for the serialport crate with these settings applied.
    pub fn builder(&self, port: &str) -> serialport::SerialPortBuilder {
        serialport::new(port, self.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout)
    }
}

impl Default for SerialLineConfig {
    fn default() -> Self {
        Self::conrad()
    }
}
