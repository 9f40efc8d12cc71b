//! Stand-in teletype: echoes each unit's input back to the same unit.

use tokio::sync::mpsc;
use ttymux_core::{Device, Unit};

const PROMPT: &[u8] = b"$ ";

/// Line-discipline loopback. Carriage return becomes CRLF followed by a
/// fresh prompt; every other byte is echoed unchanged.
pub struct LoopbackDevice {
    output: mpsc::UnboundedSender<(Unit, u8)>,
}

impl LoopbackDevice {
    /// Create the device and the stream of bytes it emits.
    #[must_use]
    pub fn open() -> (Self, mpsc::UnboundedReceiver<(Unit, u8)>) {
        let (output, rx) = mpsc::unbounded_channel();
        (Self { output }, rx)
    }

    /// Print the login prompt on a unit.
    pub fn greet(&self, unit: Unit) {
        self.emit(unit, PROMPT);
    }

    fn emit(&self, unit: Unit, bytes: &[u8]) {
        for &byte in bytes {
            if self.output.send((unit, byte)).is_err() {
                tracing::debug!(unit = %unit, "Device output closed");
                return;
            }
        }
    }
}

impl Device for LoopbackDevice {
    fn inject_input(&self, unit: Unit, byte: u8) {
        if byte == b'\r' {
            self.emit(unit, b"\r\n");
            self.emit(unit, PROMPT);
        } else {
            self.emit(unit, &[byte]);
        }
    }
}
