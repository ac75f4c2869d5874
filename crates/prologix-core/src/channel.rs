//! Byte channel seam between the driver and the serial transport.

use crate::error::Result;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// How often [`SerialChannel::wait_readable`] re-checks the input queue.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A duplex byte connection to the adapter.
pub trait ByteChannel {
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Blocks until input is pending or `timeout` passes. Returns whether
    /// the channel became readable.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool>;

    /// Reads up to `buf.len()` bytes. A read that finds nothing returns 0.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

pub struct SerialChannel {
    port_name: String,
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()?;
        log::debug!("opened {port_name} at {baud_rate} baud");
        Ok(Self {
            port_name: port_name.to_string(),
            port,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ByteChannel for SerialChannel {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        let start = Instant::now();
        loop {
            if self.port.bytes_to_read()? > 0 {
                return Ok(true);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            std::thread::sleep(READY_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        log::debug!("closing {}", self.port_name);
    }
}
