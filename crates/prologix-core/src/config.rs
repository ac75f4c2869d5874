use crate::error::{Error, Result};
use crate::reader::DEFAULT_POLL_TIMEOUT;
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 9600;
pub const DEFAULT_EOT: u8 = 0x04;
pub const MAX_GPIB_ADDRESS: u8 = 30;
pub const MAX_READ_TIMEOUT_MS: u32 = 3000;

#[derive(Debug, Clone)]
pub struct GpibConfig {
    pub port_name: String,
    /// Primary address of the instrument on the bus.
    pub address: u8,
    pub baud_rate: u32,
    /// Serial read timeout.
    pub timeout: Duration,
    /// End-of-transmission byte the adapter appends to responses.
    pub eot: u8,
    /// Report read progress.
    pub debug: bool,
    /// Adapter addresses the instrument to talk after every command.
    pub auto: bool,
    /// Echo traffic and keep a transcript.
    pub log: bool,
    /// Sleep after each command, and before reading a query response.
    pub settle: Duration,
    /// Sleep after each directive sent by `refresh`.
    pub refresh_pause: Duration,
    /// Adapter-side GPIB read timeout (`++read_tmo_ms`).
    pub read_timeout_ms: u32,
    /// Readability wait per read loop pass.
    pub poll_timeout: Duration,
    /// Bound on a whole response read. `None` blocks until the terminator.
    pub deadline: Option<Duration>,
}

impl Default for GpibConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            address: 0,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(500),
            eot: DEFAULT_EOT,
            debug: false,
            auto: false,
            log: false,
            settle: Duration::from_millis(100),
            refresh_pause: Duration::from_millis(100),
            read_timeout_ms: MAX_READ_TIMEOUT_MS,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            deadline: None,
        }
    }
}

impl GpibConfig {
    pub fn new(port_name: impl Into<String>, address: u8) -> Self {
        Self {
            port_name: port_name.into(),
            address,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_address(self.address)?;
        if self.read_timeout_ms == 0 || self.read_timeout_ms > MAX_READ_TIMEOUT_MS {
            return Err(Error::InvalidConfig(format!(
                "read timeout {} ms outside 1..={MAX_READ_TIMEOUT_MS}",
                self.read_timeout_ms
            )));
        }
        if self.baud_rate == 0 {
            return Err(Error::InvalidConfig("baud rate must be positive".into()));
        }
        Ok(())
    }

    /// Pause between chunks while waiting for the rest of a response.
    pub fn chunk_pause(&self) -> Duration {
        self.settle + Duration::from_millis(100)
    }
}

pub(crate) fn check_address(address: u8) -> Result<()> {
    if address > MAX_GPIB_ADDRESS {
        return Err(Error::InvalidConfig(format!(
            "GPIB address {address} outside 0..={MAX_GPIB_ADDRESS}"
        )));
    }
    Ok(())
}
