//! The adapter handle: configuration, commands, queries and polls.

use crate::channel::{ByteChannel, SerialChannel};
use crate::config::{check_address, GpibConfig};
use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::progress::{LogProgress, NoProgress, ProgressSink};
use crate::reader::{read_poll_reply, read_until_terminator, ReadOptions};
use crate::transcript::{EntryKind, Transcript, TranscriptEntry};
use parking_lot::Mutex;
use std::time::Duration;

/// Directive that addresses the instrument to talk until EOI.
const READ_EOI: &[u8] = b"++read eoi\n";

/// Handle to one adapter and the instrument it addresses.
///
/// Every operation holds the channel for its whole write/read cycle, so a
/// handle shared between threads never interleaves two exchanges.
pub struct Prologix<C: ByteChannel = SerialChannel> {
    inner: Mutex<Inner<C>>,
}

struct Inner<C> {
    channel: Option<C>,
    cfg: GpibConfig,
    transcript: Transcript,
    progress: Box<dyn ProgressSink>,
}

impl Prologix<SerialChannel> {
    /// Opens `cfg.port_name` and configures the adapter.
    pub fn open(cfg: GpibConfig) -> Result<Self> {
        cfg.validate()?;
        let channel = SerialChannel::open(&cfg.port_name, cfg.baud_rate, cfg.timeout)?;
        Self::with_channel(channel, cfg)
    }
}

impl<C: ByteChannel> Prologix<C> {
    pub fn with_channel(channel: C, cfg: GpibConfig) -> Result<Self> {
        cfg.validate()?;
        let driver = Self {
            inner: Mutex::new(Inner {
                channel: Some(channel),
                cfg,
                transcript: Transcript::default(),
                progress: Box::new(LogProgress),
            }),
        };
        driver.refresh()?;
        Ok(driver)
    }

    /// Replaces the sink that receives read progress in debug mode.
    pub fn set_progress(&self, progress: Box<dyn ProgressSink>) {
        self.inner.lock().progress = progress;
    }

    /// Re-sends the full adapter setup.
    pub fn refresh(&self) -> Result<()> {
        self.inner.lock().refresh()
    }

    pub fn command(&self, text: &str, sleep: Option<Duration>) -> Result<()> {
        let mut inner = self.inner.lock();
        let sleep = sleep.unwrap_or(inner.cfg.settle);
        inner.command(text, sleep)
    }

    /// Sends `text` and reads the response, `chunk_size` bytes at a time.
    pub fn query(&self, text: &str, chunk_size: usize, sleep: Option<Duration>) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let opts = inner.read_options(chunk_size);
        let sleep = sleep.unwrap_or(inner.cfg.settle);
        inner.query(text, &opts, sleep)
    }

    pub fn query_with(&self, text: &str, opts: &ReadOptions, sleep: Option<Duration>) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let sleep = sleep.unwrap_or(inner.cfg.settle);
        inner.query(text, opts, sleep)
    }

    /// Reads one terminated response without sending anything first.
    pub fn read_response(&self, chunk_size: usize) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let opts = inner.read_options(chunk_size);
        inner.read(&opts)
    }

    /// Read options built from the current configuration.
    pub fn read_options(&self, chunk_size: usize) -> ReadOptions {
        self.inner.lock().read_options(chunk_size)
    }

    /// Polls the SRQ line.
    pub fn service_request_poll(&self) -> Result<Vec<u8>> {
        self.inner.lock().poll("++srq")
    }

    /// Reads the addressed instrument's status byte.
    pub fn serial_poll(&self) -> Result<Vec<u8>> {
        self.inner.lock().poll("++spoll")
    }

    /// Closes the serial channel. Later operations fail with [`Error::Closed`].
    pub fn close(&self) {
        if self.inner.lock().channel.take().is_some() {
            log::debug!("adapter connection closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().channel.is_some()
    }

    pub fn set_debug_mode(&self, debug: bool) {
        self.inner.lock().cfg.debug = debug;
    }

    pub fn set_logging(&self, log: bool) {
        self.inner.lock().cfg.log = log;
    }

    pub fn set_auto_mode(&self, auto: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.cfg.auto = auto;
        let pause = inner.cfg.refresh_pause;
        inner.command(&format!("++auto {}", u8::from(auto)), pause)
    }

    pub fn set_address(&self, address: u8) -> Result<()> {
        check_address(address)?;
        let mut inner = self.inner.lock();
        inner.cfg.address = address;
        let pause = inner.cfg.refresh_pause;
        inner.command(&format!("++addr {address}"), pause)
    }

    pub fn config(&self) -> GpibConfig {
        self.inner.lock().cfg.clone()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.inner.lock().transcript.entries().to_vec()
    }

    pub fn transcript_text(&self, show_timestamp: bool, show_hex: bool, encoding: TextEncoding) -> String {
        self.inner
            .lock()
            .transcript
            .to_text(show_timestamp, show_hex, encoding)
    }
}

impl<C: ByteChannel> Inner<C> {
    fn channel(&mut self) -> Result<&mut C> {
        self.channel.as_mut().ok_or(Error::Closed)
    }

    fn echo(&mut self, kind: EntryKind, data: &[u8]) {
        if self.cfg.log {
            let entry = self.transcript.push(kind, data.to_vec());
            log::info!("{}", entry.line(TextEncoding::Auto));
        }
    }

    fn send_line(&mut self, text: &str) -> Result<()> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        self.channel()?.write_all(&line)
    }

    fn refresh(&mut self) -> Result<()> {
        let pause = self.cfg.refresh_pause;
        let setup = [
            format!("++addr {}", self.cfg.address),
            "++eos 3".to_string(),
            "++mode 1".to_string(),
            format!("++auto {}", u8::from(self.cfg.auto)),
            "++ifc".to_string(),
            format!("++read_tmo_ms {}", self.cfg.read_timeout_ms),
            format!("++eot_char {}", self.cfg.eot),
            "++eot_enable 1".to_string(),
        ];
        for directive in &setup {
            self.command(directive, pause)?;
        }
        Ok(())
    }

    fn command(&mut self, text: &str, sleep: Duration) -> Result<()> {
        self.echo(EntryKind::Command, text.as_bytes());
        log::debug!("command {text:?}");
        self.send_line(text)?;
        self.channel()?.flush()?;
        std::thread::sleep(sleep);
        Ok(())
    }

    fn query(&mut self, text: &str, opts: &ReadOptions, sleep: Duration) -> Result<Vec<u8>> {
        self.echo(EntryKind::Query, text.as_bytes());
        log::debug!("query {text:?}");
        self.send_line(text)?;
        if !self.cfg.auto {
            self.channel()?.write_all(READ_EOI)?;
        }
        self.channel()?.flush()?;
        std::thread::sleep(sleep);

        let data = self.read(opts)?;
        self.echo(EntryKind::Response, &data);
        Ok(data)
    }

    fn read(&mut self, opts: &ReadOptions) -> Result<Vec<u8>> {
        let eot = self.cfg.eot;
        let mut quiet = NoProgress;
        let progress: &mut dyn ProgressSink = if self.cfg.debug {
            self.progress.as_mut()
        } else {
            &mut quiet
        };
        let channel = self.channel.as_mut().ok_or(Error::Closed)?;
        read_until_terminator(channel, eot, opts, progress)
    }

    fn poll(&mut self, directive: &str) -> Result<Vec<u8>> {
        let settle = self.cfg.settle;
        self.command(directive, settle)?;
        let opts = self.read_options(1);
        let reply = read_poll_reply(self.channel()?, &opts)?;
        self.echo(EntryKind::Response, &reply);
        Ok(reply)
    }

    fn read_options(&self, chunk_size: usize) -> ReadOptions {
        ReadOptions {
            chunk_size,
            pause: self.cfg.chunk_pause(),
            poll_timeout: self.cfg.poll_timeout,
            deadline: self.cfg.deadline,
            ..Default::default()
        }
    }
}
