//! Scripted in-memory channel for exercising the driver without hardware.

use crate::channel::ByteChannel;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    chunks: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    flushes: usize,
    read_sizes: Vec<usize>,
    idle_waits: usize,
    fail_read: Option<ErrorKind>,
}

/// Each pushed chunk is one burst of input. A read takes up to the
/// buffer length from the front burst; an empty burst reads as 0 bytes.
///
/// Clones share state, so a test can keep one to inspect traffic after
/// handing the other to a driver.
#[derive(Clone, Default)]
pub struct MockChannel {
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.state.lock().chunks.push_back(chunk.to_vec());
    }

    pub fn fail_next_read(&mut self, kind: ErrorKind) {
        self.state.lock().fail_read = Some(kind);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// All written bytes joined and decoded lossily.
    pub fn written_text(&self) -> String {
        let state = self.state.lock();
        String::from_utf8_lossy(&state.writes.concat()).into_owned()
    }

    pub fn clear_writes(&mut self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.flushes = 0;
    }

    pub fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    pub fn read_sizes(&self) -> Vec<usize> {
        self.state.lock().read_sizes.clone()
    }

    pub fn reads_left(&self) -> usize {
        self.state.lock().chunks.len()
    }

    pub fn idle_waits(&self) -> usize {
        self.state.lock().idle_waits
    }
}

impl ByteChannel for MockChannel {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.state.lock().writes.push(data.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        {
            let mut state = self.state.lock();
            if state.fail_read.is_some() || !state.chunks.is_empty() {
                return Ok(true);
            }
            state.idle_waits += 1;
        }
        std::thread::sleep(timeout);
        Ok(false)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if let Some(kind) = state.fail_read.take() {
            return Err(std::io::Error::from(kind).into());
        }
        let Some(front) = state.chunks.front_mut() else {
            state.read_sizes.push(0);
            return Ok(0);
        };
        let n = front.len().min(buf.len());
        buf[..n].copy_from_slice(&front[..n]);
        front.drain(..n);
        if front.is_empty() {
            state.chunks.pop_front();
        }
        state.read_sizes.push(n);
        Ok(n)
    }
}
