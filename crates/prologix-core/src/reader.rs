//! Accumulating reads that end on the end-of-transmission byte.

use crate::channel::ByteChannel;
use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(3);

/// Upper bound of a status poll reply.
pub const POLL_REPLY_MAX: usize = 100;

/// Largest read buffer allocated per chunk. Bigger chunk sizes are
/// served in reads of this size.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Trailer the adapter sends after a status poll reply.
const POLL_REPLY_TRAILER: usize = 2;

/// Shared flag that aborts an in-progress read from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Bytes requested per read.
    pub chunk_size: usize,
    /// Sleep after every chunk that did not end the response.
    pub pause: Duration,
    /// Readability wait per loop pass.
    pub poll_timeout: Duration,
    /// Bound on the whole read. `None` waits forever.
    pub deadline: Option<Duration>,
    /// Bound on readability waits that timed out with no data.
    pub max_polls: Option<usize>,
    pub cancel: Option<CancelToken>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            pause: Duration::from_millis(200),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            deadline: None,
            max_polls: None,
            cancel: None,
        }
    }
}

impl ReadOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_polls(mut self, max_polls: usize) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Tracks the overall bounds of one read across loop passes.
struct Budget<'a> {
    opts: &'a ReadOptions,
    started: Instant,
    idle_polls: usize,
}

impl<'a> Budget<'a> {
    fn new(opts: &'a ReadOptions) -> Self {
        Self {
            opts,
            started: Instant::now(),
            idle_polls: 0,
        }
    }

    /// Time to wait for readability on this pass, or an error when a
    /// bound has been used up.
    fn next_wait(&self, received: usize) -> Result<Duration> {
        if self.opts.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        let waited = self.started.elapsed();
        if let Some(max) = self.opts.max_polls {
            if self.idle_polls >= max {
                return Err(Error::Timeout { waited, received });
            }
        }
        match self.opts.deadline {
            Some(deadline) if waited >= deadline => Err(Error::Timeout { waited, received }),
            Some(deadline) => Ok(self.opts.poll_timeout.min(deadline - waited)),
            None => Ok(self.opts.poll_timeout),
        }
    }

    /// Sleeps the inter-chunk pause, cut short at the deadline.
    fn pause(&self) {
        let pause = match self.opts.deadline {
            Some(deadline) => self
                .opts
                .pause
                .min(deadline.saturating_sub(self.started.elapsed())),
            None => self.opts.pause,
        };
        std::thread::sleep(pause);
    }

    fn idle(&mut self) {
        self.idle_polls += 1;
    }
}

/// Reads chunks until one ends with `terminator`, returning everything
/// before that final byte.
///
/// A terminator anywhere but the last byte of a chunk is kept as data.
/// Empty reads never end the response.
pub fn read_until_terminator<C>(
    channel: &mut C,
    terminator: u8,
    opts: &ReadOptions,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>>
where
    C: ByteChannel + ?Sized,
{
    if opts.chunk_size == 0 {
        return Err(Error::InvalidConfig("chunk size must be positive".into()));
    }

    let mut budget = Budget::new(opts);
    let mut data = Vec::new();
    let mut chunk = vec![0u8; opts.chunk_size.min(MAX_CHUNK_SIZE)];
    let mut received = 0;

    loop {
        let wait = budget.next_wait(received)?;
        if !channel.wait_readable(wait)? {
            budget.idle();
            continue;
        }

        let n = channel.read(&mut chunk)?;
        received += n;
        progress.bytes_received(received);
        log::trace!("read {n} bytes ({received} total)");

        match chunk[..n].split_last() {
            Some((&last, body)) if last == terminator => {
                data.extend_from_slice(body);
                break;
            }
            _ => {
                data.extend_from_slice(&chunk[..n]);
                budget.pause();
            }
        }
    }

    progress.finished(received);
    Ok(data)
}

/// Reads one status poll reply: up to [`POLL_REPLY_MAX`] bytes from the
/// first readable pass, minus the two trailer bytes. No terminator search.
pub fn read_poll_reply<C>(channel: &mut C, opts: &ReadOptions) -> Result<Vec<u8>>
where
    C: ByteChannel + ?Sized,
{
    let mut budget = Budget::new(opts);
    loop {
        let wait = budget.next_wait(0)?;
        if channel.wait_readable(wait)? {
            break;
        }
        budget.idle();
    }

    let mut buf = [0u8; POLL_REPLY_MAX];
    let n = channel.read(&mut buf)?;
    Ok(buf[..n.saturating_sub(POLL_REPLY_TRAILER)].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChannel;
    use crate::progress::{ChannelProgress, NoProgress, ReadProgress};

    const EOT: u8 = 0x04;

    fn fast() -> ReadOptions {
        ReadOptions::default()
            .with_pause(Duration::ZERO)
            .with_poll_timeout(Duration::ZERO)
    }

    fn read(mock: &mut MockChannel, opts: &ReadOptions) -> Result<Vec<u8>> {
        read_until_terminator(mock, EOT, opts, &mut NoProgress)
    }

    #[test]
    fn strips_trailing_terminator() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"+1.234E-3\x04");
        assert_eq!(read(&mut mock, &fast()).unwrap(), b"+1.234E-3");
    }

    #[test]
    fn joins_chunks_in_order() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"12");
        mock.push_chunk(b"34\x04");
        let opts = fast().with_chunk_size(4);
        assert_eq!(read(&mut mock, &opts).unwrap(), b"1234");
        assert_eq!(mock.reads_left(), 0);
    }

    #[test]
    fn empty_read_does_not_terminate() {
        let mut single = MockChannel::new();
        single.push_chunk(b"ab\x04");

        let mut split = MockChannel::new();
        split.push_chunk(b"");
        split.push_chunk(b"ab\x04");

        assert_eq!(read(&mut single, &fast()).unwrap(), read(&mut split, &fast()).unwrap());
    }

    #[test]
    fn inner_terminator_is_data() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"a\x04b");
        mock.push_chunk(b"c\x04");
        assert_eq!(read(&mut mock, &fast()).unwrap(), b"a\x04bc");
    }

    #[test]
    fn only_one_terminator_is_stripped() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"x\x04\x04");
        assert_eq!(read(&mut mock, &fast()).unwrap(), b"x\x04");
    }

    #[test]
    fn chunk_size_limits_each_read() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"abcdef\x04");
        let opts = fast().with_chunk_size(3);
        assert_eq!(read(&mut mock, &opts).unwrap(), b"abcdef");
        assert_eq!(mock.read_sizes(), vec![3, 3, 1]);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut mock = MockChannel::new();
        let opts = fast().with_chunk_size(0);
        assert!(matches!(read(&mut mock, &opts), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn silent_channel_times_out_after_max_polls() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"partial");
        let opts = fast().with_max_polls(3);
        match read(&mut mock, &opts) {
            Err(Error::Timeout { received, .. }) => assert_eq!(received, 7),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(mock.idle_waits(), 3);
    }

    #[test]
    fn silent_channel_times_out_after_deadline() {
        let mut mock = MockChannel::new();
        let opts = fast()
            .with_poll_timeout(Duration::from_millis(5))
            .with_deadline(Duration::from_millis(20));
        assert!(matches!(read(&mut mock, &opts), Err(Error::Timeout { received: 0, .. })));
    }

    #[test]
    fn pause_does_not_outlast_deadline() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"partial");
        let opts = ReadOptions::default()
            .with_pause(Duration::from_millis(500))
            .with_poll_timeout(Duration::from_millis(5))
            .with_deadline(Duration::from_millis(30));
        let started = Instant::now();
        let result = read(&mut mock, &opts);
        let elapsed = started.elapsed();
        assert!(matches!(result, Err(Error::Timeout { received: 7, .. })));
        assert!(elapsed < Duration::from_millis(30 + 5) + Duration::from_millis(50), "{elapsed:?}");
    }

    #[test]
    fn huge_chunk_size_is_capped() {
        let mut mock = MockChannel::new();
        mock.push_chunk(&vec![b'x'; MAX_CHUNK_SIZE + 10]);
        mock.push_chunk(b"\x04");
        let opts = fast().with_chunk_size(usize::MAX / 2);
        assert_eq!(read(&mut mock, &opts).unwrap().len(), MAX_CHUNK_SIZE + 10);
        assert_eq!(mock.read_sizes(), vec![MAX_CHUNK_SIZE, 10, 1]);
    }

    #[test]
    fn cancelled_read_stops() {
        let mut mock = MockChannel::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let opts = fast().with_cancel(cancel);
        assert!(matches!(read(&mut mock, &opts), Err(Error::Cancelled)));
    }

    #[test]
    fn channel_errors_propagate() {
        let mut mock = MockChannel::new();
        mock.fail_next_read(std::io::ErrorKind::BrokenPipe);
        match read(&mut mock, &fast()) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_cumulative_progress() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"12");
        mock.push_chunk(b"345\x04");
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut progress = ChannelProgress::new(tx);
        read_until_terminator(&mut mock, EOT, &fast(), &mut progress).unwrap();
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ReadProgress::Received(2),
                ReadProgress::Received(6),
                ReadProgress::Finished(6),
            ]
        );
    }

    #[test]
    fn poll_reply_drops_trailer() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"65\r\n");
        assert_eq!(read_poll_reply(&mut mock, &fast()).unwrap(), b"65");
    }

    #[test]
    fn poll_reply_ignores_terminator() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"1\x04\x04");
        assert_eq!(read_poll_reply(&mut mock, &fast()).unwrap(), b"1");
    }

    #[test]
    fn poll_reply_reads_at_most_one_hundred_bytes() {
        let mut mock = MockChannel::new();
        mock.push_chunk(&[b'7'; 150]);
        assert_eq!(read_poll_reply(&mut mock, &fast()).unwrap().len(), 98);
        assert_eq!(mock.read_sizes(), vec![100]);
    }

    #[test]
    fn short_poll_reply_is_empty() {
        let mut mock = MockChannel::new();
        mock.push_chunk(b"\n");
        assert!(read_poll_reply(&mut mock, &fast()).unwrap().is_empty());
    }
}
