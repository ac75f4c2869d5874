use crossbeam_channel::Sender;

/// Receives running byte counts while a response is being read.
pub trait ProgressSink: Send {
    fn bytes_received(&mut self, total: usize);

    fn finished(&mut self, total: usize);
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn bytes_received(&mut self, total: usize) {
        log::debug!("{total} bytes received");
    }

    fn finished(&mut self, total: usize) {
        log::debug!("response complete, {total} bytes");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadProgress {
    Received(usize),
    Finished(usize),
}

/// Forwards progress as [`ReadProgress`] events, e.g. to a UI thread.
pub struct ChannelProgress {
    tx: Sender<ReadProgress>,
}

impl ChannelProgress {
    pub fn new(tx: Sender<ReadProgress>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn bytes_received(&mut self, total: usize) {
        let _ = self.tx.send(ReadProgress::Received(total));
    }

    fn finished(&mut self, total: usize) {
        let _ = self.tx.send(ReadProgress::Finished(total));
    }
}

/// Sink used when debug mode is off.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn bytes_received(&mut self, _total: usize) {}

    fn finished(&mut self, _total: usize) {}
}
