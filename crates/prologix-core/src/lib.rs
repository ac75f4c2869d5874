//! Driver for Prologix GPIB-USB adapters: serial channel, adapter setup,
//! terminated reads, status polls and discovery.

pub mod channel;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod mock;
pub mod progress;
pub mod reader;
pub mod transcript;

pub use channel::{ByteChannel, SerialChannel};
pub use config::GpibConfig;
pub use discovery::{filter_prologix, find_prologix, list_ports, PortInfo};
pub use driver::Prologix;
pub use encoding::TextEncoding;
pub use error::{Error, Result};
pub use progress::{ChannelProgress, LogProgress, NoProgress, ProgressSink, ReadProgress};
pub use reader::{read_poll_reply, read_until_terminator, CancelToken, ReadOptions};
pub use transcript::{EntryKind, Transcript, TranscriptEntry};
