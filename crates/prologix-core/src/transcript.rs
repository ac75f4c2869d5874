//! Bounded record of the traffic echoed in logging mode.

use crate::encoding::TextEncoding;
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_TRANSCRIPT_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Command,
    Query,
    Response,
}

impl EntryKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            EntryKind::Command => ">>",
            EntryKind::Query => "??",
            EntryKind::Response => "==",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub kind: EntryKind,
    pub data: Vec<u8>,
}

impl TranscriptEntry {
    /// One echo line, e.g. `?? *IDN?`. Response text is trimmed.
    pub fn line(&self, encoding: TextEncoding) -> String {
        let text = encoding.decode(&self.data);
        let text = match self.kind {
            EntryKind::Response => text.trim(),
            _ => text.as_str(),
        };
        format!("{} {}", self.kind.prefix(), text)
    }
}

pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    max_entries: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSCRIPT_LEN)
    }
}

impl Transcript {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, kind: EntryKind, data: Vec<u8>) -> &TranscriptEntry {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        self.entries.push(TranscriptEntry { timestamp, kind, data });

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_text(&self, show_timestamp: bool, show_hex: bool, encoding: TextEncoding) -> String {
        let mut result = String::new();
        for entry in &self.entries {
            if show_timestamp {
                let millis = entry.timestamp % 1000;
                let secs = entry.timestamp / 1000;
                let hours = (secs / 3600) % 24;
                let minutes = (secs / 60) % 60;
                let seconds = secs % 60;
                result.push_str(&format!("[{hours:02}:{minutes:02}:{seconds:02}.{millis:03}] "));
            }
            if show_hex {
                result.push_str(entry.kind.prefix());
                for byte in &entry.data {
                    result.push_str(&format!(" {byte:02X}"));
                }
            } else {
                result.push_str(&entry.line(encoding));
            }
            result.push('\n');
        }
        result
    }
}
