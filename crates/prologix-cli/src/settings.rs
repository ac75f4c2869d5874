use anyhow::{Context, Result};
use prologix_core::GpibConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent defaults, read from `settings.json`. Every field is optional;
/// command-line flags win over anything set here.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub port: Option<String>,
    pub address: Option<u8>,
    pub baud_rate: Option<u32>,
    pub eot: Option<u8>,
    pub auto: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub settle_ms: Option<u64>,
    pub read_timeout_ms: Option<u32>,
    pub deadline_ms: Option<u64>,
    pub encoding: Option<String>,
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("prologix").join("settings.json"))
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Loads `path` if given, else the per-user file when it exists.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn apply(&self, cfg: &mut GpibConfig) {
        if let Some(port) = &self.port {
            cfg.port_name = port.clone();
        }
        if let Some(address) = self.address {
            cfg.address = address;
        }
        if let Some(baud_rate) = self.baud_rate {
            cfg.baud_rate = baud_rate;
        }
        if let Some(eot) = self.eot {
            cfg.eot = eot;
        }
        if let Some(auto) = self.auto {
            cfg.auto = auto;
        }
        if let Some(ms) = self.timeout_ms {
            cfg.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.settle_ms {
            cfg.settle = Duration::from_millis(ms);
        }
        if let Some(ms) = self.read_timeout_ms {
            cfg.read_timeout_ms = ms;
        }
        if let Some(ms) = self.deadline_ms {
            cfg.deadline = Some(Duration::from_millis(ms));
        }
    }
}
