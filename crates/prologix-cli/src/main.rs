mod settings;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use prologix_core::{find_prologix, list_ports, GpibConfig, Prologix, TextEncoding};
use settings::Settings;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "prologix", version, about = "Talk to GPIB instruments through a Prologix GPIB-USB adapter")]
struct Cli {
    /// Serial port of the adapter. Defaults to the first Prologix found.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// GPIB address of the instrument.
    #[arg(short, long, global = true)]
    address: Option<u8>,

    #[arg(long, global = true)]
    baud: Option<u32>,

    /// End-of-transmission byte, as a decimal value.
    #[arg(long, global = true)]
    eot: Option<u8>,

    /// Put the adapter in read-after-write mode.
    #[arg(long, global = true, conflicts_with = "no_auto")]
    auto: bool,

    /// Turn read-after-write mode off, even if the settings file enables it.
    #[arg(long, global = true)]
    no_auto: bool,

    /// Give up on a response after this many milliseconds.
    #[arg(long, global = true)]
    deadline_ms: Option<u64>,

    /// Echo every command and response.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Report read progress.
    #[arg(long, global = true)]
    debug: bool,

    /// Print responses as hex.
    #[arg(long, global = true)]
    hex: bool,

    /// auto, utf-8, ascii or latin1.
    #[arg(long, global = true)]
    encoding: Option<TextEncoding>,

    /// Settings file. Defaults to prologix/settings.json in the user config dir.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List Prologix adapters.
    List {
        /// Show every serial port.
        #[arg(long)]
        all: bool,
    },
    /// Send a command without reading a response.
    Command { text: String },
    /// Send a query and print the response.
    Query {
        text: String,
        #[arg(long, default_value_t = 100)]
        chunk_size: usize,
    },
    /// Serial poll the instrument's status byte.
    Spoll,
    /// Poll the SRQ line.
    Srq,
}

impl Cli {
    fn gpib_config(&self, settings: &Settings) -> GpibConfig {
        let mut cfg = GpibConfig::default();
        settings.apply(&mut cfg);
        if let Some(port) = &self.port {
            cfg.port_name = port.clone();
        }
        if let Some(address) = self.address {
            cfg.address = address;
        }
        if let Some(baud) = self.baud {
            cfg.baud_rate = baud;
        }
        if let Some(eot) = self.eot {
            cfg.eot = eot;
        }
        if let Some(ms) = self.deadline_ms {
            cfg.deadline = Some(Duration::from_millis(ms));
        }
        if self.auto {
            cfg.auto = true;
        } else if self.no_auto {
            cfg.auto = false;
        }
        cfg.log = self.verbose;
        cfg.debug = self.debug;
        cfg
    }

    fn encoding(&self, settings: &Settings) -> Result<TextEncoding> {
        match (self.encoding, &settings.encoding) {
            (Some(encoding), _) => Ok(encoding),
            (None, Some(name)) => name.parse().map_err(|e: String| anyhow!(e)),
            (None, None) => Ok(TextEncoding::Auto),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = Settings::load_or_default(cli.settings.as_deref())?;

    if let Cmd::List { all } = cli.command {
        return list(all);
    }

    let mut cfg = cli.gpib_config(&settings);
    if cfg.port_name.is_empty() {
        let found = find_prologix().context("no --port given")?;
        cfg.port_name = found[0].port_name.clone();
        log::info!("using adapter on {}", cfg.port_name);
    }
    let encoding = cli.encoding(&settings)?;

    let port_name = cfg.port_name.clone();
    let gpib = Prologix::open(cfg).with_context(|| format!("opening adapter on {port_name}"))?;

    let reply = match &cli.command {
        Cmd::List { .. } => None,
        Cmd::Command { text } => {
            gpib.command(text, None)?;
            None
        }
        Cmd::Query { text, chunk_size } => Some(gpib.query(text, *chunk_size, None)?),
        Cmd::Spoll => Some(gpib.serial_poll()?),
        Cmd::Srq => Some(gpib.service_request_poll()?),
    };
    gpib.close();

    if let Some(reply) = reply {
        if cli.hex {
            println!("{}", hex::encode(&reply));
        } else {
            println!("{}", encoding.decode(&reply).trim_end());
        }
    }
    Ok(())
}

fn list(all: bool) -> Result<()> {
    let ports = if all { list_ports()? } else { find_prologix()? };
    for p in ports {
        match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => println!("{} ({:04X}:{:04X}) {}", p.port_name, vid, pid, p.description()),
            _ => println!("{} {}", p.port_name, p.description()),
        }
    }
    Ok(())
}
