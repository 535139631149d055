use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cfgchan_core::{DeviceSession, Locator, LocatorConfig, NusbBackend, PollPolicy};
use cfgchan_core::transport::NusbHidTransport;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "HID configuration channel tool (Pure Rust)", long_about = None)]
struct Args {
    /// Path to a TOML locator configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// USB vendor ID (hex)
    #[arg(long, value_parser = parse_hex_u16)]
    vid: Option<u16>,

    /// Product ID of the device (hex)
    #[arg(long, value_parser = parse_hex_u16)]
    pid: Option<u16>,

    /// Product ID of the dongle (hex)
    #[arg(long, value_parser = parse_hex_u16)]
    dongle_pid: Option<u16>,

    /// Do not look for the device behind a dongle
    #[arg(long, conflicts_with = "dongle_pid")]
    no_dongle: bool,

    /// Only use the device with this hardware ID (hex)
    #[arg(long)]
    hwid: Option<String>,

    /// Delay between response polls in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Number of response polls before giving up
    #[arg(long)]
    retries: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show board name and hardware ID
    Info,
    /// List modules and their options
    List,
    /// Read an option value
    Get { module: String, option: String },
    /// Write an option value (hex bytes, e.g. 2003)
    Set {
        module: String,
        option: String,
        value: String,
    },
    /// Write the effective locator configuration to a TOML file
    SaveConfig { path: PathBuf },
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex ID {s:?}: {e}"))
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    hex::decode(digits).map_err(|e| format!("invalid hex value {s:?}: {e}"))
}

fn locator_config(args: &Args) -> Result<LocatorConfig> {
    let mut config = match &args.config {
        Some(path) => LocatorConfig::load_from_file(path)?,
        None => LocatorConfig::default(),
    };

    if let Some(vid) = args.vid {
        config.vendor_id = vid;
    }
    if let Some(pid) = args.pid {
        config.product_id = pid;
    }
    if args.no_dongle {
        config.dongle_product_id = None;
    } else if let Some(dongle_pid) = args.dongle_pid {
        config.dongle_product_id = Some(dongle_pid);
    }
    if let Some(hwid) = &args.hwid {
        config.hwid = Some(hwid.clone());
    }
    if let Some(interval) = args.poll_interval_ms {
        config.poll = PollPolicy::new(Duration::from_millis(interval), config.poll.retry_budget);
    }
    if let Some(retries) = args.retries {
        config.poll.retry_budget = retries;
    }

    Ok(config)
}

fn open(config: LocatorConfig) -> Result<DeviceSession<NusbHidTransport>> {
    let locator = Locator::new(NusbBackend, config);
    let session = locator.find().context("no configurable device found")?;
    Ok(session)
}

fn run(args: &Args) -> Result<()> {
    let config = locator_config(args)?;

    if let Command::SaveConfig { path } = &args.command {
        config
            .save_to_file(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let mut session = open(config)?;

    match &args.command {
        Command::Info => {
            let identity = session.identity()?;
            println!("Board name: {}", identity.board_name);
            println!("HW ID: {}", identity.hwid_hex());
        }
        Command::List => {
            for (module, options) in session.listing()? {
                println!("{module}");
                for option in options {
                    println!("  {option}");
                }
            }
        }
        Command::Get { module, option } => {
            let value = session
                .get(module, option)
                .with_context(|| format!("fetching {module}.{option}"))?;
            println!("{}", hex::encode(value));
        }
        Command::Set {
            module,
            option,
            value,
        } => {
            let value = parse_hex_bytes(value).map_err(anyhow::Error::msg)?;
            session
                .set(module, option, &value)
                .with_context(|| format!("setting {module}.{option}"))?;
            info!("{}.{} set to {}", module, option, hex::encode(&value));
        }
        Command::SaveConfig { .. } => {}
    }

    session.close();
    Ok(())
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting cfgchan (nusb backend)...");

    if let Err(e) = run(&args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u16("0x52DE"), Ok(0x52DE));
        assert_eq!(parse_hex_u16("1915"), Ok(0x1915));
        assert!(parse_hex_u16("zz").is_err());
        assert_eq!(parse_hex_bytes("0x2003"), Ok(vec![0x20, 0x03]));
        assert!(parse_hex_bytes("123").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "cfgchan",
            "--pid",
            "52dd",
            "--no-dongle",
            "--retries",
            "7",
            "--poll-interval-ms",
            "5",
            "get",
            "led",
            "on",
        ]);
        let config = locator_config(&args).unwrap();
        assert_eq!(config.vendor_id, 0x1915);
        assert_eq!(config.product_id, 0x52DD);
        assert_eq!(config.dongle_product_id, None);
        assert_eq!(config.poll, PollPolicy::new(Duration::from_millis(5), 7));
    }

    #[test]
    fn test_set_subcommand() {
        let args = Args::parse_from(["cfgchan", "--hwid", "0xBEEF", "set", "motion", "cpi", "2003"]);
        match &args.command {
            Command::Set { module, option, value } => {
                assert_eq!((module.as_str(), option.as_str()), ("motion", "cpi"));
                assert_eq!(parse_hex_bytes(value), Ok(vec![0x20, 0x03]));
            }
            other => panic!("unexpected command {other:?}"),
        }
        let config = locator_config(&args).unwrap();
        assert_eq!(config.normalized_hwid().as_deref(), Some("beef"));
    }
}
