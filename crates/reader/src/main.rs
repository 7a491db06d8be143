//! temper2-read
//!
//! Prints the inside and outside temperature of an attached TEMPer2
//! thermometer.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use reader::Temper2Reader;
use reader::config::{ReaderConfig, expand_path, validate_log_level};
use reader::usb::{DetachPolicy, RusbTransport};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "temper2-read")]
#[command(
    author,
    version,
    about = "Read the inside and outside temperature of a TEMPer2 USB thermometer"
)]
#[command(long_about = "
Reads both sensors of a TEMPer2 (0c45:7401) USB thermometer once and prints
the values in degrees Celsius.

EXAMPLES:
    # Read with default settings
    temper2-read

    # Wait longer for the device and print JSON
    temper2-read --timeout-ms 3000 --json

    # Only detach the kernel driver when libusb reports one is bound
    temper2-read --detach-policy auto

CONFIGURATION:
    The reader looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/temper2/reader.toml
    3. /etc/temper2/reader.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// USB transfer timeout in milliseconds
    #[arg(short, long, value_name = "MS")]
    timeout_ms: Option<u32>,

    /// When to detach kernel drivers
    #[arg(long, value_enum, value_name = "POLICY")]
    detach_policy: Option<DetachPolicyArg>,

    /// Print the reading as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DetachPolicyArg {
    Always,
    Auto,
}

impl From<DetachPolicyArg> for DetachPolicy {
    fn from(arg: DetachPolicyArg) -> Self {
        match arg {
            DetachPolicyArg::Always => DetachPolicy::Always,
            DetachPolicyArg::Auto => DetachPolicy::Auto,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if let Some(ref path) = args.config {
        ReaderConfig::load(Some(expand_path(path))).context("Failed to load configuration")?
    } else {
        ReaderConfig::load_or_default()
    };

    // CLI flags override config values
    if let Some(level) = args.log_level {
        validate_log_level(&level)?;
        config.reader.log_level = level;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.usb.timeout_ms = timeout_ms;
    }
    if let Some(policy) = args.detach_policy {
        config.usb.detach_policy = policy.into();
    }
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.reader.log_level).context("Failed to setup logging")?;

    info!("temper2-read v{}", env!("CARGO_PKG_VERSION"));
    let options = config.session_options();
    debug!(
        "Timeout: {:?}, detach policy: {:?}",
        options.timeout, options.detach_policy
    );

    let reader = Temper2Reader::new(RusbTransport, options);
    let reading = reader
        .read_temperature()
        .context("Failed to read temperature")?;

    if args.json {
        let json = serde_json::to_string_pretty(&reading).context("Failed to encode reading")?;
        println!("{}", json);
    } else {
        println!("Inside temperature: {}", reading.inside_celsius);
        println!("Outside temperature: {}", reading.outside_celsius);
    }

    Ok(())
}
