//! Command line surface. Clap only gathers the raw flags; the rules tying them together live in
//! [`Args::validate`].

use clap::Parser;
use pciefpga::{
    core::AccessRequest,
    geometry::Space,
};
use std::path::PathBuf;

/// Simple register access to an FPGA over PCIe
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// PCI device directory, e.g. /sys/bus/pci/devices/0000:03:00.0
    #[arg(short = 'b', long, value_name = "DEVICE FILE")]
    pub devicefile: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Perform read access
    #[arg(short, long)]
    pub read: bool,

    /// Perform write access
    #[arg(short, long)]
    pub write: bool,

    /// BAR number [0|2|4]
    #[arg(short = 'n', long, value_name = "BAR")]
    pub barno: Option<String>,

    /// FPGA address to read/write, in hex
    #[arg(short, long, value_name = "HEX")]
    pub address: Option<String>,

    /// Data to write to the FPGA, in hex
    #[arg(short, long, value_name = "HEX")]
    pub data: Option<String>,
}

/// Invalid combinations of command line arguments
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("--devicefile option not set")]
    MissingDeviceFile,
    #[error("--barno option not set")]
    MissingBar,
    #[error("Invalid option for BAR number: `{0}`")]
    InvalidBar(String),
    #[error("Neither --read or --write was set")]
    NoDirection,
    #[error("Only one of --read or --write can be set")]
    BothDirections,
    #[error("--read is set but no --address")]
    ReadWithoutAddress,
    #[error("--write is set but either --address or --data not set")]
    WriteWithoutOperands,
    #[error("--address format is invalid: `{0}`")]
    BadAddress(String),
    #[error("--data format is invalid: `{0}`")]
    BadData(String),
}

/// Everything needed to perform the access, checked
#[derive(Debug, PartialEq, Eq)]
pub struct Validated {
    pub device: PathBuf,
    pub request: AccessRequest,
}

/// Hex text with an optional `0x` prefix
fn strip_hex(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn parse_address(s: &str) -> Result<u64, ArgumentError> {
    u64::from_str_radix(strip_hex(s.trim()), 16).map_err(|_| ArgumentError::BadAddress(s.into()))
}

fn parse_data(s: &str) -> Result<u32, ArgumentError> {
    u32::from_str_radix(strip_hex(s.trim()), 16).map_err(|_| ArgumentError::BadData(s.into()))
}

fn parse_bar(s: &str) -> Result<u8, ArgumentError> {
    let bar = s
        .trim()
        .parse::<u8>()
        .map_err(|_| ArgumentError::InvalidBar(s.into()))?;
    Space::try_from(bar).map_err(|_| ArgumentError::InvalidBar(s.into()))?;
    Ok(bar)
}

impl Args {
    /// Check the rules between arguments and build the access request
    /// # Errors
    /// Returns the first rule that was broken
    pub fn validate(&self) -> Result<Validated, ArgumentError> {
        let device = self
            .devicefile
            .clone()
            .ok_or(ArgumentError::MissingDeviceFile)?;
        let bar = parse_bar(self.barno.as_deref().ok_or(ArgumentError::MissingBar)?)?;
        let address = match (self.read, self.write) {
            (false, false) => return Err(ArgumentError::NoDirection),
            (true, true) => return Err(ArgumentError::BothDirections),
            (true, false) => self
                .address
                .as_deref()
                .ok_or(ArgumentError::ReadWithoutAddress)?,
            (false, true) => match (&self.address, &self.data) {
                (Some(address), Some(_)) => address.as_str(),
                _ => return Err(ArgumentError::WriteWithoutOperands),
            },
        };
        let address = parse_address(address)?;
        // Data is only meaningful for writes, but a malformed value is still rejected
        let data = self.data.as_deref().map(parse_data).transpose()?;
        let request = match data {
            Some(data) if self.write => AccessRequest::write(bar, address, data),
            _ => AccessRequest::read(bar, address),
        };
        Ok(Validated { device, request })
    }
}
