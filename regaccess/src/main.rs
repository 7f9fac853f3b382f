//! Read or write a single FPGA register over PCIe
//!
//! ```text
//! regaccess --devicefile /sys/bus/pci/devices/0000:03:00.0 --barno 2 --read --address 180004
//! ```

mod cli;

use anyhow::Context;
use clap::{
    error::ErrorKind,
    CommandFactory,
    Parser,
};
use cli::{
    Args,
    Validated,
};
use pciefpga::prelude::*;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the device, perform the access, and give back what was read (or written)
fn run(args: &Validated) -> anyhow::Result<u32> {
    let transport = Local::open(&args.device)
        .with_context(|| format!("Could not open device {}", args.device.display()))?;
    let mut fpga = Fpga::new(transport).context("Could not map the device windows")?;
    let value = fpga
        .perform_access(&args.request)
        .with_context(|| format!("Access to BAR {} failed", args.request.bar()))?;
    Ok(value)
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage, asked for or not, is a failed invocation
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };
    init_tracing(args.verbose);

    let args = match args.validate() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}\n");
            eprintln!("{}", Args::command().render_help());
            return ExitCode::FAILURE;
        }
    };
    debug!("Address = {:#010X}", args.request.address());
    if let Access::Write(data) = args.request.access() {
        debug!("Data = {data:#010X}");
    }

    match run(&args) {
        Ok(value) => {
            if args.request.access() == Access::Read {
                println!("0x{value:08X}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
