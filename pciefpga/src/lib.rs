//! # PCIe FPGA
//!
//! Single-register access to FPGA devices that expose their downstream memory through a set of
//! fixed-size PCI-Express windows (BARs). Two of the downstream spaces are larger than the
//! windows that reach them, so every access into them first programs a page-select register.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod core;
pub mod geometry;
pub mod prelude;
pub mod regs;
pub mod transport;
pub mod window;

use geometry::Space;

/// Errors that can occur while resolving or performing a single access
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("BAR {0} is not one of the accessible windows (0, 2 or 4)")]
    InvalidSpace(u8),
    #[error("Page {page:#x} in the {space} space does not fit the 32-bit page-select register")]
    PageOutOfRange { space: Space, page: u64 },
    #[error("Offset {offset:#x} is outside of the {space} window ({size:#x} bytes)")]
    OutOfBounds {
        space: Space,
        /// In bytes from the start of the window, whatever the addressing of the space
        offset: u128,
        size: usize,
    },
    #[error("Offset {offset:#x} in the {space} window is not aligned to {align} bytes")]
    Misaligned {
        space: Space,
        offset: usize,
        align: usize,
    },
    #[error(transparent)]
    Transport(#[from] transport::Error),
}
