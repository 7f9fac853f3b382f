//! "Local" transport where the device's BARs are exposed by Linux through sysfs, i.e.
//! `/sys/bus/pci/devices/<domain:bus:dev.fn>/resource<N>`

use memmap2::{
    MmapMut,
    MmapOptions,
};
use nix::libc::O_SYNC;
use std::{
    fs::File,
    os::unix::fs::OpenOptionsExt,
    path::{
        Path,
        PathBuf,
    },
    ptr,
};
use tracing::{
    debug,
    trace,
};

use super::{
    Mapping,
    Transport,
    TransportResult,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not open device {path}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not map BAR {bar}")]
    Map { bar: u8, source: std::io::Error },
    #[error("Could not get BAR {bar} size")]
    Size { bar: u8, source: std::io::Error },
    #[error("BAR {0} is not implemented by the device (zero size)")]
    Empty(u8),
}

#[derive(Debug)]
/// A local connection to a PCIe device through its sysfs resource files
pub struct Local {
    path: PathBuf,
}

impl Local {
    /// Open the PCIe device whose sysfs directory is `path`.
    ///
    /// Note: Mapping the resource files usually requires root
    /// # Errors
    /// Returns an error if `path` is not a readable directory
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path).map_err(|source| Error::Open {
            path: path.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(Error::Open {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "not a PCI device directory",
                ),
            });
        }
        debug!(path = %path.display(), "Opened device");
        Ok(Self { path })
    }

    fn resource(&self, bar: u8) -> PathBuf {
        self.path.join(format!("resource{bar}"))
    }
}

/// A BAR mapped from its resource file
#[derive(Debug)]
pub struct LocalWindow {
    mem: MmapMut,
}

impl Mapping for LocalWindow {
    fn read_u32(&self, offset: usize) -> u32 {
        let src = self.mem[offset..offset + 4].as_ptr().cast::<u32>();
        // Safety: in bounds by the slice above, alignment is the caller's contract
        unsafe { ptr::read_volatile(src) }
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        let dst = self.mem[offset..offset + 4].as_mut_ptr().cast::<u32>();
        // Safety: in bounds by the slice above, alignment is the caller's contract
        unsafe { ptr::write_volatile(dst, value) }
    }

    fn read_u64(&self, offset: usize) -> u64 {
        let src = self.mem[offset..offset + 8].as_ptr().cast::<u64>();
        // Safety: in bounds by the slice above, alignment is the caller's contract
        unsafe { ptr::read_volatile(src) }
    }

    fn write_u64(&mut self, offset: usize, value: u64) {
        let dst = self.mem[offset..offset + 8].as_mut_ptr().cast::<u64>();
        // Safety: in bounds by the slice above, alignment is the caller's contract
        unsafe { ptr::write_volatile(dst, value) }
    }
}

impl Transport for Local {
    type Mapping = LocalWindow;

    fn map_window(&mut self, bar: u8) -> TransportResult<LocalWindow> {
        let file = File::options()
            .read(true)
            .write(true)
            .custom_flags(O_SYNC)
            .open(self.resource(bar))
            .map_err(|source| Error::Map { bar, source })?;
        let len = file
            .metadata()
            .map_err(|source| Error::Map { bar, source })?
            .len();
        if len == 0 {
            return Err(Error::Empty(bar).into());
        }
        // Safety: the mapping is device memory that nothing else in this process aliases
        let mem = unsafe { MmapOptions::new().map_mut(&file) }
            .map_err(|source| Error::Map { bar, source })?;
        debug!(bar, host_addr = ?mem.as_ptr(), "Mapped BAR");
        Ok(LocalWindow { mem })
    }

    fn window_size(&mut self, bar: u8) -> TransportResult<usize> {
        let len = std::fs::metadata(self.resource(bar))
            .map_err(|source| Error::Size { bar, source })?
            .len();
        let size = usize::try_from(len).map_err(|_| Error::Size {
            bar,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "BAR larger than the address space",
            ),
        })?;
        Ok(size)
    }

    fn unmap_window(&mut self, bar: u8, mapping: LocalWindow) {
        drop(mapping);
        trace!(bar, "Unmapped BAR");
    }

    fn close(&mut self) {
        trace!(path = %self.path.display(), "Closed device");
    }
}
