//! The core types and functions for performing a single access on an FPGA over PCIe
use crate::{
    geometry::{
        PageAddress,
        Space,
        WB_IMPLICIT_BITS,
    },
    transport::Transport,
    window::Window,
    Error,
};
use tracing::{
    debug,
    warn,
};

/// The direction of an access, carrying the data for writes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    Read,
    Write(u32),
}

/// One operator request: which BAR, which logical address, and what to do there
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    bar: u8,
    address: u64,
    access: Access,
}

impl AccessRequest {
    #[must_use]
    pub fn new(bar: u8, address: u64, access: Access) -> Self {
        Self {
            bar,
            address,
            access,
        }
    }

    #[must_use]
    pub fn read(bar: u8, address: u64) -> Self {
        Self::new(bar, address, Access::Read)
    }

    #[must_use]
    pub fn write(bar: u8, address: u64, data: u32) -> Self {
        Self::new(bar, address, Access::Write(data))
    }

    #[must_use]
    pub fn bar(&self) -> u8 {
        self.bar
    }

    #[must_use]
    pub fn address(&self) -> u64 {
        self.address
    }

    #[must_use]
    pub fn access(&self) -> Access {
        self.access
    }
}

/// An open FPGA with all of its windows mapped.
///
/// The windows are mapped when this is constructed and unmapped in reverse order (BAR 4, 2, 0)
/// followed by closing the device when it is dropped, no matter how we got there.
#[derive(Debug)]
pub struct Fpga<T>
where
    T: Transport,
{
    transport: T,
    /// In the order of [`Space::ALL`]
    windows: Vec<Window<T::Mapping>>,
}

impl<T> Fpga<T>
where
    T: Transport,
{
    /// Map every window of an already opened device
    /// # Errors
    /// Returns an error if any window fails to map or report its size. Windows mapped up to that
    /// point are released before returning.
    pub fn new(transport: T) -> Result<Self, Error> {
        let mut fpga = Self {
            transport,
            windows: Vec::with_capacity(Space::ALL.len()),
        };
        for space in Space::ALL {
            let mapping = fpga.transport.map_window(space.bar())?;
            fpga.windows.push(Window::new(space, mapping, 0));
        }
        for window in &mut fpga.windows {
            let bar = window.space().bar();
            let size = fpga.transport.window_size(bar)?;
            debug!(bar, size, "BAR size");
            window.set_size(size);
        }
        Ok(fpga)
    }

    /// Size in bytes of the window serving `space`
    #[must_use]
    pub fn window_size(&self, space: Space) -> usize {
        self.window(space).size()
    }

    fn window(&self, space: Space) -> &Window<T::Mapping> {
        // Every space has a window once `new` returned
        &self.windows[space as usize]
    }

    fn window_mut(&mut self, space: Space) -> &mut Window<T::Mapping> {
        &mut self.windows[space as usize]
    }

    /// Perform the single access described by `request`, returning the value read or the value
    /// written.
    ///
    /// Taking `&mut self` makes programming the page and the transfer that depends on it one
    /// critical section. The page-select registers are device state though, so two processes (or
    /// two `Fpga`s on the same device) accessing the same paged space will race.
    /// # Errors
    /// Returns an error if the BAR is not one of ours, the page does not fit the page-select
    /// register, or the offset is outside of the window
    pub fn perform_access(&mut self, request: &AccessRequest) -> Result<u32, Error> {
        let space = Space::try_from(request.bar())?;
        let address = request.address();
        if space == Space::Wishbone && address & ((1 << WB_IMPLICIT_BITS) - 1) != 0 {
            warn!("Low bits of Wishbone address {address:#x} are not transmitted, ignoring them");
        }
        let pa = space.split(address);
        let value = match space.page_register() {
            None => self.transfer(space, pa.offset, request.access())?,
            Some(reg) => self.paged_transfer(space, reg, pa, request.access())?,
        };
        debug!(
            "{} BAR{}, data = {value:#010X}, addr = {address:#010X}, page = {}",
            match request.access() {
                Access::Read => "Read from",
                Access::Write(_) => "Wrote to",
            },
            space.bar(),
            pa.page,
        );
        Ok(value)
    }

    /// Select the page of `pa` and then transfer at its offset. This is the only caller of
    /// [`Fpga::select_page`].
    fn paged_transfer(
        &mut self,
        space: Space,
        reg: usize,
        pa: PageAddress,
        access: Access,
    ) -> Result<u32, Error> {
        let page = pa.page_register_value(space)?;
        // Don't touch the page register for an access that can't happen
        self.window(space).byte_offset(pa.offset)?;
        self.select_page(reg, page)?;
        self.transfer(space, pa.offset, access)
    }

    fn select_page(&mut self, reg: usize, page: u32) -> Result<(), Error> {
        self.window_mut(Space::Direct).write(reg as u64, page)?;
        Ok(())
    }

    fn transfer(&mut self, space: Space, index: u64, access: Access) -> Result<u32, Error> {
        let window = self.window_mut(space);
        match access {
            Access::Read => window.read(index),
            Access::Write(data) => window.write(index, data),
        }
    }
}

impl<T> Drop for Fpga<T>
where
    T: Transport,
{
    fn drop(&mut self) {
        while let Some(window) = self.windows.pop() {
            let bar = window.space().bar();
            self.transport.unmap_window(bar, window.into_mapping());
        }
        self.transport.close();
    }
}
