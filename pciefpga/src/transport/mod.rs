//! Defines the device-handle mechanisms that every transport must implement. A transport is
//! something that can hand out mappings of the device's BARs.

pub mod local;
pub mod mock;

/// Errors from the transport implementations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Local(#[from] local::Error),
    #[error(transparent)]
    Mock(#[from] mock::Error),
}

pub type TransportResult<T> = Result<T, Error>;

/// Raw access into one mapped BAR.
///
/// These methods are *unchecked*: callers guarantee that `offset` plus the access size lies
/// within the window and that `offset` is naturally aligned for the access size. The checks live
/// in [`crate::window::Window`].
pub trait Mapping {
    /// Load the 32-bit word at byte offset `offset`
    fn read_u32(&self, offset: usize) -> u32;

    /// Store the 32-bit word `value` at byte offset `offset`
    fn write_u32(&mut self, offset: usize, value: u32);

    /// Load the 64-bit word at byte offset `offset`
    fn read_u64(&self, offset: usize) -> u64;

    /// Store the 64-bit word `value` at byte offset `offset`
    fn write_u64(&mut self, offset: usize, value: u64);
}

/// The trait that is implemented for PCIe device handles.
/// Opening the device is the job of each implementation's constructor; the methods of this trait
/// *assume* that the device is already open.
pub trait Transport {
    /// The handle to a mapped window
    type Mapping: Mapping;

    /// Map BAR `bar` into our address space
    fn map_window(&mut self, bar: u8) -> TransportResult<Self::Mapping>;

    /// The size in bytes of BAR `bar`
    fn window_size(&mut self, bar: u8) -> TransportResult<usize>;

    /// Release a mapping previously returned by [`Transport::map_window`]
    fn unmap_window(&mut self, bar: u8, mapping: Self::Mapping);

    /// Close the device. No windows are mapped when this is called.
    fn close(&mut self);
}
