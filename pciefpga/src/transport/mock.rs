//! Mock transport implementations used in testing the interface

use super::{
    Mapping,
    Transport,
    TransportResult,
};
use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("BAR {0} does not exist on the mock device")]
    MissingWindow(u8),
    #[error("Injected failure mapping BAR {0}")]
    MapFailed(u8),
    #[error("Injected failure querying the size of BAR {0}")]
    SizeFailed(u8),
}

/// Everything the mock device was asked to do, in order
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Event {
    Map(u8),
    Unmap(u8),
    Close,
    Read { bar: u8, offset: usize, bytes: usize },
    Write {
        bar: u8,
        offset: usize,
        bytes: usize,
        value: u64,
    },
}

#[derive(Debug, Default)]
struct State {
    memory: HashMap<(u8, usize), u8>,
    events: Vec<Event>,
}

impl State {
    fn load(&self, bar: u8, offset: usize, n: usize) -> u64 {
        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().take(n).enumerate() {
            *byte = self.memory.get(&(bar, offset + i)).copied().unwrap_or(0);
        }
        u64::from_le_bytes(bytes)
    }

    fn store(&mut self, bar: u8, offset: usize, n: usize, value: u64) {
        for (i, byte) in value.to_le_bytes().into_iter().take(n).enumerate() {
            self.memory.insert((bar, offset + i), byte);
        }
    }
}

/// A device that mocks BAR reads and writes, useful for testing.
///
/// Clones share the same memory and event log, so a test can hold on to one while another is
/// consumed by an [`crate::core::Fpga`].
#[derive(Debug, Clone)]
pub struct Mock {
    sizes: HashMap<u8, usize>,
    fail_map: Option<u8>,
    fail_size: Option<u8>,
    state: Rc<RefCell<State>>,
}

impl Mock {
    /// Construct a new mock device by providing the size in bytes of each BAR
    #[must_use]
    pub fn new(sizes: HashMap<u8, usize>) -> Self {
        // Memory is represented lazily, unwritten bytes read back as zero
        Self {
            sizes,
            fail_map: None,
            fail_size: None,
            state: Rc::default(),
        }
    }

    /// Make mapping `bar` fail
    #[must_use]
    pub fn fail_map(mut self, bar: u8) -> Self {
        self.fail_map = Some(bar);
        self
    }

    /// Make the size query of `bar` fail
    #[must_use]
    pub fn fail_size(mut self, bar: u8) -> Self {
        self.fail_size = Some(bar);
        self
    }

    /// The events recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Forget the recorded events, keeping memory contents
    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    /// Peek at a 32-bit word of device memory without recording an event
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn peek_u32(&self, bar: u8, offset: usize) -> u32 {
        self.state.borrow().load(bar, offset, 4) as u32
    }

    /// Peek at a 64-bit word of device memory without recording an event
    #[must_use]
    pub fn peek_u64(&self, bar: u8, offset: usize) -> u64 {
        self.state.borrow().load(bar, offset, 8)
    }

    /// Poke a 64-bit word of device memory without recording an event, as if the hardware had
    /// changed it
    pub fn poke_u64(&self, bar: u8, offset: usize, value: u64) {
        self.state.borrow_mut().store(bar, offset, 8, value);
    }

    fn record(&self, event: Event) {
        self.state.borrow_mut().events.push(event);
    }
}

/// A mapped BAR of a [`Mock`] device
#[derive(Debug)]
pub struct MockWindow {
    bar: u8,
    state: Rc<RefCell<State>>,
}

impl MockWindow {
    fn read(&self, offset: usize, bytes: usize) -> u64 {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Read {
            bar: self.bar,
            offset,
            bytes,
        });
        state.load(self.bar, offset, bytes)
    }

    fn write(&mut self, offset: usize, bytes: usize, value: u64) {
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Write {
            bar: self.bar,
            offset,
            bytes,
            value,
        });
        state.store(self.bar, offset, bytes, value);
    }
}

impl Mapping for MockWindow {
    #[allow(clippy::cast_possible_truncation)]
    fn read_u32(&self, offset: usize) -> u32 {
        self.read(offset, 4) as u32
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.write(offset, 4, value.into());
    }

    fn read_u64(&self, offset: usize) -> u64 {
        self.read(offset, 8)
    }

    fn write_u64(&mut self, offset: usize, value: u64) {
        self.write(offset, 8, value);
    }
}

impl Transport for Mock {
    type Mapping = MockWindow;

    fn map_window(&mut self, bar: u8) -> TransportResult<MockWindow> {
        if self.fail_map == Some(bar) {
            return Err(Error::MapFailed(bar).into());
        }
        if !self.sizes.contains_key(&bar) {
            return Err(Error::MissingWindow(bar).into());
        }
        self.record(Event::Map(bar));
        Ok(MockWindow {
            bar,
            state: Rc::clone(&self.state),
        })
    }

    fn window_size(&mut self, bar: u8) -> TransportResult<usize> {
        if self.fail_size == Some(bar) {
            return Err(Error::SizeFailed(bar).into());
        }
        Ok(*self.sizes.get(&bar).ok_or(Error::MissingWindow(bar))?)
    }

    fn unmap_window(&mut self, bar: u8, mapping: MockWindow) {
        debug_assert_eq!(bar, mapping.bar);
        self.record(Event::Unmap(bar));
    }

    fn close(&mut self) {
        self.record(Event::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paste::paste;

    fn device() -> Mock {
        Mock::new(HashMap::from([(0, 0x100), (2, 0x10_0000), (4, 0x8_0000)]))
    }

    macro_rules! test_rw_width {
        ($name:ident, $read:ident, $write:ident, $v:literal) => {
            paste! {
                #[test]
                fn [<test_rw_ $name>]() {
                    let mut transport = device();
                    let mut window = transport.map_window(2).unwrap();
                    window.$write(0x10, $v);
                    assert_eq!(window.$read(0x10), $v);
                }
            }
        };
    }

    #[test]
    fn test_unwritten_reads_zero() {
        let mut transport = device();
        let window = transport.map_window(0).unwrap();
        assert_eq!(window.read_u32(0x1C), 0);
    }

    #[test]
    fn test_windows_are_separate() {
        let mut transport = device();
        let mut bar0 = transport.map_window(0).unwrap();
        let bar2 = transport.map_window(2).unwrap();
        bar0.write_u32(0, 0xDEAD_BEEF);
        assert_eq!(bar2.read_u32(0), 0);
        assert_eq!(transport.peek_u32(0, 0), 0xDEAD_BEEF);
    }

    #[test]
    fn test_events_in_order() {
        let mut transport = device();
        let mut bar0 = transport.map_window(0).unwrap();
        bar0.write_u32(4, 7);
        let _ = bar0.read_u32(4);
        transport.unmap_window(0, bar0);
        transport.close();
        assert_eq!(
            transport.events(),
            vec![
                Event::Map(0),
                Event::Write {
                    bar: 0,
                    offset: 4,
                    bytes: 4,
                    value: 7
                },
                Event::Read {
                    bar: 0,
                    offset: 4,
                    bytes: 4
                },
                Event::Unmap(0),
                Event::Close,
            ]
        );
    }

    #[test]
    fn test_injected_failures() {
        let mut transport = device().fail_map(2).fail_size(4);
        assert!(transport.map_window(0).is_ok());
        assert!(matches!(
            transport.map_window(2),
            Err(super::super::Error::Mock(Error::MapFailed(2)))
        ));
        assert!(matches!(
            transport.window_size(4),
            Err(super::super::Error::Mock(Error::SizeFailed(4)))
        ));
        assert!(matches!(
            transport.map_window(1),
            Err(super::super::Error::Mock(Error::MissingWindow(1)))
        ));
    }

    test_rw_width!(u32, read_u32, write_u32, 0xDEAD_BEEF);
    test_rw_width!(u64, read_u64, write_u64, 0xDEAD_BEEF_B0BA_CAFE);
}
