//! Typed handles over mapped BARs. A [`Window`] knows which address space it belongs to and
//! hides the addressing convention of that space: the direct and SDRAM windows are indexed in
//! bytes and moved in 32-bit words, while the Wishbone window is indexed in its native 64-bit
//! units.

use crate::{
    geometry::Space,
    regs::AccessWidth,
    transport::Mapping,
    Error,
};
use tracing::trace;

/// One mapped BAR together with the space it serves and its size
#[derive(Debug)]
pub struct Window<M> {
    space: Space,
    mapping: M,
    size: usize,
}

impl<M> Window<M>
where
    M: Mapping,
{
    #[must_use]
    pub fn new(space: Space, mapping: M, size: usize) -> Self {
        Self {
            space,
            mapping,
            size,
        }
    }

    #[must_use]
    pub fn space(&self) -> Space {
        self.space
    }

    /// Size of the window in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Give the raw mapping back, e.g. to unmap it
    #[must_use]
    pub fn into_mapping(self) -> M {
        self.mapping
    }

    /// Resolve `index` (in the window's addressing convention) into a checked byte offset
    pub(crate) fn byte_offset(&self, index: u64) -> Result<usize, Error> {
        let width = self.space.width();
        // Wide enough that scaling a Wishbone unit index can't overflow
        let wide = match self.space {
            Space::Direct | Space::Sdram => u128::from(index),
            Space::Wishbone => u128::from(index) << width.shift(),
        };
        let offset = usize::try_from(wide)
            .ok()
            .filter(|o| o.checked_add(width.bytes()).is_some_and(|end| end <= self.size))
            .ok_or(Error::OutOfBounds {
                space: self.space,
                offset: wide,
                size: self.size,
            })?;
        if offset % width.bytes() != 0 {
            return Err(Error::Misaligned {
                space: self.space,
                offset,
                align: width.bytes(),
            });
        }
        Ok(offset)
    }

    /// Read the 32-bit value at `index`
    /// # Errors
    /// Returns an error if `index` is out of bounds or misaligned
    #[allow(clippy::cast_possible_truncation)]
    pub fn read(&self, index: u64) -> Result<u32, Error> {
        let offset = self.byte_offset(index)?;
        let value = match self.space.width() {
            // Only the low half of a Wishbone unit carries data
            AccessWidth::QWord => self.mapping.read_u64(offset) as u32,
            _ => self.mapping.read_u32(offset),
        };
        trace!(space = %self.space, offset, value, "Window read");
        Ok(value)
    }

    /// Write `value` at `index`, giving back the value written
    /// # Errors
    /// Returns an error if `index` is out of bounds or misaligned
    pub fn write(&mut self, index: u64, value: u32) -> Result<u32, Error> {
        let offset = self.byte_offset(index)?;
        match self.space.width() {
            AccessWidth::QWord => self.mapping.write_u64(offset, value.into()),
            _ => self.mapping.write_u32(offset, value),
        }
        trace!(space = %self.space, offset, value, "Window write");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{
        mock::{
            Event,
            Mock,
        },
        Transport,
    };
    use std::collections::HashMap;

    fn window(space: Space, size: usize) -> (Mock, Window<crate::transport::mock::MockWindow>) {
        let mut mock = Mock::new(HashMap::from([(space.bar(), size)]));
        let mapping = mock.map_window(space.bar()).unwrap();
        mock.clear_events();
        (mock.clone(), Window::new(space, mapping, size))
    }

    #[test]
    fn test_direct_is_byte_addressed() {
        let (mock, mut w) = window(Space::Direct, 0x100);
        w.write(0x1C, 0xDEAD_BEEF).unwrap();
        assert_eq!(mock.peek_u32(0, 0x1C), 0xDEAD_BEEF);
        assert_eq!(w.read(0x1C).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_wishbone_is_unit_addressed() {
        let (mock, mut w) = window(Space::Wishbone, 0x8_0000);
        w.write(0x2001, 0x1234_5678).unwrap();
        assert_eq!(
            mock.events(),
            vec![Event::Write {
                bar: 4,
                offset: 0x2001 * 8,
                bytes: 8,
                value: 0x1234_5678
            }]
        );
        assert_eq!(mock.peek_u64(4, 0x10008), 0x1234_5678);
    }

    #[test]
    fn test_wishbone_read_truncates_unit() {
        let (mock, w) = window(Space::Wishbone, 0x8_0000);
        mock.poke_u64(4, 8, 0xAAAA_BBBB_CCCC_DDDD);
        assert_eq!(w.read(1).unwrap(), 0xCCCC_DDDD);
    }

    #[test]
    fn test_last_word_in_bounds() {
        let (_, mut w) = window(Space::Sdram, 0x10_0000);
        assert!(w.write(0xF_FFFC, 1).is_ok());
        assert!(matches!(
            w.write(0x10_0000, 1),
            Err(Error::OutOfBounds {
                space: Space::Sdram,
                offset: 0x10_0000,
                ..
            })
        ));
    }

    #[test]
    fn test_straddling_end_is_out_of_bounds() {
        let (_, w) = window(Space::Direct, 0x100);
        assert!(matches!(w.read(0xFE), Err(Error::OutOfBounds { .. })));
        assert!(matches!(w.read(u64::MAX), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_wishbone_bounds_in_units() {
        // 0x10 units of 8 bytes
        let (_, w) = window(Space::Wishbone, 0x80);
        assert!(w.read(0xF).is_ok());
        assert!(matches!(w.read(0x10), Err(Error::OutOfBounds { .. })));
        assert!(matches!(w.read(u64::MAX >> 1), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn test_wishbone_out_of_bounds_reports_bytes() {
        let (_, w) = window(Space::Wishbone, 0x80);
        let err = w.read(0x10).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfBounds {
                space: Space::Wishbone,
                offset: 0x80,
                size: 0x80
            }
        ));
        assert_eq!(
            err.to_string(),
            "Offset 0x80 is outside of the Wishbone window (0x80 bytes)"
        );
        // Scaling the largest index doesn't wrap
        assert!(matches!(
            w.read(u64::MAX),
            Err(Error::OutOfBounds { offset, .. }) if offset == u128::from(u64::MAX) * 8
        ));
    }

    #[test]
    fn test_misaligned() {
        let (mock, w) = window(Space::Direct, 0x100);
        assert!(matches!(
            w.read(0x1D),
            Err(Error::Misaligned {
                space: Space::Direct,
                offset: 0x1D,
                align: 4
            })
        ));
        assert!(mock.events().is_empty());
    }
}
