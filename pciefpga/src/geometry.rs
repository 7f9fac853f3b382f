//! Geometry of the three address spaces reachable over PCIe and the arithmetic that splits a
//! logical address into the page selecting the window contents and the offset inside it.

use crate::{
    regs::{
        AccessWidth,
        SDRAM_PAGE_OFFSET,
        WB_PAGE_OFFSET,
    },
    Error,
};
use std::fmt::Display;

/// Number of address bits covered by one SDRAM page
pub const SDRAM_PAGE_BITS: u32 = 20;
/// Size of one SDRAM page in bytes
pub const SDRAM_PAGE_SIZE: u64 = 1 << SDRAM_PAGE_BITS;
/// Mask selecting the in-page offset of an SDRAM address
pub const SDRAM_PAGE_MASK: u64 = SDRAM_PAGE_SIZE - 1;

/// Number of (already shifted) address bits covered by one Wishbone page
pub const WB_PAGE_BITS: u32 = 16;
/// Size of one Wishbone page in 64-bit units
pub const WB_PAGE_SIZE: u64 = 1 << WB_PAGE_BITS;
/// Mask selecting the in-page offset of a shifted Wishbone address
pub const WB_PAGE_MASK: u64 = WB_PAGE_SIZE - 1;
/// Low Wishbone address bits that are always zero and never transmitted
pub const WB_IMPLICIT_BITS: u32 = 3;

/// The address spaces of the FPGA, each bound to one BAR
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Space {
    /// BAR 0, the PCIe core register file. Byte addressed, not paged.
    Direct,
    /// BAR 2, one 1 MiB page of SDRAM at a time. Byte addressed.
    Sdram,
    /// BAR 4, one page of the Wishbone bus at a time. Addressed in 64-bit units.
    Wishbone,
}

impl Space {
    /// All spaces, in the order their windows are acquired
    pub const ALL: [Space; 3] = [Space::Direct, Space::Sdram, Space::Wishbone];

    /// The BAR number backing this space
    #[must_use]
    pub const fn bar(self) -> u8 {
        match self {
            Space::Direct => 0,
            Space::Sdram => 2,
            Space::Wishbone => 4,
        }
    }

    /// The native unit of the window for this space
    #[must_use]
    pub const fn width(self) -> AccessWidth {
        match self {
            Space::Direct | Space::Sdram => AccessWidth::DWord,
            Space::Wishbone => AccessWidth::QWord,
        }
    }

    /// Byte offset of the page-select register in BAR 0, if this space is paged
    #[must_use]
    pub const fn page_register(self) -> Option<usize> {
        match self {
            Space::Direct => None,
            Space::Sdram => Some(SDRAM_PAGE_OFFSET),
            Space::Wishbone => Some(WB_PAGE_OFFSET),
        }
    }

    /// Split `address` into the page and the offset in window units
    #[must_use]
    pub fn split(self, address: u64) -> PageAddress {
        match self {
            Space::Direct => PageAddress {
                page: 0,
                offset: address,
            },
            Space::Sdram => sdram_split(address),
            Space::Wishbone => wishbone_split(address),
        }
    }

    /// Reassemble a logical address from the page and in-page offset
    #[must_use]
    pub fn join(self, pa: PageAddress) -> u64 {
        match self {
            Space::Direct => pa.offset,
            Space::Sdram => sdram_join(pa),
            Space::Wishbone => wishbone_join(pa),
        }
    }
}

impl TryFrom<u8> for Space {
    type Error = Error;

    fn try_from(bar: u8) -> Result<Self, Self::Error> {
        Space::ALL
            .into_iter()
            .find(|s| s.bar() == bar)
            .ok_or(Error::InvalidSpace(bar))
    }
}

impl Display for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Space::Direct => "direct",
                Space::Sdram => "SDRAM",
                Space::Wishbone => "Wishbone",
            }
        )
    }
}

/// A logical address decomposed into the page that has to be selected and the offset into the
/// window once it is
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageAddress {
    pub page: u64,
    pub offset: u64,
}

impl PageAddress {
    /// The value to program into the 32-bit page-select register
    /// # Errors
    /// Returns an error if the page number needs more than 32 bits
    pub fn page_register_value(&self, space: Space) -> Result<u32, Error> {
        u32::try_from(self.page).map_err(|_| Error::PageOutOfRange {
            space,
            page: self.page,
        })
    }
}

/// Decompose an SDRAM byte address
#[must_use]
pub const fn sdram_split(address: u64) -> PageAddress {
    PageAddress {
        page: address >> SDRAM_PAGE_BITS,
        offset: address & SDRAM_PAGE_MASK,
    }
}

#[must_use]
pub const fn sdram_join(pa: PageAddress) -> u64 {
    (pa.page << SDRAM_PAGE_BITS) | pa.offset
}

/// Decompose a Wishbone byte address. The bottom [`WB_IMPLICIT_BITS`] are dropped, so the offset
/// is in 64-bit units.
#[must_use]
pub const fn wishbone_split(address: u64) -> PageAddress {
    let shifted = address >> WB_IMPLICIT_BITS;
    PageAddress {
        page: shifted >> WB_PAGE_BITS,
        offset: shifted & WB_PAGE_MASK,
    }
}

/// Inverse of [`wishbone_split`], the implicit low bits come back as zero
#[must_use]
pub const fn wishbone_join(pa: PageAddress) -> u64 {
    ((pa.page << WB_PAGE_BITS) | pa.offset) << WB_IMPLICIT_BITS
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sdram_split() {
        let pa = sdram_split(0x0018_0005);
        assert_eq!(pa.page, 1);
        assert_eq!(pa.offset, 0x8_0005);
    }

    #[test]
    fn test_wishbone_split() {
        let pa = wishbone_split(0x0001_0008);
        assert_eq!(pa.page, 0);
        assert_eq!(pa.offset, 0x2001);
    }

    #[test]
    fn test_wishbone_page_boundary() {
        // First unit of the second page
        let pa = wishbone_split(1 << (WB_PAGE_BITS + WB_IMPLICIT_BITS));
        assert_eq!(pa, PageAddress { page: 1, offset: 0 });
    }

    #[test]
    fn test_direct_is_not_paged() {
        let pa = Space::Direct.split(0x1C);
        assert_eq!(pa, PageAddress { page: 0, offset: 0x1C });
    }

    #[test]
    fn test_bar_numbers() {
        for space in Space::ALL {
            assert_eq!(Space::try_from(space.bar()).unwrap(), space);
        }
        for bar in [1u8, 3, 5, 6, 255] {
            assert!(matches!(Space::try_from(bar), Err(Error::InvalidSpace(b)) if b == bar));
        }
    }

    #[test]
    fn test_page_overflow() {
        let pa = Space::Sdram.split(u64::MAX);
        assert!(matches!(
            pa.page_register_value(Space::Sdram),
            Err(Error::PageOutOfRange { space: Space::Sdram, .. })
        ));
        // The highest page that still fits
        let pa = Space::Sdram.split((u64::from(u32::MAX) << SDRAM_PAGE_BITS) | 0xF_FFFF);
        assert_eq!(pa.page_register_value(Space::Sdram).unwrap(), u32::MAX);
    }

    proptest! {
        #[test]
        fn sdram_roundtrip(address in any::<u64>()) {
            prop_assert_eq!(sdram_join(sdram_split(address)), address);
        }

        #[test]
        fn wishbone_roundtrip(address in any::<u64>()) {
            let aligned = address & !((1 << WB_IMPLICIT_BITS) - 1);
            prop_assert_eq!(wishbone_join(wishbone_split(address)), aligned);
        }

        #[test]
        fn space_roundtrip(address in any::<u64>()) {
            for space in Space::ALL {
                let expected = match space {
                    Space::Wishbone => address & !((1 << WB_IMPLICIT_BITS) - 1),
                    Space::Direct | Space::Sdram => address,
                };
                prop_assert_eq!(space.join(space.split(address)), expected);
            }
        }

        #[test]
        fn offsets_stay_in_page(address in any::<u64>()) {
            prop_assert!(sdram_split(address).offset < SDRAM_PAGE_SIZE);
            prop_assert!(wishbone_split(address).offset < WB_PAGE_SIZE);
        }
    }
}
