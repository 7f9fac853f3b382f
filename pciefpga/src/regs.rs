//! Register map of the PCIe core inside the FPGA firmware. These must match the gateware.

/// Width codes used by the PCIe core to describe the size of one addressed unit
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum AccessWidth {
    /// 8-bit units
    Byte = 0,
    /// 16-bit units
    Word = 1,
    /// 32-bit units
    DWord = 2,
    /// 64-bit units
    QWord = 3,
}

impl AccessWidth {
    /// The shift that turns a unit index into a byte offset
    #[must_use]
    pub const fn shift(self) -> u32 {
        self as u32
    }

    /// Size of one unit in bytes
    #[must_use]
    pub const fn bytes(self) -> usize {
        1 << self.shift()
    }
}

/// Index of the SDRAM page-select register in the BAR 0 register file
const SDRAM_PAGE_REG: usize = 7;
/// Index of the Wishbone page-select register in the BAR 0 register file
const WB_PAGE_REG: usize = 9;

/// Byte offset in BAR 0 of the register holding the SDRAM page visible through BAR 2
pub const SDRAM_PAGE_OFFSET: usize = SDRAM_PAGE_REG << AccessWidth::DWord.shift();
/// Byte offset in BAR 0 of the register holding the Wishbone page visible through BAR 4
pub const WB_PAGE_OFFSET: usize = WB_PAGE_REG << AccessWidth::DWord.shift();
