//! Register map, NVM layout constants and unit conversions for the STUSB4500.
//! Register values follow ST's NVM programming guide; field encodings follow the
//! sink PDO layout in sectors 3 and 4.

/// Default 7-bit I2C address (ADDR0/ADDR1 straps tied low).
pub const DEFAULT_I2C_ADDRESS: u8 = 0x28;

/// Register addresses used by the NVM flasher.
pub mod addr {
    /// Shared read/write buffer, 8 bytes wide (one sector).
    pub const RW_BUFFER: u8 = 0x53;
    /// Customer password register; must hold [`NVM_PASSWORD`](super::NVM_PASSWORD) to unlock.
    pub const FTP_CUST_PASSWORD: u8 = 0x95;
    /// Control 0: power, reset, request and sector index.
    pub const FTP_CTRL_0: u8 = 0x96;
    /// Control 1: erase-sector mask and opcode.
    pub const FTP_CTRL_1: u8 = 0x97;
}

/// Value unlocking the customer NVM area.
pub const NVM_PASSWORD: u8 = 0x47;

pub const SECTOR_COUNT: usize = 5;
pub const SECTOR_SIZE: usize = 8;
pub const NVM_SIZE: usize = SECTOR_COUNT * SECTOR_SIZE;

/// FTP_CTRL_0 bits 2-0: sector index.
pub const CTRL0_SECT_MASK: u8 = 0x07;
/// FTP_CTRL_1 bits 7-3: erase-sector mask.
pub const CTRL1_SER_MASK: u8 = 0xF8;
/// FTP_CTRL_1 bits 2-0: opcode.
pub const CTRL1_OPCODE_MASK: u8 = 0x07;

bitflags::bitflags! {
    /// FTP_CTRL_0 register bits (0x96).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct Ctrl0Bits: u8 {
        /// Bit 7: NVM power.
        const PWR   = 0x80;
        /// Bit 6: NVM controller out of reset (active low reset).
        const RST_N = 0x40;
        /// Bit 4: Request; set to latch the opcode, cleared by hardware when done.
        const REQ   = 0x10;
    }

    /// Sector flags for the FTP_CTRL_1 erase mask (before shifting into bits 7-3).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct SectorMask: u8 {
        const SECTOR_0 = 0x01;
        const SECTOR_1 = 0x02;
        const SECTOR_2 = 0x04;
        const SECTOR_3 = 0x08;
        const SECTOR_4 = 0x10;
    }
}

/// FTP_CUST_OPCODE field values (FTP_CTRL_1 bits 2-0).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    /// Read memory array.
    Read = 0x00,
    /// Shift data into the Program Load register.
    WritePl = 0x01,
    /// Shift data into the Sector Erase register.
    WriteSer = 0x02,
    /// Shift data out of the Program Load register.
    ReadPl = 0x03,
    /// Shift data out of the Sector Erase register.
    ReadSer = 0x04,
    /// Erase memory array.
    EraseSector = 0x05,
    /// Program one 64-bit word into the array.
    ProgSector = 0x06,
    /// Soft-program the array.
    SoftProgSector = 0x07,
}

/// FTP_CTRL_1 value selecting `opcode` with the given erase mask.
pub fn ctrl1_value(opcode: Opcode, erase: SectorMask) -> u8 {
    ((erase.bits() << 3) & CTRL1_SER_MASK) | (opcode as u8 & CTRL1_OPCODE_MASK)
}

/// FTP_CTRL_0 value that powers the controller and latches the pending opcode for `sector`.
pub fn ctrl0_load(sector: u8) -> u8 {
    (sector & CTRL0_SECT_MASK) | (Ctrl0Bits::PWR | Ctrl0Bits::RST_N | Ctrl0Bits::REQ).bits()
}

/// NVM content shipped from the factory.
pub const FACTORY_DEFAULTS: [u8; NVM_SIZE] = [
    0x00, 0x00, 0xB0, 0xAA, 0x00, 0x45, 0x00, 0x00, // sector 0
    0x10, 0x40, 0x9C, 0x1C, 0xFF, 0x01, 0x3C, 0xDF, // sector 1
    0x02, 0x40, 0x0F, 0x00, 0x32, 0x00, 0xFC, 0xF1, // sector 2
    0x00, 0x19, 0x56, 0xAF, 0xF5, 0x35, 0x5F, 0x00, // sector 3
    0x00, 0x4B, 0x90, 0x21, 0x43, 0x00, 0x40, 0xFB, // sector 4
];

/// PDO1 is always a fixed 5 V request.
pub const PDO1_VOLTAGE_MV: u16 = 5_000;
pub const VOLTAGE_MIN_MV: u16 = 5_000;
pub const VOLTAGE_MAX_MV: u16 = 20_000;
/// PDO2 voltage: 8-bit field, 200 mV LSB.
pub const PDO2_VOLTAGE_LSB_MV: u16 = 200;
/// PDO3 voltage: 10-bit field, 50 mV LSB.
pub const PDO3_VOLTAGE_LSB_MV: u16 = 50;
pub const PDO3_VOLTAGE_CODE_MAX: u16 = 0x3FF;

pub const CURRENT_MAX_MA: u16 = 5_000;
/// Flex current: 10-bit field, 10 mA LSB.
pub const FLEX_CURRENT_LSB_MA: u16 = 10;
/// Voltage limit nibbles are stored as (percent - 5).
pub const VOLTAGE_LIMIT_OFFSET_PCT: u8 = 5;

/// Convert PDO2 voltage (mV) to its 8-bit code. Clamps to 5-20 V.
pub fn pdo2_voltage_mv_to_code(mv: u16) -> u8 {
    let mv = mv.clamp(VOLTAGE_MIN_MV, VOLTAGE_MAX_MV);
    ((mv + PDO2_VOLTAGE_LSB_MV / 2) / PDO2_VOLTAGE_LSB_MV) as u8
}

pub fn code_to_pdo2_voltage_mv(code: u8) -> u16 {
    code as u16 * PDO2_VOLTAGE_LSB_MV
}

/// Convert PDO3 voltage (mV) to its 10-bit code. Clamps to 5-20 V.
pub fn pdo3_voltage_mv_to_code(mv: u16) -> u16 {
    let mv = mv.clamp(VOLTAGE_MIN_MV, VOLTAGE_MAX_MV);
    ((mv + PDO3_VOLTAGE_LSB_MV / 2) / PDO3_VOLTAGE_LSB_MV).min(PDO3_VOLTAGE_CODE_MAX)
}

pub fn code_to_pdo3_voltage_mv(code: u16) -> u16 {
    (code & PDO3_VOLTAGE_CODE_MAX) * PDO3_VOLTAGE_LSB_MV
}

/// Decode a 4-bit current nibble: 0.25 A steps up to 3 A, then 0.5 A steps up to 5 A.
pub fn code_to_current_ma(code: u8) -> u16 {
    match code & 0x0F {
        0 => 0,
        c @ 1..=10 => c as u16 * 250 + 250,
        c => c as u16 * 500 - 2_500,
    }
}

/// Quantize a current request to the nearest nibble. Clamps to 5 A; below 0.5 A maps to 0.
pub fn current_ma_to_code(ma: u16) -> u8 {
    let ma = ma.min(CURRENT_MAX_MA);
    if ma < 500 {
        0
    } else if ma <= 3_000 {
        // round(4 * A - 1)
        ((ma - 250 + 125) / 250) as u8
    } else {
        // round(2 * A + 5)
        ((2 * ma as u32 + 5_000 + 500) / 1_000) as u8
    }
}

/// Decode a voltage limit nibble into percent.
pub fn code_to_limit_pct(code: u8) -> u8 {
    (code & 0x0F) + VOLTAGE_LIMIT_OFFSET_PCT
}
