//! In-memory mirror of the five NVM sectors and the parameter codec on top of it.
//!
//! Every accessor is a pure function of fixed byte offsets; setters rewrite only
//! their own field mask and leave the rest of the byte alone.

use crate::data_types::{GpioControl, Pdo, PdoSettings, PowerOkConfig};
use crate::error::InvalidBufferLength;
use crate::registers::{
    FACTORY_DEFAULTS, FLEX_CURRENT_LSB_MA, NVM_SIZE, PDO1_VOLTAGE_MV, SECTOR_COUNT, SECTOR_SIZE,
    VOLTAGE_LIMIT_OFFSET_PCT, code_to_current_ma, code_to_limit_pct, code_to_pdo2_voltage_mv,
    code_to_pdo3_voltage_mv, current_ma_to_code, pdo2_voltage_mv_to_code, pdo3_voltage_mv_to_code,
};

/// Byte offsets into the 40-byte image.
mod offset {
    /// Sector 1: GPIO function.
    pub const GPIO_CFG: usize = 8;
    /// Sector 3: PDO1 current, PDO count, flags; low byte of PDO3 voltage.
    pub const PDO1_CFG: usize = 26;
    /// PDO1 upper limit (bits 7-4), PDO3 voltage bits 9-8 (bits 1-0).
    pub const PDO1_LIMIT: usize = 27;
    /// PDO2 lower limit (bits 7-4), PDO2 current (bits 3-0).
    pub const PDO2_CFG: usize = 28;
    /// PDO3 current (bits 7-4), PDO2 upper limit (bits 3-0).
    pub const PDO3_CFG: usize = 29;
    /// PDO3 upper limit (bits 7-4), PDO3 lower limit (bits 3-0).
    pub const PDO3_LIMIT: usize = 30;
    /// Sector 4: PDO2 voltage.
    pub const PDO2_VOLTAGE: usize = 33;
    /// Flex current bits 5-0 (bits 7-2).
    pub const FLEX_LOW: usize = 35;
    /// Flex current bits 9-6 (bits 3-0), POWER_OK config (bits 6-5).
    pub const FLEX_HIGH: usize = 36;
    /// POWER_ONLY_ABOVE_5V (bit 3), REQ_SRC_CURRENT (bit 4).
    pub const POWER_FLAGS: usize = 38;
}

/// Raw NVM contents: 5 sectors of 8 bytes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SectorImage([u8; NVM_SIZE]);

impl SectorImage {
    pub const fn zeroed() -> Self {
        Self([0; NVM_SIZE])
    }

    pub const fn factory_defaults() -> Self {
        Self(FACTORY_DEFAULTS)
    }

    pub const fn from_bytes(bytes: [u8; NVM_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NVM_SIZE] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; NVM_SIZE] {
        self.0
    }

    /// Raw bytes of sector `index` (0-4).
    pub fn sector(&self, index: usize) -> Option<&[u8; SECTOR_SIZE]> {
        if index >= SECTOR_COUNT {
            return None;
        }
        self.0[index * SECTOR_SIZE..(index + 1) * SECTOR_SIZE]
            .try_into()
            .ok()
    }

    pub(crate) fn sector_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.0[index * SECTOR_SIZE..(index + 1) * SECTOR_SIZE]
    }

    /// Byte-for-byte comparison against [`FACTORY_DEFAULTS`].
    pub fn is_factory_defaults(&self) -> bool {
        self.0 == FACTORY_DEFAULTS
    }

    fn byte(&self, offset: usize) -> u8 {
        self.0[offset]
    }

    fn update_byte(&mut self, offset: usize, mask: u8, value: u8) {
        let cur = self.0[offset];
        self.0[offset] = (cur & !mask) | (value & mask);
    }

    /// Requested voltage in mV. PDO1 is always 5 V.
    pub fn voltage_mv(&self, pdo: Pdo) -> u16 {
        match pdo {
            Pdo::Pdo1 => PDO1_VOLTAGE_MV,
            Pdo::Pdo2 => code_to_pdo2_voltage_mv(self.byte(offset::PDO2_VOLTAGE)),
            Pdo::Pdo3 => {
                let code = ((self.byte(offset::PDO1_LIMIT) as u16 & 0x03) << 8)
                    | self.byte(offset::PDO1_CFG) as u16;
                code_to_pdo3_voltage_mv(code)
            }
        }
    }

    /// Set the requested voltage (clamped to 5-20 V). PDO1 is fixed, so this is a no-op for it.
    pub fn set_voltage_mv(&mut self, pdo: Pdo, mv: u16) {
        match pdo {
            Pdo::Pdo1 => {}
            Pdo::Pdo2 => self.update_byte(offset::PDO2_VOLTAGE, 0xFF, pdo2_voltage_mv_to_code(mv)),
            Pdo::Pdo3 => {
                let code = pdo3_voltage_mv_to_code(mv);
                self.update_byte(offset::PDO1_CFG, 0xFF, code as u8);
                self.update_byte(offset::PDO1_LIMIT, 0x03, (code >> 8) as u8);
            }
        }
    }

    /// Requested operating current in mA.
    pub fn current_ma(&self, pdo: Pdo) -> u16 {
        let code = match pdo {
            Pdo::Pdo1 => self.byte(offset::PDO1_CFG) >> 4,
            Pdo::Pdo2 => self.byte(offset::PDO2_CFG) & 0x0F,
            Pdo::Pdo3 => self.byte(offset::PDO3_CFG) >> 4,
        };
        code_to_current_ma(code)
    }

    /// Set the requested current, quantized to the nearest nibble step (clamped to 5 A).
    pub fn set_current_ma(&mut self, pdo: Pdo, ma: u16) {
        let code = current_ma_to_code(ma);
        match pdo {
            Pdo::Pdo1 => self.update_byte(offset::PDO1_CFG, 0xF0, code << 4),
            Pdo::Pdo2 => self.update_byte(offset::PDO2_CFG, 0x0F, code),
            Pdo::Pdo3 => self.update_byte(offset::PDO3_CFG, 0xF0, code << 4),
        }
    }

    /// Under-voltage lockout margin in percent (5-20). Fixed at 5 for PDO1.
    pub fn lower_voltage_limit(&self, pdo: Pdo) -> u8 {
        match pdo {
            Pdo::Pdo1 => VOLTAGE_LIMIT_OFFSET_PCT,
            Pdo::Pdo2 => code_to_limit_pct(self.byte(offset::PDO2_CFG) >> 4),
            Pdo::Pdo3 => code_to_limit_pct(self.byte(offset::PDO3_LIMIT)),
        }
    }

    /// Over-voltage lockout margin in percent (5-20).
    pub fn upper_voltage_limit(&self, pdo: Pdo) -> u8 {
        match pdo {
            Pdo::Pdo1 => code_to_limit_pct(self.byte(offset::PDO1_LIMIT) >> 4),
            Pdo::Pdo2 => code_to_limit_pct(self.byte(offset::PDO3_CFG)),
            Pdo::Pdo3 => code_to_limit_pct(self.byte(offset::PDO3_LIMIT) >> 4),
        }
    }

    pub fn pdo_settings(&self, pdo: Pdo) -> PdoSettings {
        PdoSettings {
            voltage_mv: self.voltage_mv(pdo),
            current_ma: self.current_ma(pdo),
            lower_limit_pct: self.lower_voltage_limit(pdo),
            upper_limit_pct: self.upper_voltage_limit(pdo),
        }
    }

    /// Current used for PDO requests when the flex current option is active, in mA.
    pub fn flex_current_ma(&self) -> u16 {
        let high = (self.byte(offset::FLEX_HIGH) & 0x0F) as u16;
        let low = (self.byte(offset::FLEX_LOW) >> 2) as u16;
        ((high << 6) | low) * FLEX_CURRENT_LSB_MA
    }

    /// Number of sink PDOs advertised (0-3).
    pub fn pdo_number(&self) -> u8 {
        (self.byte(offset::PDO1_CFG) >> 1) & 0x03
    }

    pub fn external_power(&self) -> bool {
        self.byte(offset::PDO1_CFG) & 0x08 != 0
    }

    pub fn usb_comm_capable(&self) -> bool {
        self.byte(offset::PDO1_CFG) & 0x01 != 0
    }

    pub fn power_ok_config(&self) -> PowerOkConfig {
        PowerOkConfig::from_bits(self.byte(offset::FLEX_HIGH) >> 5)
    }

    pub fn gpio_control(&self) -> GpioControl {
        GpioControl::from_bits(self.byte(offset::GPIO_CFG) >> 4)
    }

    pub fn power_above_5v_only(&self) -> bool {
        self.byte(offset::POWER_FLAGS) & 0x08 != 0
    }

    pub fn req_src_current(&self) -> bool {
        self.byte(offset::POWER_FLAGS) & 0x10 != 0
    }
}

impl Default for SectorImage {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl From<[u8; NVM_SIZE]> for SectorImage {
    fn from(bytes: [u8; NVM_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for SectorImage {
    type Error = InvalidBufferLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; NVM_SIZE] = bytes
            .try_into()
            .map_err(|_| InvalidBufferLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for SectorImage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
