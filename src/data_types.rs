//! Data types for the STUSB4500 driver: PDO selection, decoded enums and driver configuration.

use crate::error::InvalidPdo;
use crate::registers::DEFAULT_I2C_ADDRESS;

/// Sink Power Data Object slot.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Pdo {
    /// Fixed 5 V; only current and upper limit are configurable.
    Pdo1 = 1,
    Pdo2 = 2,
    Pdo3 = 3,
}

impl Pdo {
    pub const ALL: [Pdo; 3] = [Pdo::Pdo1, Pdo::Pdo2, Pdo::Pdo3];

    /// 1-based PDO number.
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Legacy mapping: 1 and 2 select their PDO, anything else selects PDO3.
    pub fn from_number_lossy(number: u8) -> Self {
        match number {
            1 => Pdo::Pdo1,
            2 => Pdo::Pdo2,
            _ => Pdo::Pdo3,
        }
    }
}

impl TryFrom<u8> for Pdo {
    type Error = InvalidPdo;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(Pdo::Pdo1),
            2 => Ok(Pdo::Pdo2),
            3 => Ok(Pdo::Pdo3),
            n => Err(InvalidPdo(n)),
        }
    }
}

/// POWER_OK pin configuration (NVM byte 36, bits 6-5).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerOkConfig {
    Config1,
    /// Code 1 is not assigned.
    Reserved,
    /// Factory default.
    Config2,
    Config3,
}

impl PowerOkConfig {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => PowerOkConfig::Config1,
            0b01 => PowerOkConfig::Reserved,
            0b10 => PowerOkConfig::Config2,
            _ => PowerOkConfig::Config3,
        }
    }
}

/// GPIO pin function (NVM byte 8, bits 5-4).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GpioControl {
    /// Driven through the GPIO_SW_GPIO register.
    SoftwareControl,
    /// Asserted during hardware fault recovery (factory default).
    ErrorRecovery,
    Debug,
    /// Reflects sink power state.
    SinkPower,
}

impl GpioControl {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => GpioControl::SoftwareControl,
            0b01 => GpioControl::ErrorRecovery,
            0b10 => GpioControl::Debug,
            _ => GpioControl::SinkPower,
        }
    }
}

/// Decoded request for one PDO slot.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PdoSettings {
    pub voltage_mv: u16,
    pub current_ma: u16,
    /// Under-voltage tolerance in percent.
    pub lower_limit_pct: u8,
    /// Over-voltage tolerance in percent.
    pub upper_limit_pct: u8,
}

/// Busy polls allowed per NVM operation when using [`PollLimit::default`].
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10_000;

/// Bound on the CTRL_0 request-bit busy wait.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollLimit {
    /// Poll until the controller finishes, however long that takes.
    Unbounded,
    /// Give up with [`Error::Timeout`](crate::Error::Timeout) after this many busy reads.
    Attempts(u32),
}

impl PollLimit {
    /// True once `busy_reads` busy reads have used up the budget.
    pub fn exhausted(self, busy_reads: u32) -> bool {
        match self {
            PollLimit::Unbounded => false,
            PollLimit::Attempts(max) => busy_reads >= max,
        }
    }
}

impl Default for PollLimit {
    fn default() -> Self {
        PollLimit::Attempts(DEFAULT_POLL_ATTEMPTS)
    }
}

/// Driver configuration.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// 7-bit I2C address.
    pub address: u8,
    pub poll_limit: PollLimit,
}

impl Config {
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_poll_limit(mut self, poll_limit: PollLimit) -> Self {
        self.poll_limit = poll_limit;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            poll_limit: PollLimit::default(),
        }
    }
}
