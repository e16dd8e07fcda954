//! Error definitions for the STUSB4500 driver.

use crate::registers::NVM_SIZE;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum Error<I2cError> {
    /// Underlying I2C transaction failed.
    I2c(I2cError),
    /// Raw NVM image was not exactly 40 bytes long (actual length attached).
    InvalidBufferLength(usize),
    /// PDO number outside 1..=3.
    InvalidPdo(u8),
    /// CTRL_0 request bit stayed set for the whole poll budget.
    Timeout,
}

impl<I2cError: core::fmt::Debug> core::fmt::Display for Error<I2cError> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {:?}", e),
            Error::InvalidBufferLength(len) => {
                write!(f, "NVM image must be {} bytes, got {}", NVM_SIZE, len)
            }
            Error::InvalidPdo(n) => write!(f, "PDO number {} out of range (1..=3)", n),
            Error::Timeout => write!(f, "NVM controller stayed busy"),
        }
    }
}

/// Slice handed to [`SectorImage::try_from`](crate::image::SectorImage) had the wrong length.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidBufferLength(pub usize);

/// PDO number outside 1..=3.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidPdo(pub u8);

impl<I2cError> From<InvalidBufferLength> for Error<I2cError> {
    fn from(err: InvalidBufferLength) -> Self {
        Error::InvalidBufferLength(err.0)
    }
}

impl<I2cError> From<InvalidPdo> for Error<I2cError> {
    fn from(err: InvalidPdo) -> Self {
        Error::InvalidPdo(err.0)
    }
}
