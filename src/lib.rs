//! STUSB4500 NVM driver
//!
//! Reads the five NVM sectors of the STUSB4500 USB-PD sink controller into a
//! 40-byte mirror, decodes PDO requests and configuration flags from it, and
//! writes the mirror back through the chip's test-mode erase/program sequence.
//! no-std, blocking by default with an `async` twin API, optional defmt support.

#![no_std]

pub mod data_types;
pub mod driver;
pub mod error;
pub mod image;
pub mod nvm;
pub mod registers;

pub use data_types::{Config, Pdo, PollLimit};
pub use driver::Stusb4500;
pub use error::Error;
pub use image::SectorImage;
pub use registers::{DEFAULT_I2C_ADDRESS, FACTORY_DEFAULTS};
