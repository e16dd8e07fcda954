//! STUSB4500 driver.
//! Owns the I2C handle and the NVM mirror; blocking API with `_async` twins behind
//! the `async` feature.

use crate::data_types::{Config, Pdo, PollLimit};
use crate::error::Error;
use crate::image::SectorImage;
use crate::nvm::NvmSession;

/// STUSB4500 NVM driver.
///
/// Construction reads the five NVM sectors into an owned [`SectorImage`]. Getters and
/// setters work on that mirror only; nothing reaches the chip until one of the
/// `write_*` methods is called.
pub struct Stusb4500<I2C> {
    i2c: I2C,
    config: Config,
    image: SectorImage,
}

impl<I2C> Stusb4500<I2C> {
    fn unloaded(i2c: I2C, config: Config) -> Self {
        Self {
            i2c,
            config,
            image: SectorImage::zeroed(),
        }
    }

    fn session(&mut self) -> NvmSession<'_, I2C> {
        NvmSession::new(&mut self.i2c, self.config.address, self.config.poll_limit)
    }

    /// Return the 7-bit I2C address configured for this instance.
    pub fn address(&self) -> u8 {
        self.config.address
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Change the busy-poll bound used by later NVM operations.
    pub fn set_poll_limit(&mut self, poll_limit: PollLimit) {
        self.config.poll_limit = poll_limit;
    }

    /// Current NVM mirror.
    pub fn image(&self) -> &SectorImage {
        &self.image
    }

    /// Mutable access to the mirror for field setters.
    pub fn image_mut(&mut self) -> &mut SectorImage {
        &mut self.image
    }

    pub fn voltage_mv(&self, pdo: Pdo) -> u16 {
        self.image.voltage_mv(pdo)
    }

    pub fn set_voltage_mv(&mut self, pdo: Pdo, mv: u16) {
        self.image.set_voltage_mv(pdo, mv);
    }

    pub fn current_ma(&self, pdo: Pdo) -> u16 {
        self.image.current_ma(pdo)
    }

    pub fn set_current_ma(&mut self, pdo: Pdo, ma: u16) {
        self.image.set_current_ma(pdo, ma);
    }

    pub fn is_factory_defaults(&self) -> bool {
        self.image.is_factory_defaults()
    }

    /// Release the I2C handle.
    pub fn free(self) -> I2C {
        self.i2c
    }
}

impl<I2C> Stusb4500<I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    /// Create a driver at the default address (0x28) and read the NVM.
    pub fn new(i2c: I2C) -> Result<Self, Error<I2C::Error>> {
        Self::with_config(i2c, Config::default())
    }

    /// Create a driver at a custom I2C address and read the NVM.
    pub fn with_address(i2c: I2C, address: u8) -> Result<Self, Error<I2C::Error>> {
        Self::with_config(i2c, Config::default().with_address(address))
    }

    pub fn with_config(i2c: I2C, config: Config) -> Result<Self, Error<I2C::Error>> {
        let mut driver = Self::unloaded(i2c, config);
        driver.read_parameters()?;
        Ok(driver)
    }

    /// Replace the mirror with the device's NVM. On error the previous mirror is kept.
    pub fn read_parameters(&mut self) -> Result<&SectorImage, Error<I2C::Error>> {
        let image = self.session().read_image()?;
        self.image = image;
        Ok(&self.image)
    }

    /// Erase the NVM and program it with the current mirror.
    pub fn write_parameters(&mut self) -> Result<(), Error<I2C::Error>> {
        let image = self.image;
        self.session().write_image(&image)
    }

    /// Program `image` and adopt it as the mirror once the write completes.
    pub fn write_image(&mut self, image: &SectorImage) -> Result<(), Error<I2C::Error>> {
        self.session().write_image(image)?;
        self.image = *image;
        Ok(())
    }

    /// Program a raw 40-byte image.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let image = SectorImage::try_from(data)?;
        self.write_image(&image)
    }

    /// Restore the factory NVM content.
    pub fn write_defaults(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_image(&SectorImage::factory_defaults())
    }
}

#[cfg(feature = "async")]
impl<I2C> Stusb4500<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    /// Async version of [`Self::new`].
    pub async fn new_async(i2c: I2C) -> Result<Self, Error<I2C::Error>> {
        Self::with_config_async(i2c, Config::default()).await
    }

    pub async fn with_address_async(i2c: I2C, address: u8) -> Result<Self, Error<I2C::Error>> {
        Self::with_config_async(i2c, Config::default().with_address(address)).await
    }

    pub async fn with_config_async(i2c: I2C, config: Config) -> Result<Self, Error<I2C::Error>> {
        let mut driver = Self::unloaded(i2c, config);
        driver.read_parameters_async().await?;
        Ok(driver)
    }

    pub async fn read_parameters_async(&mut self) -> Result<&SectorImage, Error<I2C::Error>> {
        let image = self.session().read_image_async().await?;
        self.image = image;
        Ok(&self.image)
    }

    pub async fn write_parameters_async(&mut self) -> Result<(), Error<I2C::Error>> {
        let image = self.image;
        self.session().write_image_async(&image).await
    }

    pub async fn write_image_async(
        &mut self,
        image: &SectorImage,
    ) -> Result<(), Error<I2C::Error>> {
        self.session().write_image_async(image).await?;
        self.image = *image;
        Ok(())
    }

    pub async fn write_bytes_async(&mut self, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let image = SectorImage::try_from(data)?;
        self.write_image_async(&image).await
    }

    pub async fn write_defaults_async(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_image_async(&SectorImage::factory_defaults()).await
    }
}
