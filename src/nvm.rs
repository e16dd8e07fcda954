//! NVM access protocol.
//!
//! [`NvmSession`] borrows the I2C handle exclusively for one multi-step sequence
//! (password, power-up, opcode set/load, busy poll, exit). The borrow is the bus
//! lock: nothing else can talk through the handle until the session is dropped,
//! which happens on every exit path including `?` propagation.
//!
//! Transport errors abort the sequence immediately. No cleanup is attempted, so
//! a failed sequence can leave the chip in test mode with a partially erased or
//! programmed array; re-run the whole operation to recover.

use crate::data_types::PollLimit;
use crate::error::Error;
use crate::image::SectorImage;
use crate::registers::{
    Ctrl0Bits, NVM_PASSWORD, Opcode, SECTOR_COUNT, SECTOR_SIZE, SectorMask, addr, ctrl0_load,
    ctrl1_value,
};

#[cfg(feature = "defmt")]
use defmt::{debug, trace, warn};

// Stub macros when defmt is not available
#[cfg(not(feature = "defmt"))]
macro_rules! warn {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {{}};
}

#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($($arg:tt)*) => {{}};
}

const POWERED: u8 = Ctrl0Bits::PWR.bits() | Ctrl0Bits::RST_N.bits();

/// Exclusive, scoped access to the NVM controller of one device.
pub struct NvmSession<'a, I2C> {
    i2c: &'a mut I2C,
    address: u8,
    poll_limit: PollLimit,
    test_mode: bool,
}

impl<'a, I2C> NvmSession<'a, I2C> {
    pub fn new(i2c: &'a mut I2C, address: u8, poll_limit: PollLimit) -> Self {
        Self {
            i2c,
            address,
            poll_limit,
            test_mode: false,
        }
    }

    /// True between a successful password write and a completed exit.
    pub fn in_test_mode(&self) -> bool {
        self.test_mode
    }
}

impl<I2C> Drop for NvmSession<'_, I2C> {
    fn drop(&mut self) {
        if self.test_mode {
            warn!("NVM session released with device {=u8:#x} still in test mode", self.address);
        }
    }
}

impl<I2C> NvmSession<'_, I2C>
where
    I2C: embedded_hal::i2c::I2c,
{
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(Error::I2c)
    }

    fn write_regs(&mut self, start_reg: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        let mut buf = [0u8; SECTOR_SIZE + 1];
        if data.len() > SECTOR_SIZE {
            return Err(Error::InvalidBufferLength(data.len()));
        }
        buf[0] = start_reg;
        buf[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.address, &buf[..=data.len()])
            .map_err(Error::I2c)
    }

    fn read_regs(&mut self, start_reg: u8, data: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write_read(self.address, &[start_reg], data)
            .map_err(Error::I2c)
    }

    /// Unlock with the customer password and bring the NVM controller out of reset.
    pub fn enter_test_mode(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_reg(addr::FTP_CUST_PASSWORD, NVM_PASSWORD)?;
        self.test_mode = true;
        // Controller reset, then power up.
        self.write_reg(addr::FTP_CTRL_0, 0x00)?;
        self.write_reg(addr::FTP_CTRL_0, POWERED)?;
        debug!("NVM test mode entered");
        Ok(())
    }

    /// Clear both control registers and relock the password.
    pub fn exit_test_mode(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_regs(addr::FTP_CTRL_0, &[Ctrl0Bits::RST_N.bits(), 0x00])?;
        self.write_reg(addr::FTP_CUST_PASSWORD, 0x00)?;
        self.test_mode = false;
        debug!("NVM test mode exited");
        Ok(())
    }

    fn set_opcode(&mut self, opcode: Opcode, erase: SectorMask) -> Result<(), Error<I2C::Error>> {
        self.write_reg(addr::FTP_CTRL_1, ctrl1_value(opcode, erase))
    }

    /// Latch the pending CTRL_1 opcode with REQ and wait for completion.
    /// Always a separate transaction from `set_opcode`.
    fn load_opcode(&mut self, sector: u8) -> Result<(), Error<I2C::Error>> {
        self.write_reg(addr::FTP_CTRL_0, ctrl0_load(sector))?;
        self.wait_ready()
    }

    /// Poll CTRL_0 until the controller clears REQ.
    pub fn wait_ready(&mut self) -> Result<(), Error<I2C::Error>> {
        let mut busy_reads: u32 = 0;
        loop {
            let mut buf = [0u8; 1];
            self.read_regs(addr::FTP_CTRL_0, &mut buf)?;
            if !Ctrl0Bits::from_bits_retain(buf[0]).contains(Ctrl0Bits::REQ) {
                trace!("NVM ready after {=u32} busy reads", busy_reads);
                return Ok(());
            }
            busy_reads += 1;
            if self.poll_limit.exhausted(busy_reads) {
                warn!("NVM controller still busy after {=u32} reads", busy_reads);
                return Err(Error::Timeout);
            }
        }
    }

    /// Fetch one sector into `out`. Requires test mode.
    pub fn read_sector(&mut self, sector: u8, out: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.write_reg(addr::FTP_CTRL_0, POWERED)?;
        self.set_opcode(Opcode::Read, SectorMask::empty())?;
        self.load_opcode(sector)?;
        self.read_regs(addr::RW_BUFFER, out)?;
        trace!("NVM sector {=u8} read", sector);
        Ok(())
    }

    /// Erase the sectors in `mask`: load the SER register, soft-program, then erase.
    pub fn erase_sectors(&mut self, mask: SectorMask) -> Result<(), Error<I2C::Error>> {
        self.set_opcode(Opcode::WriteSer, mask)?;
        self.load_opcode(0)?;
        self.set_opcode(Opcode::SoftProgSector, SectorMask::empty())?;
        self.load_opcode(0)?;
        self.set_opcode(Opcode::EraseSector, SectorMask::empty())?;
        self.load_opcode(0)?;
        debug!("NVM sectors {=u8:#x} erased", mask.bits());
        Ok(())
    }

    /// Program one erased sector from `data` (8 bytes).
    pub fn program_sector(&mut self, sector: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        self.write_regs(addr::RW_BUFFER, data)?;
        self.write_reg(addr::FTP_CTRL_0, POWERED)?;
        self.set_opcode(Opcode::WritePl, SectorMask::empty())?;
        self.load_opcode(0)?;
        self.set_opcode(Opcode::ProgSector, SectorMask::empty())?;
        self.load_opcode(sector)?;
        trace!("NVM sector {=u8} programmed", sector);
        Ok(())
    }

    /// Read all five sectors.
    pub fn read_image(&mut self) -> Result<SectorImage, Error<I2C::Error>> {
        let mut image = SectorImage::zeroed();
        self.enter_test_mode()?;
        for sector in 0..SECTOR_COUNT {
            self.read_sector(sector as u8, image.sector_mut(sector))?;
        }
        self.exit_test_mode()?;
        Ok(image)
    }

    /// Erase and reprogram all five sectors with `image`.
    pub fn write_image(&mut self, image: &SectorImage) -> Result<(), Error<I2C::Error>> {
        self.enter_test_mode()?;
        // RW buffer must be cleared for the partial-erase logic.
        self.write_reg(addr::RW_BUFFER, 0x00)?;
        self.erase_sectors(SectorMask::all())?;
        for (sector, data) in image.as_bytes().chunks_exact(SECTOR_SIZE).enumerate() {
            self.program_sector(sector as u8, data)?;
        }
        self.exit_test_mode()
    }
}

#[cfg(feature = "async")]
impl<I2C> NvmSession<'_, I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    async fn write_reg_async(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write(self.address, &[reg, value])
            .await
            .map_err(Error::I2c)
    }

    async fn write_regs_async(
        &mut self,
        start_reg: u8,
        data: &[u8],
    ) -> Result<(), Error<I2C::Error>> {
        let mut buf = [0u8; SECTOR_SIZE + 1];
        if data.len() > SECTOR_SIZE {
            return Err(Error::InvalidBufferLength(data.len()));
        }
        buf[0] = start_reg;
        buf[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.address, &buf[..=data.len()])
            .await
            .map_err(Error::I2c)
    }

    async fn read_regs_async(
        &mut self,
        start_reg: u8,
        data: &mut [u8],
    ) -> Result<(), Error<I2C::Error>> {
        self.i2c
            .write_read(self.address, &[start_reg], data)
            .await
            .map_err(Error::I2c)
    }

    /// Async version of [`enter_test_mode`](Self::enter_test_mode).
    pub async fn enter_test_mode_async(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_reg_async(addr::FTP_CUST_PASSWORD, NVM_PASSWORD).await?;
        self.test_mode = true;
        self.write_reg_async(addr::FTP_CTRL_0, 0x00).await?;
        self.write_reg_async(addr::FTP_CTRL_0, POWERED).await?;
        debug!("NVM test mode entered");
        Ok(())
    }

    pub async fn exit_test_mode_async(&mut self) -> Result<(), Error<I2C::Error>> {
        self.write_regs_async(addr::FTP_CTRL_0, &[Ctrl0Bits::RST_N.bits(), 0x00]).await?;
        self.write_reg_async(addr::FTP_CUST_PASSWORD, 0x00).await?;
        self.test_mode = false;
        debug!("NVM test mode exited");
        Ok(())
    }

    async fn set_opcode_async(
        &mut self,
        opcode: Opcode,
        erase: SectorMask,
    ) -> Result<(), Error<I2C::Error>> {
        self.write_reg_async(addr::FTP_CTRL_1, ctrl1_value(opcode, erase)).await
    }

    async fn load_opcode_async(&mut self, sector: u8) -> Result<(), Error<I2C::Error>> {
        self.write_reg_async(addr::FTP_CTRL_0, ctrl0_load(sector)).await?;
        self.wait_ready_async().await
    }

    pub async fn wait_ready_async(&mut self) -> Result<(), Error<I2C::Error>> {
        let mut busy_reads: u32 = 0;
        loop {
            let mut buf = [0u8; 1];
            self.read_regs_async(addr::FTP_CTRL_0, &mut buf).await?;
            if !Ctrl0Bits::from_bits_retain(buf[0]).contains(Ctrl0Bits::REQ) {
                trace!("NVM ready after {=u32} busy reads", busy_reads);
                return Ok(());
            }
            busy_reads += 1;
            if self.poll_limit.exhausted(busy_reads) {
                warn!("NVM controller still busy after {=u32} reads", busy_reads);
                return Err(Error::Timeout);
            }
        }
    }

    pub async fn read_sector_async(
        &mut self,
        sector: u8,
        out: &mut [u8],
    ) -> Result<(), Error<I2C::Error>> {
        self.write_reg_async(addr::FTP_CTRL_0, POWERED).await?;
        self.set_opcode_async(Opcode::Read, SectorMask::empty()).await?;
        self.load_opcode_async(sector).await?;
        self.read_regs_async(addr::RW_BUFFER, out).await?;
        trace!("NVM sector {=u8} read", sector);
        Ok(())
    }

    pub async fn erase_sectors_async(&mut self, mask: SectorMask) -> Result<(), Error<I2C::Error>> {
        self.set_opcode_async(Opcode::WriteSer, mask).await?;
        self.load_opcode_async(0).await?;
        self.set_opcode_async(Opcode::SoftProgSector, SectorMask::empty()).await?;
        self.load_opcode_async(0).await?;
        self.set_opcode_async(Opcode::EraseSector, SectorMask::empty()).await?;
        self.load_opcode_async(0).await?;
        debug!("NVM sectors {=u8:#x} erased", mask.bits());
        Ok(())
    }

    pub async fn program_sector_async(
        &mut self,
        sector: u8,
        data: &[u8],
    ) -> Result<(), Error<I2C::Error>> {
        self.write_regs_async(addr::RW_BUFFER, data).await?;
        self.write_reg_async(addr::FTP_CTRL_0, POWERED).await?;
        self.set_opcode_async(Opcode::WritePl, SectorMask::empty()).await?;
        self.load_opcode_async(0).await?;
        self.set_opcode_async(Opcode::ProgSector, SectorMask::empty()).await?;
        self.load_opcode_async(sector).await?;
        trace!("NVM sector {=u8} programmed", sector);
        Ok(())
    }

    pub async fn read_image_async(&mut self) -> Result<SectorImage, Error<I2C::Error>> {
        let mut image = SectorImage::zeroed();
        self.enter_test_mode_async().await?;
        for sector in 0..SECTOR_COUNT {
            self.read_sector_async(sector as u8, image.sector_mut(sector)).await?;
        }
        self.exit_test_mode_async().await?;
        Ok(image)
    }

    pub async fn write_image_async(
        &mut self,
        image: &SectorImage,
    ) -> Result<(), Error<I2C::Error>> {
        self.enter_test_mode_async().await?;
        self.write_reg_async(addr::RW_BUFFER, 0x00).await?;
        self.erase_sectors_async(SectorMask::all()).await?;
        for (sector, data) in image.as_bytes().chunks_exact(SECTOR_SIZE).enumerate() {
            self.program_sector_async(sector as u8, data).await?;
        }
        self.exit_test_mode_async().await
    }
}
