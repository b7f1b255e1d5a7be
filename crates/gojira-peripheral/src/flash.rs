//! `NorFlash` view of a single internal flash sector. The STM32F4
//! sectors have different sizes, so the sector used for storage is
//! fixed at compile time and exposed as one erase unit.

use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};
use stm32f4xx_hal::{
    flash::{self, FlashExt},
    pac::FLASH,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectorFlashError {
    OutOfBounds,
    NotAligned,
    Hal(flash::Error),
}

impl NorFlashError for SectorFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            SectorFlashError::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            SectorFlashError::NotAligned => NorFlashErrorKind::NotAligned,
            SectorFlashError::Hal(_) => NorFlashErrorKind::Other,
        }
    }
}

/// Flash sector `SECTOR`, which starts `SECTOR_OFFSET` bytes into the
/// flash and is `SECTOR_LEN` bytes long. Offsets given to the trait
/// methods are relative to the start of the sector.
pub struct SectorFlash<const SECTOR: u8, const SECTOR_OFFSET: usize, const SECTOR_LEN: usize> {
    flash: FLASH,
}

impl<const SECTOR: u8, const SECTOR_OFFSET: usize, const SECTOR_LEN: usize> SectorFlash<SECTOR, SECTOR_OFFSET, SECTOR_LEN> {
    pub fn new(flash: FLASH) -> Self {
        Self { flash }
    }

    fn check_range(offset: u32, len: usize) -> Result<usize, SectorFlashError> {
        let offset = offset as usize;
        match offset.checked_add(len) {
            Some(end) if end <= SECTOR_LEN => Ok(offset),
            _ => Err(SectorFlashError::OutOfBounds),
        }
    }
}

impl<const SECTOR: u8, const SECTOR_OFFSET: usize, const SECTOR_LEN: usize> ErrorType
    for SectorFlash<SECTOR, SECTOR_OFFSET, SECTOR_LEN>
{
    type Error = SectorFlashError;
}

impl<const SECTOR: u8, const SECTOR_OFFSET: usize, const SECTOR_LEN: usize> ReadNorFlash
    for SectorFlash<SECTOR, SECTOR_OFFSET, SECTOR_LEN>
{
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = SECTOR_OFFSET + Self::check_range(offset, bytes.len())?;
        let src = self.flash.read().get(start..start + bytes.len()).ok_or(SectorFlashError::OutOfBounds)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SECTOR_LEN
    }
}

impl<const SECTOR: u8, const SECTOR_OFFSET: usize, const SECTOR_LEN: usize> NorFlash
    for SectorFlash<SECTOR, SECTOR_OFFSET, SECTOR_LEN>
{
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = SECTOR_LEN;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from != 0 || to as usize != SECTOR_LEN {
            return Err(SectorFlashError::NotAligned);
        }
        self.flash.unlocked().erase(SECTOR).map_err(SectorFlashError::Hal)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(SectorFlashError::NotAligned);
        }
        let start = SECTOR_OFFSET + Self::check_range(offset, bytes.len())?;
        self.flash.unlocked().program(start, bytes.iter()).map_err(SectorFlashError::Hal)
    }
}
