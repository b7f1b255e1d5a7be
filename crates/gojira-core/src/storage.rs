//! Persistent configuration in a dedicated flash region.
//!
//! The image is a byte stream packed into 32-bit words, first byte in
//! the most significant position. Words are stored little endian, so
//! a CRC unit fed with the words sees the stream in order.
//!
//! ```text
//! [keymap L*R*C*4][macro actions 10*32*4][macro lengths 10]
//! [layer u32][nkro u32][zero padding .. LEN - 4][crc32]
//! ```

use core::fmt::Display;

use crc::{CRC_32_MPEG_2, Crc};
use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};
use gojira_common::{dev_debug, dev_error, dev_info, dev_warn};

use crate::action::Action;
use crate::keyboard_macro::{MACRO_MAX_KEYS, MACRO_MAX_LEN, MacroStore};
use crate::keymap::KeymapTable;

const WORD: usize = core::mem::size_of::<u32>();

static CONFIG_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Bytes used by an image, padding and checksum excluded.
pub const fn image_len(layers: usize, rows: usize, cols: usize) -> usize {
    layers * rows * cols * Action::SIZE
        + MACRO_MAX_KEYS * MACRO_MAX_LEN * Action::SIZE
        + MACRO_MAX_KEYS
        + 2 * WORD
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageError {
    /// The region does not fit the image, or its length is not made of
    /// whole erase pages and words.
    Layout,
    Erase { page: usize, kind: NorFlashErrorKind },
    Program { offset: u32, kind: NorFlashErrorKind },
    Read { offset: u32, kind: NorFlashErrorKind },
    CrcMismatch { stored: u32, computed: u32 },
    Corrupt,
}

impl Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StorageError::Layout => write!(f, "config does not fit the flash region"),
            StorageError::Erase { page, kind } => write!(f, "erase of page {} failed: {:?}", page, kind),
            StorageError::Program { offset, kind } => {
                write!(f, "program at {:#x} failed: {:?}", offset, kind)
            }
            StorageError::Read { offset, kind } => write!(f, "read at {:#x} failed: {:?}", offset, kind),
            StorageError::CrcMismatch { stored, computed } => {
                write!(f, "crc mismatch: stored {:08x}, computed {:08x}", stored, computed)
            }
            StorageError::Corrupt => write!(f, "config contents are invalid"),
        }
    }
}

/// Configuration as decoded from flash, not yet applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredConfig<const LAYERS: usize, const ROWS: usize, const COLS: usize> {
    pub keymap: KeymapTable<LAYERS, ROWS, COLS>,
    pub macros: MacroStore,
    pub nkro: bool,
}

struct WordWriter<'a, F> {
    flash: &'a mut F,
    base: u32,
    offset: u32,
    word: u32,
    filled: usize,
}

impl<F: NorFlash> WordWriter<'_, F> {
    fn write_byte(&mut self, b: u8) -> Result<(), StorageError> {
        self.word = (self.word << 8) | b as u32;
        self.filled += 1;
        if self.filled == WORD {
            self.write_word(self.word)?;
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        bytes.iter().try_for_each(|b| self.write_byte(*b))
    }

    fn write_word(&mut self, word: u32) -> Result<(), StorageError> {
        let offset = self.base + self.offset;
        self.flash
            .write(offset, &word.to_le_bytes())
            .map_err(|e| StorageError::Program { offset, kind: e.kind() })?;
        self.offset += WORD as u32;
        self.word = 0;
        self.filled = 0;
        Ok(())
    }

    fn pad_to(&mut self, end: u32) -> Result<(), StorageError> {
        while self.offset < end {
            self.write_byte(0)?;
        }
        Ok(())
    }
}

struct WordReader<'a, F> {
    flash: &'a mut F,
    base: u32,
    offset: u32,
    word: [u8; WORD],
    left: usize,
}

impl<F: NorFlash> WordReader<'_, F> {
    fn read_word(&mut self) -> Result<u32, StorageError> {
        let offset = self.base + self.offset;
        let mut bytes = [0u8; WORD];
        self.flash
            .read(offset, &mut bytes)
            .map_err(|e| StorageError::Read { offset, kind: e.kind() })?;
        self.offset += WORD as u32;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_byte(&mut self) -> Result<u8, StorageError> {
        if self.left == 0 {
            self.word = self.read_word()?.to_be_bytes();
            self.left = WORD;
        }
        let b = self.word[WORD - self.left];
        self.left -= 1;
        Ok(b)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], StorageError> {
        let mut out = [0u8; N];
        for b in out.iter_mut() {
            *b = self.read_byte()?;
        }
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, StorageError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    fn read_action(&mut self) -> Result<Action, StorageError> {
        Action::from_bytes(self.read_array()?).map_err(|e| {
            dev_warn!("Stored config: {}", e);
            StorageError::Corrupt
        })
    }
}

/// Keeps the configuration in `LEN` bytes of `flash` starting at
/// `base`.
pub struct ConfigStore<F, const LEN: usize> {
    flash: F,
    base: u32,
}

impl<F: NorFlash, const LEN: usize> ConfigStore<F, LEN> {
    const CRC_OFFSET: u32 = (LEN - WORD) as u32;

    pub fn new(flash: F, base: u32) -> Self {
        Self { flash, base }
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    fn check_layout(image: usize) -> Result<(), StorageError> {
        let aligned = F::ERASE_SIZE > 0
            && LEN % F::ERASE_SIZE == 0
            && WORD % F::WRITE_SIZE.max(1) == 0
            && LEN % WORD == 0;
        if !aligned || image + WORD > LEN {
            dev_error!("Config of {} bytes does not fit region of {}", image, LEN);
            return Err(StorageError::Layout);
        }
        Ok(())
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        for page in 0..LEN / F::ERASE_SIZE {
            let from = self.base + (page * F::ERASE_SIZE) as u32;
            self.flash
                .erase(from, from + F::ERASE_SIZE as u32)
                .map_err(|e| StorageError::Erase { page, kind: e.kind() })?;
        }
        Ok(())
    }

    fn compute_crc(&mut self) -> Result<u32, StorageError> {
        let mut reader = WordReader { flash: &mut self.flash, base: self.base, offset: 0, word: [0; WORD], left: 0 };
        let mut digest = CONFIG_CRC.digest();
        while reader.offset < Self::CRC_OFFSET {
            digest.update(&reader.read_word()?.to_be_bytes());
        }
        Ok(digest.finalize())
    }

    fn read_stored_crc(&mut self) -> Result<u32, StorageError> {
        let offset = self.base + Self::CRC_OFFSET;
        let mut bytes = [0u8; WORD];
        self.flash
            .read(offset, &mut bytes)
            .map_err(|e| StorageError::Read { offset, kind: e.kind() })?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Replaces the stored image. On error the region is left without
    /// a valid checksum.
    pub fn write_config<const LAYERS: usize, const ROWS: usize, const COLS: usize>(
        &mut self,
        keymap: &KeymapTable<LAYERS, ROWS, COLS>,
        macros: &MacroStore,
        nkro: bool,
    ) -> Result<(), StorageError> {
        Self::check_layout(image_len(LAYERS, ROWS, COLS))?;
        self.erase()?;

        let mut writer = WordWriter { flash: &mut self.flash, base: self.base, offset: 0, word: 0, filled: 0 };
        for (_, _, _, action) in keymap.cells() {
            writer.write_bytes(&action.to_bytes())?;
        }
        for action in macros.slots().iter().flatten() {
            writer.write_bytes(&action.to_bytes())?;
        }
        writer.write_bytes(macros.lengths())?;
        writer.write_bytes(&(keymap.current_layer() as u32).to_be_bytes())?;
        writer.write_bytes(&(nkro as u32).to_be_bytes())?;
        writer.pad_to(Self::CRC_OFFSET)?;

        let crc = self.compute_crc()?;
        let mut writer =
            WordWriter { flash: &mut self.flash, base: self.base, offset: Self::CRC_OFFSET, word: 0, filled: 0 };
        writer.write_word(crc)?;

        dev_info!("Config saved, crc {:08x}", crc);
        Ok(())
    }

    /// Reads and validates the stored image. Nothing is returned unless
    /// the checksum matches and every field decodes.
    pub fn read_config<const LAYERS: usize, const ROWS: usize, const COLS: usize>(
        &mut self,
    ) -> Result<StoredConfig<LAYERS, ROWS, COLS>, StorageError> {
        Self::check_layout(image_len(LAYERS, ROWS, COLS))?;

        let stored = self.read_stored_crc()?;
        let computed = self.compute_crc()?;
        if stored != computed {
            dev_debug!("Config crc {:08x} does not match {:08x}", stored, computed);
            return Err(StorageError::CrcMismatch { stored, computed });
        }

        let mut reader = WordReader { flash: &mut self.flash, base: self.base, offset: 0, word: [0; WORD], left: 0 };

        let mut keymap = KeymapTable::<LAYERS, ROWS, COLS>::empty();
        for layer in 0..LAYERS {
            for row in 0..ROWS {
                for col in 0..COLS {
                    let action = reader.read_action()?;
                    keymap.set(layer, row, col, action).map_err(|_| StorageError::Corrupt)?;
                }
            }
        }

        let mut actions = [[Action::None; MACRO_MAX_LEN]; MACRO_MAX_KEYS];
        for action in actions.iter_mut().flatten() {
            *action = reader.read_action()?;
        }
        let lengths = reader.read_array::<MACRO_MAX_KEYS>()?;
        let macros = MacroStore::from_parts(actions, lengths).map_err(|e| {
            dev_warn!("Stored config: {}", e);
            StorageError::Corrupt
        })?;

        let layer = reader.read_u32()?;
        keymap.set_current_layer(layer as usize).map_err(|_| StorageError::Corrupt)?;
        let nkro = reader.read_u32()? != 0;

        dev_info!("Config loaded, layer {}, nkro {}", layer, nkro);
        Ok(StoredConfig { keymap, macros, nkro })
    }

    /// Erases the region. An erased region never holds a valid image.
    pub fn clear_config(&mut self) -> Result<(), StorageError> {
        if F::ERASE_SIZE == 0 || LEN % F::ERASE_SIZE != 0 {
            return Err(StorageError::Layout);
        }
        self.erase()?;
        dev_info!("Config erased");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use embedded_storage::nor_flash::ErrorType;

    use super::*;
    use crate::action::{Modifiers, MouseButtons};
    use crate::keycode::{CONSUMER_MUTE, KEY_A};

    const PAGE: usize = 256;
    const REGION: usize = 6 * PAGE;

    #[derive(Debug)]
    struct RamFlashError;

    impl NorFlashError for RamFlashError {
        fn kind(&self) -> NorFlashErrorKind {
            NorFlashErrorKind::Other
        }
    }

    struct RamFlash {
        mem: [u8; REGION],
        fail_erase_from: Option<u32>,
        fail_write_at: Option<u32>,
        writes: usize,
    }

    impl RamFlash {
        fn new() -> Self {
            Self { mem: [0xff; REGION], fail_erase_from: None, fail_write_at: None, writes: 0 }
        }
    }

    impl ErrorType for RamFlash {
        type Error = RamFlashError;
    }

    impl ReadNorFlash for RamFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            bytes.copy_from_slice(&self.mem[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            REGION
        }
    }

    impl NorFlash for RamFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = PAGE;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            if self.fail_erase_from == Some(from) {
                return Err(RamFlashError);
            }
            self.mem[from as usize..to as usize].fill(0xff);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.fail_write_at == Some(offset) {
                return Err(RamFlashError);
            }
            self.writes += 1;
            let start = offset as usize;
            self.mem[start..start + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }

    type Store = ConfigStore<RamFlash, REGION>;

    fn sample() -> (KeymapTable<2, 2, 3>, MacroStore) {
        let mut keymap = KeymapTable::<2, 2, 3>::empty();
        keymap.set(0, 0, 0, Action::key(KEY_A)).unwrap();
        keymap.set(0, 1, 2, Action::Key { modifiers: Modifiers::LEFT_SHIFT, code: 0x1e }).unwrap();
        keymap.set(1, 0, 1, Action::Consumer(CONSUMER_MUTE)).unwrap();
        keymap
            .set(1, 1, 1, Action::Automouse { buttons: MouseButtons::LEFT, period_divisor: 4, wiggle: -3 })
            .unwrap();
        keymap.set(1, 1, 2, Action::Layer(0)).unwrap();
        keymap.set_current_layer(1).unwrap();

        let mut macros = MacroStore::new();
        macros.set_phrase(0, b"hi\n").unwrap();
        macros.set_actions(9, &[Action::Macro(0), Action::Wheel { buttons: MouseButtons::empty(), dh: 0, dv: -1 }]).unwrap();
        (keymap, macros)
    }

    #[test]
    fn test_round_trip() {
        let (keymap, macros) = sample();
        let mut store = Store::new(RamFlash::new(), 0);
        store.write_config(&keymap, &macros, true).unwrap();

        let loaded = store.read_config::<2, 2, 3>().unwrap();
        assert_eq!(loaded.keymap, keymap);
        assert_eq!(loaded.keymap.current_layer(), 1);
        assert_eq!(loaded.macros, macros);
        assert!(loaded.nkro);
    }

    #[test]
    fn test_stream_packing() {
        let mut keymap = KeymapTable::<2, 2, 3>::empty();
        keymap.set(0, 0, 0, Action::key(KEY_A)).unwrap();
        let mut store = Store::new(RamFlash::new(), 0);
        store.write_config(&keymap, &MacroStore::new(), false).unwrap();

        // Stream bytes 03 00 00 04 form word 0x03000004, stored little
        // endian.
        assert_eq!(&store.flash_mut().mem[..4], &[0x04, 0x00, 0x00, 0x03]);
        // Padding is written, not left erased.
        assert_eq!(store.flash_mut().mem[REGION - 5], 0);
    }

    #[test]
    fn test_every_single_bit_flip_detected() {
        let (keymap, macros) = sample();
        let mut store = Store::new(RamFlash::new(), 0);
        store.write_config(&keymap, &macros, false).unwrap();

        for byte in 0..REGION {
            for bit in 0..8 {
                store.flash_mut().mem[byte] ^= 1 << bit;
                assert!(store.read_config::<2, 2, 3>().is_err(), "flip at {}:{} undetected", byte, bit);
                store.flash_mut().mem[byte] ^= 1 << bit;
            }
        }
        assert!(store.read_config::<2, 2, 3>().is_ok());
    }

    #[test]
    fn test_erase_failure_aborts_write() {
        let (keymap, macros) = sample();
        let mut flash = RamFlash::new();
        flash.fail_erase_from = Some(2 * PAGE as u32);
        let mut store = Store::new(flash, 0);

        assert_eq!(
            store.write_config(&keymap, &macros, false),
            Err(StorageError::Erase { page: 2, kind: NorFlashErrorKind::Other })
        );
        assert_eq!(store.flash_mut().writes, 0);
    }

    #[test]
    fn test_program_failure_aborts_write() {
        let (keymap, macros) = sample();
        let mut flash = RamFlash::new();
        flash.fail_write_at = Some(8);
        let mut store = Store::new(flash, 0);

        assert!(matches!(store.write_config(&keymap, &macros, false), Err(StorageError::Program { offset: 8, .. })));
        assert_eq!(store.flash_mut().writes, 2);
        assert!(store.read_config::<2, 2, 3>().is_err());
    }

    #[test]
    fn test_cleared_region_invalid() {
        let (keymap, macros) = sample();
        let mut store = Store::new(RamFlash::new(), 0);
        store.write_config(&keymap, &macros, false).unwrap();
        store.clear_config().unwrap();
        assert!(matches!(store.read_config::<2, 2, 3>(), Err(StorageError::CrcMismatch { .. })));
    }

    #[test]
    fn test_bad_contents_with_valid_crc_rejected() {
        let (keymap, macros) = sample();
        let mut store = Store::new(RamFlash::new(), 0);
        store.write_config(&keymap, &macros, false).unwrap();

        // Rewrite the first cell with an unknown tag and fix up the crc.
        store.flash_mut().mem[3] = 0x7f;
        let crc = store.compute_crc().unwrap();
        store.flash_mut().mem[REGION - 4..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(store.read_config::<2, 2, 3>(), Err(StorageError::Corrupt));
    }

    #[test]
    fn test_layer_out_of_range_rejected() {
        let (keymap, macros) = sample();
        let mut store = Store::new(RamFlash::new(), 0);
        store.write_config(&keymap, &macros, false).unwrap();

        // Last byte of the big endian layer field.
        let stream_pos = image_len(2, 2, 3) - 2 * WORD + 3;
        let flash_pos = stream_pos / WORD * WORD + (WORD - 1 - stream_pos % WORD);
        assert_eq!(store.flash_mut().mem[flash_pos], 1);
        store.flash_mut().mem[flash_pos] = 2;
        let crc = store.compute_crc().unwrap();
        store.flash_mut().mem[REGION - 4..].copy_from_slice(&crc.to_le_bytes());
        assert_eq!(store.read_config::<2, 2, 3>(), Err(StorageError::Corrupt));
    }

    #[test]
    fn test_region_too_small() {
        let mut store = ConfigStore::<RamFlash, PAGE>::new(RamFlash::new(), 0);
        let (keymap, macros) = sample();
        assert_eq!(store.write_config(&keymap, &macros, false), Err(StorageError::Layout));
    }
}
