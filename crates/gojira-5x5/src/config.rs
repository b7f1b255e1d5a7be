use gojira_core::keyboard::Keyboard;
use gojira_peripheral::{
    clock::DwtClock,
    flash::SectorFlash,
    key_matrix::{KeyMatrixPins, PinsWithSamePort},
};
use stm32f4xx_hal::gpio::{Input, Output, Pin, PushPull};

// The total layers of the layout.
pub const LAYERS: usize = 2;

pub const ROWS: usize = 5;
pub const COLS: usize = 5;

pub const DEBOUNCE_MILLIS: u32 = 10;

// Time the host gets to configure the device before it is reset.
pub const ENUMERATE_TIMEOUT_MILLIS: u32 = 2000;

pub const LOG_BUFFER_LEN: usize = 1024;

// Flash sector 7 of the STM32F411CE, which memory.x leaves out of the
// program image.
pub const CONFIG_SECTOR: u8 = 7;
pub const CONFIG_SECTOR_OFFSET: usize = 0x6_0000;
pub const CONFIG_LEN: usize = 128 * 1024;

pub const USB_VID_PID: (u16, u16) = (0xdead, 0xbeef);

pub type KeyMatrixRowPins = (
    Pin<'A', 0, Output<PushPull>>,
    Pin<'A', 1, Output<PushPull>>,
    Pin<'A', 2, Output<PushPull>>,
    Pin<'A', 3, Output<PushPull>>,
    Pin<'A', 4, Output<PushPull>>,
);

pub type KeyMatrixColPins = PinsWithSamePort<(
    Pin<'B', 0, Input>,
    Pin<'B', 1, Input>,
    Pin<'B', 2, Input>,
    Pin<'B', 6, Input>,
    Pin<'B', 7, Input>,
)>;

pub type IndicatorLeds = (
    Pin<'C', 13, Output<PushPull>>,
    Pin<'C', 14, Output<PushPull>>,
    Pin<'C', 15, Output<PushPull>>,
);

pub type TMatrixPins = KeyMatrixPins<KeyMatrixRowPins, KeyMatrixColPins>;
pub type TConfigFlash = SectorFlash<CONFIG_SECTOR, CONFIG_SECTOR_OFFSET, CONFIG_LEN>;
pub type TKeyboard = Keyboard<DwtClock, TMatrixPins, TConfigFlash, CONFIG_LEN, LAYERS, ROWS, COLS>;
