// Firmware for the Gojira 5x5 macro pad on an STM32F411 board.
//
// The device enumerates first and only then starts scanning the
// matrix. A host that does not configure it within a couple of
// seconds gets a fresh enumeration attempt through a reset.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::bare_urls)]

mod config;
mod layout;
mod usb;

use config::*;

use core::mem::MaybeUninit;
use core::ptr::addr_of_mut;

use cortex_m::peripheral::SCB;
use cortex_m_rt::entry;
use gojira_common::{dev_error, dev_info, dev_warn};
use gojira_core::{
    keyboard::Indicators,
    log::RingBufferLogger,
    matrix::MatrixScanner,
    storage::ConfigStore,
};
use gojira_peripheral::{
    clock::DwtClock,
    flash::SectorFlash,
    key_matrix::{IntoInputPinsWithSamePort, KeyMatrixPins},
};

#[allow(unused_imports)]
use panic_itm as _;

use stm32f4xx_hal::{otg_fs::USB, pac, prelude::*};
use synopsys_usb_otg::UsbBus;
use usb_device::bus::UsbBusAllocator;

use crate::usb::UsbLink;

static mut EP_MEMORY: [u32; 1024] = [0; 1024];
static mut USB_ALLOC: MaybeUninit<UsbBusAllocator<UsbBus<USB>>> = MaybeUninit::uninit();
static mut LOGGER: MaybeUninit<RingBufferLogger<LOG_BUFFER_LEN>> = MaybeUninit::uninit();

fn update_leds(leds: &mut IndicatorLeds, indicators: Indicators) {
    leds.0.set_state(indicators.contains(Indicators::AUTOMOUSE_ACTIVE).into());
    leds.1.set_state(indicators.contains(Indicators::AUTOMOUSE_PRESS).into());
    leds.2.set_state(indicators.contains(Indicators::MACRO_ACTIVE).into());
}

#[entry]
fn main() -> ! {
    main0()
}

fn main0() -> ! {
    let (Some(dp), Some(mut cortex)) = (pac::Peripherals::take(), cortex_m::Peripherals::take()) else {
        // Only reachable if something took the peripherals before us.
        SCB::sys_reset();
    };

    let rcc = dp.RCC.constrain();

    let clocks = rcc
        .cfgr
        .use_hse(8.MHz())
        .sysclk(96.MHz())
        .pclk1(48.MHz())
        .pclk2(48.MHz())
        .require_pll48clk()
        .freeze();

    let logger: &'static RingBufferLogger<LOG_BUFFER_LEN> =
        unsafe { LOGGER.write(RingBufferLogger::new(log::Level::Info)) };
    // Only fails if a logger is already installed.
    let _ = RingBufferLogger::install(logger);
    dev_info!("Device startup, {} layers of {}x{}", LAYERS, ROWS, COLS);

    let gpioa = dp.GPIOA.split();
    let gpiob = dp.GPIOB.split();
    let gpioc = dp.GPIOC.split();

    let mut leds: IndicatorLeds = (
        gpioc.pc13.into_push_pull_output(),
        gpioc.pc14.into_push_pull_output(),
        gpioc.pc15.into_push_pull_output(),
    );
    update_leds(&mut leds, Indicators::empty());

    let clock = DwtClock::new(&clocks, &mut cortex.DCB, &mut cortex.DWT);

    let matrix_pins: TMatrixPins = KeyMatrixPins::new::<ROWS, COLS>(
        (
            gpioa.pa0.into_push_pull_output(),
            gpioa.pa1.into_push_pull_output(),
            gpioa.pa2.into_push_pull_output(),
            gpioa.pa3.into_push_pull_output(),
            gpioa.pa4.into_push_pull_output(),
        ),
        (
            gpiob.pb0.into_input(),
            gpiob.pb1.into_input(),
            gpiob.pb2.into_input(),
            gpiob.pb6.into_input(),
            gpiob.pb7.into_input(),
        )
            .into_input_pins_with_same_port(),
    );
    let matrix = MatrixScanner::new(matrix_pins, DEBOUNCE_MILLIS);

    let store = ConfigStore::new(SectorFlash::new(dp.FLASH), 0);
    let mut keyboard = TKeyboard::new(clock, matrix, layout::LAYOUT, store);
    keyboard.set_log_drain(logger);

    match keyboard.load_config() {
        Ok(()) => {
            dev_info!("Stored configuration loaded");
        }
        Err(e) => {
            dev_warn!("Using the default configuration: {}", e);
        }
    }

    let usb = USB {
        usb_global: dp.OTG_FS_GLOBAL,
        usb_device: dp.OTG_FS_DEVICE,
        usb_pwrclk: dp.OTG_FS_PWRCLK,
        pin_dm: gpioa.pa11.into(),
        pin_dp: gpioa.pa12.into(),
        hclk: clocks.hclk(),
    };

    let usb_alloc: &'static UsbBusAllocator<UsbBus<USB>> =
        unsafe { USB_ALLOC.write(UsbBus::new(usb, &mut *addr_of_mut!(EP_MEMORY))) };

    let mut link = match UsbLink::alloc(usb_alloc, USB_VID_PID) {
        Ok(link) => link,
        Err(e) => {
            dev_error!("USB device setup failed: {:?}", e);
            SCB::sys_reset();
        }
    };

    if let Err(e) = keyboard.wait_for_enumeration(&mut link, ENUMERATE_TIMEOUT_MILLIS) {
        dev_error!("{}, resetting", e);
        SCB::sys_reset();
    }

    loop {
        keyboard.poll(&mut link);
        update_leds(&mut leds, keyboard.indicators());
    }
}
