//! GPIO wiring of a key matrix. Rows are driven high one at a time
//! and the columns, pulled down, read high for every closed switch on
//! the selected row.

use core::sync::atomic::{Ordering, fence};

use gojira_core::matrix::MatrixPins;
use stm32f4xx_hal::gpio::{Input, Output, Pin, PushPull, Pull, Speed};

use super::gpio::{GpioPort, GpioX};

// Cycles given to a freshly selected row before the columns are
// sampled. At 96 MHz this is well above the ~10 ns rise time of a
// pin at medium speed.
const ROW_SETTLE_CYCLES: u32 = 16;

macro_rules! output_pins_impl {
    ($($npins:literal),*) => {
        $(
        seq_macro::seq!(i in 0..$npins {
            impl<#(const P~i: char, const N~i: u8,)*> OutputPins<$npins> for (#(Pin<P~i, N~i, Output<PushPull>>,)*) {
                fn select(&mut self, index: usize) {
                    match index {
                        #(
                            i => self.i.set_high(),
                        )*
                        _ => {}
                    }
                }

                fn release_all(&mut self) {
                    #(
                        self.i.set_low();
                    )*
                }

                fn setup_pins(&mut self) {
                    #(
                        self.i.set_speed(Speed::Medium);
                        self.i.set_low();
                    )*
                }
            }
        });
        )*
    };
}

macro_rules! input_pins_same_port_impl {
    ($($npins:literal),*) => {
        $(
        seq_macro::seq!(i in 0..$npins {
            impl<const PORT: char, #(const N~i: u8,)*> IntoInputPinsWithSamePort for (#(Pin<PORT, N~i, Input>,)*) {
                type Output = PinsWithSamePort<(#(Pin<PORT, N~i, Input>,)*)>;

                fn into_input_pins_with_same_port(self) -> Self::Output {
                    PinsWithSamePort { pins: self }
                }
            }

            impl<const PORT: char, #(const N~i: u8,)*> InputPins<$npins> for PinsWithSamePort<(#(Pin<PORT, N~i, Input>,)*)>
            where
                GpioX<PORT>: GpioPort,
            {
                fn read_closed(&self) -> u32 {
                    // SAFETY: only the bits of the owned input pins
                    // are looked at.
                    let idr = unsafe { GpioX::<PORT>::idr_value() };
                    let mut closed = 0;
                    #(
                        closed |= ((idr >> N~i) & 1) << i;
                    )*
                    closed
                }

                fn setup_pins(&mut self) {
                    #(
                        self.pins.i.set_internal_resistor(Pull::Down);
                    )*
                }
            }
        });
        )*
    };
}

output_pins_impl!(2, 3, 4, 5, 6, 7, 8);
input_pins_same_port_impl!(2, 3, 4, 5, 6, 7, 8);

/// A set of output pins that select one matrix line at a time.
pub trait OutputPins<const N: usize> {
    fn select(&mut self, index: usize);
    fn release_all(&mut self);
    fn setup_pins(&mut self);
}

/// A set of input pins that can be sampled together.
pub trait InputPins<const N: usize> {
    /// Bit `i` is set if the `i`-th pin reads as closed.
    fn read_closed(&self) -> u32;
    fn setup_pins(&mut self);
}

/// Converts a tuple of input pins on the same port into a type that
/// reads all of them from a single register access.
pub trait IntoInputPinsWithSamePort {
    type Output;

    fn into_input_pins_with_same_port(self) -> Self::Output;
}

/// Input pins located on the same GPIO port. The pins may be spread
/// over the port in any order; reads return them packed in tuple
/// order.
pub struct PinsWithSamePort<T> {
    pins: T,
}

pub struct KeyMatrixPins<RowPins, ColPins> {
    rows: RowPins,
    cols: ColPins,
}

impl<RowPins, ColPins> KeyMatrixPins<RowPins, ColPins> {
    pub fn new<const ROWS: usize, const COLS: usize>(mut rows: RowPins, mut cols: ColPins) -> Self
    where
        RowPins: OutputPins<ROWS>,
        ColPins: InputPins<COLS>,
    {
        rows.setup_pins();
        cols.setup_pins();
        Self { rows, cols }
    }
}

impl<const ROWS: usize, const COLS: usize, RowPins, ColPins> MatrixPins<ROWS, COLS> for KeyMatrixPins<RowPins, ColPins>
where
    RowPins: OutputPins<ROWS>,
    ColPins: InputPins<COLS>,
{
    fn read_row(&mut self, row: usize) -> u32 {
        self.rows.select(row);
        fence(Ordering::SeqCst);
        cortex_m::asm::delay(ROW_SETTLE_CYCLES);

        let closed = self.cols.read_closed();
        fence(Ordering::SeqCst);
        self.rows.release_all();
        closed
    }
}
