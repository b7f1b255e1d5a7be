//! Whole-port register access, used to sample several input pins of
//! the same port at once.

macro_rules! gpio_port_impl {
    ($($port:ident $portc:literal),*) => {
        $(
        impl GpioPort for GpioX<$portc> {
            unsafe fn idr_value() -> u32 {
                unsafe { stm32f4xx_hal::pac::$port::steal().idr().read().bits() }
            }
        }
        )*
    }
}

/// A GPIO port, named by the same letter the HAL pins use.
pub struct GpioX<const PORT: char> {}

pub trait GpioPort {
    /// Reads the input data register of the whole port.
    ///
    /// # Safety
    ///
    /// The port is accessed without owning it. Only the bits of pins
    /// the caller owns and has configured as inputs are meaningful.
    unsafe fn idr_value() -> u32;
}

#[cfg(feature = "stm32f411")]
gpio_port_impl!(GPIOA 'A', GPIOB 'B', GPIOC 'C', GPIOD 'D', GPIOE 'E', GPIOH 'H');
