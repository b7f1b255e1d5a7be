#![no_std]

pub mod clock;
pub mod flash;
pub mod gpio;
pub mod key_matrix;
