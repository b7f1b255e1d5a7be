#![no_std]

pub mod action;
pub mod automouse;
pub mod command;
pub mod dispatch;
pub mod hid;
pub mod keyboard;
pub mod keyboard_macro;
pub mod keycode;
pub mod keymap;
pub mod log;
pub mod matrix;
pub mod report;
pub mod serial;
pub mod storage;
