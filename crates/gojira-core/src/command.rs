//! Line oriented configuration commands received over the serial
//! channel.

use core::fmt::{Display, Write};

use gojira_common::{dev_debug, dev_warn};

use crate::action::{Action, ActionDecodeError};
use crate::keyboard_macro::{MacroError, MacroStore};
use crate::keymap::KeymapError;
use crate::serial::{SERIAL_RX_CAPACITY, SerialPort};
use crate::storage::StorageError;

/// Strings reported by the device, indexed by their USB string index.
pub const USB_STRINGS: [&str; 8] = [
    "dijkstra.xyz",
    "Gojira",
    env!("CARGO_PKG_VERSION"),
    "Boot keyboard",
    "Boot mouse",
    "Control keyboard",
    "NKRO keyboard",
    "Command channel",
];

const CMD_IDENTIFY: u8 = b'i';
const CMD_KEYMAP_DUMP: u8 = b'k';
const CMD_KEYMAP_SET: u8 = b'K';
const CMD_MACRO_CLEAR: u8 = b'm';
const CMD_MACRO_SET: u8 = b'M';
const CMD_NKRO_CLEAR: u8 = b'n';
const CMD_NKRO_SET: u8 = b'N';
const CMD_CONFIG_SAVE: u8 = b's';
const CMD_CONFIG_LOAD: u8 = b'l';
const CMD_CONFIG_ERASE: u8 = b'e';
const CMD_HELP: u8 = b'?';

const HELP: &str = "commands:
i                - identify
k                - dump keymap
Kllrrcctta1a2a3  - set keymap layer, row, column, type, arg1-3
m                - clear all macro keys
Mnnstring        - set macro nn with string
n                - clear nkro
N                - set nkro
s                - save config
l                - load config
e                - erase config
";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// Arguments missing, too long or not hexadecimal.
    Syntax,
    Action(ActionDecodeError),
    Keymap(KeymapError),
    Macro(MacroError),
    Storage(StorageError),
}

impl Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandError::Syntax => write!(f, "malformed arguments"),
            CommandError::Action(e) => write!(f, "{}", e),
            CommandError::Keymap(e) => write!(f, "{}", e),
            CommandError::Macro(e) => write!(f, "{}", e),
            CommandError::Storage(e) => write!(f, "{}", e),
        }
    }
}

impl From<ActionDecodeError> for CommandError {
    fn from(value: ActionDecodeError) -> Self {
        CommandError::Action(value)
    }
}

impl From<KeymapError> for CommandError {
    fn from(value: KeymapError) -> Self {
        CommandError::Keymap(value)
    }
}

impl From<MacroError> for CommandError {
    fn from(value: MacroError) -> Self {
        CommandError::Macro(value)
    }
}

impl From<StorageError> for CommandError {
    fn from(value: StorageError) -> Self {
        CommandError::Storage(value)
    }
}

/// Everything the commands can inspect or change.
pub trait CommandTarget {
    /// Layers, rows and columns of the keymap.
    fn keymap_size(&self) -> (usize, usize, usize);
    fn keymap_get(&self, layer: usize, row: usize, col: usize) -> Result<Action, KeymapError>;
    fn keymap_set(&mut self, layer: usize, row: usize, col: usize, action: Action) -> Result<(), KeymapError>;
    fn macros_mut(&mut self) -> &mut MacroStore;
    fn nkro(&self) -> bool;
    fn set_nkro(&mut self, active: bool);
    fn save_config(&mut self) -> Result<(), StorageError>;
    fn load_config(&mut self) -> Result<(), StorageError>;
    fn erase_config(&mut self) -> Result<(), StorageError>;
}

fn hex_digit(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// Decodes exactly `N` bytes from `2 * N` hex digits.
fn parse_hex<const N: usize>(digits: &[u8]) -> Result<[u8; N], CommandError> {
    if digits.len() != 2 * N {
        return Err(CommandError::Syntax);
    }
    let mut out = [0u8; N];
    for (dst, pair) in out.iter_mut().zip(digits.chunks_exact(2)) {
        let hi = hex_digit(pair[0]).ok_or(CommandError::Syntax)?;
        let lo = hex_digit(pair[1]).ok_or(CommandError::Syntax)?;
        *dst = (hi << 4) | lo;
    }
    Ok(out)
}

#[derive(Default)]
pub struct CommandProcessor {
    line: heapless::Vec<u8, SERIAL_RX_CAPACITY>,
}

impl CommandProcessor {
    pub const fn new() -> Self {
        Self { line: heapless::Vec::new() }
    }

    /// Runs every complete line queued in `serial`. Responses are
    /// queued on the same port.
    pub fn process<T: CommandTarget + ?Sized>(&mut self, serial: &mut SerialPort, target: &mut T) {
        while serial.read_line(&mut self.line) {
            if let Err(e) = Self::run_line(&self.line, serial, target) {
                dev_warn!("Command failed: {}", e);
                let _ = writeln!(serial, "error: {}", e);
            }
        }
    }

    fn run_line<T: CommandTarget + ?Sized>(
        line: &[u8],
        out: &mut SerialPort,
        target: &mut T,
    ) -> Result<(), CommandError> {
        let Some((&cmd, args)) = line.split_first() else {
            return Ok(());
        };

        // Writes into the serial port never fail; output that does
        // not fit is dropped there.
        match cmd {
            CMD_IDENTIFY => {
                for (i, s) in USB_STRINGS.iter().enumerate() {
                    let _ = writeln!(out, "{:02x}: {}", i, s);
                }
            }
            CMD_KEYMAP_DUMP => Self::dump_keymap(out, target)?,
            CMD_KEYMAP_SET => {
                let [layer, row, col, tag, a1, a2, a3] = parse_hex::<7>(args)?;
                let action = Action::from_bytes([tag, a1, a2, a3])?;
                target.keymap_set(layer as usize, row as usize, col as usize, action)?;
                dev_debug!("Keymap {}/{}/{} set to {:?}", layer, row, col, action);
            }
            CMD_MACRO_CLEAR => target.macros_mut().clear_all(),
            CMD_MACRO_SET => {
                if args.len() < 3 {
                    return Err(CommandError::Syntax);
                }
                let [slot] = parse_hex::<1>(&args[..2])?;
                target.macros_mut().set_phrase(slot as usize, &args[2..])?;
            }
            CMD_NKRO_CLEAR | CMD_NKRO_SET => {
                target.set_nkro(cmd == CMD_NKRO_SET);
                let _ = writeln!(out, "nkro {}", target.nkro() as u8);
            }
            CMD_CONFIG_SAVE => {
                target.save_config()?;
                let _ = writeln!(out, "config saved");
            }
            CMD_CONFIG_LOAD => {
                target.load_config()?;
                let _ = writeln!(out, "config loaded");
            }
            CMD_CONFIG_ERASE => {
                target.erase_config()?;
                let _ = writeln!(out, "config erased");
            }
            CMD_HELP => {
                let _ = out.write_str(HELP);
            }
            _ => {
                dev_debug!("Discarding unknown command {:02x}", cmd);
            }
        }
        Ok(())
    }

    fn dump_keymap<T: CommandTarget + ?Sized>(out: &mut SerialPort, target: &T) -> Result<(), CommandError> {
        let (layers, rows, cols) = target.keymap_size();
        for layer in 0..layers {
            for row in 0..rows {
                let _ = write!(out, "{:02x}/{:02x}:", layer, row);
                for col in 0..cols {
                    let action = target.keymap_get(layer, row, col)?;
                    let _ = write!(out, " {:08x}", u32::from_be_bytes(action.to_bytes()));
                }
                let _ = writeln!(out);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::string::String;

    use super::*;
    use crate::keycode::KEY_A;
    use crate::keymap::KeymapTable;

    struct Target {
        keymap: KeymapTable<2, 2, 2>,
        macros: MacroStore,
        nkro: bool,
        saves: usize,
    }

    impl Target {
        fn new() -> Self {
            Self { keymap: KeymapTable::empty(), macros: MacroStore::new(), nkro: false, saves: 0 }
        }
    }

    impl CommandTarget for Target {
        fn keymap_size(&self) -> (usize, usize, usize) {
            (2, 2, 2)
        }

        fn keymap_get(&self, layer: usize, row: usize, col: usize) -> Result<Action, KeymapError> {
            self.keymap.get(layer, row, col)
        }

        fn keymap_set(&mut self, layer: usize, row: usize, col: usize, action: Action) -> Result<(), KeymapError> {
            self.keymap.set(layer, row, col, action)
        }

        fn macros_mut(&mut self) -> &mut MacroStore {
            &mut self.macros
        }

        fn nkro(&self) -> bool {
            self.nkro
        }

        fn set_nkro(&mut self, active: bool) {
            self.nkro = active;
        }

        fn save_config(&mut self) -> Result<(), StorageError> {
            self.saves += 1;
            Ok(())
        }

        fn load_config(&mut self) -> Result<(), StorageError> {
            Err(StorageError::Corrupt)
        }

        fn erase_config(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn run(target: &mut Target, input: &[u8]) -> String {
        let mut serial = SerialPort::new();
        serial.set_echo(false);
        serial.receive(input);
        CommandProcessor::new().process(&mut serial, target);

        let mut buf = [0u8; 1024];
        let n = serial.drain_output(&mut buf);
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    #[test]
    fn test_identify() {
        let out = run(&mut Target::new(), b"i\r");
        assert!(out.starts_with("00: dijkstra.xyz\r\n01: Gojira\r\n"));
        assert!(out.ends_with("07: Command channel\r\n"));
    }

    #[test]
    fn test_set_then_dump_keymap() {
        let mut target = Target::new();
        let out = run(&mut target, b"K01010003000004\nk\n");
        assert_eq!(target.keymap.get(1, 1, 0), Ok(Action::key(KEY_A)));
        assert_eq!(
            out,
            "00/00: 00000000 00000000\r\n\
             00/01: 00000000 00000000\r\n\
             01/00: 00000000 00000000\r\n\
             01/01: 03000004 00000000\r\n"
        );
    }

    #[test]
    fn test_malformed_set_refused() {
        let mut target = Target::new();
        let out = run(&mut target, b"K0101000300000\nK01010003000g04\nK03000003000004\nK00000063000004\n");
        assert_eq!(out.matches("error: ").count(), 4);
        assert!(target.keymap.cells().all(|(_, _, _, a)| a == Action::None));
    }

    #[test]
    fn test_macro_commands() {
        let mut target = Target::new();
        run(&mut target, b"M02ab\r");
        assert_eq!(target.macros.len(2), 2);
        run(&mut target, b"m\n");
        assert_eq!(target.macros.len(2), 0);

        let out = run(&mut target, b"M0a\n");
        assert!(out.starts_with("error: "));
        let out = run(&mut target, b"M0bx\n");
        assert!(out.starts_with("error: macro slot 11"));
    }

    #[test]
    fn test_nkro_and_config_commands() {
        let mut target = Target::new();
        assert_eq!(run(&mut target, b"N\n"), "nkro 1\r\n");
        assert!(target.nkro);
        assert_eq!(run(&mut target, b"n\n"), "nkro 0\r\n");
        assert_eq!(run(&mut target, b"s\n"), "config saved\r\n");
        assert_eq!(target.saves, 1);
        assert_eq!(run(&mut target, b"l\n"), "error: config contents are invalid\r\n");
    }

    #[test]
    fn test_unknown_and_blank_lines() {
        let mut target = Target::new();
        assert_eq!(run(&mut target, b"\r\n\nzzz\n"), "");
        assert!(run(&mut target, b"?\n").starts_with("commands:\r\n"));
    }

    #[test]
    fn test_help_mentions_every_command() {
        for cmd in ["i ", "k ", "K", "m ", "M", "n ", "N ", "s ", "l ", "e "] {
            assert!(HELP.lines().any(|l| l.starts_with(cmd)), "{}", cmd);
        }
    }
}
