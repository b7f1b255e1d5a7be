use core::fmt::Display;

use bitflags::bitflags;
use embedded_storage::nor_flash::NorFlash;
use gojira_common::{KeyState, dev_debug, dev_error, dev_info, dev_warn, time::Clock};

use crate::action::Action;
use crate::command::{CommandProcessor, CommandTarget};
use crate::dispatch::Devices;
use crate::hid::{Endpoint, Link};
use crate::keyboard_macro::{MacroEngine, MacroStore};
use crate::keymap::{KeymapError, KeymapTable};
use crate::log::LogDrain;
use crate::matrix::{Edge, MatrixPins, MatrixScanner};
use crate::report::KeyboardState;
use crate::serial::SerialPort;
use crate::storage::{ConfigStore, StorageError};

bitflags! {
    /// State shown on the board LEDs.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Indicators: u8 {
        const AUTOMOUSE_ACTIVE = 1 << 0;
        const AUTOMOUSE_PRESS = 1 << 1;
        const MACRO_ACTIVE = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumerationTimeout {
    pub waited_millis: u32,
}

impl Display for EnumerationTimeout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "host did not configure the device within {} ms", self.waited_millis)
    }
}

// Most log bytes moved into the serial output per poll.
const LOG_CHUNK_LEN: usize = 64;

/// The parts of the keyboard the command channel works on.
struct Settings<'a, F, const CONFIG_LEN: usize, const LAYERS: usize, const ROWS: usize, const COLS: usize> {
    keymap: &'a mut KeymapTable<LAYERS, ROWS, COLS>,
    macros: &'a mut MacroEngine,
    keyboard: &'a mut KeyboardState,
    store: &'a mut ConfigStore<F, CONFIG_LEN>,
}

impl<F: NorFlash, const CONFIG_LEN: usize, const LAYERS: usize, const ROWS: usize, const COLS: usize> CommandTarget
    for Settings<'_, F, CONFIG_LEN, LAYERS, ROWS, COLS>
{
    fn keymap_size(&self) -> (usize, usize, usize) {
        (LAYERS, ROWS, COLS)
    }

    fn keymap_get(&self, layer: usize, row: usize, col: usize) -> Result<Action, KeymapError> {
        self.keymap.get(layer, row, col)
    }

    fn keymap_set(&mut self, layer: usize, row: usize, col: usize, action: Action) -> Result<(), KeymapError> {
        self.keymap.set(layer, row, col, action)
    }

    fn macros_mut(&mut self) -> &mut MacroStore {
        self.macros.store_mut()
    }

    fn nkro(&self) -> bool {
        self.keyboard.nkro_active()
    }

    fn set_nkro(&mut self, active: bool) {
        self.keyboard.set_nkro(active);
    }

    fn save_config(&mut self) -> Result<(), StorageError> {
        self.store.write_config(self.keymap, self.macros.store(), self.keyboard.nkro_active())
    }

    fn load_config(&mut self) -> Result<(), StorageError> {
        let stored = self.store.read_config::<LAYERS, ROWS, COLS>()?;
        // The keymap, the macros and the NKRO flag change together.
        critical_section::with(|_| {
            *self.keymap = stored.keymap;
            self.macros.replace_store(stored.macros);
            self.keyboard.set_nkro(stored.nkro);
        });
        Ok(())
    }

    fn erase_config(&mut self) -> Result<(), StorageError> {
        self.store.clear_config()
    }
}

/// Owns every piece of keyboard state and runs it from a single
/// cooperative loop through [`Keyboard::poll`].
pub struct Keyboard<C, P, F, const CONFIG_LEN: usize, const LAYERS: usize, const ROWS: usize, const COLS: usize> {
    clock: C,
    matrix: MatrixScanner<P, ROWS, COLS>,
    keymap: KeymapTable<LAYERS, ROWS, COLS>,
    devices: Devices,
    macros: MacroEngine,
    store: ConfigStore<F, CONFIG_LEN>,
    serial: SerialPort,
    commands: CommandProcessor,
    log_drain: Option<&'static dyn LogDrain>,
}

impl<C, P, F, const CONFIG_LEN: usize, const LAYERS: usize, const ROWS: usize, const COLS: usize>
    Keyboard<C, P, F, CONFIG_LEN, LAYERS, ROWS, COLS>
where
    C: Clock,
    P: MatrixPins<ROWS, COLS>,
    F: NorFlash,
{
    pub fn new(
        clock: C,
        matrix: MatrixScanner<P, ROWS, COLS>,
        keymap: KeymapTable<LAYERS, ROWS, COLS>,
        store: ConfigStore<F, CONFIG_LEN>,
    ) -> Self {
        Self {
            clock,
            matrix,
            keymap,
            devices: Devices::new(),
            macros: MacroEngine::new(),
            store,
            serial: SerialPort::new(),
            commands: CommandProcessor::new(),
            log_drain: None,
        }
    }

    /// Forwards the output of `drain` to the command channel.
    pub fn set_log_drain(&mut self, drain: &'static dyn LogDrain) {
        self.log_drain = Some(drain);
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn keymap(&self) -> &KeymapTable<LAYERS, ROWS, COLS> {
        &self.keymap
    }

    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    pub fn macros(&self) -> &MacroEngine {
        &self.macros
    }

    pub fn matrix_mut(&mut self) -> &mut MatrixScanner<P, ROWS, COLS> {
        &mut self.matrix
    }

    pub fn serial_mut(&mut self) -> &mut SerialPort {
        &mut self.serial
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<F, CONFIG_LEN> {
        &mut self.store
    }

    fn settings(&mut self) -> Settings<'_, F, CONFIG_LEN, LAYERS, ROWS, COLS> {
        Settings {
            keymap: &mut self.keymap,
            macros: &mut self.macros,
            keyboard: &mut self.devices.keyboard,
            store: &mut self.store,
        }
    }

    /// Replaces the keymap, macros and NKRO mode with the stored
    /// configuration. Nothing changes if the stored image is invalid.
    pub fn load_config(&mut self) -> Result<(), StorageError> {
        self.settings().load_config()
    }

    pub fn save_config(&mut self) -> Result<(), StorageError> {
        self.settings().save_config()
    }

    fn process_commands(&mut self) {
        let mut settings = Settings {
            keymap: &mut self.keymap,
            macros: &mut self.macros,
            keyboard: &mut self.devices.keyboard,
            store: &mut self.store,
        };
        self.commands.process(&mut self.serial, &mut settings);
    }

    /// Handles bytes received on the command channel. Complete lines
    /// are executed right away.
    pub fn serial_receive(&mut self, bytes: &[u8]) {
        if self.serial.receive(bytes) {
            self.process_commands();
        }
    }

    pub fn indicators(&self) -> Indicators {
        let mut indicators = Indicators::empty();
        indicators.set(Indicators::AUTOMOUSE_ACTIVE, self.devices.automouse.is_active());
        indicators.set(Indicators::AUTOMOUSE_PRESS, self.devices.automouse.is_pressed());
        indicators.set(Indicators::MACRO_ACTIVE, self.macros.is_active());
        indicators
    }

    /// Polls `link` until the host configures the keyboard, giving up
    /// after `timeout_millis`. Command lines received meanwhile run
    /// once the keyboard is configured.
    pub fn wait_for_enumeration<L: Link + ?Sized>(
        &mut self,
        link: &mut L,
        timeout_millis: u32,
    ) -> Result<(), EnumerationTimeout> {
        let start = self.clock.now_millis();
        let mut line_received = false;
        loop {
            let serial = &mut self.serial;
            link.poll(&mut |bytes| {
                line_received |= serial.receive(bytes);
            });

            if link.is_active(Endpoint::Keyboard) {
                dev_info!("Configured after {} ms", self.clock.elapsed_since(start));
                if line_received {
                    self.process_commands();
                }
                return Ok(());
            }

            let waited_millis = self.clock.elapsed_since(start);
            if waited_millis >= timeout_millis {
                dev_error!("Enumeration timed out");
                return Err(EnumerationTimeout { waited_millis });
            }
        }
    }

    fn dispatch_edge<L: Link + ?Sized>(&mut self, link: &mut L, edge: Edge) {
        let action = match self.keymap.lookup(edge.row as usize, edge.col as usize) {
            Ok(action) => action,
            Err(e) => {
                dev_warn!("Ignoring edge: {}", e);
                return;
            }
        };

        dev_debug!("{}/{} {:?}: {:?}", edge.row, edge.col, edge.state, action);
        match action {
            Action::Layer(layer) => {
                if edge.state == KeyState::Pressed {
                    self.keymap.select_layer(layer);
                }
            }
            Action::Macro(slot) => self.macros.trigger(slot, edge.state),
            action => {
                self.devices.apply(&self.clock, &action, edge.state);
                self.devices.flush(link);
            }
        }
    }

    fn drain_log(&mut self) {
        let Some(drain) = self.log_drain else {
            return;
        };
        let mut chunk = [0u8; LOG_CHUNK_LEN];
        let room = self.serial.output_room().min(LOG_CHUNK_LEN);
        let n = drain.read_pending_bytes(&mut chunk[..room]);
        self.serial.write_bytes(&chunk[..n]);
    }

    /// Runs one iteration of the main loop. Never blocks.
    pub fn poll<L: Link + ?Sized>(&mut self, link: &mut L) {
        let serial = &mut self.serial;
        let mut line_received = false;
        link.poll(&mut |bytes| {
            line_received |= serial.receive(bytes);
        });
        if line_received {
            self.process_commands();
        }
        self.devices.flush(link);

        if link.is_active(Endpoint::Serial) {
            self.drain_log();
            self.serial.flush(link);
        }

        if link.is_active(Endpoint::Keyboard) {
            self.matrix.scan(&self.clock);
            while let Some(edge) = self.matrix.next_edge() {
                self.dispatch_edge(link, edge);
            }
        }

        if self.devices.automouse.is_active() {
            self.devices.automouse.tick(&self.clock, &mut self.devices.mouse, link);
        }

        if self.macros.is_active() {
            let devices = &mut self.devices;
            let clock = &self.clock;
            self.macros.tick(|action, state| devices.deliver_if_idle(clock, link, action, state));
        }
    }
}
