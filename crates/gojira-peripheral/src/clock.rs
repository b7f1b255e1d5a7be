use gojira_common::{dev_info, time::Clock};
use stm32f4xx_hal::{
    pac::{DCB, DWT},
    rcc::Clocks,
};
use vcell::VolatileCell;

/// Millisecond clock derived from the DWT cycle counter.
///
/// The cycle counter wraps every 2^32 cycles (~44 s at 96 MHz), so
/// [`Clock::now_millis`] has to be called more often than that for the
/// count to stay right. The main loop takes care of it.
pub struct DwtClock {
    cycles_per_milli: u32,
    last_cycles: VolatileCell<u32>,
    // Cycles seen since `last_cycles` that did not add up to a whole
    // millisecond yet.
    carry: VolatileCell<u32>,
    millis: VolatileCell<u32>,
}

impl DwtClock {
    pub fn new(clocks: &Clocks, dcb: &mut DCB, dwt: &mut DWT) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();

        let cycles_per_milli = (clocks.sysclk().raw() / 1000).max(1);
        dev_info!("DWT clock started, {} cycles per ms", cycles_per_milli);

        Self {
            cycles_per_milli,
            last_cycles: VolatileCell::new(DWT::cycle_count()),
            carry: VolatileCell::new(0),
            millis: VolatileCell::new(0),
        }
    }
}

impl Clock for DwtClock {
    fn now_millis(&self) -> u32 {
        let now = DWT::cycle_count();
        let elapsed = now.wrapping_sub(self.last_cycles.get()) as u64 + self.carry.get() as u64;
        let per_milli = self.cycles_per_milli as u64;

        self.last_cycles.set(now);
        self.carry.set((elapsed % per_milli) as u32);
        let millis = self.millis.get().wrapping_add((elapsed / per_milli) as u32);
        self.millis.set(millis);
        millis
    }
}
