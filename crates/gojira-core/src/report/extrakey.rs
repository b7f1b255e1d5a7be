use gojira_common::KeyState;
use zerocopy::IntoBytes;

use crate::hid::{Endpoint, ExtraKeyReport, Link, REPORT_ID_CONSUMER, REPORT_ID_SYSTEM};

use super::push_report;

/// System and consumer controls share one endpoint, told apart by
/// the report id. Only the last pressed control is reported.
#[derive(Clone, Debug, Default)]
pub struct ExtraKeyState {
    report: ExtraKeyReport,
    dirty: bool,
}

impl ExtraKeyState {
    pub const fn new() -> Self {
        Self { report: ExtraKeyReport { report_id: REPORT_ID_CONSUMER, code: [0; 2] }, dirty: false }
    }

    pub fn report(&self) -> &ExtraKeyReport {
        &self.report
    }

    fn event(&mut self, report_id: u8, code: u16, state: KeyState) {
        self.report = match state {
            KeyState::Pressed => ExtraKeyReport::new(report_id, code),
            KeyState::Released => ExtraKeyReport::new(report_id, 0),
        };
        self.dirty = true;
    }

    pub fn consumer_event(&mut self, code: u16, state: KeyState) {
        self.event(REPORT_ID_CONSUMER, code, state);
    }

    pub fn system_event(&mut self, code: u16, state: KeyState) {
        self.event(REPORT_ID_SYSTEM, code, state);
    }

    pub fn flush<L: Link + ?Sized>(&mut self, link: &mut L) {
        if self.dirty && push_report(link, Endpoint::ExtraKey, self.report.as_bytes()) {
            self.dirty = false;
        }
    }
}
