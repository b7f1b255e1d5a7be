//! Per device class report state. Handlers mutate the reports and
//! mark them dirty; `flush` hands dirty reports to idle endpoints.

mod extrakey;
mod keyboard;
mod mouse;

pub use extrakey::*;
pub use keyboard::*;
pub use mouse::*;

use gojira_common::{dev_trace, dev_warn};

use crate::hid::{Endpoint, Link, TransportError};

/// Writes `bytes` to `endpoint` if it is idle. Returns whether the
/// report was accepted, so the caller can clear its dirty flag.
pub(crate) fn push_report<L: Link + ?Sized>(link: &mut L, endpoint: Endpoint, bytes: &[u8]) -> bool {
    if !link.is_idle(endpoint) {
        return false;
    }

    match link.write(endpoint, bytes) {
        Ok(_) => {
            dev_trace!("{:?} report sent: {:?}", endpoint, bytes);
            true
        }
        Err(TransportError::WouldBlock) => false,
        Err(e) => {
            // Nothing else can be done with the report, keep it dirty
            // and let the next flush retry.
            dev_warn!("{:?} report not sent: {}", endpoint, e);
            false
        }
    }
}
