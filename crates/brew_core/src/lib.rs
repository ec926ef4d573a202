//! `brew_core` — brewhouse batch/tank state machine.
//!
//! No IO, no clock. All timestamps enter via the caller-supplied `now`.

mod engine;
mod ledger;
mod registry;
mod report;
mod scanner;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use engine::{advance, AdvanceError};
pub use ledger::{fulfill_order, new_batch, place_order, LedgerError};
pub use report::{batch_status_lines, format_elapsed, tank_status_lines};
pub use scanner::due_for_advancement;
pub use types::*;

use chrono::{DateTime, Utc};

pub(crate) fn emit(counters: &mut Counters, at: DateTime<Utc>, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, at, event }
}
