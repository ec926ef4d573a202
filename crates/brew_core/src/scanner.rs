//! Due-for-advancement scanner. Advisory only — never mutates state; an
//! external scheduler decides whether to call `advance` on what it reports.

use chrono::{DateTime, Duration, Utc};

use crate::{BatchId, BrewState, Settings, Stage};

/// Batches that have outstayed their stage's expected dwell time.
///
/// Waiting has no dwell of its own: the first batch still waiting *to brew*
/// is reported, and only while the brewing line is idle — there is nothing
/// actionable otherwise. Batches parked in Waiting after a failed tank
/// acquisition resurface through tank availability, not elapsed time.
pub fn due_for_advancement(
    state: &BrewState,
    settings: &Settings,
    now: DateTime<Utc>,
) -> Vec<BatchId> {
    let mut due = Vec::new();

    if state.ledger.queue(Stage::Brewing).is_empty() {
        let head = state.ledger.queue(Stage::Waiting).iter().find(|id| {
            state
                .ledger
                .batches
                .get(*id)
                .is_some_and(|b| b.next_stage == Stage::Brewing)
        });
        if let Some(id) = head {
            due.push(id.clone());
        }
    }

    collect_overdue(
        state,
        Stage::Brewing,
        Duration::hours(settings.brewing_dwell_hours),
        now,
        &mut due,
    );
    collect_overdue(
        state,
        Stage::Fermenting,
        Duration::days(settings.fermenting_dwell_days),
        now,
        &mut due,
    );
    collect_overdue(
        state,
        Stage::Conditioning,
        Duration::days(settings.conditioning_dwell_days),
        now,
        &mut due,
    );

    // Bottling throughput scales with batch size.
    for id in state.ledger.queue(Stage::Bottling) {
        if let Some(batch) = state.ledger.batches.get(id) {
            let dwell =
                Duration::hours(settings.bottling_hours_per_litre * i64::from(batch.volume_litres));
            if now - batch.stage_entered_at >= dwell {
                due.push(id.clone());
            }
        }
    }

    due
}

fn collect_overdue(
    state: &BrewState,
    stage: Stage,
    dwell: Duration,
    now: DateTime<Utc>,
    due: &mut Vec<BatchId>,
) {
    for id in state.ledger.queue(stage) {
        if let Some(batch) = state.ledger.batches.get(id) {
            if now - batch.stage_entered_at > dwell {
                due.push(id.clone());
            }
        }
    }
}
