//! Human-readable status lines for batches and tanks.

use chrono::{DateTime, Duration, Utc};

use crate::{BatchId, BrewState, Stage};

/// One line per tracked batch, stage order then FIFO within a stage, e.g.
/// "500 Litres of Organic Pilsner has been fermenting for 2 weeks, 0 days and 3:15:9".
pub fn batch_status_lines(state: &BrewState, now: DateTime<Utc>) -> Vec<(BatchId, String)> {
    let mut lines = Vec::new();
    for stage in Stage::tracked() {
        for id in state.ledger.queue(stage) {
            let Some(batch) = state.ledger.batches.get(id) else {
                continue;
            };
            let line = format!(
                "{} Litres of {} has been {} for {}",
                batch.volume_litres,
                batch.beer,
                stage.label(),
                format_elapsed(now - batch.stage_entered_at),
            );
            lines.push((id.clone(), line));
        }
    }
    lines
}

/// One line per occupied tank: "Albert is currently processing 500L of Organic Pilsner".
pub fn tank_status_lines(state: &BrewState) -> Vec<String> {
    state
        .registry
        .tanks()
        .iter()
        .filter_map(|tank| {
            let occupant = tank.occupant.as_ref()?;
            let batch = state.ledger.batches.get(occupant)?;
            Some(format!(
                "{} is currently processing {}L of {}",
                tank.name, batch.volume_litres, batch.beer
            ))
        })
        .collect()
}

/// Decompose an elapsed duration into "W weeks, D days and H:M:S".
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.num_seconds().max(0);
    let (minutes, seconds) = (total_secs / 60, total_secs % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);
    let (weeks, days) = (days / 7, days % 7);
    format!("{weeks} weeks, {days} days and {hours}:{minutes}:{seconds}")
}
