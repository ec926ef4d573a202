//! Stage transition engine.
//!
//! `advance` is the single entry point for moving a batch through the
//! pipeline. It assumes exclusive access via `&mut BrewState`; whatever lock
//! serialises mutations belongs to the hosting application.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{emit, BatchId, BrewState, Event, EventEnvelope, Stage};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvanceError {
    #[error("unknown batch '{0}'")]
    UnknownBatch(BatchId),
}

/// Move `batch_id` toward its next stage.
///
/// Order of operations:
/// 1. Hold in place if the target is the occupied brewing line.
/// 2. Leave the current stage queue.
/// 3. Release the tank vacated by fermenting/conditioning — before any
///    acquisition, forward move or not.
/// 4. When the target stage needs a tank, resolve and claim the requested
///    one; with no request, or an unresolvable/unsuitable tank, fall back to
///    `Waiting` with the target left unchanged so the same transition is
///    retried later.
/// 5. Fold finished volume into the tally when the move ends the lifecycle.
/// 6. Rejoin the queue for the resulting stage at the tail and reset the
///    stage clock.
///
/// Returns the stage the batch ended up in.
pub fn advance(
    state: &mut BrewState,
    batch_id: &BatchId,
    requested_tank: Option<&str>,
    now: DateTime<Utc>,
    events: &mut Vec<EventEnvelope>,
) -> Result<Stage, AdvanceError> {
    let Some(batch) = state.ledger.batches.get(batch_id) else {
        return Err(AdvanceError::UnknownBatch(batch_id.clone()));
    };
    let current = batch.current_stage;
    let target = batch.next_stage;
    let volume = batch.volume_litres;

    // The brewing line is a capacity-1 resource: instead of blocking, the
    // batch stays queued until the line frees up.
    if target == Stage::Brewing && !state.ledger.queue(Stage::Brewing).is_empty() {
        events.push(emit(
            &mut state.counters,
            now,
            Event::AdvanceHeld {
                batch_id: batch_id.clone(),
                stage: current,
            },
        ));
        return Ok(current);
    }

    state.ledger.remove(current, batch_id);
    release_tank(state, batch_id, now, events);

    let landed = if target == Stage::Finished {
        finish_batch(state, batch_id, now, events);
        Stage::Finished
    } else if target.requires_tank() {
        match suitable_tank(state, requested_tank, target, volume) {
            Some(tank_name) => {
                occupy_tank(state, batch_id, &tank_name, current, target, now, events);
                target
            }
            None => {
                // Tail of Waiting; `next_stage` keeps pointing at `target`.
                if let Some(batch) = state.ledger.batches.get_mut(batch_id) {
                    batch.current_stage = Stage::Waiting;
                }
                events.push(emit(
                    &mut state.counters,
                    now,
                    Event::SentToWaiting {
                        batch_id: batch_id.clone(),
                        wanted: target,
                    },
                ));
                Stage::Waiting
            }
        }
    } else {
        if let Some(batch) = state.ledger.batches.get_mut(batch_id) {
            batch.current_stage = target;
            batch.next_stage = target.successor();
        }
        events.push(emit(
            &mut state.counters,
            now,
            Event::StageAdvanced {
                batch_id: batch_id.clone(),
                from: current,
                to: target,
            },
        ));
        target
    };

    if landed != Stage::Finished {
        state.ledger.push_back(landed, batch_id.clone());
        if let Some(batch) = state.ledger.batches.get_mut(batch_id) {
            batch.stage_entered_at = now;
        }
    }

    Ok(landed)
}

/// Clear the occupancy left behind by a fermenting/conditioning batch. Runs
/// before any acquisition, so a batch never blocks on its own vacated tank.
fn release_tank(
    state: &mut BrewState,
    batch_id: &BatchId,
    now: DateTime<Utc>,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(batch) = state.ledger.batches.get(batch_id) else {
        return;
    };
    if !batch.current_stage.requires_tank() {
        return;
    }
    let Some(tank_name) = batch.tank.clone() else {
        return;
    };

    if let Some(tank) = state.registry.find_by_name_mut(&tank_name) {
        tank.occupant = None;
    }
    if let Some(batch) = state.ledger.batches.get_mut(batch_id) {
        batch.tank = None;
    }
    events.push(emit(
        &mut state.counters,
        now,
        Event::TankReleased {
            batch_id: batch_id.clone(),
            tank: tank_name,
        },
    ));
}

/// Resolve a requested tank label to a claimable tank name for `stage`.
///
/// Labels may carry a capacity suffix ("Albert 1000L"); everything after the
/// first space is ignored. `None` when the name does not resolve or the tank
/// is occupied, too small, or of the wrong duty.
fn suitable_tank(
    state: &BrewState,
    requested: Option<&str>,
    stage: Stage,
    volume_litres: u32,
) -> Option<String> {
    let label = requested?;
    let name = label.split(' ').next().unwrap_or(label);
    let tank = state.registry.find_by_name(name)?;
    (tank.occupant.is_none() && tank.duty.suits(stage) && volume_litres <= tank.capacity_litres)
        .then(|| tank.name.clone())
}

fn occupy_tank(
    state: &mut BrewState,
    batch_id: &BatchId,
    tank_name: &str,
    from: Stage,
    to: Stage,
    now: DateTime<Utc>,
    events: &mut Vec<EventEnvelope>,
) {
    if let Some(tank) = state.registry.find_by_name_mut(tank_name) {
        tank.occupant = Some(batch_id.clone());
    }
    if let Some(batch) = state.ledger.batches.get_mut(batch_id) {
        batch.tank = Some(tank_name.to_string());
        batch.current_stage = to;
        batch.next_stage = to.successor();
    }
    events.push(emit(
        &mut state.counters,
        now,
        Event::TankAssigned {
            batch_id: batch_id.clone(),
            tank: tank_name.to_string(),
        },
    ));
    events.push(emit(
        &mut state.counters,
        now,
        Event::StageAdvanced {
            batch_id: batch_id.clone(),
            from,
            to,
        },
    ));
}

/// Fold the batch volume into the finished tally and drop it from tracking.
/// This ends the batch's individual identity.
fn finish_batch(
    state: &mut BrewState,
    batch_id: &BatchId,
    now: DateTime<Utc>,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(batch) = state.ledger.batches.remove(batch_id) else {
        return;
    };
    *state
        .ledger
        .finished
        .entry(batch.beer.clone())
        .or_insert(0.0) += f64::from(batch.volume_litres);
    events.push(emit(
        &mut state.counters,
        now,
        Event::BatchFinished {
            batch_id: batch_id.clone(),
            beer: batch.beer,
            volume_litres: batch.volume_litres,
        },
    ));
}
