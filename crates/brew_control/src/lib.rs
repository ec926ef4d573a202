//! Caller-side planning helpers: what to brew next, which tanks to offer.
//!
//! Nothing here mutates state. These functions read a `BrewState` plus the
//! demand-forecast collaborator and produce advice for the hosting surface
//! (daemon, CLI, or dashboard) to act on.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use brew_core::{Batch, BrewState, Settings, Stage, Tank};

/// Opaque demand oracle. The production implementation extrapolates from
/// sales history; this crate only ever sees predicted bottle counts.
pub trait DemandForecast {
    /// Predicted bottle demand per beer over `window_days` starting at `from`.
    fn predicted_demand(&self, from: NaiveDate, window_days: i64) -> HashMap<String, f64>;
}

/// Flat-rate stand-in: a fixed weekly rate per beer, scaled to the window.
pub struct TableForecast {
    weekly_bottles: HashMap<String, f64>,
}

impl TableForecast {
    pub fn new(weekly_bottles: HashMap<String, f64>) -> Self {
        TableForecast { weekly_bottles }
    }
}

impl DemandForecast for TableForecast {
    fn predicted_demand(&self, _from: NaiveDate, window_days: i64) -> HashMap<String, f64> {
        #[allow(clippy::cast_precision_loss)]
        let weeks = window_days as f64 / 7.0;
        self.weekly_bottles
            .iter()
            .map(|(beer, rate)| (beer.clone(), rate * weeks))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrewSuggestion {
    pub beer: String,
    pub volume_litres: u32,
}

/// Recommend the next batch to brew, or `None` when nothing should start.
///
/// The planning rule: look at the demand window starting `lead_weeks` out,
/// discount beer already in flight (waiting, brewing, fermenting) at twice
/// its batch volume, pick the highest residual demand, and size the brew to
/// half that demand rounded up to the next ten litres, capped by the largest
/// free fermenter. No suggestion while the brewing line is busy, a batch is
/// already waiting to brew, no large-enough fermenter is free, or the sized
/// volume is below the floor.
pub fn suggest_next_brew(
    state: &BrewState,
    settings: &Settings,
    forecast: &dyn DemandForecast,
    today: NaiveDate,
) -> Option<BrewSuggestion> {
    let from = today + Duration::weeks(settings.suggestion_lead_weeks);
    let mut demand = forecast.predicted_demand(from, settings.suggestion_window_days);
    if demand.is_empty() {
        return None;
    }

    for stage in [Stage::Waiting, Stage::Brewing, Stage::Fermenting] {
        for id in state.ledger.queue(stage) {
            if let Some(batch) = state.ledger.batches.get(id) {
                if let Some(pending) = demand.get_mut(&batch.beer) {
                    *pending -=
                        f64::from(batch.volume_litres) * settings.suggestion_inflight_factor;
                }
            }
        }
    }

    let fermenters = state
        .registry
        .available_tanks(settings.suggestion_fermenter_floor_litres, Stage::Fermenting);
    let brewing_busy = !state.ledger.queue(Stage::Brewing).is_empty();
    let waiting_to_brew = state.ledger.queue(Stage::Waiting).iter().any(|id| {
        state
            .ledger
            .batches
            .get(id)
            .is_some_and(|b| b.next_stage == Stage::Brewing)
    });
    if fermenters.is_empty() || brewing_busy || waiting_to_brew {
        return None;
    }

    let (beer, peak) = demand.iter().max_by(|a, b| a.1.total_cmp(b.1))?;
    let sized = round_up_to(
        peak * settings.suggestion_demand_fraction,
        settings.suggestion_round_to_litres,
    );
    let largest = fermenters.iter().map(|t| t.capacity_litres).max()?;
    let volume = sized.min(largest);
    if volume <= settings.suggestion_min_volume_litres {
        return None;
    }

    Some(BrewSuggestion {
        beer: beer.clone(),
        volume_litres: volume,
    })
}

fn round_up_to(value: f64, step: u32) -> u32 {
    if value <= 0.0 {
        return 0;
    }
    let step_f = f64::from(step);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = ((value / step_f).ceil() * step_f) as u32;
    rounded
}

/// Tanks worth offering for a batch's next stage, first-fit order.
///
/// When the batch is about to condition and already sits in a
/// condition-capable tank, that tank is offered first; `advance` releases
/// the old occupancy before acquiring, so staying put is a legal claim.
pub fn tank_options<'a>(state: &'a BrewState, batch: &Batch) -> Vec<&'a Tank> {
    if !batch.next_stage.requires_tank() {
        return Vec::new();
    }
    let mut options = state
        .registry
        .available_tanks(batch.volume_litres, batch.next_stage);
    if batch.next_stage == Stage::Conditioning {
        if let Some(current) = batch
            .tank
            .as_deref()
            .and_then(|name| state.registry.find_by_name(name))
        {
            if current.duty.can_condition() && batch.volume_litres <= current.capacity_litres {
                options.retain(|t| t.name != current.name);
                options.insert(0, current);
            }
        }
    }
    options
}
