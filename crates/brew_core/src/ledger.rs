//! Ledger operations: batch intake, queue bookkeeping, and the order backlog.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::{
    emit, Batch, BatchId, BrewState, Event, EventEnvelope, Order, OrderId, ProcessLedger,
    Settings, Stage,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("batch volume must be between 1 and {max} litres, got {got}")]
    InvalidVolume { got: u32, max: u32 },
    #[error("order quantity must be at least one bottle")]
    InvalidQuantity,
    #[error("unknown order '{0}'")]
    UnknownOrder(OrderId),
    #[error("not enough finished {beer}: need {needed_litres} litres, have {available_litres}")]
    InsufficientInventory {
        beer: String,
        needed_litres: f64,
        available_litres: f64,
    },
}

impl ProcessLedger {
    pub fn new() -> Self {
        ProcessLedger {
            batches: HashMap::new(),
            queues: std::array::from_fn(|_| Vec::new()),
            finished: HashMap::new(),
            orders: Vec::new(),
        }
    }

    /// Batches currently queued in `stage`, FIFO order. Empty for `Finished`.
    pub fn queue(&self, stage: Stage) -> &[BatchId] {
        match stage.queue_index() {
            Some(idx) => &self.queues[idx],
            None => &[],
        }
    }

    /// Batch ids across all tracked stages, stage order then FIFO within.
    pub fn tracked_batches(&self) -> impl Iterator<Item = &BatchId> {
        self.queues.iter().flatten()
    }

    pub(crate) fn push_back(&mut self, stage: Stage, id: BatchId) {
        if let Some(idx) = stage.queue_index() {
            self.queues[idx].push(id);
        }
    }

    pub(crate) fn remove(&mut self, stage: Stage, id: &BatchId) {
        if let Some(idx) = stage.queue_index() {
            self.queues[idx].retain(|queued| queued != id);
        }
    }
}

impl Default for ProcessLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a new batch. If the brewing line is idle the batch goes straight
/// into `Brewing`, bypassing `Waiting`; otherwise it joins the tail of the
/// waiting queue.
pub fn new_batch(
    state: &mut BrewState,
    settings: &Settings,
    beer: &str,
    volume_litres: u32,
    now: DateTime<Utc>,
    events: &mut Vec<EventEnvelope>,
) -> Result<BatchId, LedgerError> {
    if volume_litres == 0 || volume_litres > settings.max_batch_volume_litres {
        return Err(LedgerError::InvalidVolume {
            got: volume_litres,
            max: settings.max_batch_volume_litres,
        });
    }

    let id = BatchId(format!("batch_{:04}", state.counters.next_batch_id));
    state.counters.next_batch_id += 1;

    let stage = if state.ledger.queue(Stage::Brewing).is_empty() {
        Stage::Brewing
    } else {
        Stage::Waiting
    };

    state.ledger.batches.insert(
        id.clone(),
        Batch {
            id: id.clone(),
            beer: beer.to_string(),
            volume_litres,
            current_stage: stage,
            next_stage: stage.successor(),
            stage_entered_at: now,
            tank: None,
        },
    );
    state.ledger.push_back(stage, id.clone());

    events.push(emit(
        &mut state.counters,
        now,
        Event::BatchStarted {
            batch_id: id.clone(),
            beer: beer.to_string(),
            volume_litres,
            stage,
        },
    ));

    Ok(id)
}

/// Queue a customer order. Quantity must be at least one bottle.
pub fn place_order(
    state: &mut BrewState,
    beer: &str,
    bottles: u32,
    due: NaiveDate,
    now: DateTime<Utc>,
    events: &mut Vec<EventEnvelope>,
) -> Result<OrderId, LedgerError> {
    if bottles == 0 {
        return Err(LedgerError::InvalidQuantity);
    }

    let id = OrderId(format!("order_{:04}", state.counters.next_order_id));
    state.counters.next_order_id += 1;

    state.ledger.orders.push(Order {
        id: id.clone(),
        beer: beer.to_string(),
        bottles,
        due,
    });

    events.push(emit(
        &mut state.counters,
        now,
        Event::OrderPlaced {
            order_id: id.clone(),
            beer: beer.to_string(),
            bottles,
        },
    ));

    Ok(id)
}

/// Deliver an order out of finished stock. All-or-nothing: on insufficient
/// inventory the order stays queued and the tally is untouched.
pub fn fulfill_order(
    state: &mut BrewState,
    settings: &Settings,
    order_id: &OrderId,
    now: DateTime<Utc>,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), LedgerError> {
    let Some(position) = state.ledger.orders.iter().position(|o| &o.id == order_id) else {
        return Err(LedgerError::UnknownOrder(order_id.clone()));
    };

    let order = &state.ledger.orders[position];
    let needed_litres = f64::from(order.bottles) * settings.litres_per_bottle;
    let available_litres = state
        .ledger
        .finished
        .get(&order.beer)
        .copied()
        .unwrap_or(0.0);
    if available_litres < needed_litres {
        return Err(LedgerError::InsufficientInventory {
            beer: order.beer.clone(),
            needed_litres,
            available_litres,
        });
    }

    let order = state.ledger.orders.remove(position);
    if let Some(stock) = state.ledger.finished.get_mut(&order.beer) {
        *stock -= needed_litres;
    }

    events.push(emit(
        &mut state.counters,
        now,
        Event::OrderFulfilled {
            order_id: order.id.clone(),
            beer: order.beer,
            bottles: order.bottles,
        },
    ));

    Ok(())
}
