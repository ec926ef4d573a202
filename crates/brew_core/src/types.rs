//! Type definitions for `brew_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the brewhouse.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(BatchId);
string_id!(OrderId);
string_id!(EventId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// One phase of production. Batches move strictly forward along this order;
/// the single backward edge is a failed tank acquisition, which drops the
/// batch back to `Waiting`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Stage {
    Waiting,
    Brewing,
    Fermenting,
    Conditioning,
    Bottling,
    Finished,
}

impl Stage {
    /// Number of stages that keep a queue. `Finished` batches are not tracked.
    pub const TRACKED: usize = 5;

    /// The tracked stages in pipeline order.
    pub const fn tracked() -> [Stage; Stage::TRACKED] {
        [
            Stage::Waiting,
            Stage::Brewing,
            Stage::Fermenting,
            Stage::Conditioning,
            Stage::Bottling,
        ]
    }

    pub fn successor(self) -> Stage {
        match self {
            Stage::Waiting => Stage::Brewing,
            Stage::Brewing => Stage::Fermenting,
            Stage::Fermenting => Stage::Conditioning,
            Stage::Conditioning => Stage::Bottling,
            Stage::Bottling | Stage::Finished => Stage::Finished,
        }
    }

    /// Fermenting and conditioning happen inside a tank; every other stage
    /// uses dedicated equipment.
    pub fn requires_tank(self) -> bool {
        matches!(self, Stage::Fermenting | Stage::Conditioning)
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Waiting => "waiting",
            Stage::Brewing => "brewing",
            Stage::Fermenting => "fermenting",
            Stage::Conditioning => "conditioning",
            Stage::Bottling => "bottling",
            Stage::Finished => "finished",
        }
    }

    pub(crate) fn queue_index(self) -> Option<usize> {
        match self {
            Stage::Finished => None,
            tracked => Some(tracked as usize),
        }
    }
}

/// What a tank is plumbed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankDuty {
    Fermenter,
    Conditioner,
    Both,
}

impl TankDuty {
    pub fn can_ferment(self) -> bool {
        matches!(self, TankDuty::Fermenter | TankDuty::Both)
    }

    pub fn can_condition(self) -> bool {
        matches!(self, TankDuty::Conditioner | TankDuty::Both)
    }

    /// Whether a tank of this duty can host the given stage.
    pub fn suits(self, stage: Stage) -> bool {
        match stage {
            Stage::Fermenting => self.can_ferment(),
            Stage::Conditioning => self.can_condition(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tank {
    pub name: String,
    pub capacity_litres: u32,
    pub duty: TankDuty,
    /// Back-reference to the occupying batch; resolved through the ledger.
    /// A tank holds at most one batch, and the occupant's volume never
    /// exceeds `capacity_litres`.
    pub occupant: Option<BatchId>,
}

impl Tank {
    /// Display label used by tank pickers, e.g. "Albert 1000L". `advance`
    /// accepts these labels back by ignoring everything after the first space.
    pub fn pick_label(&self) -> String {
        format!("{} {}L", self.name, self.capacity_litres)
    }
}

/// The fixed pool of vessels. Membership is static after initialisation;
/// only occupancy changes. Query operations live in `registry.rs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankRegistry {
    pub(crate) tanks: Vec<Tank>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub beer: String,
    pub volume_litres: u32,
    pub current_stage: Stage,
    pub next_stage: Stage,
    pub stage_entered_at: DateTime<Utc>,
    /// Name of the tank currently holding this batch. Set exactly while
    /// `current_stage` is fermenting or conditioning.
    pub tank: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub beer: String,
    pub bottles: u32,
    pub due: NaiveDate,
}

/// Per-stage batch queues, finished-goods tally, and the order backlog.
///
/// A batch id appears in exactly one stage queue, or in none once finished.
/// The brewing queue never holds more than one batch — the brewing line is a
/// capacity-1 resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessLedger {
    pub batches: HashMap<BatchId, Batch>,
    /// FIFO queue of batch ids per tracked stage, indexed by `Stage`.
    pub(crate) queues: [Vec<BatchId>; Stage::TRACKED],
    /// Accumulated finished volume in litres, keyed by beer name.
    pub finished: HashMap<String, f64>,
    pub orders: Vec<Order>,
}

/// The whole mutable brewhouse: ledger plus tank pool plus id counters.
///
/// Explicitly constructed and passed `&mut` into every operation; whatever
/// lock serialises mutations is owned by the hosting application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrewState {
    pub ledger: ProcessLedger,
    pub registry: TankRegistry,
    pub counters: Counters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_batch_id: u64,
    pub next_order_id: u64,
    pub next_event_id: u64,
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub at: DateTime<Utc>,
    pub event: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchStarted {
        batch_id: BatchId,
        beer: String,
        volume_litres: u32,
        stage: Stage,
    },
    StageAdvanced {
        batch_id: BatchId,
        from: Stage,
        to: Stage,
    },
    /// The brewing line was occupied; the batch stayed where it was.
    AdvanceHeld {
        batch_id: BatchId,
        stage: Stage,
    },
    TankAssigned {
        batch_id: BatchId,
        tank: String,
    },
    TankReleased {
        batch_id: BatchId,
        tank: String,
    },
    /// No suitable tank; the batch went back to the waiting queue.
    SentToWaiting {
        batch_id: BatchId,
        wanted: Stage,
    },
    BatchFinished {
        batch_id: BatchId,
        beer: String,
        volume_litres: u32,
    },
    OrderPlaced {
        order_id: OrderId,
        beer: String,
        bottles: u32,
    },
    OrderFulfilled {
        order_id: OrderId,
        beer: String,
        bottles: u32,
    },
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankDef {
    pub name: String,
    pub capacity_litres: u32,
    pub duty: TankDuty,
}

impl TankDef {
    pub fn new(name: &str, capacity_litres: u32, duty: TankDuty) -> Self {
        TankDef {
            name: name.to_string(),
            capacity_litres,
            duty,
        }
    }
}

/// Operational knobs. Loaded from a settings file by `brew_world`; the
/// defaults reproduce the brewhouse this system was built for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub brewing_dwell_hours: i64,
    pub fermenting_dwell_days: i64,
    pub conditioning_dwell_days: i64,
    /// Bottling throughput: expected hours per litre of batch volume.
    pub bottling_hours_per_litre: i64,
    pub litres_per_bottle: f64,
    pub max_batch_volume_litres: u32,
    pub autosave_interval_secs: u64,
    /// How far ahead the next-brew suggestion looks.
    pub suggestion_lead_weeks: i64,
    pub suggestion_window_days: i64,
    /// In-flight volume is discounted from demand at this multiple.
    pub suggestion_inflight_factor: f64,
    /// Fraction of residual demand a suggested brew should cover.
    pub suggestion_demand_fraction: f64,
    pub suggestion_round_to_litres: u32,
    pub suggestion_min_volume_litres: u32,
    /// A fermenter at least this large must be free before suggesting.
    pub suggestion_fermenter_floor_litres: u32,
    pub tanks: Vec<TankDef>,
    /// Stand-in demand table for the forecast collaborator, bottles per week.
    pub weekly_demand_bottles: HashMap<String, f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            brewing_dwell_hours: 180,
            fermenting_dwell_days: 28,
            conditioning_dwell_days: 14,
            bottling_hours_per_litre: 1,
            litres_per_bottle: 0.5,
            max_batch_volume_litres: 1000,
            autosave_interval_secs: 120,
            suggestion_lead_weeks: 10,
            suggestion_window_days: 42,
            suggestion_inflight_factor: 2.0,
            suggestion_demand_fraction: 0.5,
            suggestion_round_to_litres: 10,
            suggestion_min_volume_litres: 10,
            suggestion_fermenter_floor_litres: 800,
            tanks: vec![
                TankDef::new("Albert", 1000, TankDuty::Both),
                TankDef::new("Brigadier", 800, TankDuty::Both),
                TankDef::new("Camilla", 1000, TankDuty::Both),
                TankDef::new("Dylon", 800, TankDuty::Both),
                TankDef::new("Emily", 1000, TankDuty::Both),
                TankDef::new("Florence", 800, TankDuty::Both),
                TankDef::new("Gertrude", 680, TankDuty::Conditioner),
                TankDef::new("Harry", 680, TankDuty::Conditioner),
                TankDef::new("R2D2", 800, TankDuty::Fermenter),
            ],
            weekly_demand_bottles: HashMap::from([
                ("Organic Red Helles".to_string(), 240.0),
                ("Organic Pilsner".to_string(), 320.0),
                ("Organic Dunkel".to_string(), 160.0),
            ]),
        }
    }
}
