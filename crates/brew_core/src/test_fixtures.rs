//! Shared test fixtures for brew_core and downstream crates.
//!
//! `base_settings()` is the production default set; `two_tank_state()` is
//! the minimal fermenter/conditioner pair most transition tests drive;
//! `t0()` is a fixed "now" so elapsed-time assertions stay deterministic.

use chrono::{DateTime, TimeZone, Utc};

use crate::{BrewState, Counters, ProcessLedger, Settings, Tank, TankDuty, TankRegistry};

/// Fixed reference instant.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 3, 2, 9, 0, 0).unwrap()
}

pub fn base_settings() -> Settings {
    Settings::default()
}

pub fn tank(name: &str, capacity_litres: u32, duty: TankDuty) -> Tank {
    Tank {
        name: name.to_string(),
        capacity_litres,
        duty,
        occupant: None,
    }
}

pub fn state_with_tanks(tanks: Vec<Tank>) -> BrewState {
    BrewState {
        ledger: ProcessLedger::new(),
        registry: TankRegistry::new(tanks),
        counters: Counters::default(),
    }
}

/// One 1000 L fermenter "A" and one 680 L conditioner "B".
pub fn two_tank_state() -> BrewState {
    state_with_tanks(vec![
        tank("A", 1000, TankDuty::Fermenter),
        tank("B", 680, TankDuty::Conditioner),
    ])
}
