//! Settings loading, seed state, and snapshot persistence shared between
//! brew_cli and brew_daemon.

use std::path::Path;

use anyhow::{Context, Result};
use brew_core::{BrewState, Counters, ProcessLedger, Settings, Tank, TankRegistry};

/// Validates settings, panicking on any authoring error.
///
/// Catches mistakes like duplicate tank names, a zero-capacity tank, or a
/// zero bottle size that would make fulfilment meaningless.
pub fn validate_settings(settings: &Settings) {
    let mut seen = std::collections::HashSet::new();
    for tank in &settings.tanks {
        assert!(
            seen.insert(tank.name.as_str()),
            "duplicate tank name '{}'",
            tank.name,
        );
        assert!(
            tank.capacity_litres > 0,
            "tank '{}' has zero capacity",
            tank.name,
        );
        // Requested-tank resolution cuts labels at the first space.
        assert!(
            !tank.name.contains(' '),
            "tank name '{}' contains a space and would not survive a label round-trip",
            tank.name,
        );
    }
    assert!(
        settings.litres_per_bottle > 0.0,
        "litres_per_bottle must be positive",
    );
    assert!(
        settings.max_batch_volume_litres > 0,
        "max_batch_volume_litres must be positive",
    );
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let settings: Settings =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    validate_settings(&settings);
    Ok(settings)
}

/// Fresh ledger plus the configured tank pool, nothing in flight.
pub fn build_initial_state(settings: &Settings) -> BrewState {
    let tanks = settings
        .tanks
        .iter()
        .map(|def| Tank {
            name: def.name.clone(),
            capacity_litres: def.capacity_litres,
            duty: def.duty,
            occupant: None,
        })
        .collect();
    BrewState {
        ledger: ProcessLedger::new(),
        registry: TankRegistry::new(tanks),
        counters: Counters::default(),
    }
}

/// Write a whole-state snapshot. The format is the state itself as JSON; a
/// successful save round-trips every batch, tank, tally, and order exactly.
pub fn save_state(path: &Path, state: &BrewState) -> Result<()> {
    let body = serde_json::to_string_pretty(state).context("serializing state")?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Read back the last snapshot.
///
/// `Ok(None)` when no snapshot exists yet or the file is empty; `Err` when
/// one exists but cannot be read or parsed. Callers fall back to
/// `build_initial_state` either way — a bad snapshot is never fatal.
pub fn load_state(path: &Path) -> Result<Option<BrewState>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("reading {}", path.display()));
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let state =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(state))
}
