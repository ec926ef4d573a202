use std::path::PathBuf;
use std::sync::Arc;

use brew_control::TableForecast;
use brew_core::{BrewState, EventEnvelope, Settings};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Everything behind the single mutation lock. Every handler that writes
/// takes the lock for the whole read-modify-write, so an `advance` and its
/// tank bookkeeping are atomic with respect to any other request.
pub struct Brewhouse {
    pub state: BrewState,
    pub settings: Settings,
    pub forecast: TableForecast,
}

pub type SharedBrew = Arc<Mutex<Brewhouse>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;

#[derive(Clone)]
pub struct AppState {
    pub brew: SharedBrew,
    pub event_tx: EventTx,
    pub state_path: Arc<PathBuf>,
}
