use std::time::Duration;

use crate::state::AppState;

/// Periodically snapshot the shared state to disk.
///
/// The copy is taken under the mutation lock, so a half-applied advance can
/// never be captured; the write happens after the lock is released. A fixed
/// interval, no back-off: a failed save just logs and waits for the next
/// tick.
pub async fn run_autosave_loop(app: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it so boot doesn't write.
    interval.tick().await;

    loop {
        interval.tick().await;
        let snapshot = app.brew.lock().state.clone();
        match brew_world::save_state(&app.state_path, &snapshot) {
            Ok(()) => tracing::debug!("state auto-saved"),
            Err(err) => tracing::error!("autosave failed: {err:#}"),
        }
    }
}
