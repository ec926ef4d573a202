use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use brew_control::TableForecast;
use brew_core::Settings;
use clap::Parser;
use parking_lot::Mutex;
use tokio::sync::broadcast;

mod autosave;
mod routes;
mod state;

use state::{AppState, Brewhouse};

#[derive(Parser)]
#[command(name = "brew_daemon", about = "Brewhouse production pipeline daemon")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,
    /// Snapshot file; created on the first save if absent.
    #[arg(long, default_value = "brewhouse_state.json")]
    state_file: PathBuf,
    /// Settings file. Built-in defaults are used when not given.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Allowed CORS origin for the dashboard.
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => brew_world::load_settings(path)?,
        None => Settings::default(),
    };

    let state = match brew_world::load_state(&args.state_file) {
        Ok(Some(state)) => {
            tracing::info!("loaded snapshot from {}", args.state_file.display());
            state
        }
        Ok(None) => {
            tracing::info!("no snapshot found; starting fresh");
            brew_world::build_initial_state(&settings)
        }
        Err(err) => {
            tracing::warn!("snapshot unreadable ({err:#}); starting fresh");
            brew_world::build_initial_state(&settings)
        }
    };

    let forecast = TableForecast::new(settings.weekly_demand_bottles.clone());
    let (event_tx, _) = broadcast::channel(256);
    let app_state = AppState {
        brew: Arc::new(Mutex::new(Brewhouse {
            state,
            settings: settings.clone(),
            forecast,
        })),
        event_tx,
        state_path: Arc::new(args.state_file.clone()),
    };

    tokio::spawn(autosave::run_autosave_loop(
        app_state.clone(),
        settings.autosave_interval_secs,
    ));

    let router = routes::make_router_with_cors(app_state, &args.cors_origin);
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    tracing::info!("listening on {}", args.listen);
    axum::serve(listener, router).await.context("serving")?;
    Ok(())
}
