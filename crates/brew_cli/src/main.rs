use std::path::PathBuf;

use anyhow::Result;
use brew_control::{suggest_next_brew, tank_options, TableForecast};
use brew_core::{
    advance, batch_status_lines, due_for_advancement, fulfill_order, new_batch, place_order,
    tank_status_lines, BatchId, BrewState, Event, OrderId, Settings, Stage,
};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "brew_cli", about = "Brewhouse production pipeline CLI")]
struct Cli {
    /// Snapshot file shared with the daemon.
    #[arg(long, default_value = "brewhouse_state.json")]
    state_file: PathBuf,
    /// Settings file. Built-in defaults are used when not given.
    #[arg(long)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every tracked batch, occupied tank, bottled stock, and order.
    Status,
    /// List tanks with duty and occupancy.
    Tanks,
    /// Start a new batch.
    AddBatch {
        #[arg(long)]
        beer: String,
        /// Batch volume in litres.
        #[arg(long)]
        volume: u32,
    },
    /// Move a batch to its next stage.
    Advance {
        batch_id: String,
        /// Tank name or picker label, when the next stage needs one.
        #[arg(long)]
        tank: Option<String>,
    },
    /// List batches overdue in their current stage.
    Due,
    /// Recommend the next brew from the demand forecast.
    Suggest,
    /// Queue a customer order.
    PlaceOrder {
        #[arg(long)]
        beer: String,
        #[arg(long)]
        bottles: u32,
        /// Due date, YYYY-MM-DD.
        #[arg(long)]
        due: NaiveDate,
    },
    /// Deliver an order out of finished stock.
    Fulfill { order_id: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => brew_world::load_settings(path)?,
        None => Settings::default(),
    };
    let mut state = match brew_world::load_state(&cli.state_file) {
        Ok(Some(state)) => state,
        Ok(None) => brew_world::build_initial_state(&settings),
        Err(err) => {
            eprintln!("snapshot unreadable ({err:#}); starting fresh");
            brew_world::build_initial_state(&settings)
        }
    };

    let mutated = match cli.command {
        Commands::Status => {
            print_status(&state, &settings);
            false
        }
        Commands::Tanks => {
            print_tanks(&state);
            false
        }
        Commands::Due => {
            print_due(&state, &settings);
            false
        }
        Commands::Suggest => {
            print_suggestion(&state, &settings);
            false
        }
        Commands::AddBatch { beer, volume } => {
            run_add_batch(&mut state, &settings, &beer, volume)?;
            true
        }
        Commands::Advance { batch_id, tank } => {
            run_advance(&mut state, &batch_id, tank.as_deref())?;
            true
        }
        Commands::PlaceOrder { beer, bottles, due } => {
            run_place_order(&mut state, &beer, bottles, due)?;
            true
        }
        Commands::Fulfill { order_id } => {
            run_fulfill(&mut state, &settings, &order_id)?;
            true
        }
    };

    if mutated {
        brew_world::save_state(&cli.state_file, &state)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read-only commands
// ---------------------------------------------------------------------------

fn print_status(state: &BrewState, settings: &Settings) {
    let now = Utc::now();
    println!("Batches:");
    for (id, line) in batch_status_lines(state, now) {
        println!("  [{id}] {line}");
    }
    println!("Tanks:");
    for line in tank_status_lines(state) {
        println!("  {line}");
    }
    println!("Bottled and ready:");
    let mut bottled: Vec<_> = state.ledger.finished.iter().collect();
    bottled.sort_by(|a, b| a.0.cmp(b.0));
    for (beer, litres) in bottled {
        #[allow(clippy::cast_possible_truncation)]
        let bottles = (litres / settings.litres_per_bottle).floor() as i64;
        println!("  {bottles} bottles of {beer}");
    }
    println!("Orders:");
    for order in &state.ledger.orders {
        println!(
            "  [{}] {} bottles of {} due {}",
            order.id,
            order.bottles,
            order.beer,
            order.due.format("%d/%m/%Y"),
        );
    }
}

fn print_tanks(state: &BrewState) {
    for tank in state.registry.tanks() {
        let occupancy = match &tank.occupant {
            Some(batch_id) => format!("occupied by {batch_id}"),
            None => "free".to_string(),
        };
        println!("{} ({:?}): {occupancy}", tank.pick_label(), tank.duty);
    }
}

fn print_due(state: &BrewState, settings: &Settings) {
    let due = due_for_advancement(state, settings, Utc::now());
    if due.is_empty() {
        println!("nothing is overdue");
        return;
    }
    for id in due {
        if let Some(batch) = state.ledger.batches.get(&id) {
            println!(
                "[{id}] {} is done {} and ready for {}",
                batch.beer,
                batch.current_stage.label(),
                batch.next_stage.label(),
            );
        }
    }
}

fn print_suggestion(state: &BrewState, settings: &Settings) {
    let forecast = TableForecast::new(settings.weekly_demand_bottles.clone());
    match suggest_next_brew(state, settings, &forecast, Utc::now().date_naive()) {
        Some(suggestion) => println!(
            "start brewing {} L of {}",
            suggestion.volume_litres, suggestion.beer,
        ),
        None => println!("no brew suggested right now"),
    }
}

// ---------------------------------------------------------------------------
// Mutating commands
// ---------------------------------------------------------------------------

fn run_add_batch(
    state: &mut BrewState,
    settings: &Settings,
    beer: &str,
    volume: u32,
) -> Result<()> {
    let id = new_batch(state, settings, beer, volume, Utc::now(), &mut Vec::new())?;
    let stage = state.ledger.batches[&id].current_stage;
    println!("[{id}] {volume} L of {beer}: {}", stage.label());
    Ok(())
}

fn run_advance(state: &mut BrewState, batch_id: &str, tank: Option<&str>) -> Result<()> {
    let id = BatchId(batch_id.to_string());
    let mut events = Vec::new();
    let landed = advance(state, &id, tank, Utc::now(), &mut events)?;

    for envelope in &events {
        match &envelope.event {
            Event::AdvanceHeld { .. } => println!("brewing line is busy; batch stays put"),
            Event::TankReleased { tank, .. } => println!("released {tank}"),
            Event::TankAssigned { tank, .. } => println!("assigned to {tank}"),
            Event::SentToWaiting { wanted, .. } => {
                println!("no tank claimed; back to waiting, still headed for {}", wanted.label());
            }
            Event::BatchFinished {
                beer,
                volume_litres,
                ..
            } => println!("finished: {volume_litres} L of {beer} added to stock"),
            _ => {}
        }
    }
    println!("[{id}] now {}", landed.label());

    // A batch parked on a missing tank: show what could take it.
    if let Some(batch) = state.ledger.batches.get(&id) {
        if batch.current_stage == Stage::Waiting && batch.next_stage.requires_tank() {
            let options = tank_options(state, batch);
            if options.is_empty() {
                println!("no suitable tank is free for {}", batch.next_stage.label());
            } else {
                println!("tanks available for {}:", batch.next_stage.label());
                for tank in options {
                    println!("  {}", tank.pick_label());
                }
            }
        }
    }
    Ok(())
}

fn run_place_order(state: &mut BrewState, beer: &str, bottles: u32, due: NaiveDate) -> Result<()> {
    let id = place_order(state, beer, bottles, due, Utc::now(), &mut Vec::new())?;
    println!("[{id}] {bottles} bottles of {beer} due {}", due.format("%d/%m/%Y"));
    Ok(())
}

fn run_fulfill(state: &mut BrewState, settings: &Settings, order_id: &str) -> Result<()> {
    let id = OrderId(order_id.to_string());
    fulfill_order(state, settings, &id, Utc::now(), &mut Vec::new())?;
    println!("[{id}] delivered");
    Ok(())
}
