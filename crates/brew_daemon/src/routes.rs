use crate::state::{AppState, Brewhouse};
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{
        sse::{Event, Sse},
        Json,
    },
    routing::{get, post},
    Router,
};
use brew_core::{BatchId, EventEnvelope, LedgerError, OrderId, Stage};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<axum::http::HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/meta", get(meta_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/tanks", get(tanks_handler))
        .route("/api/v1/due", get(due_handler))
        .route("/api/v1/suggestion", get(suggestion_handler))
        .route("/api/v1/batches", post(create_batch_handler))
        .route("/api/v1/batches/:id/advance", post(advance_handler))
        .route("/api/v1/batches/:id/tanks", get(batch_tanks_handler))
        .route("/api/v1/orders", get(orders_handler).post(create_order_handler))
        .route("/api/v1/orders/:id/fulfill", post(fulfill_handler))
        .route("/api/v1/save", post(save_handler))
        .route("/api/v1/stream", get(stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NewBatchRequest {
    beer: String,
    volume_litres: u32,
}

#[derive(Deserialize, Default)]
pub struct AdvanceRequest {
    /// Tank name or picker label ("Albert 1000L"); omit for tankless hops.
    tank: Option<String>,
}

#[derive(Deserialize)]
pub struct NewOrderRequest {
    beer: String,
    bottles: u32,
    due: NaiveDate,
}

fn ledger_error_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::UnknownOrder(_) => StatusCode::NOT_FOUND,
        LedgerError::InsufficientInventory { .. } => StatusCode::CONFLICT,
        LedgerError::InvalidVolume { .. } | LedgerError::InvalidQuantity => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

// ---------------------------------------------------------------------------
// Read handlers
// ---------------------------------------------------------------------------

pub async fn meta_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    let sim = app.brew.lock();
    let in_flight: serde_json::Map<String, serde_json::Value> = Stage::tracked()
        .iter()
        .map(|stage| {
            (
                stage.label().to_string(),
                sim.state.ledger.queue(*stage).len().into(),
            )
        })
        .collect();
    Json(json!({
        "batches_tracked": sim.state.ledger.batches.len(),
        "in_flight": in_flight,
        "tanks": sim.state.registry.tanks().len(),
        "tanks_occupied": sim
            .state
            .registry
            .tanks()
            .iter()
            .filter(|t| t.occupant.is_some())
            .count(),
        "orders_open": sim.state.ledger.orders.len(),
    }))
}

pub async fn snapshot_handler(
    State(app): State<AppState>,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let sim = app.brew.lock();
    match serde_json::to_string(&sim.state) {
        Ok(json) => {
            drop(sim);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                json,
            )
        }
        Err(err) => {
            tracing::error!("snapshot serialization failed: {err}");
            drop(sim);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                r#"{"error":"serialization failed"}"#.to_string(),
            )
        }
    }
}

pub async fn status_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    let sim = app.brew.lock();
    let now = Utc::now();
    let batches: Vec<serde_json::Value> = brew_core::batch_status_lines(&sim.state, now)
        .into_iter()
        .map(|(id, line)| json!({"batch_id": id.0, "line": line}))
        .collect();
    let tanks = brew_core::tank_status_lines(&sim.state);
    let mut bottled: Vec<String> = sim
        .state
        .ledger
        .finished
        .iter()
        .map(|(beer, litres)| {
            #[allow(clippy::cast_possible_truncation)]
            let bottles = (litres / sim.settings.litres_per_bottle).floor() as i64;
            format!("{bottles} bottles of {beer}")
        })
        .collect();
    bottled.sort();
    Json(json!({
        "batches": batches,
        "tanks": tanks,
        "bottled": bottled,
        "orders": sim.state.ledger.orders,
    }))
}

pub async fn tanks_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    let sim = app.brew.lock();
    let tanks: Vec<serde_json::Value> = sim
        .state
        .registry
        .tanks()
        .iter()
        .map(|tank| {
            json!({
                "name": tank.name,
                "capacity_litres": tank.capacity_litres,
                "duty": tank.duty,
                "occupant": tank.occupant,
                "label": tank.pick_label(),
            })
        })
        .collect();
    Json(json!({ "tanks": tanks }))
}

pub async fn due_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    let sim = app.brew.lock();
    let now = Utc::now();
    let due: Vec<serde_json::Value> =
        brew_core::due_for_advancement(&sim.state, &sim.settings, now)
            .into_iter()
            .filter_map(|id| {
                let batch = sim.state.ledger.batches.get(&id)?;
                Some(json!({
                    "batch_id": id.0,
                    "beer": batch.beer,
                    "stage": batch.current_stage.label(),
                    "next_stage": batch.next_stage.label(),
                }))
            })
            .collect();
    Json(json!({ "due": due }))
}

pub async fn suggestion_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    let sim = app.brew.lock();
    let today = Utc::now().date_naive();
    let suggestion =
        brew_control::suggest_next_brew(&sim.state, &sim.settings, &sim.forecast, today);
    Json(json!({ "suggestion": suggestion }))
}

pub async fn batch_tanks_handler(
    State(app): State<AppState>,
    Path(batch_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let sim = app.brew.lock();
    let Some(batch) = sim.state.ledger.batches.get(&BatchId(batch_id)) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "unknown batch"})),
        );
    };
    let options: Vec<String> = brew_control::tank_options(&sim.state, batch)
        .iter()
        .map(|tank| tank.pick_label())
        .collect();
    (StatusCode::OK, Json(json!({ "tanks": options })))
}

pub async fn orders_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    let sim = app.brew.lock();
    Json(json!({ "orders": sim.state.ledger.orders }))
}

// ---------------------------------------------------------------------------
// Mutation handlers
// ---------------------------------------------------------------------------

pub async fn create_batch_handler(
    State(app): State<AppState>,
    Json(req): Json<NewBatchRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut events = Vec::new();
    let result = {
        let mut sim = app.brew.lock();
        let Brewhouse {
            ref mut state,
            ref settings,
            ..
        } = *sim;
        brew_core::new_batch(
            state,
            settings,
            &req.beer,
            req.volume_litres,
            Utc::now(),
            &mut events,
        )
        .map(|id| {
            let stage = state.ledger.batches[&id].current_stage;
            (id, stage)
        })
    };
    publish(&app, events);
    match result {
        Ok((id, stage)) => (
            StatusCode::CREATED,
            Json(json!({"batch_id": id.0, "stage": stage.label()})),
        ),
        Err(err) => (
            ledger_error_status(&err),
            Json(json!({"error": err.to_string()})),
        ),
    }
}

pub async fn advance_handler(
    State(app): State<AppState>,
    Path(batch_id): Path<String>,
    Json(req): Json<AdvanceRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let id = BatchId(batch_id);
    let mut events = Vec::new();
    let result = {
        let mut sim = app.brew.lock();
        let Brewhouse { ref mut state, .. } = *sim;
        brew_core::advance(state, &id, req.tank.as_deref(), Utc::now(), &mut events)
    };
    publish(&app, events);
    match result {
        Ok(stage) => (
            StatusCode::OK,
            Json(json!({"batch_id": id.0, "stage": stage.label()})),
        ),
        Err(err) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": err.to_string()})),
        ),
    }
}

pub async fn create_order_handler(
    State(app): State<AppState>,
    Json(req): Json<NewOrderRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut events = Vec::new();
    let result = {
        let mut sim = app.brew.lock();
        let Brewhouse { ref mut state, .. } = *sim;
        brew_core::place_order(
            state,
            &req.beer,
            req.bottles,
            req.due,
            Utc::now(),
            &mut events,
        )
    };
    publish(&app, events);
    match result {
        Ok(id) => (StatusCode::CREATED, Json(json!({"order_id": id.0}))),
        Err(err) => (
            ledger_error_status(&err),
            Json(json!({"error": err.to_string()})),
        ),
    }
}

pub async fn fulfill_handler(
    State(app): State<AppState>,
    Path(order_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let id = OrderId(order_id);
    let mut events = Vec::new();
    let result = {
        let mut sim = app.brew.lock();
        let Brewhouse {
            ref mut state,
            ref settings,
            ..
        } = *sim;
        brew_core::fulfill_order(state, settings, &id, Utc::now(), &mut events)
    };
    publish(&app, events);
    match result {
        Ok(()) => (StatusCode::OK, Json(json!({"order_id": id.0}))),
        Err(err) => (
            ledger_error_status(&err),
            Json(json!({"error": err.to_string()})),
        ),
    }
}

pub async fn save_handler(State(app): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let snapshot = app.brew.lock().state.clone();
    match brew_world::save_state(&app.state_path, &snapshot) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"path": app.state_path.display().to_string()})),
        ),
        Err(err) => {
            tracing::error!("save failed: {err:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": format!("{err:#}")})),
            )
        }
    }
}

fn publish(app: &AppState, events: Vec<EventEnvelope>) {
    if !events.is_empty() {
        let _ = app.event_tx.send(events);
    }
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

pub async fn stream_handler(
    State(app): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = app.event_tx.subscribe();
    let brew = app.brew.clone();

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(5));
        heartbeat.tick().await; // discard the immediate first tick
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(events) if !events.is_empty() => {
                            let data = serde_json::to_string(&events).unwrap_or_default();
                            yield Ok(Event::default().data(data));
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    let tracked = brew.lock().state.ledger.batches.len();
                    let hb = json!({"heartbeat": true, "batches_tracked": tracked});
                    yield Ok(Event::default().data(hb.to_string()));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use brew_core::Settings;
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_test_state() -> AppState {
        make_test_state_at(PathBuf::from("unused_state.json"))
    }

    fn make_test_state_at(state_path: PathBuf) -> AppState {
        let settings = Settings::default();
        let state = brew_world::build_initial_state(&settings);
        let forecast = brew_control::TableForecast::new(settings.weekly_demand_bottles.clone());
        let (event_tx, _) = tokio::sync::broadcast::channel(64);
        AppState {
            brew: Arc::new(parking_lot::Mutex::new(Brewhouse {
                state,
                settings,
                forecast,
            })),
            event_tx,
            state_path: Arc::new(state_path),
        }
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_meta_returns_200() {
        let app = make_router(make_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/meta")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_meta_counts_seed_tanks() {
        let app = make_router(make_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/meta")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["tanks"], 9);
        assert_eq!(json["batches_tracked"], 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_valid_json() {
        let app = make_router(make_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/snapshot")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json.get("ledger").is_some());
        assert!(json.get("registry").is_some());
    }

    #[tokio::test]
    async fn test_create_batch_starts_brewing() {
        let state = make_test_state();
        let app = make_router(state.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/batches",
                r#"{"beer":"Organic Pilsner","volume_litres":500}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["stage"], "brewing");

        let sim = state.brew.lock();
        assert_eq!(sim.state.ledger.queue(Stage::Brewing).len(), 1);
    }

    #[tokio::test]
    async fn test_create_batch_rejects_zero_volume() {
        let app = make_router(make_test_state());
        let response = app
            .oneshot(post_json(
                "/api/v1/batches",
                r#"{"beer":"Organic Pilsner","volume_litres":0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_advance_unknown_batch_is_404() {
        let app = make_router(make_test_state());
        let response = app
            .oneshot(post_json("/api/v1/batches/batch_9999/advance", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_advance_into_tank_via_api() {
        let state = make_test_state();

        let app = make_router(state.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/batches",
                r#"{"beer":"Organic Pilsner","volume_litres":500}"#,
            ))
            .await
            .unwrap();
        let batch_id = body_json(response).await["batch_id"]
            .as_str()
            .unwrap()
            .to_string();

        let app = make_router(state.clone());
        let response = app
            .oneshot(post_json(
                &format!("/api/v1/batches/{batch_id}/advance"),
                r#"{"tank":"Albert 1000L"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["stage"], "fermenting");

        let sim = state.brew.lock();
        assert!(sim
            .state
            .registry
            .find_by_name("Albert")
            .unwrap()
            .occupant
            .is_some());
    }

    #[tokio::test]
    async fn test_fulfill_without_stock_is_409() {
        let state = make_test_state();

        let app = make_router(state.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/orders",
                r#"{"beer":"Organic Pilsner","bottles":24,"due":"2020-06-01"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let order_id = body_json(response).await["order_id"]
            .as_str()
            .unwrap()
            .to_string();

        let app = make_router(state.clone());
        let response = app
            .oneshot(post_json(
                &format!("/api/v1/orders/{order_id}/fulfill"),
                "{}",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let sim = state.brew.lock();
        assert_eq!(sim.state.ledger.orders.len(), 1, "order stays queued");
    }

    #[tokio::test]
    async fn test_status_reports_lines() {
        let state = make_test_state();

        let app = make_router(state.clone());
        app.oneshot(post_json(
            "/api/v1/batches",
            r#"{"beer":"Organic Pilsner","volume_litres":500}"#,
        ))
        .await
        .unwrap();

        let app = make_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        let line = json["batches"][0]["line"].as_str().unwrap();
        assert!(line.starts_with("500 Litres of Organic Pilsner has been brewing"));
    }

    #[tokio::test]
    async fn test_save_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = make_test_state_at(path.clone());

        let app = make_router(state);
        let response = app
            .oneshot(post_json("/api/v1/save", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let restored = brew_world::load_state(&path).unwrap();
        assert!(restored.is_some(), "snapshot readable after save");
    }

    #[tokio::test]
    async fn test_batch_tank_options_listed() {
        let state = make_test_state();

        let app = make_router(state.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/batches",
                r#"{"beer":"Organic Pilsner","volume_litres":900}"#,
            ))
            .await
            .unwrap();
        let batch_id = body_json(response).await["batch_id"]
            .as_str()
            .unwrap()
            .to_string();

        let app = make_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/batches/{batch_id}/tanks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        let tanks: Vec<&str> = json["tanks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        // 900 L fits only the 1000 L dual-duty fermenters.
        assert_eq!(tanks, ["Albert 1000L", "Camilla 1000L", "Emily 1000L"]);
    }
}
