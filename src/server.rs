//! HTTP API server: axum router and request handlers.
//!
//! Optional remote surface next to the physical button. The server runs on
//! the tokio async runtime while the blade runs on a plain `std::thread`;
//! button events from the API travel through the same `std::sync::mpsc`
//! channel as the ones from the GPIO classifier.
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Json`
//! - `Arc` for sharing state across async tasks
//! - `tower-http` middleware for tracing and CORS

use crate::Color;
use crate::blade::BladePhase;
use crate::controller::{self, BladeCommand, BladeStatus};
use crate::input::ButtonEvent;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Serialize;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the blade thread
    pub command_tx: Sender<BladeCommand>,
    /// Shared blade status (blade thread writes, handlers read)
    pub status: Arc<Mutex<BladeStatus>>,
    /// Configured color cycle
    pub colors: Arc<Vec<Color>>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(get_status, get_colors, post_press, post_hold),
    components(schemas(BladeStatus, BladePhase, PaletteEntry)),
    tags(
        (name = "blade", description = "Blade control endpoints"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "Lightsaber API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for the lightsaber blade controller"
    )
)]
pub struct ApiDoc;

// ── Response types ───────────────────────────────────────────────────

/// One entry of the color cycle.
#[derive(Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct PaletteEntry {
    /// Position in the cycle
    pub index: usize,
    /// RGB color array [red, green, blue]
    #[schema(value_type = Vec<u8>, example = "[255, 0, 0]")]
    pub color: Color,
    /// Whether the blade currently uses this color
    pub active: bool,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(
                    utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
                        .validator_url("none"),
                ),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/colors", get(get_colors))
        .route("/api/v1/blade/press", post(post_press))
        .route("/api/v1/blade/hold", post(post_hold))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status: return current blade state
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current blade status", body = BladeStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<BladeStatus> {
    let status = controller::lock(&state.status).clone();
    Json(status)
}

/// GET /api/v1/colors: list the color cycle
#[utoipa::path(
    get,
    path = "/api/v1/colors",
    tag = "blade",
    responses(
        (status = 200, description = "Configured colors in cycle order", body = Vec<PaletteEntry>)
    )
)]
async fn get_colors(State(state): State<AppState>) -> Json<Vec<PaletteEntry>> {
    let current = controller::lock(&state.status).color_index;
    let entries = state
        .colors
        .iter()
        .enumerate()
        .map(|(index, &color)| PaletteEntry {
            index,
            color,
            active: index == current,
        })
        .collect();
    Json(entries)
}

/// POST /api/v1/blade/press: same as a short button press
#[utoipa::path(
    post,
    path = "/api/v1/blade/press",
    tag = "blade",
    responses(
        (status = 202, description = "Press queued: ignites the blade or cycles its color"),
        (status = 500, description = "Blade thread is not running")
    )
)]
async fn post_press(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    send_button(&state, ButtonEvent::ShortPress)
}

/// POST /api/v1/blade/hold: same as holding the button
#[utoipa::path(
    post,
    path = "/api/v1/blade/hold",
    tag = "blade",
    responses(
        (status = 202, description = "Hold queued: retracts the blade"),
        (status = 500, description = "Blade thread is not running")
    )
)]
async fn post_hold(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    send_button(&state, ButtonEvent::LongHold)
}

/// Queue a button event. The blade applies its own guards, so the request
/// is accepted even if the event turns out to be a no-op.
fn send_button(state: &AppState, event: ButtonEvent) -> Result<StatusCode, (StatusCode, String)> {
    state
        .command_tx
        .send(BladeCommand::Button(event))
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Blade thread gone".to_string(),
            )
        })?;

    Ok(StatusCode::ACCEPTED)
}
