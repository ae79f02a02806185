// Crowd-aware bus API server
// Static GTFS stops/shapes, simulated stop crowding and naive single-shape routing.

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod config;
mod geo;
mod gtfs_models;
mod occupancy;
mod route_resolver;

use config::ServerConfig;
use gtfs_models::{Stop, TransitNetwork};
use occupancy::OccupancyStore;
use route_resolver::{RouteOutcome, RouteResolver, RouteResponse};

const BUSES_LIMIT: usize = 50;
const SUGGESTION_LIMIT: usize = 5;
const MIN_QUERY_CHARS: usize = 2;

#[derive(Clone)]
struct AppState {
    network: Arc<TransitNetwork>,
    occupancy: Arc<OccupancyStore>,
}

#[derive(Serialize)]
struct BusEntry<'a> {
    id: &'a str,
    number: &'a str,
    lat: f64,
    lng: f64,
    occupants: u32,
    capacity: u32,
}

#[derive(Deserialize)]
struct CrowdUpdate {
    stop_id: String,
    status: String,
}

#[derive(Deserialize)]
struct SuggestQuery {
    q: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        MessageResponse {
            message: message.into(),
        }
    }
}

// ============================================================================
// API Endpoints
// ============================================================================

async fn get_buses(state: web::Data<AppState>) -> HttpResponse {
    let mut buses = Vec::with_capacity(BUSES_LIMIT);
    for stop in state.network.stops.stops().iter().take(BUSES_LIMIT) {
        match state.occupancy.get(&stop.id) {
            Ok(record) => buses.push(BusEntry {
                id: &stop.id,
                number: &stop.name,
                lat: stop.lat,
                lng: stop.lon,
                occupants: record.occupants,
                capacity: record.capacity,
            }),
            Err(e) => {
                error!("❌ Failed to read occupancy: {}", e);
                return HttpResponse::InternalServerError()
                    .json(MessageResponse::new("Failed to retrieve buses"));
            }
        }
    }
    HttpResponse::Ok().json(buses)
}

async fn update_crowd(
    state: web::Data<AppState>,
    update: web::Json<CrowdUpdate>,
) -> HttpResponse {
    match state.occupancy.set_from_status(&update.stop_id, &update.status) {
        Ok(record) => {
            info!(
                "🚏 Crowd update for {}: '{}' -> {}/{}",
                update.stop_id, update.status, record.occupants, record.capacity
            );
            HttpResponse::Ok().json(MessageResponse::new("Crowd level updated"))
        }
        Err(e) => {
            error!("❌ Failed to update occupancy: {}", e);
            HttpResponse::InternalServerError()
                .json(MessageResponse::new("Failed to update crowd level"))
        }
    }
}

async fn suggest_stops(
    state: web::Data<AppState>,
    query: web::Query<SuggestQuery>,
) -> HttpResponse {
    let matches: Vec<&Stop> = match query.q.as_deref() {
        Some(q) if q.chars().count() >= MIN_QUERY_CHARS => {
            state.network.stops.search_by_name(q, SUGGESTION_LIMIT)
        }
        _ => Vec::new(),
    };
    HttpResponse::Ok().json(matches)
}

/// Always answers 200; failures are reported in the payload's `error` field.
async fn plan_route(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let network = state.network.clone();
    let body = body.into_inner();

    let outcome = match tokio::task::spawn_blocking(move || {
        RouteResolver::new(&network).resolve_json(&body)
    })
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("❌ Routing task panicked: {}", e);
            RouteOutcome::Failed("Routing task panicked".to_string())
        }
    };

    HttpResponse::Ok().json(RouteResponse::from(outcome))
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let tracked_stops = match state.occupancy.len() {
        Ok(n) => n,
        Err(e) => {
            error!("❌ Failed to read occupancy: {}", e);
            return HttpResponse::InternalServerError()
                .json(MessageResponse::new("Occupancy state unavailable"));
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "Crowd-aware bus API",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().timestamp(),
        "stops_loaded": state.network.stops.len(),
        "shapes_loaded": state.network.shapes.len(),
        "tracked_stops": tracked_stops
    }))
}

fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api")
            .route("/buses", web::get().to(get_buses))
            .route("/update-crowd", web::post().to(update_crowd))
            .route("/suggest", web::get().to(suggest_stops))
            .route("/route", web::post().to(plan_route)),
    );
}

// ============================================================================
// Server Setup
// ============================================================================

async fn run_server(config: ServerConfig, app_state: AppState) -> std::io::Result<()> {
    info!("🌐 Server running on: http://{}:{}", config.bind_addr, config.port);
    info!("📍 Available Routes:");
    info!("   GET  /api/buses          - Stops with simulated crowding");
    info!("   POST /api/update-crowd   - Report crowd level at a stop");
    info!("   GET  /api/suggest?q=     - Stop name autocomplete");
    info!("   POST /api/route          - Route, fares and stops to a destination");
    info!("   GET  /health             - Health check");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(configure_routes)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> std::io::Result<()> {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("⚠️  Ignoring unreadable .env file: {}", e);
        }
    }

    info!("🚀 Crowd-aware bus server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();

    info!("📡 Loading GTFS data from {}...", config.gtfs_dir.display());
    let network = TransitNetwork::load_or_empty(&config.gtfs_dir);

    let occupancy = OccupancyStore::new();
    if config.seed_occupancy {
        let ids = network.stops.stops().iter().map(|s| s.id.as_str());
        if let Err(e) = occupancy.seed_random(ids, &mut rand::rng()) {
            warn!("⚠️  Occupancy seeding failed: {}", e);
        } else {
            info!("   ✓ Seeded crowding for {} stops", network.stops.len());
        }
    }

    let app_state = AppState {
        network: Arc::new(network),
        occupancy: Arc::new(occupancy),
    };

    actix_web::rt::System::new().block_on(run_server(config, app_state))
}
