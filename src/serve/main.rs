//! HTTP service for storm-impact parcel analysis.
//!
//! `POST /analyze` takes a multipart upload (storm boundary GeoJSON
//! plus a jurisdiction key) and responds with the eligible-parcel CSV.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use palmetto::config::Config;
use palmetto::models::output;
use palmetto::pipeline;
use palmetto::PipelineError;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Uploads beyond this are rejected before parsing.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "Storm-impact parcel analysis server")]
struct Args {
    /// Listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Parcel dataset root (one subdirectory per jurisdiction)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(data_dir) = args.data_dir {
        config.global.data_dir = data_dir;
    }
    if let Some(listen) = args.listen {
        config.global.listen = listen;
    }

    info!("Palmetto Analysis Server");
    info!("Parcel data root: {}", config.global.data_dir.display());

    let listen = config.global.listen.clone();
    let state = Arc::new(AppState { config });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/jurisdictions", get(jurisdictions_handler))
        .route("/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Map pipeline failures onto the response contract: bad boundary is
/// the caller's fault, an unknown jurisdiction is a 404, everything
/// else is on us.
fn pipeline_error_response(err: &PipelineError) -> Response {
    let status = match err {
        PipelineError::InvalidBoundaryGeometry(_) => StatusCode::BAD_REQUEST,
        PipelineError::JurisdictionNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_json(status, err.to_string())
}

/// Run one analysis: multipart fields `storm` (GeoJSON file) and
/// `county` (jurisdiction key), CSV back.
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let request_id = Uuid::new_v4();

    let mut storm: Option<Vec<u8>> = None;
    let mut county: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_json(StatusCode::BAD_REQUEST, format!("bad upload: {e}")),
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "storm" => match field.bytes().await {
                Ok(bytes) => storm = Some(bytes.to_vec()),
                Err(e) => {
                    return error_json(StatusCode::BAD_REQUEST, format!("bad storm file: {e}"))
                }
            },
            "county" => match field.text().await {
                Ok(text) => county = Some(text),
                Err(e) => {
                    return error_json(StatusCode::BAD_REQUEST, format!("bad county field: {e}"))
                }
            },
            _ => {}
        }
    }

    let (Some(storm), Some(county)) = (storm, county) else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Missing storm file or county field",
        );
    };

    info!(%request_id, %county, bytes = storm.len(), "Received analysis request");

    // The pipeline is synchronous and CPU/IO bound; keep it off the
    // async workers.
    let config = state.config.clone();
    let county_for_run = county.clone();
    let joined = tokio::task::spawn_blocking(move || {
        pipeline::analyze_slice(&storm, &county_for_run, &config)
    })
    .await;

    let rows = match joined {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            error!(%request_id, %county, "Analysis failed: {e}");
            return pipeline_error_response(&e);
        }
        Err(e) => {
            error!(%request_id, "Analysis task panicked: {e}");
            return error_json(StatusCode::INTERNAL_SERVER_ERROR, "analysis task failed");
        }
    };

    info!(%request_id, %county, rows = rows.len(), "Returning final CSV");

    match output::write_csv(&rows) {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "inline"),
            ],
            csv,
        )
            .into_response(),
        Err(e) => {
            error!(%request_id, "CSV conversion failed: {e}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "CSV conversion failed")
        }
    }
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Jurisdictions with a parcel dataset on this server.
async fn jurisdictions_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JurisdictionsResponse>, (StatusCode, String)> {
    let data_dir = state.config.global.data_dir.clone();
    let mut entries = tokio::fs::read_dir(&data_dir).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}: {e}", data_dir.display()),
        )
    })?;

    let mut jurisdictions = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            if let Ok(name) = entry.file_name().into_string() {
                jurisdictions.push(name);
            }
        }
    }
    jurisdictions.sort();

    Ok(Json(JurisdictionsResponse { jurisdictions }))
}

#[derive(Serialize)]
struct JurisdictionsResponse {
    jurisdictions: Vec<String>,
}
