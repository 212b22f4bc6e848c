use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use campus_api::{AppState, AppStateInner};
use campus_gateway::connection;
use campus_gateway::hub::Hub;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("CAMPUS_JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.into());
    if jwt_secret == DEV_JWT_SECRET {
        warn!("CAMPUS_JWT_SECRET is unset; using the development secret");
    }
    let db_path = std::env::var("CAMPUS_DB_PATH").unwrap_or_else(|_| "campus.db".into());
    let host = std::env::var("CAMPUS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CAMPUS_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let static_dir = std::env::var("CAMPUS_STATIC_DIR").ok().map(PathBuf::from);

    // Init database
    let db = Arc::new(campus_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let hub = Hub::new(db.clone());
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let ws_route = Router::new()
        .route("/users/messages/{user_id}", get(ws_upgrade))
        .with_state(hub);

    let mut app = Router::new()
        .merge(campus_api::router(app_state))
        .merge(ws_route);

    if let Some(dir) = static_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }

    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Campus server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(hub): State<Hub>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, hub, user_id))
}
