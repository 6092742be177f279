use axum::{
    Router,
    http::{HeaderValue, Method},
};
use cc_statement_tracker::api::{self, AppState};
use cc_statement_tracker::config::AppConfig;
use cc_statement_tracker::db;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();
    cc_statement_tracker::init_tracing(&config.log_filter);
    let addr = config.socket_addr()?;

    info!("Opening database {}", config.db_path.display());
    let conn = db::init_db(&config.db_path)?;
    let state = AppState::new(conn);

    // CORS setup to allow a local frontend to make requests
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:8080".parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", api::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
