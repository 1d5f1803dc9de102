use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use linkdir::config::{Cli, Config};
use linkdir::search::HttpSearchProvider;
use linkdir::state::AppState;
use linkdir::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    let search = Arc::new(HttpSearchProvider::from_config(config.search.clone()));

    let state = AppState {
        db: pool,
        config: config.clone(),
        search,
    };

    // Build router
    let app = Router::new()
        .route("/", get(routes::home::index))
        .route("/about", get(routes::home::about))
        .route(
            "/search",
            get(routes::search::page).post(routes::search::run),
        )
        .merge(routes::categories::router())
        .merge(routes::pages::router())
        .merge(routes::auth::router())
        .nest_service("/media", ServeDir::new(config.uploads_path()))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
