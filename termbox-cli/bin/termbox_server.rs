use std::sync::Arc;

use axum::http::{header::CONTENT_TYPE, Method};
use clap::Parser;
use termbox_cli::{styles::CHECKMARK, ServerArgs, TermboxCliResult};
use termbox_core::config::ImageCatalog;
use termbox_server::{management, route, state::AppState};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions: Main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
pub async fn main() -> TermboxCliResult<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let args = ServerArgs::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Arc::new(args.to_config()?);

    if args.dev_mode {
        tracing::info!("Development mode: {}", args.dev_mode);
        println!(
            "{} Running in {} mode",
            &*CHECKMARK,
            console::style("development").yellow()
        );
    }

    // The server cannot do anything useful without its images
    let catalog = Arc::new(ImageCatalog::load(config.get_catalog_path()).await?);

    let runtime = config.get_runtime().connect()?;

    // Start the background jobs
    let scheduler =
        management::create_scheduler(&config, Arc::clone(&runtime), Arc::clone(&catalog))
            .start(CancellationToken::new());

    let state = AppState::new(config.clone(), runtime, catalog);

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any);

    let app = route::create_router(state).layer(cors);

    // Start server
    tracing::info!("Starting server on {}", config.get_addr());
    println!(
        "{} Server listening on {}",
        &*CHECKMARK,
        console::style(config.get_addr()).yellow()
    );

    let listener = tokio::net::TcpListener::bind(config.get_addr()).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}
