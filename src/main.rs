use std::sync::Arc;

use jamlink::core::Config;
use jamlink::{AppState, create_router, sync};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Inizializza il logging strutturato (filtrabile via RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jamlink=info,tower_http=warn")),
        )
        .init();

    // Carica la configurazione
    let config = Config::from_env()?;
    config.print_info();

    // Stato condiviso: repository sul document store, sessioni e topic
    let state = Arc::new(AppState::new(config.jwt_secret.clone()));

    // Bridge dal feed di modifiche dello store ai canali per entità
    tokio::spawn(sync::bridge::run(state.clone()));

    // Crea il router
    let app = create_router(state).layer(CorsLayer::permissive());

    // Avvia il server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
