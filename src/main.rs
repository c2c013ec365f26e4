mod config;
mod protocol;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::config::Config;
use crate::services::directory::HttpDirectory;
use crate::services::projects::HttpProjectStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    let projects = HttpProjectStore::new(&config.upstream).expect("project store init failed");
    // One upstream client serves both lookup and token verification.
    let directory = Arc::new(HttpDirectory::new(&config.upstream).expect("directory init failed"));
    let state = state::AppState::new(Arc::new(projects), directory.clone(), directory);

    // Spawn background room eviction task.
    let _sweeper = services::room::spawn_room_sweeper(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "sketchrelay listening");
    axum::serve(listener, app).await.expect("server failed");
}
