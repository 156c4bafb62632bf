use actix_web::{web, App, HttpServer};

use crate::config::ServerConfig;
use super::{configure, AppState};

/// Start the HTTP server and run until shutdown
pub async fn start_server(state: web::Data<AppState>, config: &ServerConfig) -> std::io::Result<()> {
    tracing::info!(
        "🌐 Starting order service on http://{}:{}",
        config.host,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
