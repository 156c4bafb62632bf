use anyhow::Context;
use actix_web::web;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_guard::config::AppConfig;
use order_guard::domain::order::{
    InMemoryOrderRepository, OrderAnalyticsService, OrdersService, RetryingRepository,
};
use order_guard::envelope::ResultEnvelope;
use order_guard::http::{start_server, AppState};
use order_guard::metrics::Metrics;
use order_guard::utils::RetryConfig;

fn load_fixtures(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Fixtures {} are not valid JSON", path.display()))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
        )
        .init();

    tracing::info!("🚀 Starting order guard");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 2. Order store ===
    let table = match &config.fixtures_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading order fixtures");
            load_fixtures(path)?
        }
        None => Value::Array(Vec::new()),
    };
    let repository = RetryingRepository::new(InMemoryOrderRepository::with_table(table), RetryConfig::default());

    // === 3. Services ===
    let analytics = OrderAnalyticsService::new(config.analytics.clone()).with_metrics(metrics.clone());
    let orders = OrdersService::new(Arc::new(repository), config.orders.clone()).with_metrics(metrics.clone());

    if let Ok(stored) = orders.load_collection::<()>("startup").await {
        match analytics.calculate_order_totals(stored.as_ref()) {
            ResultEnvelope::Success { data, meta, .. } => tracing::info!(
                orders = data.total_orders,
                revenue = data.total_revenue,
                skipped = meta.skipped_count,
                "📦 Order store ready"
            ),
            ResultEnvelope::Failure { message, .. } => {
                tracing::warn!(error = %message, "Could not summarise stored orders")
            }
        }
    }

    // === 4. HTTP ===
    let state = web::Data::new(AppState {
        analytics,
        orders,
        metrics,
    });
    start_server(state, &config.server).await?;

    tracing::info!("👋 Order guard stopped");
    Ok(())
}
