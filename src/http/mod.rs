use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::diagnostics::fields;
use crate::domain::order::{
    CreateOrder, OrderAnalyticsService, OrderQuery, OrderStatus, OrdersService, UpdateOrder,
};
use crate::envelope::{ErrorKind, ResultEnvelope};
use crate::metrics::Metrics;

mod server;

pub use server::start_server;

// ============================================================================
// HTTP Adapter
// ============================================================================
//
// Thin translation between actix-web and the services. Handlers never
// inspect order data themselves; the envelope decides the status code.
//
// ============================================================================

pub struct AppState {
    pub analytics: OrderAnalyticsService,
    pub orders: OrdersService,
    pub metrics: Arc<Metrics>,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Database => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serialize an envelope with `on_success` or the status of its failure kind
pub fn respond<T: Serialize>(envelope: &ResultEnvelope<T>, on_success: StatusCode) -> HttpResponse {
    let status = envelope.error_kind().map(status_for).unwrap_or(on_success);
    HttpResponse::build(status).json(envelope)
}

fn bad_body(error: serde_json::Error) -> HttpResponse {
    let envelope: ResultEnvelope<()> = ResultEnvelope::failure(
        ErrorKind::InvalidInput,
        "Request body is not valid JSON",
        fields([("error", json!(error.to_string()))]),
    );
    respond(&envelope, StatusCode::OK)
}

/// Empty body means the caller supplied no collection at all
fn parse_collection(body: &[u8]) -> Result<Option<Value>, HttpResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(bad_body)
}

/// Syntax errors are bad input; well-formed JSON of the wrong shape is a
/// validation failure naming the offending field
fn parse_command<T: DeserializeOwned>(body: &[u8]) -> Result<T, HttpResponse> {
    let value: Value = serde_json::from_slice(body).map_err(bad_body)?;
    serde_json::from_value(value).map_err(|error| {
        let envelope: ResultEnvelope<()> = ResultEnvelope::failure(
            ErrorKind::Validation,
            format!("Validation failed: {}", error),
            fields([("error", json!(error.to_string()))]),
        );
        respond(&envelope, StatusCode::OK)
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "order-guard"
    }))
}

async fn metrics_handler(state: web::Data<AppState>) -> HttpResponse {
    match state.metrics.render() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Report {
    Totals,
    Statistics,
    Breakdown,
    Extended,
}

impl Report {
    fn operation(self) -> &'static str {
        match self {
            Report::Totals => "totals",
            Report::Statistics => "statistics",
            Report::Breakdown => "breakdown",
            Report::Extended => "extended",
        }
    }

    fn run(self, analytics: &OrderAnalyticsService, orders: Option<&Value>) -> HttpResponse {
        match self {
            Report::Totals => respond(&analytics.calculate_order_totals(orders), StatusCode::OK),
            Report::Statistics => respond(&analytics.get_order_statistics(orders), StatusCode::OK),
            Report::Breakdown => respond(&analytics.get_calculation_breakdown(orders), StatusCode::OK),
            Report::Extended => respond(&analytics.get_extended_statistics(orders), StatusCode::OK),
        }
    }
}

/// Analyse the stored collection
async fn stored_report(state: &AppState, report: Report) -> HttpResponse {
    match state.orders.load_collection::<()>(report.operation()).await {
        Ok(raw) => report.run(&state.analytics, raw.as_ref()),
        Err(envelope) => respond(&envelope, StatusCode::OK),
    }
}

/// Analyse the request body
fn posted_report(state: &AppState, report: Report, body: &[u8]) -> HttpResponse {
    match parse_collection(body) {
        Ok(raw) => report.run(&state.analytics, raw.as_ref()),
        Err(response) => response,
    }
}

async fn stored_totals(state: web::Data<AppState>) -> HttpResponse {
    stored_report(&state, Report::Totals).await
}

async fn stored_statistics(state: web::Data<AppState>) -> HttpResponse {
    stored_report(&state, Report::Statistics).await
}

async fn stored_breakdown(state: web::Data<AppState>) -> HttpResponse {
    stored_report(&state, Report::Breakdown).await
}

async fn stored_extended(state: web::Data<AppState>) -> HttpResponse {
    stored_report(&state, Report::Extended).await
}

async fn posted_totals(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    posted_report(&state, Report::Totals, &body)
}

async fn posted_statistics(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    posted_report(&state, Report::Statistics, &body)
}

async fn posted_breakdown(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    posted_report(&state, Report::Breakdown, &body)
}

async fn posted_extended(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    posted_report(&state, Report::Extended, &body)
}

#[derive(Debug, Deserialize)]
struct OrdersParams {
    customer_id: Option<String>,
    status: Option<String>,
}

async fn list_orders(state: web::Data<AppState>, params: web::Query<OrdersParams>) -> HttpResponse {
    let params = params.into_inner();

    let status = match params.status.as_deref().map(|raw| (raw, OrderStatus::parse(raw))) {
        None => None,
        Some((_, Some(status))) => Some(status),
        Some((raw, None)) => {
            let envelope: ResultEnvelope<()> = ResultEnvelope::failure(
                ErrorKind::InvalidInput,
                "Invalid status filter",
                fields([("status", json!(raw))]),
            );
            return respond(&envelope, StatusCode::OK);
        }
    };

    let query = OrderQuery {
        customer_id: params.customer_id,
        status,
    };
    respond(&state.orders.get_orders(query).await, StatusCode::OK)
}

async fn order_stats(state: web::Data<AppState>) -> HttpResponse {
    respond(&state.orders.get_order_stats().await, StatusCode::OK)
}

async fn get_order(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    respond(&state.orders.get_order_by_id(&id).await, StatusCode::OK)
}

async fn create_order(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    match parse_command::<CreateOrder>(&body) {
        Ok(command) => respond(&state.orders.create_order(command).await, StatusCode::CREATED),
        Err(response) => response,
    }
}

async fn update_order(state: web::Data<AppState>, id: web::Path<String>, body: web::Bytes) -> HttpResponse {
    match parse_command::<UpdateOrder>(&body) {
        Ok(command) => respond(&state.orders.update_order(&id, command).await, StatusCode::OK),
        Err(response) => response,
    }
}

async fn delete_order(state: web::Data<AppState>, id: web::Path<String>) -> HttpResponse {
    respond(&state.orders.delete_order(&id).await, StatusCode::OK)
}

/// Route table shared by the server and the tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/analytics/totals", web::get().to(stored_totals))
        .route("/analytics/totals", web::post().to(posted_totals))
        .route("/analytics/statistics", web::get().to(stored_statistics))
        .route("/analytics/statistics", web::post().to(posted_statistics))
        .route("/analytics/breakdown", web::get().to(stored_breakdown))
        .route("/analytics/breakdown", web::post().to(posted_breakdown))
        .route("/analytics/extended", web::get().to(stored_extended))
        .route("/analytics/extended", web::post().to(posted_extended))
        .route("/orders", web::get().to(list_orders))
        .route("/orders", web::post().to(create_order))
        .route("/orders/stats", web::get().to(order_stats))
        .route("/orders/{id}", web::get().to(get_order))
        .route("/orders/{id}", web::patch().to(update_order))
        .route("/orders/{id}", web::delete().to(delete_order));
}

// ============================================================================
// Unit Tests
// ============================================================================
