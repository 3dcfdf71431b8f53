//! Read-only HTTP surface over the monitor and the aggregator

use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(list_endpoints))
        .route("/commits", web::get().to(aggregated_commits))
        .route("/health", web::get().to(health_check));
}

// Endpoint statuses with their relative check times
async fn list_endpoints(data: web::Data<AppState>) -> impl Responder {
    let views = data.monitor.views().await;
    debug!("Returning status of {} endpoints", views.len());

    HttpResponse::Ok().json(views)
}

// 7x24 commit matrix, `null` until the first aggregation
async fn aggregated_commits(data: web::Data<AppState>) -> impl Responder {
    let matrix = match &data.aggregator {
        Some(aggregator) => aggregator.matrix().await,
        None => None,
    };

    HttpResponse::Ok().json(matrix)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health_check() -> impl Responder {
    web::Json(HealthResponse {
        status: "OK".into(),
    })
}
