use actix_web::{web, HttpResponse, Responder};
use kameo::actor::ActorRef;
use prometheus::{Encoder, TextEncoder};

use crate::health::{GetSystemHealth, HealthMonitorActor, DATABASE, KAFKA};
use crate::metrics::Metrics;
use crate::pipeline::OrderQueryService;

pub(super) async fn get_order(
    path: web::Path<String>,
    query: web::Data<OrderQueryService>,
) -> impl Responder {
    let order_uid = path.into_inner();

    match query.get_order(&order_uid).await {
        Ok(Some(order)) => HttpResponse::Ok().json(order),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "order not found",
            "order_uid": order_uid,
        })),
        Err(e) => {
            tracing::error!(order_uid = %order_uid, error = %e, "Order lookup failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal error",
            }))
        }
    }
}

pub(super) async fn metrics(metrics: web::Data<Metrics>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

pub(super) async fn health(monitor: web::Data<ActorRef<HealthMonitorActor>>) -> impl Responder {
    let (database, kafka) = match monitor.ask(GetSystemHealth).await {
        Ok(health) => (health.is_up(DATABASE), health.is_up(KAFKA)),
        Err(_) => {
            tracing::warn!("Health monitor unreachable");
            (false, false)
        }
    };

    let body = serde_json::json!({ "database": database, "kafka": kafka });
    if database && kafka {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
