use std::sync::Arc;
use std::time::Instant;

use actix_web::dev::{Server, Service};
use actix_web::{web, App, HttpServer};
use kameo::actor::ActorRef;

use super::handlers;
use crate::health::HealthMonitorActor;
use crate::metrics::Metrics;
use crate::pipeline::OrderQueryService;

/// Everything the handlers need, shared across workers.
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<OrderQueryService>,
    pub metrics: Arc<Metrics>,
    pub health: ActorRef<HealthMonitorActor>,
}

pub(super) fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::from(state.query.clone()))
        .app_data(web::Data::from(state.metrics.clone()))
        .app_data(web::Data::new(state.health.clone()))
        .route("/order/{order_uid}", web::get().to(handlers::get_order))
        .route("/metrics", web::get().to(handlers::metrics))
        .route("/health", web::get().to(handlers::health));
}

/// Bind the HTTP server. The returned `Server` is not yet polled; the caller
/// awaits it and keeps its handle for graceful stop.
pub fn build_server(state: AppState, host: &str, port: u16) -> std::io::Result<Server> {
    tracing::info!("🌐 Starting HTTP server on http://{}:{}", host, port);

    let server = HttpServer::new(move || {
        let metrics = state.metrics.clone();
        let state = state.clone();

        App::new()
            .wrap_fn(move |req, srv| {
                let metrics = metrics.clone();
                let method = req.method().to_string();
                let started = Instant::now();
                let response = srv.call(req);

                async move {
                    let response = response.await?;
                    let path = response
                        .request()
                        .match_pattern()
                        .unwrap_or_else(|| "unmatched".to_string());
                    metrics.record_http_request(
                        &method,
                        &path,
                        response.status().as_u16(),
                        started.elapsed().as_secs_f64(),
                    );
                    Ok(response)
                }
            })
            .configure(|cfg| configure(cfg, &state))
    })
    .bind((host, port))?
    .disable_signals()
    .run();

    Ok(server)
}
