// ============================================================================
// HTTP Surface
// ============================================================================
//
//   GET /order/{order_uid}  cache-aside lookup (200 / 404 / 500)
//   GET /metrics            prometheus text exposition
//   GET /health             per-dependency reachability (200 / 503)
//
// Every request is counted and timed in `Metrics`.
//
// ============================================================================

mod handlers;
mod server;

pub use server::{build_server, AppState};
