// ============================================================================
// Health Monitoring
// ============================================================================
//
// - status/  - HealthStatus, ComponentHealth
// - monitor/ - kameo actor aggregating per-component health
// - checker/ - periodic probes (database ping, broker metadata, dead-letter
//              circuit breaker) feeding the actor and the `resource_up` gauge
//
// ============================================================================

mod checker;
mod monitor;
mod status;

pub use checker::{
    BrokerProbe, DeadLetterProbe, HealthChecker, HealthProbe, StoreProbe, DATABASE, DEAD_LETTER,
    KAFKA,
};
pub use monitor::{GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth};
pub use status::{ComponentHealth, HealthStatus};
