use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kameo::actor::ActorRef;
use kameo::error::Infallible;
use kameo::message::{Context, Message};
use kameo::reply::{Reply, ReplyError};
use kameo::Actor;

use super::status::{ComponentHealth, HealthStatus};

// ============================================================================
// Health Monitor Actor
// ============================================================================
//
// Holds the last reported status of every dependency and aggregates them:
// - any component Unhealthy -> Unhealthy (names listed)
// - otherwise any Degraded  -> Degraded
// - otherwise               -> Healthy
//
// Reports arrive from the HealthChecker task; readers ask for a snapshot.
//
// ============================================================================

#[derive(Debug)]
pub struct UpdateHealth {
    pub component: String,
    pub status: HealthStatus,
}

#[derive(Debug)]
pub struct GetSystemHealth;

#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
    pub check_time: DateTime<Utc>,
}

impl SystemHealth {
    /// A component nobody has reported on yet counts as down.
    pub fn is_up(&self, component: &str) -> bool {
        self.components
            .get(component)
            .is_some_and(|health| health.status.is_healthy())
    }
}

impl Reply for SystemHealth {
    type Ok = Self;
    type Error = Infallible;
    type Value = Self;

    fn to_result(self) -> Result<Self, Infallible> {
        Ok(self)
    }

    fn into_any_err(self) -> Option<Box<dyn ReplyError>> {
        None
    }

    fn into_value(self) -> Self::Value {
        self
    }
}

#[derive(Default)]
pub struct HealthMonitorActor {
    components: HashMap<String, ComponentHealth>,
}

impl HealthMonitorActor {
    pub fn new() -> Self {
        Self::default()
    }

    fn compute_overall_status(&self) -> HealthStatus {
        let mut has_degraded = false;
        let mut unhealthy_components: Vec<String> = self
            .components
            .iter()
            .filter_map(|(name, health)| match &health.status {
                HealthStatus::Unhealthy(msg) => Some(format!("{name}: {msg}")),
                HealthStatus::Degraded(_) => {
                    has_degraded = true;
                    None
                }
                HealthStatus::Healthy => None,
            })
            .collect();
        unhealthy_components.sort();

        if !unhealthy_components.is_empty() {
            HealthStatus::Unhealthy(unhealthy_components.join(", "))
        } else if has_degraded {
            HealthStatus::Degraded("Some components degraded".to_string())
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Actor for HealthMonitorActor {
    type Args = Self;
    type Error = Infallible;

    async fn on_start(state: Self::Args, _actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        tracing::info!("HealthMonitorActor started");
        Ok(state)
    }
}

impl Message<UpdateHealth> for HealthMonitorActor {
    type Reply = ();

    async fn handle(
        &mut self,
        msg: UpdateHealth,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        let previous = self
            .components
            .get(&msg.component)
            .map(|health| health.status.clone());

        if previous.as_ref() != Some(&msg.status) {
            if msg.status.is_healthy() {
                tracing::info!(component = %msg.component, "Component healthy");
            } else {
                tracing::warn!(component = %msg.component, status = ?msg.status, "Component not healthy");
            }
        }

        self.components.insert(
            msg.component.clone(),
            ComponentHealth::new(msg.component, msg.status),
        );
    }
}

impl Message<GetSystemHealth> for HealthMonitorActor {
    type Reply = SystemHealth;

    async fn handle(
        &mut self,
        _msg: GetSystemHealth,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        SystemHealth {
            overall_status: self.compute_overall_status(),
            components: self.components.clone(),
            check_time: Utc::now(),
        }
    }
}
