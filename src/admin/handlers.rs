use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::load_balancer::BackendSnapshot;
use crate::observability::{GlobalStats, StatsSnapshot};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub algorithm: &'static str,
    pub backends: usize,
    pub eligible_backends: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let registry = state.balancer.registry();
    let eligible = registry.eligible().len();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if eligible > 0 { "operational" } else { "degraded" },
        algorithm: state.balancer.algorithm().as_str(),
        backends: registry.len(),
        eligible_backends: eligible,
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<StatsSnapshot> {
    Json(state.balancer.stats())
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendSnapshot>> {
    Json(
        state
            .balancer
            .registry()
            .all()
            .iter()
            .map(|b| b.snapshot())
            .collect(),
    )
}

pub async fn reset_stats(State(state): State<AdminState>) -> Json<GlobalStats> {
    state.balancer.reset_stats();
    Json(state.balancer.stats().global)
}
