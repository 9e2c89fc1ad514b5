//! Small HTTP surface for liveness checks and counters.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bot::MetricsSnapshot;
use crate::storage::Storage;

const INDEX: &str = "Expense Tracker Bot is running!\nHealth check: /health\nMetrics: /metrics\n";

pub type MetricsSource = Arc<dyn Fn() -> MetricsSnapshot + Send + Sync>;

pub struct HealthState {
    storage: Arc<dyn Storage>,
    metrics: MetricsSource,
    started_at: Instant,
}

impl HealthState {
    pub fn new(storage: Arc<dyn Storage>, metrics: MetricsSource) -> Self {
        Self {
            storage,
            metrics,
            started_at: Instant::now(),
        }
    }

    fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub database: &'static str,
    pub uptime_secs: u64,
}

pub fn router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// `GET /`
async fn index() -> &'static str {
    INDEX
}

/// `GET /health`: 503 while the database does not answer.
async fn health(State(s): State<Arc<HealthState>>) -> impl IntoResponse {
    let (code, status, database) = match s.storage.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            warn!("Health check failed: {:#}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };
    let body = HealthStatus {
        status,
        timestamp: Utc::now(),
        database,
        uptime_secs: s.uptime_secs(),
    };
    (code, Json(body))
}

/// `GET /metrics` in the Prometheus text format.
async fn metrics(State(s): State<Arc<HealthState>>) -> String {
    let m = (s.metrics)();
    let mut out = String::from("# Expense Tracker Bot Metrics\n");
    for (name, value) in [
        ("expensebot_uptime_seconds", s.uptime_secs()),
        ("expensebot_messages_total", m.message_count),
        ("expensebot_commands_total", m.command_count),
        ("expensebot_errors_total", m.error_count),
        ("expensebot_expenses_total", m.expense_count),
        ("expensebot_active_users", m.active_users),
    ] {
        let _ = writeln!(out, "{name} {value}");
    }
    let _ = writeln!(
        out,
        "expensebot_last_update_timestamp {}",
        m.last_update_time.timestamp()
    );
    out
}

/// Bind `addr` and serve in the background. Abort the handle to stop.
pub async fn spawn_health_server(
    addr: &str,
    state: Arc<HealthState>,
) -> anyhow::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    info!("✅ Health server listening on {}", listener.local_addr()?);

    let app = router(state);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health server error: {:?}", e);
        }
    }))
}
