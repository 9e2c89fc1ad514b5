//! Process-wide counters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub message_count: u64,
    pub command_count: u64,
    pub error_count: u64,
    pub expense_count: u64,
    /// Conversations started since boot; evictions do not lower it.
    pub active_users: u64,
    pub last_update_time: DateTime<Utc>,
}

pub struct Metrics {
    inner: Mutex<MetricsSnapshot>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot {
                message_count: 0,
                command_count: 0,
                error_count: 0,
                expense_count: 0,
                active_users: 0,
                last_update_time: Utc::now(),
            }),
        }
    }

    fn record(&self, f: impl FnOnce(&mut MetricsSnapshot)) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner);
        inner.last_update_time = Utc::now();
    }

    pub fn record_message(&self) {
        self.record(|m| m.message_count += 1);
    }

    pub fn record_command(&self) {
        self.record(|m| m.command_count += 1);
    }

    pub fn record_error(&self) {
        self.record(|m| m.error_count += 1);
    }

    pub fn record_expense(&self) {
        self.record(|m| m.expense_count += 1);
    }

    pub fn record_active_user(&self) {
        self.record(|m| m.active_users += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
