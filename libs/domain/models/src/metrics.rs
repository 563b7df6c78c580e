use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Process-lifetime counters. Non-durable by design (Design Notes: "simple
/// atomic counters; avoid unbounded histogram structures").
#[derive(Debug, Default)]
pub struct Metrics {
    query_count: AtomicU64,
    error_count: AtomicU64,
    last_backup_time_millis: AtomicI64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub query_count: u64,
    pub error_count: u64,
    pub last_backup_time: Option<DateTime<Utc>>,
}

impl Metrics {
    pub fn record_query(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backup(&self, at: DateTime<Utc>) {
        self.last_backup_time_millis
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let millis = self.last_backup_time_millis.load(Ordering::Relaxed);
        MetricsSnapshot {
            query_count: self.query_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            last_backup_time: if millis == 0 {
                None
            } else {
                DateTime::from_timestamp_millis(millis)
            },
        }
    }
}
