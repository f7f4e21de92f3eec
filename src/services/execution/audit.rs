// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::sanitize::sanitize_error_message;
use crate::domain::types::{FailureKind, RouteSource};
use alloy::primitives::{B256, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Where a single attempt got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    Quoting,
    Encoding,
    Signing,
    Broadcasting,
    Confirming,
    Confirmed,
    Reverted,
    TimedOut,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptState::Confirmed | AttemptState::Reverted | AttemptState::TimedOut
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// `swap` or `approve`.
    pub operation: String,
    pub source: Option<String>,
    pub attempt: u32,
    pub state: AttemptState,
    pub success: bool,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub tx_hash: Option<B256>,
    pub gas_used: Option<u64>,
    pub block_number: Option<u64>,
    pub duration_ms: u64,
    pub expected_out: Option<U256>,
    pub min_out: Option<U256>,
    /// Expected output came from the spot-price estimate, not a quoter.
    pub low_confidence: bool,
    pub dry_run: bool,
}

/// Fields a caller fills in; sequence number and timestamp are assigned on append.
#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub operation: &'static str,
    pub source: Option<RouteSource>,
    pub attempt: u32,
    pub state: Option<AttemptState>,
    pub failure: Option<FailureKind>,
    pub error: Option<String>,
    pub tx_hash: Option<B256>,
    pub gas_used: Option<u64>,
    pub block_number: Option<u64>,
    pub duration_ms: u64,
    pub expected_out: Option<U256>,
    pub min_out: Option<U256>,
    pub low_confidence: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub attempts: u64,
    pub confirmed: u64,
    pub failed: u64,
    pub gas_used: u64,
}

/// Records kept in memory; older ones live only in the sink.
pub const DEFAULT_RETAINED_RECORDS: usize = 1024;

struct Inner {
    next_seq: u64,
    records: VecDeque<AuditRecord>,
    summary: BTreeMap<String, SourceSummary>,
}

/// Attempt log with a bounded in-memory tail, running per-source totals and
/// an optional JSON-lines file sink.
pub struct AuditLog {
    inner: Mutex<Inner>,
    sink: Option<Mutex<File>>,
    retained: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_RECORDS)
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retained: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_seq: 1,
                records: VecDeque::new(),
                summary: BTreeMap::new(),
            }),
            sink: None,
            retained: retained.max(1),
        }
    }

    /// Log that also appends each record to `path`. Sink failures are logged
    /// and never fail the swap.
    pub fn with_sink(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Some(Mutex::new(file)),
            ..Self::default()
        })
    }

    pub fn append(&self, entry: AuditEntry) -> AuditRecord {
        let state = entry.state.unwrap_or(AttemptState::Idle);
        let mut record = AuditRecord {
            seq: 0,
            timestamp: Utc::now(),
            operation: entry.operation.to_string(),
            source: entry.source.map(|s| s.to_string()),
            attempt: entry.attempt,
            state,
            success: state == AttemptState::Confirmed && entry.failure.is_none(),
            failure: entry.failure,
            error: entry.error.as_deref().map(sanitize_error_message),
            tx_hash: entry.tx_hash,
            gas_used: entry.gas_used,
            block_number: entry.block_number,
            duration_ms: entry.duration_ms,
            expected_out: entry.expected_out,
            min_out: entry.min_out,
            low_confidence: entry.low_confidence,
            dry_run: entry.dry_run,
        };
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            record.seq = inner.next_seq;
            inner.next_seq += 1;

            let totals = inner
                .summary
                .entry(record.source.clone().unwrap_or_else(|| "engine".to_string()))
                .or_default();
            totals.attempts += 1;
            if record.success {
                totals.confirmed += 1;
            } else {
                totals.failed += 1;
            }
            totals.gas_used = totals.gas_used.saturating_add(record.gas_used.unwrap_or(0));

            if inner.records.len() >= self.retained {
                inner.records.pop_front();
            }
            inner.records.push_back(record.clone());
        }
        // File IO happens outside the record lock.
        if let Some(sink) = self.sink.as_ref() {
            let written = serde_json::to_string(&record).map_err(std::io::Error::other).and_then(|line| {
                let mut file = sink.lock().unwrap_or_else(|e| e.into_inner());
                writeln!(file, "{line}")
            });
            if let Err(e) = written {
                tracing::warn!(target: "audit", error = %e, "Audit sink write failed");
            }
        }
        tracing::info!(
            target: "audit",
            seq = record.seq,
            operation = %record.operation,
            source = record.source.as_deref().unwrap_or("engine"),
            attempt = record.attempt,
            state = ?record.state,
            success = record.success,
            failure = ?record.failure,
            low_confidence = record.low_confidence,
            tx_hash = ?record.tx_hash,
            duration_ms = record.duration_ms,
            "Attempt recorded"
        );
        record
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-source counts over every record appended, including ones no longer
    /// retained in memory. Keyed by the source label (`engine` when unattributed).
    pub fn summary(&self) -> BTreeMap<String, SourceSummary> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .summary
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_sequenced_and_scrubbed() {
        let log = AuditLog::new();
        let key = format!("0x{}", "cd".repeat(32));
        log.append(AuditEntry {
            operation: "swap",
            source: Some(RouteSource::Aggregator("0x".into())),
            attempt: 1,
            state: Some(AttemptState::Quoting),
            failure: Some(FailureKind::Unavailable),
            error: Some(format!("boom {key}")),
            ..Default::default()
        });
        log.append(AuditEntry {
            operation: "swap",
            source: Some(RouteSource::Venue("uniswap_v3".into())),
            attempt: 1,
            state: Some(AttemptState::Confirmed),
            gas_used: Some(120_000),
            ..Default::default()
        });

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, 1);
        assert_eq!(records[1].seq, 2);
        assert!(!records[0].success);
        assert!(!records[0].error.as_deref().unwrap_or("").contains(&key));
        assert!(records[1].success);

        let summary = log.summary();
        assert_eq!(summary["aggregator:0x"].failed, 1);
        assert_eq!(summary["venue:uniswap_v3"].confirmed, 1);
        assert_eq!(summary["venue:uniswap_v3"].gas_used, 120_000);
    }

    #[test]
    fn memory_keeps_a_bounded_tail_but_totals_everything() {
        let log = AuditLog::with_retention(3);
        for attempt in 1..=5 {
            log.append(AuditEntry {
                operation: "swap",
                source: Some(RouteSource::Venue("aerodrome".into())),
                attempt,
                state: Some(AttemptState::Reverted),
                failure: Some(FailureKind::Reverted),
                ..Default::default()
            });
        }
        let records = log.records();
        assert_eq!(records.len(), 3);
        assert_eq!(log.len(), 3);
        assert_eq!(records.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(log.summary()["venue:aerodrome"].attempts, 5);
        assert_eq!(log.summary()["venue:aerodrome"].failed, 5);
    }

    #[test]
    fn estimated_attempts_are_flagged() {
        let log = AuditLog::new();
        let record = log.append(AuditEntry {
            operation: "swap",
            attempt: 1,
            state: Some(AttemptState::Confirmed),
            low_confidence: true,
            ..Default::default()
        });
        assert!(record.low_confidence);
        assert!(log.records()[0].low_confidence);
    }

    #[test]
    fn sink_writes_json_lines() {
        let path = std::env::temp_dir().join(format!("swapper-audit-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let log = AuditLog::with_sink(&path).expect("sink");
            log.append(AuditEntry {
                operation: "approve",
                attempt: 1,
                state: Some(AttemptState::Confirmed),
                ..Default::default()
            });
        }
        let body = std::fs::read_to_string(&path).expect("read");
        let line: serde_json::Value = serde_json::from_str(body.trim()).expect("json");
        assert_eq!(line["operation"], "approve");
        assert_eq!(line["state"], "confirmed");
        assert_eq!(line["low_confidence"], false);
        let _ = std::fs::remove_file(path);
    }
}
