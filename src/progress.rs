//! Progress reporting module for synchronization runs
//!
//! This module provides data structures and utilities for reporting
//! progress to external callers via stderr, one JSON object per line.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::ScanError;
use crate::sync::SyncStats;

/// Phase indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    /// Walking and filtering the media directory
    #[default]
    Scan,
    /// Reconciling records against the manifest
    Sync,
}

impl SyncPhase {
    /// Get string representation of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Scan => "scan",
            SyncPhase::Sync => "sync",
        }
    }
}

/// Start message sent when a run begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Media root
    pub media_path: String,
    /// Manifest location
    pub manifest_path: String,
}

/// Progress message sent while records are reconciled
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Current phase
    pub phase: SyncPhase,
    /// Media files visited so far
    #[serde(rename = "f")]
    pub visited: u64,
    /// Total media files in this scan
    #[serde(rename = "t")]
    pub total: u64,
    /// Records reused from the manifest
    #[serde(rename = "c")]
    pub cached: u64,
    /// Records that received metadata
    #[serde(rename = "r")]
    pub fetched: u64,
    /// Records confirmed absent upstream
    #[serde(rename = "nf")]
    pub not_found: u64,
    /// Manifest key currently processed
    pub key: String,
}

/// Error message sent when a run aborts
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error type/category
    pub error_type: String,
    /// Error message description
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Done message sent when a run completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Final counters
    #[serde(flatten)]
    pub stats: SyncStats,
}

/// Progress reporter for outputting run progress to stderr
///
/// Handles timing, sequence numbers, and formatting of the message types.
/// Progress lines are throttled to `interval_ms`; start, error and done
/// lines are always written.
#[derive(Debug)]
pub struct ProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Timestamp of the last progress line, `u64::MAX` before the first one
    last_report_ms: AtomicU64,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        Self {
            enabled,
            interval_ms,
            last_report_ms: AtomicU64::new(u64::MAX),
            seq: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// A reporter that never writes anything
    pub fn disabled() -> Self {
        Self::new(false, 0)
    }

    /// Check if enough time has passed since the last progress line
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let last = self.last_report_ms.load(Ordering::Relaxed);
        last == u64::MAX || self.current_timestamp().saturating_sub(last) >= self.interval_ms
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    /// Report run start
    pub fn report_start(&self, media_path: &Path, manifest_path: &Path) {
        if !self.enabled {
            return;
        }

        let msg = StartMessage {
            msg_type: "start",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            media_path: media_path.to_string_lossy().to_string(),
            manifest_path: manifest_path.to_string_lossy().to_string(),
        };
        self.output_to_stderr(&msg);
    }

    /// Report reconciliation progress
    ///
    /// Returns true if a message was actually sent (respects interval timing).
    pub fn report_progress(
        &self,
        phase: SyncPhase,
        visited: u64,
        total: u64,
        stats: &SyncStats,
        key: &str,
    ) -> bool {
        if !self.should_report() {
            return false;
        }

        let msg = ProgressMessage {
            msg_type: "p",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            phase,
            visited,
            total,
            cached: stats.cached,
            fetched: stats.fetched,
            not_found: stats.not_found,
            key: key.to_string(),
        };
        self.output_to_stderr(&msg);
        self.last_report_ms
            .store(self.current_timestamp(), Ordering::Relaxed);
        true
    }

    /// Report a fatal error (ignores interval timing)
    pub fn report_error(&self, error: &ScanError) {
        if !self.enabled {
            return;
        }

        let msg = ErrorProgressMessage {
            msg_type: "err",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            error_type: format!("{:?}", error.kind),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        };
        self.output_to_stderr(&msg);
    }

    /// Report run completion
    pub fn report_done(&self, stats: &SyncStats) {
        if !self.enabled {
            return;
        }

        let msg = DoneMessage {
            msg_type: "done",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            stats: stats.clone(),
        };
        self.output_to_stderr(&msg);
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
