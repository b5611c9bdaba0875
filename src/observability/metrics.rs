//! Metrics recorded through the `metrics` facade.
//!
//! # Metrics
//! - `telemetry_events_total` (counter): published events by kind
//! - `authorization_decisions_total` (counter): gate decisions by outcome
//! - `startup_faults_total` (counter): startup faults by severity
//!
//! No recorder is installed by this crate; the host decides where counters go.

use metrics::counter;

pub fn record_telemetry_event(kind: &'static str) {
    counter!("telemetry_events_total", "kind" => kind).increment(1);
}

pub fn record_authorization(outcome: &'static str) {
    counter!("authorization_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_startup_fault(severity: &'static str) {
    counter!("startup_faults_total", "severity" => severity).increment(1);
}
