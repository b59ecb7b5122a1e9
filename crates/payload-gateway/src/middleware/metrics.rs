//! Encryption layer counters, exposed as JSON or Prometheus text.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Encryption layer metrics
#[derive(Debug, Default)]
pub struct EncryptionMetrics {
    // Inbound
    pub requests_decrypted: AtomicU64,
    pub requests_plaintext: AtomicU64,
    pub requests_excluded: AtomicU64,
    pub requests_rejected: AtomicU64,

    // Outbound
    pub responses_encrypted: AtomicU64,
    pub responses_plaintext: AtomicU64,
    pub responses_fallback: AtomicU64,
    pub responses_failed: AtomicU64,
}

/// Point-in-time copy of [`EncryptionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_decrypted: u64,
    pub requests_plaintext: u64,
    pub requests_excluded: u64,
    pub requests_rejected: u64,
    pub responses_encrypted: u64,
    pub responses_plaintext: u64,
    pub responses_fallback: u64,
    pub responses_failed: u64,
}

impl EncryptionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Envelope decrypted and handed on as plaintext
    pub fn record_decrypted(&self) {
        self.requests_decrypted.fetch_add(1, Ordering::Relaxed);
    }

    /// Plaintext request accepted on a Negotiated route
    pub fn record_plaintext_request(&self) {
        self.requests_plaintext.fetch_add(1, Ordering::Relaxed);
    }

    /// Request on an Excluded route
    pub fn record_excluded(&self) {
        self.requests_excluded.fetch_add(1, Ordering::Relaxed);
    }

    /// Request rejected before reaching the handler
    pub fn record_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encrypted(&self) {
        self.responses_encrypted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_plaintext_response(&self) {
        self.responses_plaintext.fetch_add(1, Ordering::Relaxed);
    }

    /// Response sent as plaintext after an encryption failure
    pub fn record_fallback(&self) {
        self.responses_fallback.fetch_add(1, Ordering::Relaxed);
    }

    /// Response replaced by a 500 after an encryption failure
    pub fn record_failed(&self) {
        self.responses_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_decrypted: self.requests_decrypted.load(Ordering::Relaxed),
            requests_plaintext: self.requests_plaintext.load(Ordering::Relaxed),
            requests_excluded: self.requests_excluded.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            responses_encrypted: self.responses_encrypted.load(Ordering::Relaxed),
            responses_plaintext: self.responses_plaintext.load(Ordering::Relaxed),
            responses_fallback: self.responses_fallback.load(Ordering::Relaxed),
            responses_failed: self.responses_failed.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        let counters = [
            ("requests_decrypted_total", "Envelopes decrypted", s.requests_decrypted),
            ("requests_plaintext_total", "Plaintext requests accepted", s.requests_plaintext),
            ("requests_excluded_total", "Requests on excluded routes", s.requests_excluded),
            ("requests_rejected_total", "Requests rejected", s.requests_rejected),
            ("responses_encrypted_total", "Responses encrypted", s.responses_encrypted),
            ("responses_plaintext_total", "Responses sent as plaintext", s.responses_plaintext),
            ("responses_fallback_total", "Plaintext fallbacks after encryption failure", s.responses_fallback),
            ("responses_failed_total", "Responses failed during encryption", s.responses_failed),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP payload_encryption_{name} {help}\n\
                 # TYPE payload_encryption_{name} counter\n\
                 payload_encryption_{name} {value}\n"
            ));
        }
        output
    }
}
