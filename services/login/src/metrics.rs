//! Prometheus metrics for the Login Service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec};

/// OTP request counter.
pub static OTP_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "login_service_otp_requests_total",
        "Total number of OTP issuance requests",
        &["status"]
    )
    .expect("Failed to register otp_requests metric")
});

/// OTP verification counter.
pub static OTP_VERIFICATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "login_service_otp_verifications_total",
        "Total number of OTP verification attempts",
        &["status"]
    )
    .expect("Failed to register otp_verifications metric")
});

/// Session issuance counter.
pub static SESSIONS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "login_service_sessions_issued_total",
        "Total number of session tokens issued",
        &["role"]
    )
    .expect("Failed to register sessions_issued metric")
});

/// Authentication decision counter.
pub static AUTH_DECISIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "login_service_auth_decisions_total",
        "Total number of bearer authentication decisions",
        &["source", "outcome"]
    )
    .expect("Failed to register auth_decisions metric")
});

/// Record an OTP issuance request.
pub fn record_otp_request(status: &str) {
    OTP_REQUESTS.with_label_values(&[status]).inc();
}

/// Record an OTP verification attempt.
pub fn record_otp_verification(status: &str) {
    OTP_VERIFICATIONS.with_label_values(&[status]).inc();
}

/// Record a session issuance.
pub fn record_session_issued(role: &str) {
    SESSIONS_ISSUED.with_label_values(&[role]).inc();
}

/// Record a bearer authentication decision.
pub fn record_auth_decision(source: &str, outcome: &str) {
    AUTH_DECISIONS.with_label_values(&[source, outcome]).inc();
}
