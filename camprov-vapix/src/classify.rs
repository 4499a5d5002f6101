//! Per-call response classification. Every VAPIX call reduces its raw
//! HTTP outcome to one of these before the retry loop in [`crate::client`]
//! decides whether to retry, succeed, or fail.

/// The outcome of a single HTTP attempt, already interpreted against a
/// call's own success/recognized-non-error rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The call achieved its intent.
    Success(String),
    /// The device reported a state (e.g. "account already exist", "No
    /// such parameter") that this call treats as equivalent to success.
    DeviceState(String),
    /// 401/403 from a call that requires auth; not retried.
    Auth(String),
    /// Malformed or unparseable response; not retried.
    Protocol(String),
    /// A terminal failure that is neither a recognized non-error nor a
    /// transient condition; not retried.
    Failure(String),
    /// Connection refused/reset, timeout, or a 5xx status; retried.
    Transient(String),
}

/// Classify a completed HTTP response against a status-based baseline
/// and a set of body substrings the call treats as a recognized
/// non-error (case-sensitive, matched anywhere in the body).
pub fn classify_status_and_body(status: u16, body: &str, recognized_ok_patterns: &[&str]) -> Outcome {
    if status == 200 {
        return Outcome::Success(format!("HTTP {status}"));
    }

    for pattern in recognized_ok_patterns {
        if body.contains(pattern) {
            return Outcome::DeviceState(format!("recognized non-error: {pattern}"));
        }
    }

    if status == 401 || status == 403 {
        return Outcome::Auth(format!("HTTP {status}: authentication failed"));
    }

    if status >= 500 {
        return Outcome::Transient(format!("HTTP {status}"));
    }

    Outcome::Failure(format!("HTTP {status}: {body}"))
}

/// Classify a transport-level failure (the request never got a response
/// at all, or the response body could not be read).
pub fn classify_transport_error(err: &reqwest::Error) -> Outcome {
    Outcome::Transient(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status_is_success() {
        assert_eq!(
            classify_status_and_body(200, "ok", &[]),
            Outcome::Success("HTTP 200".into())
        );
    }

    #[test]
    fn recognized_pattern_overrides_error_status() {
        let outcome = classify_status_and_body(400, "Error: account already exist", &["account already exist"]);
        assert!(matches!(outcome, Outcome::DeviceState(_)));
    }

    #[test]
    fn auth_failure_is_not_transient() {
        let outcome = classify_status_and_body(401, "unauthorized", &[]);
        assert!(matches!(outcome, Outcome::Auth(_)));
    }

    #[test]
    fn server_error_is_transient() {
        let outcome = classify_status_and_body(503, "overloaded", &[]);
        assert!(matches!(outcome, Outcome::Transient(_)));
    }

    #[test]
    fn unrecognized_client_error_is_terminal_failure() {
        let outcome = classify_status_and_body(400, "bad request", &[]);
        assert!(matches!(outcome, Outcome::Failure(_)));
    }
}
