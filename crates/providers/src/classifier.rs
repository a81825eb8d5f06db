//! Upstream failure classification.
//!
//! Decides whether a failed attempt should move on to the next credential
//! (`Retryable`) or end the dispatch (`Fatal`). Only rejections that are
//! plausibly specific to the key in use are retryable: quota exhaustion
//! (429), a revoked or restricted key (403), and a malformed/invalid key
//! (400). A success response with no usable text is also retryable.

use cg_domain::error::Error;

/// HTTP statuses that indicate the credential, not the request, is the
/// problem.
pub const RETRYABLE_STATUSES: [u16; 3] = [400, 403, 429];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable,
    Fatal,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        self == FailureClass::Retryable
    }
}

/// Classify an upstream failure. Pure.
pub fn classify(err: &Error) -> FailureClass {
    match err {
        Error::Upstream { status, .. } if RETRYABLE_STATUSES.contains(status) => {
            FailureClass::Retryable
        }
        Error::EmptyOutput { .. } => FailureClass::Retryable,
        _ => FailureClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: u16) -> Error {
        Error::Upstream {
            provider: "gemini".into(),
            status,
            message: "x".into(),
        }
    }

    #[test]
    fn key_specific_statuses_are_retryable() {
        for s in [400, 403, 429] {
            assert_eq!(classify(&upstream(s)), FailureClass::Retryable, "status {s}");
        }
    }

    #[test]
    fn other_statuses_are_fatal() {
        for s in [401, 404, 408, 500, 502, 503, 504] {
            assert_eq!(classify(&upstream(s)), FailureClass::Fatal, "status {s}");
        }
    }

    #[test]
    fn empty_output_is_retryable() {
        let e = Error::EmptyOutput {
            provider: "gemini".into(),
        };
        assert!(classify(&e).is_retryable());
    }

    #[test]
    fn transport_failures_are_fatal() {
        assert_eq!(classify(&Error::Http("reset".into())), FailureClass::Fatal);
        assert_eq!(classify(&Error::Timeout("60s".into())), FailureClass::Fatal);
        let undecodable = Error::Provider {
            provider: "gemini".into(),
            message: "invalid JSON".into(),
        };
        assert_eq!(classify(&undecodable), FailureClass::Fatal);
    }

    #[test]
    fn status_text_in_message_does_not_matter() {
        // A 500 whose body mentions 429 is still a 500.
        let e = Error::Upstream {
            provider: "gemini".into(),
            status: 500,
            message: "backend returned 429 internally".into(),
        };
        assert_eq!(classify(&e), FailureClass::Fatal);
    }
}
