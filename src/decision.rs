//! Per-request gate decisions.
//!
//! Each request ends in exactly one of these states:
//!
//! - **Excluded**: static asset or framework path, detection never ran
//! - **Undetected**: detection found nothing
//! - **Unreported**: something was detected but there is no API key
//! - **Reported**: detected, allowed through, visit logged in the background
//! - **Blocked**: detected and denied with 403
//!
//! Only `Blocked` changes the response.

use http::StatusCode;

/// Body sent with every blocked response.
pub const BLOCKED_BODY: &str = "Access Denied";

/// Content type of the blocked response.
pub const BLOCKED_CONTENT_TYPE: &str = "text/plain";

/// Status reported to the collector for allowed visits.
pub const ALLOWED_STATUS: StatusCode = StatusCode::OK;

/// Status of blocked responses.
pub const BLOCKED_STATUS: StatusCode = StatusCode::FORBIDDEN;

/// Outcome of running one request through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The path matched an exclusion rule.
    Excluded,

    /// `source_type` was `none`.
    Undetected,

    /// A source was detected, but without an API key nothing is logged.
    Unreported,

    /// A source was detected and allowed; the visit report was dispatched.
    Reported,

    /// A source was detected and must be denied.
    Blocked,
}

impl GateDecision {
    /// Returns `true` if the host should answer with the blocked response.
    pub fn is_blocked(&self) -> bool {
        matches!(self, GateDecision::Blocked)
    }

    /// Returns `true` if the host should continue with normal handling.
    pub fn is_pass_through(&self) -> bool {
        !self.is_blocked()
    }
}
