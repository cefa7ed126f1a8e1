//! Parameter validation
//!
//! Every constraint is checked independently and all violations are
//! collected, so a caller fixing one field at a time sees every remaining
//! problem. Violations come back in a fixed order: backend, SIP port, RTP
//! bounds, RTP ordering, max attempts, ban time.

use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;
use thiserror::Error;

use crate::request::{Backend, ConfigRequest, RawConfigRequest};

pub const SIP_PORT_RANGE: RangeInclusive<i64> = 1..=65535;
pub const RTP_PORT_RANGE: RangeInclusive<i64> = 1024..=65535;
pub const MAX_ATTEMPTS_RANGE: RangeInclusive<i64> = 1..=10;
/// One minute to one day, in seconds
pub const BAN_TIME_RANGE: RangeInclusive<i64> = 60..=86400;

/// Request field a violation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Backend,
    SipPort,
    RtpStart,
    RtpEnd,
    /// The start/end pair taken together
    RtpRange,
    MaxAttempts,
    BanTime,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Backend => "backend",
            Field::SipPort => "sip_port",
            Field::RtpStart => "rtp_start",
            Field::RtpEnd => "rtp_end",
            Field::RtpRange => "rtp_range",
            Field::MaxAttempts => "max_attempts",
            Field::BanTime => "ban_time",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single broken constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: Field,
    pub message: String,
}

impl Violation {
    fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Rejection carrying every violated constraint, in check order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.violations))]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

fn join_messages(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of [`validate`]
#[derive(Debug, Clone)]
pub struct ValidationReport {
    violations: Vec<Violation>,
    request: Option<ConfigRequest>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Messages only, in check order
    pub fn messages(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.message.as_str()).collect()
    }

    /// Hand over the validated request, or every violation found
    pub fn into_request(self) -> Result<ConfigRequest, ValidationFailure> {
        match self.request {
            Some(request) if self.violations.is_empty() => Ok(request),
            _ => Err(ValidationFailure {
                violations: self.violations,
            }),
        }
    }
}

/// Check a raw request against every domain constraint
pub fn validate(raw: &RawConfigRequest) -> ValidationReport {
    let mut violations = Vec::new();

    let backend = raw.backend.parse::<Backend>().ok();
    if backend.is_none() {
        let known: Vec<&str> = Backend::ALL.iter().map(|b| b.as_str()).collect();
        violations.push(Violation::new(
            Field::Backend,
            format!("Server type must be one of: {}", known.join(", ")),
        ));
    }

    let sip_port = in_range::<u16>(raw.sip_port, &SIP_PORT_RANGE);
    if sip_port.is_none() {
        violations.push(Violation::new(
            Field::SipPort,
            "SIP port must be between 1 and 65535",
        ));
    }

    let rtp_start = in_range::<u16>(raw.rtp_start, &RTP_PORT_RANGE);
    if rtp_start.is_none() {
        violations.push(Violation::new(
            Field::RtpStart,
            "RTP start port must be between 1024 and 65535",
        ));
    }

    let rtp_end = in_range::<u16>(raw.rtp_end, &RTP_PORT_RANGE);
    if rtp_end.is_none() {
        violations.push(Violation::new(
            Field::RtpEnd,
            "RTP end port must be between 1024 and 65535",
        ));
    }

    // Ordering is only meaningful once both bounds are in range.
    let rtp_ordered = match (rtp_start, rtp_end) {
        (Some(start), Some(end)) => {
            let ordered = start < end;
            if !ordered {
                violations.push(Violation::new(
                    Field::RtpRange,
                    "RTP start port must be less than RTP end port",
                ));
            }
            ordered
        }
        _ => false,
    };

    let max_attempts = in_range::<u8>(raw.max_attempts, &MAX_ATTEMPTS_RANGE);
    if max_attempts.is_none() {
        violations.push(Violation::new(
            Field::MaxAttempts,
            "Max attempts must be between 1 and 10",
        ));
    }

    let ban_time = in_range::<u32>(raw.ban_time, &BAN_TIME_RANGE);
    if ban_time.is_none() {
        violations.push(Violation::new(
            Field::BanTime,
            "Ban time must be between 60 and 86400 seconds",
        ));
    }

    let request = match (backend, sip_port, rtp_start, rtp_end, max_attempts, ban_time) {
        (Some(backend), Some(sip), Some(start), Some(end), Some(attempts), Some(ban))
            if rtp_ordered =>
        {
            Some(ConfigRequest::new_unchecked(
                backend,
                sip,
                start,
                end,
                attempts,
                ban,
                raw.enable_ssh,
                raw.enable_ipv6,
            ))
        }
        _ => None,
    };

    tracing::debug!(
        backend = %raw.backend,
        violations = violations.len(),
        "Validated configuration request"
    );

    ValidationReport {
        violations,
        request,
    }
}

fn in_range<T: TryFrom<i64>>(value: i64, range: &RangeInclusive<i64>) -> Option<T> {
    if range.contains(&value) {
        T::try_from(value).ok()
    } else {
        None
    }
}

impl TryFrom<RawConfigRequest> for ConfigRequest {
    type Error = ValidationFailure;

    fn try_from(raw: RawConfigRequest) -> Result<Self, Self::Error> {
        validate(&raw).into_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_raw() -> RawConfigRequest {
        RawConfigRequest {
            backend: "asterisk".to_string(),
            sip_port: 5060,
            rtp_start: 10000,
            rtp_end: 20000,
            max_attempts: 3,
            ban_time: 3600,
            enable_ssh: false,
            enable_ipv6: false,
        }
    }

    #[test]
    fn test_valid_request_has_no_violations() {
        let report = validate(&valid_raw());
        assert!(report.is_valid());
        assert!(report.violations().is_empty());

        let request = report.into_request().unwrap();
        assert_eq!(request.backend(), Backend::Asterisk);
        assert_eq!(request.sip_port(), 5060);
        assert_eq!(request.rtp_start(), 10000);
        assert_eq!(request.rtp_end(), 20000);
        assert_eq!(request.max_attempts(), 3);
        assert_eq!(request.ban_time(), 3600);
    }

    #[test]
    fn test_violations_accumulate_in_order() {
        let raw = RawConfigRequest {
            backend: "unknown".to_string(),
            sip_port: 70000,
            rtp_start: 20000,
            rtp_end: 10000,
            max_attempts: 0,
            ban_time: 30,
            ..valid_raw()
        };

        let report = validate(&raw);
        assert!(!report.is_valid());

        let fields: Vec<Field> = report.violations().iter().map(|v| v.field).collect();
        assert_eq!(
            fields,
            vec![
                Field::Backend,
                Field::SipPort,
                Field::RtpRange,
                Field::MaxAttempts,
                Field::BanTime,
            ]
        );
    }

    #[test]
    fn test_out_of_range_bound_skips_ordering_check() {
        let raw = RawConfigRequest {
            rtp_start: 65536,
            ..valid_raw()
        };

        let report = validate(&raw);
        assert_eq!(report.violations().len(), 1);
        assert_eq!(report.violations()[0].field, Field::RtpStart);
    }

    #[test]
    fn test_negative_values_rejected() {
        let raw = RawConfigRequest {
            sip_port: -1,
            ban_time: -3600,
            ..valid_raw()
        };

        let fields: Vec<Field> = validate(&raw).violations().iter().map(|v| v.field).collect();
        assert_eq!(fields, vec![Field::SipPort, Field::BanTime]);
    }

    #[test]
    fn test_failure_display_joins_messages() {
        let raw = RawConfigRequest {
            max_attempts: 11,
            ban_time: 59,
            ..valid_raw()
        };

        let err = validate(&raw).into_request().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Max attempts must be between 1 and 10; Ban time must be between 60 and 86400 seconds"
        );
    }

    #[test]
    fn test_try_from_raw() {
        assert!(ConfigRequest::try_from(valid_raw()).is_ok());

        let raw = RawConfigRequest {
            backend: "sipxecs".to_string(),
            ..valid_raw()
        };
        let err = ConfigRequest::try_from(raw).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, Field::Backend);
    }
}
