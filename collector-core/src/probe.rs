//! The probe dispatcher's interface (component C). The concrete SNMP and
//! system-command transports live outside this crate; `collector-core` only needs
//! the narrow synchronous contract below to drive the evaluation pipeline.

use crate::error::CollectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    SnmpOid,
    SystemCmd,
}

#[derive(Debug, Clone)]
pub struct ProbeDescriptor {
    pub kind: ProbeKind,
    pub argument: String,
}

/// The result of one probe call: the canonical printable text, and — iff the whole
/// of `raw` parses as a finite number — its numeric value.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub raw: String,
    pub parsed: Option<f64>,
}

impl ProbeOutcome {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = parse_finite(&raw);
        Self { raw, parsed }
    }
}

/// Parses `text` as `f64` iff the entire string is consumed and the result is finite.
pub fn parse_finite(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// One live session against a sensor's peer, reusable across the monitors of a
/// single tick. Session construction (SNMP session open, etc.) happens outside this
/// trait; implementors wrap an already-open session.
pub trait ProbeSession {
    fn probe(&mut self, descriptor: &ProbeDescriptor) -> Result<ProbeOutcome, CollectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_string_only() {
        assert_eq!(parse_finite("42"), Some(42.0));
        assert_eq!(parse_finite("42abc"), None);
        assert_eq!(parse_finite(""), None);
        assert_eq!(parse_finite("  3.5  "), Some(3.5));
    }
}
