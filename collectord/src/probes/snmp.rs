//! Component K: the SNMP transport backing `ProbeKind::SnmpOid`. Wraps the `snmp`
//! crate's synchronous session, since the GET round-trip is inherently blocking and
//! the whole Sensor Pipeline already runs inside `spawn_blocking` (see `worker.rs`).

use std::net::ToSocketAddrs;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use collector_core::error::CollectorError;
use collector_core::probe::{ProbeDescriptor, ProbeOutcome};
use snmp::{SyncSession, Value};

pub struct SnmpProbe {
    session: SyncSession,
}

impl SnmpProbe {
    /// Opens a session against `peer:161`. Construction is serialized by the caller
    /// (see `probes::OPEN_LOCK`) because `SyncSession::new` is not safely reentrant
    /// in the underlying transport.
    pub fn open(peer: &str, community: &str, timeout: Duration) -> Result<Self> {
        let addr = format!("{peer}:161")
            .to_socket_addrs()
            .with_context(|| format!("resolving SNMP peer {peer}"))?
            .next()
            .ok_or_else(|| anyhow!("no address for SNMP peer {peer}"))?;
        let session = SyncSession::new(addr, community.as_bytes(), Some(timeout), 0)
            .map_err(|e| anyhow!("opening SNMP session to {peer}: {e:?}"))?;
        Ok(Self { session })
    }

    pub fn get(&mut self, descriptor: &ProbeDescriptor) -> Result<ProbeOutcome, CollectorError> {
        let oid = parse_oid(&descriptor.argument).map_err(|e| CollectorError::Transport {
            argument: descriptor.argument.clone(),
            source: e,
        })?;

        let mut response = self
            .session
            .get(&oid)
            .map_err(|e| CollectorError::Transport {
                argument: descriptor.argument.clone(),
                source: anyhow!("SNMP GET failed: {e:?}"),
            })?;

        let raw = match response.varbinds.next() {
            Some((_, value)) => render_value(&value),
            None => String::new(),
        };
        Ok(ProbeOutcome::from_raw(raw))
    }
}

fn parse_oid(text: &str) -> Result<Vec<u64>> {
    text.trim_start_matches('.')
        .split('.')
        .map(|segment| segment.parse::<u64>().map_err(|e| anyhow!("bad OID segment {segment:?}: {e}")))
        .collect()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Boolean(b) => b.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::OctetString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => n.to_string(),
        Value::Counter64(n) => n.to_string(),
        Value::IpAddress(octets) => octets
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join("."),
        Value::ObjectIdentifier(oid) => format!("{oid:?}"),
        Value::Null => String::new(),
        other => format!("{other:?}"),
    }
}
