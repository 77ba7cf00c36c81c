pub mod snmp;
pub mod system;

use std::sync::Mutex;
use std::time::Duration;

use collector_core::error::CollectorError;
use collector_core::probe::{ProbeDescriptor, ProbeKind, ProbeOutcome, ProbeSession};

use self::snmp::SnmpProbe;

/// Serializes SNMP session construction across the process: `snmp::SyncSession::new`
/// is not guaranteed re-entrant, so every worker funnels session opens through this
/// single lock (§5's "session instantiation guarded by a mutex").
static OPEN_LOCK: Mutex<()> = Mutex::new(());

/// The composite Probe Dispatcher (component C) used by the worker pool: one SNMP
/// session per sensor tick, dispatching `system_cmd` monitors to a fresh subprocess
/// each time.
pub struct DeviceProbeSession {
    snmp: SnmpProbe,
    timeout: Duration,
}

impl DeviceProbeSession {
    pub fn open(peer: &str, community: &str, timeout: Duration) -> anyhow::Result<Self> {
        let snmp = {
            let _guard = OPEN_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            SnmpProbe::open(peer, community, timeout)?
        };
        Ok(Self { snmp, timeout })
    }
}

impl ProbeSession for DeviceProbeSession {
    fn probe(&mut self, descriptor: &ProbeDescriptor) -> Result<ProbeOutcome, CollectorError> {
        match descriptor.kind {
            ProbeKind::SnmpOid => self.snmp.get(descriptor),
            ProbeKind::SystemCmd => system::run(descriptor, self.timeout),
        }
    }
}
