//! The Sensor Pipeline (component F): orchestrates the Monitor Evaluator over one
//! sensor's ordered `monitors[]`, then hands the Measurement Store's change stream
//! to the Sink Adapter.

use std::time::Duration;

use crate::error::CollectorError;
use crate::evaluator::{self, MonitorContext, MonitorEntry, TaintSet};
use crate::measurement::Measurement;
use crate::probe::ProbeSession;
use crate::store::MeasurementStore;
use crate::vartable::VarTable;

/// A configured device to poll, with its ordered monitor entries.
#[derive(Debug, Clone)]
pub struct SensorDescriptor {
    pub sensor_name: String,
    pub sensor_id: Option<u64>,
    pub peer: String,
    pub community: String,
    pub snmp_version: String,
    pub timeout: Duration,
    pub enrichment: serde_json::Value,
    pub monitors: Vec<MonitorEntry>,
}

impl SensorDescriptor {
    /// Required-field validation, run once before a sensor is ever evaluated.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.sensor_name.is_empty() {
            return Err(CollectorError::Config {
                sensor: self.sensor_name.clone(),
                field: "sensor_name",
            });
        }
        if self.peer.is_empty() {
            return Err(CollectorError::Config {
                sensor: self.sensor_name.clone(),
                field: "peer",
            });
        }
        if self.community.is_empty() {
            return Err(CollectorError::Config {
                sensor: self.sensor_name.clone(),
                field: "community",
            });
        }
        if self.monitors.is_empty() {
            return Err(CollectorError::Config {
                sensor: self.sensor_name.clone(),
                field: "monitors",
            });
        }
        Ok(())
    }
}

/// One run of the evaluation pipeline against a shared Measurement Store.
pub struct SensorPipeline<'a> {
    store: &'a MeasurementStore,
}

impl<'a> SensorPipeline<'a> {
    pub fn new(store: &'a MeasurementStore) -> Self {
        Self { store }
    }

    /// Runs every monitor entry for `sensor` in order over a fresh scratch Variable
    /// Table, diffing each produced Measurement against the store. Returns only the
    /// Measurements that changed — the ones the sink adapter must actually publish.
    pub fn run(
        &self,
        sensor: &SensorDescriptor,
        probe: &mut dyn ProbeSession,
        now: i64,
    ) -> Result<Vec<Measurement>, CollectorError> {
        sensor.validate()?;

        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();
        let ctx = MonitorContext {
            sensor_name: &sensor.sensor_name,
            sensor_id: sensor.sensor_id,
            enrichment: &sensor.enrichment,
            now,
        };

        let mut changed = Vec::new();
        for entry in &sensor.monitors {
            let produced = evaluator::evaluate(entry, &mut vtable, &mut taint, probe, &ctx)?;
            for m in produced {
                if let Some(diff) = self.store.upsert(m) {
                    changed.push(diff);
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::MonitorForm;
    use crate::probe::{ProbeDescriptor, ProbeKind, ProbeOutcome};

    struct ScriptedProbe {
        responses: Vec<&'static str>,
    }

    impl ProbeSession for ScriptedProbe {
        fn probe(&mut self, _descriptor: &ProbeDescriptor) -> Result<ProbeOutcome, CollectorError> {
            Ok(ProbeOutcome::from_raw(self.responses.remove(0)))
        }
    }

    fn sensor_with(monitors: Vec<MonitorEntry>) -> SensorDescriptor {
        SensorDescriptor {
            sensor_name: "sensor1".into(),
            sensor_id: None,
            peer: "10.0.0.1".into(),
            community: "public".into(),
            snmp_version: "2c".into(),
            timeout: Duration::from_secs(1),
            enrichment: serde_json::Value::Null,
            monitors,
        }
    }

    fn cpu_monitor() -> MonitorEntry {
        MonitorEntry {
            name: "cpu".into(),
            unit: None,
            group_name: None,
            group_id: None,
            instance_prefix: None,
            name_split_suffix: None,
            nonzero: false,
            integer: true,
            timestamp_given: false,
            publish_bus: true,
            publish_http: true,
            form: MonitorForm::Probe {
                descriptor: ProbeDescriptor {
                    kind: ProbeKind::SnmpOid,
                    argument: ".1".into(),
                },
                split: None,
                split_op: None,
            },
        }
    }

    #[test]
    fn rejects_sensor_missing_required_fields() {
        let store = MeasurementStore::new();
        let pipeline = SensorPipeline::new(&store);
        let mut sensor = sensor_with(vec![cpu_monitor()]);
        sensor.community.clear();
        let mut probe = ScriptedProbe {
            responses: vec!["42"],
        };
        assert!(pipeline.run(&sensor, &mut probe, 0).is_err());
    }

    #[test]
    fn emits_changes_and_suppresses_repeats() {
        let store = MeasurementStore::new();
        let pipeline = SensorPipeline::new(&store);
        let sensor = sensor_with(vec![cpu_monitor()]);

        let mut probe = ScriptedProbe {
            responses: vec!["42"],
        };
        let changed = pipeline.run(&sensor, &mut probe, 0).unwrap();
        assert_eq!(changed.len(), 1);

        let mut probe = ScriptedProbe {
            responses: vec!["42"],
        };
        let changed = pipeline.run(&sensor, &mut probe, 1).unwrap();
        assert!(changed.is_empty());

        let mut probe = ScriptedProbe {
            responses: vec!["43"],
        };
        let changed = pipeline.run(&sensor, &mut probe, 2).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].value, 43.0);
    }
}
