//! The Sink Adapter (component G): serializes a [`Measurement`] to the canonical
//! line-oriented wire record. Enqueueing that record onto the bus/HTTP producers is
//! the daemon's job (`collectord::sinks`) — this crate only owns the deterministic
//! serialization step.

use serde_json::{Map, Value};

use crate::measurement::{Measurement, TypeTag};

/// One canonical wire-format line, ready to hand to a sink client's enqueue call.
#[derive(Debug, Clone)]
pub struct SinkRecord(Value);

impl SinkRecord {
    /// Renders the record as a single line of compact JSON. `serde_json::Map`
    /// defaults to a `BTreeMap` backing (this crate doesn't enable the
    /// `preserve_order` feature), so key order — and therefore the resulting bytes
    /// — is deterministic for a given Measurement.
    pub fn to_line(&self) -> String {
        serde_json::to_string(&self.0).expect("SinkRecord only ever holds serializable values")
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

fn type_tag_str(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Snmp => "snmp",
        TypeTag::System => "system",
        TypeTag::Op => "op",
    }
}

/// Builds the canonical record for a Measurement: `timestamp`, `sensor_name`,
/// `monitor`, `value_sent`, `type`, plus whichever of `sensor_id`/`instance`/`unit`/
/// `group_name`/`group_id` are present, with the `enrichment` object merged at the
/// top level.
pub fn build_record(m: &Measurement) -> SinkRecord {
    let mut obj = Map::new();
    obj.insert("timestamp".into(), Value::from(m.timestamp));
    obj.insert("sensor_name".into(), Value::from(m.sensor_name.clone()));
    obj.insert("monitor".into(), Value::from(m.monitor_name().to_string()));
    obj.insert("value_sent".into(), Value::from(m.string_value.clone()));
    obj.insert("type".into(), Value::from(type_tag_str(m.type_tag)));

    if let Some(sensor_id) = m.sensor_id {
        obj.insert("sensor_id".into(), Value::from(sensor_id));
    }
    if let Some(instance) = m.instance {
        let instance_str = match &m.instance_prefix {
            Some(prefix) => format!("{prefix}{instance}"),
            None => instance.to_string(),
        };
        obj.insert("instance".into(), Value::from(instance_str));
    }
    if let Some(unit) = &m.unit {
        obj.insert("unit".into(), Value::from(unit.clone()));
    }
    if let Some(group_name) = &m.group_name {
        obj.insert("group_name".into(), Value::from(group_name.clone()));
    }
    if let Some(group_id) = &m.group_id {
        obj.insert("group_id".into(), Value::from(group_id.clone()));
    }

    if let Value::Object(enrichment) = &m.enrichment {
        for (k, v) in enrichment {
            obj.insert(k.clone(), v.clone());
        }
    }

    SinkRecord(Value::Object(obj))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_is_deterministic() {
        let m = Measurement::new("s", "cpu", 100, 42.0, TypeTag::Snmp, true);
        let a = build_record(&m).to_line();
        let b = build_record(&m).to_line();
        assert_eq!(a, b);
    }

    #[test]
    fn monitor_field_prefers_send_name() {
        let m = Measurement::new("s", "cpu", 100, 42.0, TypeTag::Snmp, true).with_send_name("cpu_pct");
        let record = build_record(&m).into_value();
        assert_eq!(record["monitor"], "cpu_pct");
    }

    #[test]
    fn enrichment_is_merged_at_top_level() {
        let mut m = Measurement::new("s", "cpu", 100, 42.0, TypeTag::Snmp, true);
        m.enrichment = serde_json::json!({"site": "eu-west"});
        let record = build_record(&m).into_value();
        assert_eq!(record["site"], "eu-west");
    }
}
