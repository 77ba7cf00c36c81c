use serde::{Deserialize, Serialize};

/// Which component of the pipeline produced a [`Measurement`]'s value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Snmp,
    System,
    Op,
}

/// A single serializable observation. Immutable once produced; every field that
/// isn't always present is `Option`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: i64,
    pub sensor_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<u64>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_prefix: Option<String>,
    pub value: f64,
    pub string_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub type_tag: TypeTag,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub enrichment: serde_json::Value,
    pub integer: bool,
    /// Sink routing, carried from the originating monitor entry. Not part of the
    /// wire record; `collectord`'s sink fan-out reads these to decide where to
    /// publish a changed Measurement.
    pub publish_bus: bool,
    pub publish_http: bool,
}

impl Measurement {
    /// Builds a Measurement from its required fields; `string_value` is formatted
    /// from `value` following the `integer` flag's convention (whole number vs.
    /// fixed decimal), matching the wire-format rule in the external interfaces.
    pub fn new(
        sensor_name: impl Into<String>,
        name: impl Into<String>,
        timestamp: i64,
        value: f64,
        type_tag: TypeTag,
        integer: bool,
    ) -> Self {
        let name = name.into();
        let string_value = format_value(value, integer);
        Self {
            timestamp,
            sensor_name: sensor_name.into(),
            sensor_id: None,
            name,
            send_name: None,
            instance: None,
            instance_prefix: None,
            value,
            string_value,
            unit: None,
            group_name: None,
            group_id: None,
            type_tag,
            enrichment: serde_json::Value::Null,
            integer,
            publish_bus: true,
            publish_http: true,
        }
    }

    pub fn with_publish_flags(mut self, publish_bus: bool, publish_http: bool) -> Self {
        self.publish_bus = publish_bus;
        self.publish_http = publish_http;
        self
    }

    pub fn with_sensor_id(mut self, sensor_id: Option<u64>) -> Self {
        self.sensor_id = sensor_id;
        self
    }

    pub fn with_send_name(mut self, send_name: impl Into<String>) -> Self {
        self.send_name = Some(send_name.into());
        self
    }

    pub fn with_instance(mut self, instance: u64, instance_prefix: Option<String>) -> Self {
        self.instance = Some(instance);
        self.instance_prefix = instance_prefix;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_group(mut self, group_name: Option<String>, group_id: Option<String>) -> Self {
        self.group_name = group_name;
        self.group_id = group_id;
        self
    }

    pub fn with_enrichment(mut self, enrichment: serde_json::Value) -> Self {
        self.enrichment = enrichment;
        self
    }

    /// The monitor name used for serialization: `send_name` if set, else `name`.
    pub fn monitor_name(&self) -> &str {
        self.send_name.as_deref().unwrap_or(&self.name)
    }

    /// The key the Measurement Store deduplicates on.
    pub fn key(&self) -> (String, String, Option<u64>) {
        (self.sensor_name.clone(), self.name.clone(), self.instance)
    }
}

fn format_value(value: f64, integer: bool) -> String {
    if integer {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.6}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_name_falls_back_to_name() {
        let m = Measurement::new("s", "cpu", 0, 1.0, TypeTag::Snmp, true);
        assert_eq!(m.monitor_name(), "cpu");
        let m = m.with_send_name("cpu_usage");
        assert_eq!(m.monitor_name(), "cpu_usage");
    }

    #[test]
    fn integer_formatting_rounds() {
        let m = Measurement::new("s", "cpu", 0, 42.0, TypeTag::Snmp, true);
        assert_eq!(m.string_value, "42");
        let m = Measurement::new("s", "cpu", 0, 2.5, TypeTag::Snmp, false);
        assert_eq!(m.string_value, "2.500000");
    }
}
