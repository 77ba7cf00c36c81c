//! Component H: loads the JSON config document (`conf` + `sensors`) into typed,
//! validated structures. Mirrors the original collector's `str_default_config`
//! fallback values so existing config files from that system still behave the same
//! way here when a key is omitted.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use collector_core::evaluator::{MonitorEntry, MonitorForm, SplitOp};
use collector_core::probe::{ProbeDescriptor, ProbeKind};
use collector_core::pipeline::SensorDescriptor;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl SnmpVersion {
    fn parse(raw: &str) -> Self {
        match raw {
            "1" => Self::V1,
            "3" => Self::V3,
            _ => Self::V2c,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2c => "2c",
            Self::V3 => "3",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub broker: String,
    pub topic: String,
    pub timeout: Duration,
    pub passthrough: HashMap<String, String>,
    pub topic_passthrough: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_total_connections: usize,
    pub verbose: bool,
    pub max_messages: usize,
}

/// The process-wide settings parsed from the config file's `conf` object.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub debug: u8,
    pub stdout: bool,
    pub syslog: bool,
    pub threads: usize,
    pub timeout: Duration,
    pub max_snmp_fails: u32,
    pub max_kafka_fails: u32,
    pub sleep_main: Duration,
    pub sleep_worker: Duration,
    pub bus: BusConfig,
    pub http: HttpConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            debug: 100,
            stdout: true,
            syslog: false,
            threads: 10,
            timeout: Duration::from_secs(5),
            max_snmp_fails: 2,
            max_kafka_fails: 2,
            sleep_main: Duration::from_secs(10),
            sleep_worker: Duration::from_secs(2),
            bus: BusConfig {
                broker: "localhost".into(),
                topic: "SNMP".into(),
                timeout: Duration::from_secs(5),
                passthrough: HashMap::new(),
                topic_passthrough: HashMap::new(),
            },
            http: HttpConfig {
                endpoint: None,
                timeout: Duration::from_millis(10_000),
                connect_timeout: Duration::from_millis(3_000),
                max_total_connections: 4,
                verbose: false,
                max_messages: 512,
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfDoc {
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawConfigFile {
    conf: Option<RawConfDoc>,
    #[serde(default)]
    sensors: Vec<RawSensor>,
}

#[derive(Debug, Deserialize)]
struct RawSensor {
    sensor_name: Option<String>,
    sensor_id: Option<u64>,
    #[serde(alias = "sensor_ip")]
    peer: Option<String>,
    community: Option<String>,
    #[serde(default)]
    snmp_version: Option<String>,
    timeout: Option<u64>,
    #[serde(default)]
    enrichment: serde_json::Value,
    #[serde(default)]
    monitors: Vec<RawMonitor>,
}

#[derive(Debug, Deserialize)]
struct RawMonitor {
    name: String,
    unit: Option<String>,
    group_name: Option<String>,
    group_id: Option<String>,
    instance_prefix: Option<String>,
    name_split_suffix: Option<String>,
    #[serde(default)]
    nonzero: bool,
    #[serde(default)]
    integer: bool,
    #[serde(default)]
    timestamp_given: bool,
    #[serde(default = "default_true")]
    publish_bus: bool,
    #[serde(default = "default_true")]
    publish_http: bool,
    oid: Option<String>,
    system: Option<String>,
    op: Option<String>,
    split: Option<String>,
    split_op: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Loads and validates the config file at `path`. Malformed sensors are logged and
/// excluded rather than aborting the whole load — per-sensor failures never take
/// down the daemon.
pub fn load(path: &std::path::Path) -> Result<(CollectorConfig, Vec<SensorDescriptor>)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let raw: RawConfigFile =
        serde_json::from_str(&text).with_context(|| "parsing config JSON")?;

    let config = build_conf(raw.conf.unwrap_or_default());

    let mut sensors = Vec::with_capacity(raw.sensors.len());
    for raw_sensor in raw.sensors {
        match build_sensor(raw_sensor, config.timeout) {
            Ok(sensor) => sensors.push(sensor),
            Err(err) => {
                tracing::error!("skipping malformed sensor: {:#}", err);
            }
        }
    }

    Ok((config, sensors))
}

fn build_conf(raw: RawConfDoc) -> CollectorConfig {
    let mut config = CollectorConfig::default();
    let mut bus_passthrough = HashMap::new();
    let mut bus_topic_passthrough = HashMap::new();

    for (key, value) in raw.fields {
        match key.as_str() {
            "debug" => config.debug = value.as_u64().unwrap_or(config.debug as u64) as u8,
            "stdout" => config.stdout = truthy(&value, config.stdout),
            "syslog" => config.syslog = truthy(&value, config.syslog),
            "threads" => config.threads = value.as_u64().unwrap_or(config.threads as u64) as usize,
            "timeout" => {
                config.timeout = Duration::from_secs(value.as_u64().unwrap_or(5));
            }
            "max_snmp_fails" => {
                config.max_snmp_fails = value.as_u64().unwrap_or(config.max_snmp_fails as u64) as u32;
            }
            "max_kafka_fails" => {
                config.max_kafka_fails =
                    parse_numeric_string(&value).unwrap_or(config.max_kafka_fails as u64) as u32;
            }
            "sleep_main" => config.sleep_main = Duration::from_secs(value.as_u64().unwrap_or(10)),
            "sleep_worker" => {
                config.sleep_worker = Duration::from_secs(value.as_u64().unwrap_or(2));
            }
            "kafka_broker" => config.bus.broker = value.as_str().unwrap_or("localhost").to_string(),
            "kafka_topic" => config.bus.topic = value.as_str().unwrap_or("SNMP").to_string(),
            "kafka_timeout" => config.bus.timeout = Duration::from_secs(value.as_u64().unwrap_or(5)),
            "http_endpoint" => config.http.endpoint = value.as_str().map(str::to_string),
            "http_timeout" => {
                config.http.timeout = Duration::from_millis(value.as_u64().unwrap_or(10_000));
            }
            "http_connttimeout" => {
                config.http.connect_timeout =
                    Duration::from_millis(value.as_u64().unwrap_or(3_000));
            }
            "http_max_total_connections" => {
                config.http.max_total_connections = value.as_u64().unwrap_or(4) as usize;
            }
            "http_verbose" => config.http.verbose = truthy(&value, config.http.verbose),
            "rb_http_max_messages" => {
                config.http.max_messages = value.as_u64().unwrap_or(512) as usize;
            }
            _ => {
                if let Some(rest) = key.strip_prefix("rdkafka.topic.") {
                    if let Some(s) = value.as_str() {
                        bus_topic_passthrough.insert(rest.to_string(), s.to_string());
                    }
                } else if let Some(rest) = key.strip_prefix("rdkafka.") {
                    if let Some(s) = value.as_str() {
                        bus_passthrough.insert(rest.to_string(), s.to_string());
                    }
                } else {
                    tracing::warn!("ignoring unknown config key {key:?}");
                }
            }
        }
    }

    config.bus.passthrough = bus_passthrough;
    config.bus.topic_passthrough = bus_topic_passthrough;
    config
}

fn truthy(value: &serde_json::Value, default: bool) -> bool {
    value
        .as_bool()
        .or_else(|| value.as_u64().map(|n| n != 0))
        .unwrap_or(default)
}

fn parse_numeric_string(value: &serde_json::Value) -> Option<u64> {
    value.as_u64().or_else(|| value.as_str()?.parse().ok())
}

fn build_sensor(raw: RawSensor, default_timeout: Duration) -> Result<SensorDescriptor> {
    let sensor_name = raw
        .sensor_name
        .filter(|s| !s.is_empty())
        .context("missing sensor_name")?;
    let peer = raw.peer.filter(|s| !s.is_empty()).context("missing peer")?;
    let community = raw
        .community
        .filter(|s| !s.is_empty())
        .context("missing community")?;
    if raw.monitors.is_empty() {
        anyhow::bail!("sensor {sensor_name} has no monitors");
    }

    let mut monitors = Vec::with_capacity(raw.monitors.len());
    for raw_monitor in raw.monitors {
        monitors.push(build_monitor(raw_monitor)?);
    }

    Ok(SensorDescriptor {
        sensor_name,
        sensor_id: raw.sensor_id,
        peer,
        community,
        snmp_version: raw
            .snmp_version
            .map(|v| SnmpVersion::parse(&v).as_str().to_string())
            .unwrap_or_else(|| "2c".into()),
        timeout: raw
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(default_timeout),
        enrichment: raw.enrichment,
        monitors,
    })
}

fn build_monitor(raw: RawMonitor) -> Result<MonitorEntry> {
    let split_op = raw
        .split_op
        .as_deref()
        .map(|s| match s {
            "sum" => Ok(SplitOp::Sum),
            "mean" => Ok(SplitOp::Mean),
            other => anyhow::bail!("unknown split_op {other:?}"),
        })
        .transpose()?;

    let form = if let Some(op) = raw.op {
        MonitorForm::Operation {
            expression: op,
            split_op,
        }
    } else if let Some(oid) = raw.oid {
        MonitorForm::Probe {
            descriptor: ProbeDescriptor {
                kind: ProbeKind::SnmpOid,
                argument: oid,
            },
            split: raw.split,
            split_op,
        }
    } else if let Some(system) = raw.system {
        MonitorForm::Probe {
            descriptor: ProbeDescriptor {
                kind: ProbeKind::SystemCmd,
                argument: system,
            },
            split: raw.split,
            split_op,
        }
    } else {
        anyhow::bail!("monitor {} has neither oid, system nor op", raw.name);
    };

    Ok(MonitorEntry {
        name: raw.name,
        unit: raw.unit,
        group_name: raw.group_name,
        group_id: raw.group_id,
        instance_prefix: raw.instance_prefix,
        name_split_suffix: raw.name_split_suffix,
        nonzero: raw.nonzero,
        integer: raw.integer,
        timestamp_given: raw.timestamp_given,
        publish_bus: raw.publish_bus,
        publish_http: raw.publish_http,
        form,
    })
}
