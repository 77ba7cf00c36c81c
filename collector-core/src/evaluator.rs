//! The Monitor Evaluator (component D): for a single monitor entry, performs
//! splitting, vector broadcasting, split-operator reduction, validity checks, and
//! variable-table insertion.

use std::collections::HashSet;

use crate::error::CollectorError;
use crate::expr;
use crate::measurement::{Measurement, TypeTag};
use crate::probe::{ProbeDescriptor, ProbeOutcome, ProbeSession};
use crate::vartable::VarTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOp {
    Sum,
    Mean,
}

/// One configured probe or operation within a sensor, in the order it must be
/// evaluated (operation entries may only reference names produced earlier in this
/// same ordering).
#[derive(Debug, Clone)]
pub struct MonitorEntry {
    pub name: String,
    pub unit: Option<String>,
    pub group_name: Option<String>,
    pub group_id: Option<String>,
    pub instance_prefix: Option<String>,
    pub name_split_suffix: Option<String>,
    pub nonzero: bool,
    pub integer: bool,
    pub timestamp_given: bool,
    pub publish_bus: bool,
    pub publish_http: bool,
    pub form: MonitorForm,
}

#[derive(Debug, Clone)]
pub enum MonitorForm {
    Probe {
        descriptor: ProbeDescriptor,
        split: Option<String>,
        split_op: Option<SplitOp>,
    },
    Operation {
        expression: String,
        split_op: Option<SplitOp>,
    },
}

impl MonitorEntry {
    fn type_tag_for_probe(&self) -> TypeTag {
        match &self.form {
            MonitorForm::Probe { descriptor, .. } => match descriptor.kind {
                crate::probe::ProbeKind::SnmpOid => TypeTag::Snmp,
                crate::probe::ProbeKind::SystemCmd => TypeTag::System,
            },
            MonitorForm::Operation { .. } => TypeTag::Op,
        }
    }
}

/// The set of names whose value is invalid for the remainder of the current tick.
/// Membership is checked by exact token, never by substring — the original
/// collector's `strstr`-based check over-approximated (it would taint `ab` when `a`
/// failed); this table only taints identifiers that are exactly a failed name.
#[derive(Debug, Default)]
pub struct TaintSet(HashSet<String>);

impl TaintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn taint(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    pub fn is_tainted(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn any_tainted<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> bool {
        names.into_iter().any(|n| self.is_tainted(n))
    }
}

/// Context shared by every monitor entry evaluated within one sensor tick.
pub struct MonitorContext<'a> {
    pub sensor_name: &'a str,
    pub sensor_id: Option<u64>,
    pub enrichment: &'a serde_json::Value,
    pub now: i64,
}

/// Logs at ERROR under a distinct `alert` target for the PolicyViolation class of
/// failures (a `nonzero` guard tripping on a zero result). Neither `log` nor
/// `tracing` has a dedicated ALERT level; tagging the target is how a syslog/
/// tracing filter downstream tells a policy violation apart from an ordinary
/// EvalError, both of which log at ERROR severity.
macro_rules! alert {
    ($($arg:tt)*) => {
        log::error!(target: "alert", $($arg)*)
    };
}

/// Checks `value` against the EvalError/PolicyViolation split from the error
/// taxonomy, logging each distinctly. Returns whether `value` is usable.
fn validate_and_log(value: f64, nonzero: bool, name: &str) -> bool {
    if !value.is_finite() {
        error!("{name}: result is not finite");
        return false;
    }
    if nonzero && value == 0.0 {
        alert!("{name}: nonzero guard triggered on zero result");
        return false;
    }
    true
}

/// Evaluates one monitor entry, mutating `vtable`/`taint` and returning the
/// Measurements it produced.
pub fn evaluate(
    entry: &MonitorEntry,
    vtable: &mut VarTable,
    taint: &mut TaintSet,
    probe: &mut dyn ProbeSession,
    ctx: &MonitorContext,
) -> Result<Vec<Measurement>, CollectorError> {
    match &entry.form {
        MonitorForm::Probe {
            descriptor,
            split,
            split_op,
        } => evaluate_probe(entry, descriptor, split.as_deref(), *split_op, vtable, taint, probe, ctx),
        MonitorForm::Operation {
            expression,
            split_op,
        } => evaluate_operation(entry, expression, *split_op, vtable, taint, ctx),
    }
}

fn vector_name(entry: &MonitorEntry, index: usize) -> String {
    match &entry.group_id {
        Some(gid) => format!("{}_gid_{}_pos_{}", entry.name, gid, index),
        None => format!("{}_pos_{}", entry.name, index),
    }
}

fn base_measurement(entry: &MonitorEntry, ctx: &MonitorContext, timestamp: i64, value: f64) -> Measurement {
    Measurement::new(
        ctx.sensor_name,
        entry.name.clone(),
        timestamp,
        value,
        entry.type_tag_for_probe(),
        entry.integer,
    )
    .with_sensor_id(ctx.sensor_id)
    .with_enrichment(ctx.enrichment.clone())
    .with_publish_flags(entry.publish_bus, entry.publish_http)
}

fn evaluate_probe(
    entry: &MonitorEntry,
    descriptor: &ProbeDescriptor,
    split: Option<&str>,
    split_op: Option<SplitOp>,
    vtable: &mut VarTable,
    taint: &mut TaintSet,
    probe: &mut dyn ProbeSession,
    ctx: &MonitorContext,
) -> Result<Vec<Measurement>, CollectorError> {
    let outcome: ProbeOutcome = match probe.probe(descriptor) {
        Ok(outcome) => outcome,
        Err(err) => return Err(err),
    };

    if outcome.raw.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();

    match split {
        None => {
            let Some(num) = outcome.parsed else {
                warn!("{}: could not parse {:?} as a number", entry.name, outcome.raw);
                taint.taint(entry.name.clone());
                return Ok(Vec::new());
            };
            if entry.nonzero && num == 0.0 {
                alert!("{}: nonzero guard triggered on zero result", entry.name);
                taint.taint(entry.name.clone());
                return Ok(Vec::new());
            }
            vtable.append(entry.name.clone(), num);
            let mut m = base_measurement(entry, ctx, ctx.now, num);
            if let Some(unit) = &entry.unit {
                m = m.with_unit(unit.clone());
            }
            out.push(m);
        }
        Some(sep) => {
            let tokens: Vec<&str> = outcome.raw.split(sep).collect();
            let mut sum = 0.0;
            let mut count = 0usize;
            let mut last_ts = ctx.now;

            for (i, tok) in tokens.iter().enumerate() {
                let (ts, val) = if entry.timestamp_given {
                    match tok.split_once(':') {
                        Some((ts_str, val_str)) => match ts_str.parse::<i64>() {
                            Ok(ts) => (ts, val_str),
                            Err(_) => (ctx.now, *tok),
                        },
                        None => (ctx.now, *tok),
                    }
                } else {
                    (ctx.now, *tok)
                };

                if val.is_empty() {
                    continue;
                }
                let Some(parsed) = crate::probe::parse_finite(val) else {
                    warn!("{}: could not parse element {:?} as a number", entry.name, val);
                    continue;
                };

                let var_name = vector_name(entry, i);
                vtable.append(var_name, parsed);
                sum += parsed;
                count += 1;
                last_ts = ts;

                let send_name = match &entry.name_split_suffix {
                    Some(suffix) => format!("{}{}", entry.name, suffix),
                    None => entry.name.clone(),
                };
                let mut m = base_measurement(entry, ctx, ts, parsed)
                    .with_send_name(send_name)
                    .with_instance(i as u64, entry.instance_prefix.clone());
                if let Some(group) = &entry.group_name {
                    m = m.with_group(Some(group.clone()), entry.group_id.clone());
                }
                if let Some(unit) = &entry.unit {
                    m = m.with_unit(unit.clone());
                }
                out.push(m);
            }

            if let Some(reduction_op) = split_op {
                if count > 0 {
                    let reduced = match reduction_op {
                        SplitOp::Sum => sum,
                        SplitOp::Mean => sum / count as f64,
                    };
                    if reduced.is_finite() {
                        let suppress = entry.nonzero && reduced == 0.0;
                        vtable.append(entry.name.clone(), reduced);
                        if suppress {
                            alert!(
                                "{}: nonzero guard triggered on zero reduced value",
                                entry.name
                            );
                            taint.taint(entry.name.clone());
                        } else {
                            let mut m = base_measurement(entry, ctx, last_ts, reduced);
                            if let Some(unit) = &entry.unit {
                                m = m.with_unit(unit.clone());
                            }
                            out.push(m);
                        }
                    } else {
                        error!("{}: reduced value is not finite", entry.name);
                        taint.taint(entry.name.clone());
                    }
                }
            }
        }
    }

    Ok(out)
}

fn evaluate_operation(
    entry: &MonitorEntry,
    expression: &str,
    split_op: Option<SplitOp>,
    vtable: &mut VarTable,
    taint: &mut TaintSet,
    ctx: &MonitorContext,
) -> Result<Vec<Measurement>, CollectorError> {
    let ast = expr::parse(expression)?;
    let vars = expr::collect_variables(&ast);

    if taint.any_tainted(vars.iter()) {
        taint.taint(entry.name.clone());
        return Ok(Vec::new());
    }

    let mut bindings: Vec<(String, usize, usize)> = Vec::new(); // (name, start, width)
    let mut width = 1usize;
    for name in &vars {
        let Some((start, w)) = vtable.find_vector(name) else {
            error!("{}: unknown variable {}", entry.name, name);
            taint.taint(entry.name.clone());
            return Ok(Vec::new());
        };
        if w > 1 {
            if width > 1 && width != w {
                error!(
                    "{}: vector operands disagree in width ({} vs {})",
                    entry.name, width, w
                );
                taint.taint(entry.name.clone());
                return Ok(Vec::new());
            }
            width = w;
        }
        bindings.push((name.clone(), start, w));
    }

    let mut out = Vec::new();

    if width == 1 {
        let mut lookup = |name: &str| -> Result<f64, CollectorError> {
            let (_, start, _) = bindings
                .iter()
                .find(|(n, _, _)| n == name)
                .expect("collect_variables is exhaustive over operand tokens");
            vtable
                .get_by_index(*start)
                .ok_or_else(|| CollectorError::UnknownVariable(name.to_string()))
        };
        let value = expr::eval(&ast, &mut lookup)?;
        if !validate_and_log(value, entry.nonzero, &entry.name) {
            taint.taint(entry.name.clone());
            return Ok(Vec::new());
        }
        vtable.append(entry.name.clone(), value);
        let mut m = base_measurement(entry, ctx, ctx.now, value);
        if let Some(unit) = &entry.unit {
            m = m.with_unit(unit.clone());
        }
        out.push(m);
        return Ok(out);
    }

    let mut valid_results = Vec::new();
    for j in 0..width {
        let mut lookup = |name: &str| -> Result<f64, CollectorError> {
            let (_, start, w) = bindings
                .iter()
                .find(|(n, _, _)| n == name)
                .expect("collect_variables is exhaustive over operand tokens");
            let idx = if *w > 1 { start + j } else { *start };
            vtable
                .get_by_index(idx)
                .ok_or_else(|| CollectorError::UnknownVariable(name.to_string()))
        };
        let value = expr::eval(&ast, &mut lookup)?;
        if !validate_and_log(value, entry.nonzero, &entry.name) {
            taint.taint(entry.name.clone());
            continue;
        }
        let var_name = vector_name(entry, j);
        vtable.append(var_name, value);
        valid_results.push(value);
        let mut m = base_measurement(entry, ctx, ctx.now, value)
            .with_instance(j as u64, entry.instance_prefix.clone());
        if let Some(unit) = &entry.unit {
            m = m.with_unit(unit.clone());
        }
        out.push(m);
    }

    if let Some(reduction_op) = split_op {
        if !valid_results.is_empty() {
            let sum: f64 = valid_results.iter().sum();
            let reduced = match reduction_op {
                SplitOp::Sum => sum,
                SplitOp::Mean => sum / valid_results.len() as f64,
            };
            if validate_and_log(reduced, entry.nonzero, &entry.name) {
                vtable.append(entry.name.clone(), reduced);
                let mut m = base_measurement(entry, ctx, ctx.now, reduced);
                if let Some(unit) = &entry.unit {
                    m = m.with_unit(unit.clone());
                }
                out.push(m);
            } else {
                taint.taint(entry.name.clone());
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeKind;

    struct ScriptedProbe {
        responses: Vec<&'static str>,
    }

    impl ProbeSession for ScriptedProbe {
        fn probe(&mut self, _descriptor: &ProbeDescriptor) -> Result<ProbeOutcome, CollectorError> {
            let raw = self.responses.remove(0);
            Ok(ProbeOutcome::from_raw(raw))
        }
    }

    fn ctx() -> serde_json::Value {
        serde_json::Value::Null
    }

    fn probe_entry(name: &str, nonzero: bool) -> MonitorEntry {
        MonitorEntry {
            name: name.to_string(),
            unit: None,
            group_name: None,
            group_id: None,
            instance_prefix: None,
            name_split_suffix: None,
            nonzero,
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
    fn scalar_probe_change_detection() {
        let enrichment = ctx();
        let mctx = MonitorContext {
            sensor_name: "s",
            sensor_id: None,
            enrichment: &enrichment,
            now: 0,
        };
        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();
        let mut probe = ScriptedProbe {
            responses: vec!["42"],
        };
        let entry = probe_entry("cpu", false);
        let ms = evaluate(&entry, &mut vtable, &mut taint, &mut probe, &mctx).unwrap();
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].value, 42.0);
    }

    #[test]
    fn vector_with_mean_reduction() {
        let enrichment = ctx();
        let mctx = MonitorContext {
            sensor_name: "s",
            sensor_id: None,
            enrichment: &enrichment,
            now: 0,
        };
        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();
        let mut probe = ScriptedProbe {
            responses: vec!["1;2;3;4"],
        };
        let mut entry = probe_entry("load", false);
        entry.form = MonitorForm::Probe {
            descriptor: ProbeDescriptor {
                kind: ProbeKind::SnmpOid,
                argument: ".1".into(),
            },
            split: Some(";".into()),
            split_op: Some(SplitOp::Mean),
        };
        let ms = evaluate(&entry, &mut vtable, &mut taint, &mut probe, &mctx).unwrap();
        assert_eq!(ms.len(), 5);
        assert_eq!(ms[4].value, 2.5);
    }

    #[test]
    fn operation_over_vector_and_scalar() {
        let enrichment = ctx();
        let mctx = MonitorContext {
            sensor_name: "s",
            sensor_id: None,
            enrichment: &enrichment,
            now: 0,
        };
        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();

        let mut probe_a = ScriptedProbe {
            responses: vec!["10;20;30"],
        };
        let mut entry_a = probe_entry("a", false);
        entry_a.form = MonitorForm::Probe {
            descriptor: ProbeDescriptor {
                kind: ProbeKind::SnmpOid,
                argument: ".1".into(),
            },
            split: Some(";".into()),
            split_op: None,
        };
        evaluate(&entry_a, &mut vtable, &mut taint, &mut probe_a, &mctx).unwrap();

        let mut probe_b = ScriptedProbe {
            responses: vec!["2"],
        };
        let entry_b = probe_entry("b", false);
        evaluate(&entry_b, &mut vtable, &mut taint, &mut probe_b, &mctx).unwrap();

        let mut entry_c = probe_entry("c", false);
        entry_c.form = MonitorForm::Operation {
            expression: "a/b".into(),
            split_op: None,
        };
        let mut noop_probe = ScriptedProbe { responses: vec![] };
        let ms = evaluate(&entry_c, &mut vtable, &mut taint, &mut noop_probe, &mctx).unwrap();
        let values: Vec<f64> = ms.iter().map(|m| m.value).collect();
        assert_eq!(values, vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn taint_propagation_on_nonzero_guard() {
        let enrichment = ctx();
        let mctx = MonitorContext {
            sensor_name: "s",
            sensor_id: None,
            enrichment: &enrichment,
            now: 0,
        };
        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();
        let mut probe_a = ScriptedProbe {
            responses: vec!["0"],
        };
        let entry_a = probe_entry("a", true);
        let ms = evaluate(&entry_a, &mut vtable, &mut taint, &mut probe_a, &mctx).unwrap();
        assert!(ms.is_empty());
        assert!(taint.is_tainted("a"));

        let mut entry_b = probe_entry("b", false);
        entry_b.form = MonitorForm::Operation {
            expression: "a+1".into(),
            split_op: None,
        };
        let mut noop_probe = ScriptedProbe { responses: vec![] };
        let ms = evaluate(&entry_b, &mut vtable, &mut taint, &mut noop_probe, &mctx).unwrap();
        assert!(ms.is_empty());
        assert!(taint.is_tainted("b"));
    }

    #[test]
    fn dimension_mismatch_yields_no_measurements() {
        let enrichment = ctx();
        let mctx = MonitorContext {
            sensor_name: "s",
            sensor_id: None,
            enrichment: &enrichment,
            now: 0,
        };
        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();

        let mut probe_a = ScriptedProbe {
            responses: vec!["1;2;3"],
        };
        let mut entry_a = probe_entry("a", false);
        entry_a.form = MonitorForm::Probe {
            descriptor: ProbeDescriptor {
                kind: ProbeKind::SnmpOid,
                argument: ".1".into(),
            },
            split: Some(";".into()),
            split_op: None,
        };
        evaluate(&entry_a, &mut vtable, &mut taint, &mut probe_a, &mctx).unwrap();

        let mut probe_b = ScriptedProbe {
            responses: vec!["1;2;3;4"],
        };
        let mut entry_b = probe_entry("b", false);
        entry_b.form = MonitorForm::Probe {
            descriptor: ProbeDescriptor {
                kind: ProbeKind::SnmpOid,
                argument: ".2".into(),
            },
            split: Some(";".into()),
            split_op: None,
        };
        evaluate(&entry_b, &mut vtable, &mut taint, &mut probe_b, &mctx).unwrap();

        let mut entry_c = probe_entry("c", false);
        entry_c.form = MonitorForm::Operation {
            expression: "a+b".into(),
            split_op: None,
        };
        let mut noop_probe = ScriptedProbe { responses: vec![] };
        let ms = evaluate(&entry_c, &mut vtable, &mut taint, &mut noop_probe, &mctx).unwrap();
        assert!(ms.is_empty());
        assert!(taint.is_tainted("c"));
    }

    #[test]
    fn non_finite_guard_suppresses_only_dependent() {
        let enrichment = ctx();
        let mctx = MonitorContext {
            sensor_name: "s",
            sensor_id: None,
            enrichment: &enrichment,
            now: 0,
        };
        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();

        let mut probe_x = ScriptedProbe {
            responses: vec!["0"],
        };
        let entry_x = probe_entry("x", false);
        let ms = evaluate(&entry_x, &mut vtable, &mut taint, &mut probe_x, &mctx).unwrap();
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].value, 0.0);

        let mut entry_y = probe_entry("y", false);
        entry_y.form = MonitorForm::Operation {
            expression: "1/x".into(),
            split_op: None,
        };
        let mut noop_probe = ScriptedProbe { responses: vec![] };
        let ms = evaluate(&entry_y, &mut vtable, &mut taint, &mut noop_probe, &mctx).unwrap();
        assert!(ms.is_empty());
        assert!(taint.is_tainted("y"));
    }

    #[test]
    fn non_finite_split_reduction_taints_and_drops() {
        let enrichment = ctx();
        let mctx = MonitorContext {
            sensor_name: "s",
            sensor_id: None,
            enrichment: &enrichment,
            now: 0,
        };
        let mut vtable = VarTable::new();
        let mut taint = TaintSet::new();

        // Each element parses as a finite f64, but their sum overflows to infinity.
        let mut probe = ScriptedProbe {
            responses: vec!["1.7976931348623157e308;1.7976931348623157e308"],
        };
        let mut entry = probe_entry("load", false);
        entry.form = MonitorForm::Probe {
            descriptor: ProbeDescriptor {
                kind: ProbeKind::SnmpOid,
                argument: ".1".into(),
            },
            split: Some(";".into()),
            split_op: Some(SplitOp::Sum),
        };
        let ms = evaluate(&entry, &mut vtable, &mut taint, &mut probe, &mctx).unwrap();
        assert_eq!(ms.len(), 2, "per-element measurements still emit");
        assert!(taint.is_tainted("load"), "the non-finite reduction must taint the entry name");
        assert!(vtable.get("load").is_none(), "a non-finite reduction is never appended to the table");
    }
}
