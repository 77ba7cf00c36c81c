use dashmap::DashMap;

use crate::measurement::Measurement;

type Key = (String, String, Option<u64>);

/// Process-wide mapping `(sensor_name, name, instance?) -> last value`.
///
/// Backed by [`DashMap`], the same sharded-lock concurrent map the rest of this
/// codebase's ancestry reaches for when multiple independent tasks need to mutate a
/// shared table without a single global lock. Per-key mutation is serialized by the
/// shard lock; there is no cross-key ordering and no eviction — entries live for the
/// process lifetime.
#[derive(Debug, Default)]
pub struct MeasurementStore {
    values: DashMap<Key, f64>,
}

impl MeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(m)` when `m`'s key was previously absent, or its value strictly
    /// differs from what was stored; returns `None` (no change) otherwise.
    pub fn upsert(&self, m: Measurement) -> Option<Measurement> {
        let key = m.key();
        match self.values.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if *entry.get() == m.value {
                    None
                } else {
                    entry.insert(m.value);
                    Some(m)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(m.value);
                Some(m)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::TypeTag;

    fn m(value: f64) -> Measurement {
        Measurement::new("sensor", "cpu", 0, value, TypeTag::Snmp, true)
    }

    #[test]
    fn emits_on_first_observation() {
        let store = MeasurementStore::new();
        assert!(store.upsert(m(42.0)).is_some());
    }

    #[test]
    fn suppresses_unchanged_value() {
        let store = MeasurementStore::new();
        store.upsert(m(42.0));
        assert!(store.upsert(m(42.0)).is_none());
    }

    #[test]
    fn emits_on_strict_change() {
        let store = MeasurementStore::new();
        store.upsert(m(42.0));
        assert!(store.upsert(m(43.0)).is_some());
    }

    #[test]
    fn instance_is_part_of_the_key() {
        let store = MeasurementStore::new();
        store.upsert(m(42.0));
        let m2 = m(42.0).with_instance(0, None);
        assert!(store.upsert(m2).is_some());
    }
}
