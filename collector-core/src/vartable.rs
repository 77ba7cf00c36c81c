use std::collections::HashMap;

/// Outcome of [`VarTable::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted(usize),
    Duplicate,
}

/// The append-only symbolic store backing the expression engine for one sensor tick.
///
/// Names are inserted in evaluation order and never removed; `find_vector` relies on
/// that ordering to recognize a vector as a maximal contiguous run of `prefix_pos_<i>`
/// (or `prefix_gid_<g>_pos_<i>`) entries with strictly increasing indices.
#[derive(Debug, Default)]
pub struct VarTable {
    names: Vec<String>,
    values: Vec<f64>,
    index: HashMap<String, usize>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: f64) -> AppendOutcome {
        let name = name.into();
        if self.index.contains_key(&name) {
            return AppendOutcome::Duplicate;
        }
        let idx = self.names.len();
        self.index.insert(name.clone(), idx);
        self.names.push(name);
        self.values.push(value);
        AppendOutcome::Inserted(idx)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index.get(name).map(|&i| self.values[i])
    }

    pub fn get_by_index(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Locates `prefix` as either a plain scalar (`width == 1`) or a vector block
    /// (`width > 1`), returning the starting index of the run.
    ///
    /// A vector block is recognized either in its bare form (`prefix_pos_0`,
    /// `prefix_pos_1`, ...) or in its group-scoped form (`prefix_gid_<g>_pos_0`,
    /// `prefix_gid_<g>_pos_1`, ...) — whichever variant is present, the run must stay
    /// consistent (same variant, same group id) across all its elements.
    pub fn find_vector(&self, prefix: &str) -> Option<(usize, usize)> {
        if let Some(group_prefix) = self.find_group_prefix(prefix) {
            return self.scan_run(&group_prefix);
        }
        let bare_prefix = format!("{prefix}_pos_");
        if let Some(run) = self.scan_run(&bare_prefix) {
            return Some(run);
        }
        self.index_of(prefix).map(|idx| (idx, 1))
    }

    fn find_group_prefix(&self, prefix: &str) -> Option<String> {
        let marker = format!("{prefix}_gid_");
        for name in &self.names {
            if let Some(rest) = name.strip_prefix(&marker) {
                if let Some(gid_end) = rest.find("_pos_") {
                    let gid = &rest[..gid_end];
                    return Some(format!("{marker}{gid}_pos_"));
                }
            }
        }
        None
    }

    fn scan_run(&self, pos_prefix: &str) -> Option<(usize, usize)> {
        let start = self.index_of(&format!("{pos_prefix}0"))?;
        let mut width = 1;
        while self.index_of(&format!("{pos_prefix}{width}")).is_some() {
            width += 1;
        }
        Some((start, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_names() {
        let mut table = VarTable::new();
        assert_eq!(table.append("a", 1.0), AppendOutcome::Inserted(0));
        assert_eq!(table.append("a", 2.0), AppendOutcome::Duplicate);
    }

    #[test]
    fn finds_bare_vector_run() {
        let mut table = VarTable::new();
        table.append("a_pos_0", 10.0);
        table.append("a_pos_1", 20.0);
        table.append("a_pos_2", 30.0);
        assert_eq!(table.find_vector("a"), Some((0, 3)));
    }

    #[test]
    fn finds_grouped_vector_run() {
        let mut table = VarTable::new();
        table.append("a_gid_5_pos_0", 10.0);
        table.append("a_gid_5_pos_1", 20.0);
        assert_eq!(table.find_vector("a"), Some((0, 2)));
    }

    #[test]
    fn scalar_falls_back_to_single_width() {
        let mut table = VarTable::new();
        table.append("b", 7.0);
        assert_eq!(table.find_vector("b"), Some((0, 1)));
    }

    #[test]
    fn unknown_name_is_none() {
        let table = VarTable::new();
        assert_eq!(table.find_vector("missing"), None);
    }
}
