//! Location and label registry.
//!
//! Bidirectional map between byte offsets and labels, with reference
//! records, the back-reference list consumed by finalization patching,
//! and the per-location max-observed operand length map.

use std::collections::{HashMap, HashSet};

/// One materialized address reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Location of the referring instruction or constant.
    pub from: u32,
    /// The referenced location.
    pub target: u32,
    /// Observed operand length in bytes (0 when none is implied).
    pub len: u32,
    /// Mnemonic of the referrer, for the undefined-labels report.
    pub mnemonic: String,
}

/// The label registry.
#[derive(Debug, Default)]
pub struct LabelRegistry {
    by_name: HashMap<String, u32>,
    by_loc: HashMap<u32, String>,
    defined: HashSet<u32>,
    references: Vec<Reference>,
    back_refs: Vec<u32>,
    used_len: HashMap<u32, u32>,
}

impl LabelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The auto-generated label for a location: `L` plus uppercase hex
    /// without leading zeros.
    #[must_use]
    pub fn auto_name(loc: u32) -> String {
        format!("L{loc:X}")
    }

    /// Explicitly defines `name` at `loc`.
    ///
    /// A label is never rebound: if `name` already maps to a different
    /// location, or `loc` already carries a different label, the first
    /// binding wins and `false` is returned. The location is marked
    /// defined either way.
    pub fn define(&mut self, name: &str, loc: u32) -> bool {
        self.defined.insert(loc);
        if let Some(&existing) = self.by_name.get(name) {
            return existing == loc;
        }
        self.by_name.insert(name.to_string(), loc);
        if self.by_loc.contains_key(&loc) {
            return false;
        }
        self.by_loc.insert(loc, name.to_string());
        true
    }

    /// Binds `name` to `loc` by name only, leaving the location's label
    /// column free. Used for the section name, which already appears on
    /// the `START` statement.
    pub fn define_name_only(&mut self, name: &str, loc: u32) {
        self.defined.insert(loc);
        self.by_name.entry(name.to_string()).or_insert(loc);
    }

    /// Materializes a reference to `target` from `from`.
    ///
    /// Creates the (auto) label if absent, records the reference, raises
    /// the max-observed length, and queues a back-reference when the
    /// target lies before the referrer. Returns the target's label.
    pub fn refer(&mut self, target: u32, from: u32, len: u32, mnemonic: &str) -> String {
        let name = match self.by_loc.get(&target) {
            Some(name) => name.clone(),
            None => {
                let name = Self::auto_name(target);
                self.by_loc.insert(target, name.clone());
                self.by_name.entry(name.clone()).or_insert(target);
                name
            }
        };
        self.references.push(Reference {
            from,
            target,
            len,
            mnemonic: mnemonic.to_string(),
        });
        self.record_used_length(target, len);
        if target < from {
            self.back_refs.push(target);
        }
        name
    }

    /// The label at `loc`, defined or referenced-only.
    #[must_use]
    pub fn label_at(&self, loc: u32) -> Option<&str> {
        self.by_loc.get(&loc).map(String::as_str)
    }

    /// The location a label maps to.
    #[must_use]
    pub fn location_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Raises the max-observed operand length at `loc`.
    pub fn record_used_length(&mut self, loc: u32, len: u32) {
        if len == 0 {
            return;
        }
        let entry = self.used_len.entry(loc).or_insert(0);
        *entry = (*entry).max(len);
    }

    /// The max-observed operand length at `loc` (0 if never observed).
    #[must_use]
    pub fn used_length(&self, loc: u32) -> u32 {
        self.used_len.get(&loc).copied().unwrap_or(0)
    }

    /// Marks `loc` as carrying an emitted statement or explicit label.
    pub fn mark_defined(&mut self, loc: u32) {
        self.defined.insert(loc);
    }

    /// Whether `loc` is defined (as opposed to referenced-only).
    #[must_use]
    pub fn is_defined(&self, loc: u32) -> bool {
        self.defined.contains(&loc)
    }

    /// All locations that carry a label, in ascending order.
    #[must_use]
    pub fn labeled_locations(&self) -> Vec<u32> {
        let mut locs: Vec<u32> = self.by_loc.keys().copied().collect();
        locs.sort_unstable();
        locs
    }

    /// Back-referenced targets, in materialization order.
    #[must_use]
    pub fn back_references(&self) -> &[u32] {
        &self.back_refs
    }

    /// All reference records, in materialization order.
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Referenced-but-never-defined labels with their first referrer,
    /// ascending by target location.
    #[must_use]
    pub fn undefined(&self) -> Vec<(&str, u32, u32, &Reference)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for reference in &self.references {
            if self.defined.contains(&reference.target) || !seen.insert(reference.target) {
                continue;
            }
            if let Some(name) = self.label_at(reference.target) {
                out.push((
                    name,
                    reference.target,
                    self.used_length(reference.target),
                    reference,
                ));
            }
        }
        out.sort_by_key(|&(_, target, _, _)| target);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::LabelRegistry;

    #[test]
    fn auto_names_have_no_leading_zeros() {
        assert_eq!(LabelRegistry::auto_name(0), "L0");
        assert_eq!(LabelRegistry::auto_name(0x10), "L10");
        assert_eq!(LabelRegistry::auto_name(0xCAFE), "LCAFE");
    }

    #[test]
    fn define_binds_both_directions() {
        let mut reg = LabelRegistry::new();
        assert!(reg.define("ENTRY", 0x100));
        assert_eq!(reg.label_at(0x100), Some("ENTRY"));
        assert_eq!(reg.location_of("ENTRY"), Some(0x100));
        assert!(reg.is_defined(0x100));
    }

    #[test]
    fn labels_are_never_rebound() {
        let mut reg = LabelRegistry::new();
        assert!(reg.define("ENTRY", 0x100));
        assert!(!reg.define("ENTRY", 0x200));
        assert_eq!(reg.location_of("ENTRY"), Some(0x100));
        assert!(reg.define("ENTRY", 0x100), "same location is idempotent");
    }

    #[test]
    fn refer_materializes_auto_label() {
        let mut reg = LabelRegistry::new();
        let name = reg.refer(0x10, 0x4, 4, "B");
        assert_eq!(name, "L10");
        assert_eq!(reg.label_at(0x10), Some("L10"));
        assert!(!reg.is_defined(0x10));
    }

    #[test]
    fn refer_reuses_existing_label() {
        let mut reg = LabelRegistry::new();
        reg.define("TARGET", 0x10);
        assert_eq!(reg.refer(0x10, 0x4, 0, "B"), "TARGET");
    }

    #[test]
    fn used_length_is_monotonic() {
        let mut reg = LabelRegistry::new();
        reg.refer(0x10, 0, 2, "STH");
        assert_eq!(reg.used_length(0x10), 2);
        reg.refer(0x10, 4, 4, "ST");
        assert_eq!(reg.used_length(0x10), 4);
        reg.refer(0x10, 8, 2, "STH");
        assert_eq!(reg.used_length(0x10), 4, "length never shrinks");
    }

    #[test]
    fn earlier_targets_are_back_referenced() {
        let mut reg = LabelRegistry::new();
        reg.refer(0x100, 0x10, 0, "B");
        assert!(reg.back_references().is_empty(), "forward ref");
        reg.refer(0x4, 0x10, 0, "B");
        assert_eq!(reg.back_references(), &[0x4]);
    }

    #[test]
    fn undefined_reports_first_referrer_once() {
        let mut reg = LabelRegistry::new();
        reg.refer(0x40, 0x10, 4, "ST");
        reg.refer(0x40, 0x20, 2, "STH");
        reg.define("HOME", 0x8);
        reg.refer(0x8, 0x30, 0, "B");
        let undefined = reg.undefined();
        assert_eq!(undefined.len(), 1);
        let (name, target, len, first) = undefined[0];
        assert_eq!(name, "L40");
        assert_eq!(target, 0x40);
        assert_eq!(len, 4);
        assert_eq!(first.from, 0x10);
        assert_eq!(first.mnemonic, "ST");
    }
}
