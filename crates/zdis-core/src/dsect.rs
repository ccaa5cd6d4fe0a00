//! Register base bindings and DSECT field inference.
//!
//! Each of the 16 general registers is unbound, bound to a CSECT base
//! location, or bound to a named DSECT at a base offset. Displacements
//! decoded off a DSECT-bound register accrete fields whose lengths grow
//! monotonically; finalization synthesizes the DSECT bodies.

use std::collections::BTreeMap;

/// What a base register currently resolves against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseBinding {
    /// Bound to a location within the control section.
    Csect(u32),
    /// Bound to a named DSECT at a base offset.
    Dsect {
        /// DSECT name.
        name: String,
        /// Base offset within the DSECT (0, 4096, 8192, ...).
        offset: u32,
    },
}

/// A pseudo-structure accreted from observed references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dsect {
    /// Optional short description, shown on the DSECT statement.
    pub description: Option<String>,
    /// Fields keyed by displacement, valued by inferred byte length.
    pub fields: BTreeMap<u32, u32>,
}

/// Register bindings plus the accreted DSECTs.
#[derive(Debug, Default)]
pub struct DsectRegistry {
    bindings: [Option<BaseBinding>; 16],
    dsects: BTreeMap<String, Dsect>,
}

/// Span between successive base registers in a multi-register binding.
const BASE_SPAN: u32 = 4096;

impl DsectRegistry {
    /// Creates an empty registry with all registers unbound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds registers to a CSECT base; successive registers cover
    /// consecutive 4 KiB windows.
    pub fn bind_csect(&mut self, regs: &[u8], loc: u32) {
        for (i, &r) in regs.iter().enumerate() {
            self.bindings[usize::from(r & 0xF)] =
                Some(BaseBinding::Csect(loc + BASE_SPAN * i as u32));
        }
    }

    /// Binds registers to a DSECT, creating it on first sight.
    pub fn bind_dsect(&mut self, regs: &[u8], name: &str, description: Option<&str>) {
        let entry = self.dsects.entry(name.to_string()).or_default();
        if entry.description.is_none() {
            entry.description = description.map(str::to_string);
        }
        for (i, &r) in regs.iter().enumerate() {
            self.bindings[usize::from(r & 0xF)] = Some(BaseBinding::Dsect {
                name: name.to_string(),
                offset: BASE_SPAN * i as u32,
            });
        }
    }

    /// Unbinds registers.
    pub fn drop_regs(&mut self, regs: &[u8]) {
        for &r in regs {
            self.bindings[usize::from(r & 0xF)] = None;
        }
    }

    /// The current binding of a register.
    #[must_use]
    pub fn binding(&self, reg: u8) -> Option<&BaseBinding> {
        self.bindings[usize::from(reg & 0xF)].as_ref()
    }

    /// Records a field reference at `base_offset + disp` and returns its
    /// label, `<dsect>_<hexdisp>`. Field lengths only grow.
    pub fn field(&mut self, name: &str, disp: u32, len: u32) -> String {
        let entry = self.dsects.entry(name.to_string()).or_default();
        let field_len = entry.fields.entry(disp).or_insert(0);
        *field_len = (*field_len).max(len);
        format!("{name}_{disp:X}")
    }

    /// Whether any DSECT has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dsects.is_empty()
    }

    /// Synthesizes all DSECT bodies as (label, op, operands, comment) rows.
    ///
    /// Per DSECT: the `name DSECT` header (description as its comment),
    /// then fields ascending by displacement with `DS XLn` gap fillers; a
    /// zero-length inference emits `DS 0X`, and a field overlapped by its
    /// predecessor emits `DS 0XLn` instead of advancing.
    #[must_use]
    pub fn bodies(&self) -> Vec<(String, String, String, String)> {
        let mut rows = Vec::new();
        for (name, dsect) in &self.dsects {
            rows.push((
                name.clone(),
                "DSECT".to_string(),
                String::new(),
                dsect.description.clone().unwrap_or_default(),
            ));
            let mut cursor = 0u32;
            for (&disp, &len) in &dsect.fields {
                if disp > cursor {
                    rows.push((
                        String::new(),
                        "DS".to_string(),
                        format!("XL{}", disp - cursor),
                        String::new(),
                    ));
                    cursor = disp;
                }
                let label = format!("{name}_{disp:X}");
                if len == 0 {
                    rows.push((label, "DS".to_string(), "0X".to_string(), String::new()));
                } else if disp < cursor {
                    rows.push((label, "DS".to_string(), format!("0XL{len}"), String::new()));
                } else {
                    rows.push((label, "DS".to_string(), format!("XL{len}"), String::new()));
                    cursor = disp + len;
                }
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::{BaseBinding, DsectRegistry};

    #[test]
    fn csect_binding_spans_4k_windows() {
        let mut reg = DsectRegistry::new();
        reg.bind_csect(&[12, 11], 0x100);
        assert_eq!(reg.binding(12), Some(&BaseBinding::Csect(0x100)));
        assert_eq!(reg.binding(11), Some(&BaseBinding::Csect(0x1100)));
        assert_eq!(reg.binding(10), None);
    }

    #[test]
    fn dsect_binding_and_drop() {
        let mut reg = DsectRegistry::new();
        reg.bind_dsect(&[13], "WA", Some("Working storage"));
        assert!(matches!(
            reg.binding(13),
            Some(BaseBinding::Dsect { name, offset: 0 }) if name == "WA"
        ));
        reg.drop_regs(&[13]);
        assert_eq!(reg.binding(13), None);
        assert!(!reg.is_empty(), "DSECT outlives its binding");
    }

    #[test]
    fn field_labels_and_monotonic_lengths() {
        let mut reg = DsectRegistry::new();
        reg.bind_dsect(&[13], "WA", None);
        assert_eq!(reg.field("WA", 0x10, 2), "WA_10");
        assert_eq!(reg.field("WA", 0x10, 4), "WA_10");
        assert_eq!(reg.field("WA", 0x10, 2), "WA_10");
        let rows = reg.bodies();
        assert!(rows.contains(&("WA_10".into(), "DS".into(), "XL4".into(), String::new())));
    }

    #[test]
    fn bodies_fill_gaps() {
        let mut reg = DsectRegistry::new();
        reg.bind_dsect(&[13], "WA", None);
        reg.field("WA", 0x10, 4);
        reg.field("WA", 0x44, 4);
        let rows = reg.bodies();
        assert_eq!(
            rows,
            vec![
                ("WA".into(), "DSECT".into(), String::new(), String::new()),
                (String::new(), "DS".into(), "XL16".into(), String::new()),
                ("WA_10".into(), "DS".into(), "XL4".into(), String::new()),
                (String::new(), "DS".into(), "XL48".into(), String::new()),
                ("WA_44".into(), "DS".into(), "XL4".into(), String::new()),
            ]
        );
    }

    #[test]
    fn zero_length_field_is_0x() {
        let mut reg = DsectRegistry::new();
        reg.bind_dsect(&[13], "WA", None);
        reg.field("WA", 0x8, 0);
        let rows = reg.bodies();
        assert!(rows.contains(&("WA_8".into(), "DS".into(), "0X".into(), String::new())));
    }

    #[test]
    fn overlapped_field_does_not_advance() {
        let mut reg = DsectRegistry::new();
        reg.bind_dsect(&[13], "WA", None);
        reg.field("WA", 0x0, 8);
        reg.field("WA", 0x4, 4);
        let rows = reg.bodies();
        assert_eq!(
            rows,
            vec![
                ("WA".into(), "DSECT".into(), String::new(), String::new()),
                ("WA_0".into(), "DS".into(), "XL8".into(), String::new()),
                ("WA_4".into(), "DS".into(), "0XL4".into(), String::new()),
            ]
        );
    }
}
