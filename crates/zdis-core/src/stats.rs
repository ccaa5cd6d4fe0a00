//! Optional instruction-frequency statistics.
//!
//! When enabled, the engine counts format and mnemonic occurrences and
//! emits two sorted frequency tables as comment lines before `END`,
//! mnemonics grouped under their format.

use std::collections::BTreeMap;

/// Format and mnemonic occurrence counters.
#[derive(Debug, Default)]
pub struct Stats {
    formats: BTreeMap<String, u32>,
    mnemonics: BTreeMap<String, (String, u32)>,
}

impl Stats {
    /// Creates empty counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one decoded instruction.
    pub fn record(&mut self, format: &str, mnemonic: &str) {
        *self.formats.entry(format.to_string()).or_insert(0) += 1;
        self.mnemonics
            .entry(mnemonic.to_string())
            .or_insert_with(|| (format.to_string(), 0))
            .1 += 1;
    }

    /// Whether anything was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Renders the two frequency tables as comment lines.
    ///
    /// Both tables sort by descending count, then name. The second table
    /// lists each format's mnemonics on the format's line.
    #[must_use]
    pub fn report(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.is_empty() {
            return lines;
        }

        let mut formats: Vec<(&String, &u32)> = self.formats.iter().collect();
        formats.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        lines.push("*".to_string());
        lines.push("* INSTRUCTION FORMAT FREQUENCY".to_string());
        for (name, count) in &formats {
            lines.push(format!("*   {count:>6}  {name}"));
        }

        let mut mnemonics: Vec<(&String, &(String, u32))> = self.mnemonics.iter().collect();
        mnemonics.sort_by(|a, b| b.1 .1.cmp(&a.1 .1).then_with(|| a.0.cmp(b.0)));
        lines.push("*".to_string());
        lines.push("* MNEMONIC FREQUENCY BY FORMAT".to_string());
        for (format_name, _) in &formats {
            let members: Vec<String> = mnemonics
                .iter()
                .filter(|(_, (f, _))| f == *format_name)
                .map(|(m, (_, c))| format!("{m}({c})"))
                .collect();
            lines.push(format!("*   {format_name:<6} {}", members.join(" ")));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::Stats;

    #[test]
    fn empty_stats_report_nothing() {
        assert!(Stats::new().report().is_empty());
    }

    #[test]
    fn counts_accumulate() {
        let mut stats = Stats::new();
        stats.record("RR", "LR");
        stats.record("RR", "LR");
        stats.record("RX", "ST");
        let report = stats.report().join("\n");
        assert!(report.contains("     2  RR"));
        assert!(report.contains("     1  RX"));
        assert!(report.contains("LR(2)"));
        assert!(report.contains("ST(1)"));
    }

    #[test]
    fn formats_sort_by_descending_count() {
        let mut stats = Stats::new();
        stats.record("RX", "ST");
        stats.record("RR", "LR");
        stats.record("RR", "AR");
        let report = stats.report();
        let rr = report.iter().position(|l| l.ends_with("RR")).unwrap();
        let rx = report.iter().position(|l| l.ends_with("RX")).unwrap();
        assert!(rr < rx);
    }

    #[test]
    fn mnemonics_group_under_their_format() {
        let mut stats = Stats::new();
        stats.record("RR", "LR");
        stats.record("RR", "AR");
        stats.record("RX", "ST");
        let report = stats.report();
        let rr_line = report
            .iter()
            .find(|l| l.contains("RR") && l.contains("LR("))
            .expect("grouped line");
        assert!(rr_line.contains("AR(1)"));
        assert!(!rr_line.contains("ST("));
    }
}
