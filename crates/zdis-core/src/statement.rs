//! Output statements, directive attachment, and line rendering.
//!
//! Statements accumulate in emission order. Directives and comment blocks
//! attach to a location and flush, insertion-ordered and deduplicated,
//! immediately before the first statement emitted there.

use std::collections::{BTreeMap, HashMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Width of the label column.
const LABEL_WIDTH: usize = 8;
/// Width of the operation column.
const OP_WIDTH: usize = 5;
/// Width of the operand column.
const OPERAND_WIDTH: usize = 22;
/// Last column of assembler-significant text.
const ASM_WIDTH: usize = 71;

/// One numbered output record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Statement {
    /// Assembler label column content.
    pub label: Option<String>,
    /// Mnemonic or directive.
    pub op: String,
    /// Operand text.
    pub operands: String,
    /// Trailing comment.
    pub comment: String,
    /// Location the statement was emitted at.
    pub loc: Option<u32>,
    /// Raw hex consumed (empty for directives).
    pub hex: String,
    /// Format name for the source overlay.
    pub format: String,
    /// Hinted operand length for the source overlay.
    pub hint: String,
    /// Byte length of an emitted data constant, for width widening.
    pub dc_len: Option<u32>,
    /// Full-line comment content; when set, rendered verbatim.
    pub raw: Option<String>,
}

impl Statement {
    /// A source statement with a location overlay.
    #[must_use]
    pub fn source(loc: u32, op: &str, operands: String, comment: String, hex: String) -> Self {
        Self {
            op: op.to_string(),
            operands,
            comment,
            loc: Some(loc),
            hex,
            ..Self::default()
        }
    }

    /// A directive statement at a location, with no overlay.
    #[must_use]
    pub fn directive(loc: u32, op: &str, operands: String) -> Self {
        Self {
            op: op.to_string(),
            operands,
            loc: Some(loc),
            ..Self::default()
        }
    }

    /// A verbatim full-line comment.
    #[must_use]
    pub fn raw_line(text: String) -> Self {
        Self {
            raw: Some(text),
            ..Self::default()
        }
    }

    /// Whether this statement occupies storage (carries consumed hex).
    #[must_use]
    pub fn is_source(&self) -> bool {
        !self.hex.is_empty()
    }

    /// Renders the statement as one listing line.
    #[must_use]
    pub fn render(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let label = self.label.as_deref().unwrap_or("");
        let full = format!(
            "{label:<LABEL_WIDTH$} {:<OP_WIDTH$} {:<OPERAND_WIDTH$} {}",
            self.op, self.operands, self.comment
        );
        let mut line = full.trim_end().to_string();
        if self.is_source() {
            if line.len() > ASM_WIDTH {
                line.truncate(ASM_WIDTH);
            }
            let loc = self.loc.unwrap_or(0);
            line = format!(
                "{line:<ASM_WIDTH$}  {loc:08X} {:<12} {:<5} {}",
                self.hex, self.format, self.hint
            );
            line.trim_end().to_string()
        } else {
            line
        }
    }
}

/// A directive or comment block pending at a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Operation (`USING`, `DROP`, `ORG`, ...); empty for raw blocks.
    pub op: String,
    /// Operand text.
    pub operands: String,
    /// Raw comment lines, rendered verbatim when non-empty.
    pub raw: Vec<String>,
}

impl Directive {
    /// A plain directive.
    #[must_use]
    pub fn new(op: &str, operands: String) -> Self {
        Self {
            op: op.to_string(),
            operands,
            raw: Vec::new(),
        }
    }

    /// A comment block of verbatim lines.
    #[must_use]
    pub fn block(lines: Vec<String>) -> Self {
        Self {
            op: String::new(),
            operands: String::new(),
            raw: lines,
        }
    }

    fn dedup_key(&self) -> String {
        if self.raw.is_empty() {
            format!("{} {}", self.op, self.operands)
        } else {
            self.raw.join("\n")
        }
    }
}

/// The location-keyed statement buffer.
#[derive(Debug, Default)]
pub struct StatementBuffer {
    statements: Vec<Statement>,
    by_loc: HashMap<u32, usize>,
    pending: BTreeMap<u32, Vec<Directive>>,
    attached: HashSet<(u32, String)>,
}

impl StatementBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a directive at a location.
    ///
    /// Attachment is idempotent by (location, directive text) and
    /// preserves insertion order per location.
    pub fn attach(&mut self, loc: u32, directive: Directive) {
        let key = (loc, directive.dedup_key());
        if self.attached.contains(&key) {
            return;
        }
        self.attached.insert(key);
        self.pending.entry(loc).or_default().push(directive);
    }

    /// Whether directives are pending at `loc`.
    #[must_use]
    pub fn has_pending(&self, loc: u32) -> bool {
        self.pending.contains_key(&loc)
    }

    fn flush_at(&mut self, loc: u32) {
        let Some(directives) = self.pending.remove(&loc) else {
            return;
        };
        for directive in directives {
            if directive.raw.is_empty() {
                self.statements
                    .push(Statement::directive(loc, &directive.op, directive.operands));
            } else {
                for line in directive.raw {
                    self.statements.push(Statement::raw_line(line));
                }
            }
        }
    }

    /// Flushes pending directives for the statement's location, then
    /// appends it. Returns the statement's sequence index.
    pub fn emit(&mut self, stmt: Statement) -> usize {
        if let Some(loc) = stmt.loc {
            self.flush_at(loc);
            if stmt.is_source() {
                self.by_loc.entry(loc).or_insert(self.statements.len());
            }
        }
        self.statements.push(stmt);
        self.statements.len() - 1
    }

    /// Flushes every still-pending directive, ascending by location.
    pub fn flush_remaining(&mut self) {
        let locs: Vec<u32> = self.pending.keys().copied().collect();
        for loc in locs {
            self.flush_at(loc);
        }
    }

    /// Index of the first source statement emitted at `loc`.
    #[must_use]
    pub fn index_at(&self, loc: u32) -> Option<usize> {
        self.by_loc.get(&loc).copied()
    }

    /// All statements, in emission order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Mutable access for finalization patching.
    pub fn statements_mut(&mut self) -> &mut Vec<Statement> {
        &mut self.statements
    }
}

#[cfg(test)]
mod tests {
    use super::{Directive, Statement, StatementBuffer};

    #[test]
    fn render_pads_columns() {
        let mut stmt = Statement::source(0, "LR", "R12,R15".into(), "Load (32)".into(), "18CF".into());
        stmt.format = "RR".into();
        let line = stmt.render();
        assert!(line.starts_with("         LR    R12,R15"));
        assert!(line.contains("Load (32)"));
        assert!(line.contains("00000000 18CF"));
        assert!(line.contains(" RR"));
        assert_eq!(&line[71..73], "  ", "overlay starts after column 71");
    }

    #[test]
    fn render_directive_has_no_overlay() {
        let stmt = Statement::directive(0x10, "USING", "*,R12".into());
        assert_eq!(stmt.render(), "         USING *,R12");
    }

    #[test]
    fn render_label_column() {
        let mut stmt = Statement::source(0x10, "DC", "H'34'".into(), String::new(), "0022".into());
        stmt.label = Some("L10".into());
        assert!(stmt.render().starts_with("L10      DC    H'34'"));
    }

    #[test]
    fn long_comment_is_capped_at_71() {
        let comment = "x".repeat(120);
        let stmt = Statement::source(0, "LR", "R1,R2".into(), comment, "1812".into());
        let line = stmt.render();
        assert_eq!(&line[71..73], "  ");
        assert!(line.contains("00000000 1812"));
    }

    #[test]
    fn directives_flush_before_first_statement_at_location() {
        let mut buf = StatementBuffer::new();
        buf.attach(0, Directive::new("USING", "*,R12".into()));
        buf.emit(Statement::source(0, "LR", "R12,R15".into(), String::new(), "18CF".into()));
        let ops: Vec<&str> = buf.statements().iter().map(|s| s.op.as_str()).collect();
        assert_eq!(ops, vec!["USING", "LR"]);
    }

    #[test]
    fn attachment_is_idempotent_by_text() {
        let mut buf = StatementBuffer::new();
        buf.attach(0, Directive::new("USING", "*,R12".into()));
        buf.attach(0, Directive::new("USING", "*,R12".into()));
        buf.attach(0, Directive::new("DROP", "R12".into()));
        buf.emit(Statement::source(0, "LR", "R12,R15".into(), String::new(), "18CF".into()));
        let ops: Vec<&str> = buf.statements().iter().map(|s| s.op.as_str()).collect();
        assert_eq!(ops, vec!["USING", "DROP", "LR"]);
    }

    #[test]
    fn index_tracks_first_source_statement() {
        let mut buf = StatementBuffer::new();
        buf.emit(Statement::directive(0, "START", String::new()));
        let i = buf.emit(Statement::source(0, "LR", "R1,R2".into(), String::new(), "1812".into()));
        buf.emit(Statement::source(4, "LR", "R3,R4".into(), String::new(), "1834".into()));
        assert_eq!(buf.index_at(0), Some(i));
        assert_eq!(buf.index_at(8), None);
    }

    #[test]
    fn comment_blocks_flush_verbatim() {
        let mut buf = StatementBuffer::new();
        buf.attach(4, Directive::block(vec!["*---*".into(), "* hi".into()]));
        buf.emit(Statement::source(4, "DC", "H'1'".into(), String::new(), "0001".into()));
        assert_eq!(buf.statements()[0].render(), "*---*");
        assert_eq!(buf.statements()[1].render(), "* hi");
    }

    #[test]
    fn flush_remaining_drains_in_location_order() {
        let mut buf = StatementBuffer::new();
        buf.attach(8, Directive::new("DROP", "R13".into()));
        buf.attach(4, Directive::new("DROP", "R12".into()));
        buf.flush_remaining();
        let operands: Vec<&str> = buf.statements().iter().map(|s| s.operands.as_str()).collect();
        assert_eq!(operands, vec!["R12", "R13"]);
    }
}
