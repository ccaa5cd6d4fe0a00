//! The disassembly engine: annotation-driven driver and finalization.
//!
//! One engine value owns every registry for a session. The driver makes a
//! single pass over the scanned input (hex slices diced by action
//! characters, then the following tag group), dispatching each slice to
//! the code or data decoder; finalization patches back-referenced labels,
//! widens short data constants, and appends equates, DSECT bodies, the
//! undefined-labels report, and `END`. Decoding never aborts: every
//! recoverable condition becomes an in-band comment line.

use std::io;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::diag::DiagCode;
use crate::dsect::DsectRegistry;
use crate::extended::CcClass;
use crate::labels::LabelRegistry;
use crate::optable::OpcodeTables;
use crate::statement::{Directive, Statement, StatementBuffer};
use crate::stats::Stats;
use crate::tags::{scan, Action, DataType, ScanItem, Tag, UsingTarget};

/// Engine options, caller-constructed.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Initial location counter.
    pub start: u32,
    /// Emit the format/mnemonic frequency tables.
    pub stats: bool,
    /// Section name used when the input does not supply one.
    pub section: Option<String>,
}

/// Completion counters returned alongside the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    /// Number of emitted statements (comment lines included).
    pub statements: usize,
    /// Opcode positions that decoded as not-code TODO constants.
    pub todo_count: u32,
    /// Labels referenced but never defined by code or data.
    pub undefined_count: u32,
}

/// The finished listing.
#[derive(Debug, Clone)]
pub struct Listing {
    /// All statements in emission order.
    pub statements: Vec<Statement>,
    /// Rendered listing lines.
    pub lines: Vec<String>,
    /// Completion counters.
    pub summary: Summary,
}

impl Listing {
    /// The listing as one string, newline-terminated.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Writes the listing to the caller's writer.
    ///
    /// # Errors
    ///
    /// Propagates writer errors.
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.text().as_bytes())
    }
}

/// Decoding mode of the current slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Data,
}

/// The disassembler engine.
pub struct Disassembler<'t> {
    pub(crate) tables: &'t OpcodeTables,
    options: Options,
    pub(crate) loc: u32,
    mode: Mode,
    pub(crate) dtype: Option<DataType>,
    pub(crate) class: CcClass,
    pub(crate) labels: LabelRegistry,
    pub(crate) dsects: DsectRegistry,
    pub(crate) buf: StatementBuffer,
    pub(crate) stats: Stats,
    pub(crate) vector_used: bool,
    pub(crate) todo_count: u32,
    started: bool,
    section: String,
}

/// Uppercase hex rendering of a byte slice.
pub(crate) fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

impl<'t> Disassembler<'t> {
    /// Creates an engine over loaded tables.
    #[must_use]
    pub fn new(tables: &'t OpcodeTables, options: Options) -> Self {
        let section = options.section.clone().unwrap_or_else(|| "@".to_string());
        Self {
            tables,
            loc: options.start,
            options,
            mode: Mode::Code,
            dtype: None,
            class: CcClass::None,
            labels: LabelRegistry::new(),
            dsects: DsectRegistry::new(),
            buf: StatementBuffer::new(),
            stats: Stats::new(),
            vector_used: false,
            todo_count: 0,
            started: false,
            section,
        }
    }

    /// Runs one disassembly session over annotated input.
    #[must_use]
    pub fn disassemble(mut self, input: &str) -> Listing {
        for item in scan(input) {
            match item {
                ScanItem::Hex(hex) => self.decode_slice(&hex),
                ScanItem::Action(action) => self.apply_action(action),
                ScanItem::Tags(raw_tags) => {
                    for raw in raw_tags {
                        match Tag::parse(&raw) {
                            Ok(tag) => self.apply_tag(tag),
                            Err(detail) => {
                                self.ensure_started();
                                self.comment(&DiagCode::UnparseableData.comment(&detail));
                            }
                        }
                    }
                }
                ScanItem::Junk(word) => {
                    self.ensure_started();
                    self.comment(&DiagCode::InvalidHex.comment(&word));
                }
            }
        }
        self.finalize()
    }

    /// Emits the `START` statement on first use.
    fn ensure_started(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let operands = if self.options.start > 0 {
            format!("X'{:X}'", self.options.start)
        } else {
            String::new()
        };
        let mut stmt = Statement::directive(self.options.start, "START", operands);
        stmt.label = Some(self.section.clone());
        self.buf.emit(stmt);
    }

    /// Appends a full-line comment.
    pub(crate) fn comment(&mut self, text: &str) {
        self.buf.emit(Statement::raw_line(text.to_string()));
    }

    /// Decodes one hex slice in the current mode.
    fn decode_slice(&mut self, hex: &str) {
        if hex.len() % 2 != 0 {
            self.ensure_started();
            self.comment(&DiagCode::OddHex.comment(""));
            for chunk in hex.as_bytes().chunks(48) {
                let chunk = String::from_utf8_lossy(chunk);
                self.comment(&format!("*          {chunk}"));
            }
            self.loc += (hex.len() as u32 + 1) / 2 + 1;
            return;
        }
        let bytes: Vec<u8> = (0..hex.len() / 2)
            .filter_map(|i| u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).ok())
            .collect();
        self.ensure_started();
        match self.mode {
            Mode::Code => self.decode_code(&bytes),
            Mode::Data => self.decode_data(&bytes),
        }
    }

    /// Applies one action character at the current location.
    fn apply_action(&mut self, action: Action) {
        self.ensure_started();
        match action {
            Action::Code => {
                self.mode = Mode::Code;
                self.dtype = None;
            }
            Action::Data => self.mode = Mode::Data,
            Action::DataReset => {
                self.mode = Mode::Data;
                self.dtype = None;
            }
            Action::Bare => {}
        }
        if action != Action::Bare && self.labels.label_at(self.loc).is_none() {
            let name = LabelRegistry::auto_name(self.loc);
            self.labels.define(&name, self.loc);
        }
    }

    /// Applies one parsed tag at the current location.
    fn apply_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Reset => {
                self.mode = Mode::Data;
                self.dtype = None;
            }
            Tag::Type(t) => {
                self.mode = Mode::Data;
                self.dtype = Some(t);
            }
            Tag::Banner(text) => {
                self.ensure_started();
                let inner = text.len().max(40);
                let border = format!("*{}*", "-".repeat(inner + 2));
                let blank = format!("*{}*", " ".repeat(inner + 2));
                let body = format!("* {text:<inner$} *");
                self.buf.attach(
                    self.loc,
                    Directive::block(vec![border.clone(), blank.clone(), body, blank, border]),
                );
            }
            Tag::Note(text) => {
                self.ensure_started();
                let dashes = "-".repeat(text.len().max(16) + 2);
                self.buf.attach(
                    self.loc,
                    Directive::block(vec![
                        format!("*{dashes}"),
                        format!("* {text}"),
                        format!("*{dashes}"),
                    ]),
                );
            }
            Tag::Org(offset) => {
                self.ensure_started();
                self.loc = offset;
                let start = self.options.start;
                let operands = if offset >= start {
                    format!("{}+X'{:X}'", self.section, offset - start)
                } else {
                    format!("{}-X'{:X}'", self.section, start - offset)
                };
                self.buf.attach(self.loc, Directive::new("ORG", operands));
            }
            Tag::Using { regs, target } => {
                self.ensure_started();
                let base = match target {
                    UsingTarget::Here => {
                        self.dsects.bind_csect(&regs, self.loc);
                        self.labels.refer(self.loc, self.loc, 0, "USING");
                        "*".to_string()
                    }
                    UsingTarget::Loc(loc) => {
                        self.dsects.bind_csect(&regs, loc);
                        self.labels.refer(loc, self.loc, 0, "USING")
                    }
                    UsingTarget::Label(name) => {
                        if let Some(loc) = self.labels.location_of(&name) {
                            self.dsects.bind_csect(&regs, loc);
                        }
                        name
                    }
                };
                let list = register_list(&regs);
                self.buf
                    .attach(self.loc, Directive::new("USING", format!("{base},{list}")));
            }
            Tag::Drop { regs } => {
                self.ensure_started();
                self.dsects.drop_regs(&regs);
                self.buf
                    .attach(self.loc, Directive::new("DROP", register_list(&regs)));
            }
            Tag::DsectBind { regs, name, desc } => {
                self.ensure_started();
                self.dsects.bind_dsect(&regs, &name, desc.as_deref());
                let list = register_list(&regs);
                self.buf
                    .attach(self.loc, Directive::new("USING", format!("{name},{list}")));
            }
            Tag::Define { name, loc } => match loc {
                Some(loc) => {
                    self.labels.define(&name, loc);
                }
                None => {
                    if !self.started && self.loc == self.options.start {
                        self.section = name.clone();
                        self.labels.define_name_only(&name, self.loc);
                    } else {
                        self.labels.define(&name, self.loc);
                    }
                }
            },
        }
    }

    /// Emits a source statement: first statement at a location receives
    /// the location's label, and the location becomes defined.
    pub(crate) fn emit_source(&mut self, mut stmt: Statement) {
        if let Some(loc) = stmt.loc {
            if self.buf.index_at(loc).is_none() {
                if let Some(name) = self.labels.label_at(loc) {
                    stmt.label = Some(name.to_string());
                }
            }
            self.labels.mark_defined(loc);
        }
        self.buf.emit(stmt);
    }

    /// Finalization pass; consumes the engine and produces the listing.
    fn finalize(mut self) -> Listing {
        self.ensure_started();

        // A trailing action character or annotation that lands on the end
        // of the stream still needs a statement to carry its label and
        // flush its directives.
        if self.labels.label_at(self.loc).is_some() || self.buf.has_pending(self.loc) {
            let mut stmt = Statement::directive(self.loc, "DS", "0X".to_string());
            stmt.label = self.labels.label_at(self.loc).map(str::to_string);
            self.labels.mark_defined(self.loc);
            self.buf.emit(stmt);
        }
        self.buf.flush_remaining();

        // Back-reference patching: every statement at a labeled location
        // carries the label in its label column.
        for loc in self.labels.labeled_locations() {
            if let Some(index) = self.buf.index_at(loc) {
                let name = self
                    .labels
                    .label_at(loc)
                    .unwrap_or_default()
                    .to_string();
                let stmt = &mut self.buf.statements_mut()[index];
                if stmt.label.is_none() {
                    stmt.label = Some(name);
                }
                self.labels.mark_defined(loc);
            }
        }

        // Width widening: a data constant narrower than the longest
        // instruction operand observed at its location gets a zero-length
        // cover constant carrying the label.
        let old = std::mem::take(self.buf.statements_mut());
        let widened = old
            .into_iter()
            .flat_map(|mut stmt| {
                let used = stmt
                    .loc
                    .map(|loc| self.labels.used_length(loc))
                    .unwrap_or(0);
                match stmt.dc_len {
                    Some(dc_len) if used > dc_len => {
                        let mut cover =
                            Statement::directive(stmt.loc.unwrap_or(0), "DC", format!("0XL{used}"));
                        cover.label = stmt.label.take();
                        vec![cover, stmt]
                    }
                    _ => vec![stmt],
                }
            })
            .collect::<Vec<_>>();
        *self.buf.statements_mut() = widened;

        // Register equates.
        for r in 0..16u32 {
            let mut stmt = Statement::directive(self.loc, "EQU", r.to_string());
            stmt.loc = None;
            stmt.label = Some(format!("R{r}"));
            self.buf.emit(stmt);
        }
        if self.vector_used {
            for v in 0..32u32 {
                let mut stmt = Statement::directive(self.loc, "EQU", v.to_string());
                stmt.loc = None;
                stmt.label = Some(format!("V{v}"));
                self.buf.emit(stmt);
            }
        }

        // DSECT bodies.
        for (label, op, operands, comment) in self.dsects.bodies() {
            let mut stmt = Statement {
                op,
                operands,
                comment,
                ..Statement::default()
            };
            if !label.is_empty() {
                stmt.label = Some(label);
            }
            self.buf.emit(stmt);
        }

        // Statistics.
        if self.options.stats {
            for line in self.stats.report() {
                self.comment(&line);
            }
        }

        // Undefined-labels report.
        let undefined: Vec<String> = self
            .labels
            .undefined()
            .iter()
            .map(|(name, target, len, reference)| {
                format!(
                    "* {name:<8} {target:08X} LEN {len:<3} FROM {:08X} {}",
                    reference.from, reference.mnemonic
                )
            })
            .collect();
        let undefined_count = undefined.len() as u32;
        if !undefined.is_empty() {
            self.comment("*");
            self.comment("* UNDEFINED LABELS");
            for line in undefined {
                self.comment(&line);
            }
        }
        if self.todo_count > 0 {
            self.comment(&format!(
                "* {} TODO STATEMENT(S) NOT DECODED AS CODE",
                self.todo_count
            ));
        }

        let mut end = Statement::directive(self.loc, "END", String::new());
        end.loc = None;
        self.buf.emit(end);

        let statements = std::mem::take(self.buf.statements_mut());
        let mut lines = Vec::with_capacity(statements.len());
        for stmt in &statements {
            if let Some(label) = &stmt.label {
                if is_auto_label(label) {
                    lines.push(String::new());
                }
            }
            lines.push(stmt.render());
        }
        let summary = Summary {
            statements: statements.len(),
            todo_count: self.todo_count,
            undefined_count,
        };
        Listing {
            statements,
            lines,
            summary,
        }
    }
}

/// `L` followed by uppercase hex: an auto-generated label.
fn is_auto_label(name: &str) -> bool {
    name.len() > 1
        && name.starts_with('L')
        && name[1..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}

/// Renders `R12,R13` style register lists.
fn register_list(regs: &[u8]) -> String {
    regs.iter()
        .map(|r| format!("R{r}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::{hex_upper, is_auto_label, register_list};

    #[test]
    fn auto_label_detection() {
        assert!(is_auto_label("L10"));
        assert!(is_auto_label("LCAFE"));
        assert!(!is_auto_label("L"));
        assert!(!is_auto_label("LOOP"));
        assert!(!is_auto_label("WA_10"));
    }

    #[test]
    fn register_lists_render() {
        assert_eq!(register_list(&[12]), "R12");
        assert_eq!(register_list(&[12, 13]), "R12,R13");
    }

    #[test]
    fn hex_renders_uppercase() {
        assert_eq!(hex_upper(&[0x18, 0xCF]), "18CF");
        assert_eq!(hex_upper(&[0x00, 0x0A]), "000A");
    }
}
