//! The code decoder: opcode probing, field parsing, operand emission,
//! and extended-mnemonic post-processing.
//!
//! Each position takes a 12-nibble window (zero-padded past the end of
//! the slice). A probe miss, or a hit needing more bytes than remain,
//! takes the not-code path: the bytes become a friendly-form constant
//! with a TODO marker and the decoder moves on. Base+displacement
//! operands materialize labels and record operand lengths against their
//! targets; DSECT-bound bases translate to field labels in the operand
//! text itself.

use crate::dsect::BaseBinding;
use crate::ebcdic;
use crate::engine::{hex_upper, Disassembler};
use crate::extended::{self, BranchKind, CcClass};
use crate::fields::{self, Field, FieldValues};
use crate::formats::{LengthHint, Operand};
use crate::optable::{svc_description, Flag, Instruction};
use crate::statement::Statement;

/// Marker comment for positions that did not decode as code.
const TODO_NOTE: &str = "<-- TODO (not code)";

/// Decoration applied to a storage operand.
enum Extra {
    None,
    Index(u32),
    Len(u32),
    LenReg(u32),
    Vec(u32),
}

/// Unsigned immediate rendering: small decimal, hard blank, printable
/// character, else hex.
fn fmt_u(value: u32) -> String {
    if value < 16 {
        value.to_string()
    } else if value == 0x40 {
        "C' '".to_string()
    } else if value <= 0xFF && ebcdic::is_printable(value as u8) {
        format!("C'{}'", ebcdic::to_literal(&[value as u8]))
    } else {
        format!("X'{value:X}'")
    }
}

/// 20-bit long displacement from its low and high parts, signed.
fn long_disp(fields: &FieldValues, dl: Field, dh: Field) -> i64 {
    let raw = i64::from((fields.value(dh) << 12) | fields.value(dl));
    if raw & 0x8_0000 != 0 {
        raw - 0x10_0000
    } else {
        raw
    }
}

/// Whether a recipe element renders the instruction's condition mask.
fn is_mask_element(element: Operand) -> bool {
    matches!(
        element,
        Operand::U(Field::M1 | Field::M3 | Field::M4) | Operand::M(Field::M3)
    )
}

impl Disassembler<'_> {
    /// Decodes one code slice instruction by instruction.
    pub(crate) fn decode_code(&mut self, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let rest = &bytes[i..];
            let mut window = [0u8; 12];
            for (j, slot) in window.iter_mut().enumerate() {
                let byte = rest.get(j / 2).copied().unwrap_or(0);
                *slot = if j % 2 == 0 { byte >> 4 } else { byte & 0xF };
            }
            let Some(instr) = self.tables.probe(&window) else {
                i += self.emit_not_code(rest);
                continue;
            };
            let len = instr.format.bytes();
            if len > rest.len() {
                i += self.emit_not_code(rest);
                continue;
            }
            self.decode_instruction(instr, &window, &rest[..len]);
            i += len;
        }
    }

    /// Emits the not-code constant for an undecodable position.
    fn emit_not_code(&mut self, rest: &[u8]) -> usize {
        self.todo_count += 1;
        let take = rest.len().min(2);
        let chunk = rest[..take].to_vec();
        let note = TODO_NOTE.to_string();
        if take == 2 {
            let value = i16::from_be_bytes([chunk[0], chunk[1]]);
            let text = if self.loc % 2 == 0 && i64::from(value).abs() <= 4096 {
                format!("H'{value}'")
            } else {
                format!("XL2'{}'", hex_upper(&chunk))
            };
            self.emit_dc_todo(&chunk, text, note);
        } else {
            let text = format!("AL1({})", chunk[0]);
            self.emit_dc_todo(&chunk, text, note);
        }
        take
    }

    fn emit_dc_todo(&mut self, chunk: &[u8], operands: String, comment: String) {
        let mut stmt = Statement::source(self.loc, "DC", operands, comment, hex_upper(chunk));
        stmt.dc_len = Some(chunk.len() as u32);
        self.emit_source(stmt);
        self.loc += chunk.len() as u32;
    }

    /// Decodes one matched instruction.
    fn decode_instruction(&mut self, instr: &Instruction, window: &[u8; 12], raw: &[u8]) {
        let parsed = fields::parse(instr.format.template, window);
        let hint = eval_hint(instr, &parsed);
        let instr_loc = self.loc;

        let mut operands: Vec<(String, bool)> = Vec::new();
        for element in instr.format.recipe {
            if let Some(text) = self.operand_text(*element, &parsed, instr_loc, hint, instr) {
                operands.push((text, is_mask_element(*element)));
            }
        }

        let (mnemonic, operands, comment) = self.postprocess(instr, &parsed, operands);
        self.stats.record(instr.format.name, &mnemonic);
        self.class = match instr.flag {
            Flag::Arith => CcClass::Arith,
            Flag::Compare => CcClass::Compare,
            Flag::Mask => CcClass::Mask,
            Flag::CcOnly => CcClass::None,
            _ => self.class,
        };

        let mut stmt = Statement::source(
            instr_loc,
            &mnemonic,
            operands.join(","),
            comment,
            hex_upper(raw),
        );
        stmt.format = instr.format.name.to_string();
        if hint > 0 {
            stmt.hint = hint.to_string();
        }
        self.emit_source(stmt);
        self.loc += raw.len() as u32;
    }

    /// Renders one recipe element; `None` suppresses the operand.
    fn operand_text(
        &mut self,
        element: Operand,
        parsed: &FieldValues,
        instr_loc: u32,
        hint: u32,
        instr: &Instruction,
    ) -> Option<String> {
        let v = |f: Field| parsed.value(f);
        match element {
            Operand::R(f) => Some(format!("R{}", v(f))),
            Operand::V(f) => {
                self.vector_used = true;
                Some(format!("V{}", v(f)))
            }
            Operand::U(f) => Some(fmt_u(v(f))),
            Operand::S(f) => Some(parsed.signed(f).to_string()),
            Operand::X(f) => {
                let width = usize::from(parsed.width(f));
                Some(format!("X'{:0width$X}'", v(f)))
            }
            Operand::M(f) => Some(format!("B'{:04b}'", v(f) & 0xF)),
            Operand::Om(f) => {
                let mask = v(f) & 0xF;
                (mask != 0).then(|| format!("B'{mask:04b}'"))
            }
            Operand::Ml(f) => Some((v(f) & 0xF).count_ones().to_string()),
            Operand::Db { d, b } | Operand::Dbs { d, b } => Some(self.storage(
                i64::from(v(d)),
                v(b),
                Extra::None,
                instr_loc,
                hint,
                &instr.mnemonic,
            )),
            Operand::Ldb { dl, dh, b } | Operand::Ldbs { dl, dh, b } => Some(self.storage(
                long_disp(parsed, dl, dh),
                v(b),
                Extra::None,
                instr_loc,
                hint,
                &instr.mnemonic,
            )),
            Operand::Dxb { d, x, b } => Some(self.storage(
                i64::from(v(d)),
                v(b),
                Extra::Index(v(x)),
                instr_loc,
                hint,
                &instr.mnemonic,
            )),
            Operand::Ldxb { dl, dh, x, b } => Some(self.storage(
                long_disp(parsed, dl, dh),
                v(b),
                Extra::Index(v(x)),
                instr_loc,
                hint,
                &instr.mnemonic,
            )),
            Operand::Dlb { d, l, b } => Some(self.storage(
                i64::from(v(d)),
                v(b),
                Extra::Len(v(l) + 1),
                instr_loc,
                hint,
                &instr.mnemonic,
            )),
            Operand::Drb { d, r, b } => Some(self.storage(
                i64::from(v(d)),
                v(b),
                Extra::LenReg(v(r)),
                instr_loc,
                hint,
                &instr.mnemonic,
            )),
            Operand::Dvb { d, v: vf, b } => {
                self.vector_used = true;
                Some(self.storage(
                    i64::from(v(d)),
                    v(b),
                    Extra::Vec(v(vf)),
                    instr_loc,
                    hint,
                    &instr.mnemonic,
                ))
            }
            Operand::Rel(f) => {
                let offset = 2 * parsed.signed(f);
                let target = (i64::from(instr_loc) + offset).max(0) as u32;
                Some(self.labels.refer(target, instr_loc, hint, &instr.mnemonic))
            }
        }
    }

    /// Resolves one base+displacement operand.
    ///
    /// A CSECT-bound base materializes the target label (for the label
    /// column and the reference report) but keeps the explicit
    /// displacement form in the operand text; a DSECT-bound base
    /// translates to the inferred field label.
    fn storage(
        &mut self,
        disp: i64,
        base: u32,
        extra: Extra,
        instr_loc: u32,
        hint: u32,
        mnemonic: &str,
    ) -> String {
        if base != 0 {
            match self.dsects.binding(base as u8) {
                Some(&BaseBinding::Csect(origin)) => {
                    let target = (i64::from(origin) + disp).max(0) as u32;
                    let _ = self.labels.refer(target, instr_loc, hint, mnemonic);
                }
                Some(BaseBinding::Dsect { name, offset }) => {
                    let name = name.clone();
                    let fdisp = (i64::from(*offset) + disp).max(0) as u32;
                    let label = self.dsects.field(&name, fdisp, hint);
                    return decorate(&label, &extra);
                }
                None => {}
            }
        }
        explicit_form(disp, base, &extra)
    }
}

/// Field-label form of a storage operand.
fn decorate(label: &str, extra: &Extra) -> String {
    match extra {
        Extra::None | Extra::Index(0) => label.to_string(),
        Extra::Index(x) => format!("{label}(R{x})"),
        Extra::Len(l) => format!("{label}({l})"),
        Extra::LenReg(r) => format!("{label}(R{r})"),
        Extra::Vec(v) => format!("{label}(V{v})"),
    }
}

/// Explicit displacement form of a storage operand.
fn explicit_form(disp: i64, base: u32, extra: &Extra) -> String {
    match extra {
        Extra::None => {
            if base != 0 {
                format!("{disp}(R{base})")
            } else {
                disp.to_string()
            }
        }
        Extra::Index(x) => match (*x != 0, base != 0) {
            (true, true) => format!("{disp}(R{x},R{base})"),
            (true, false) => format!("{disp}(R{x})"),
            (false, true) => format!("{disp}(,R{base})"),
            (false, false) => disp.to_string(),
        },
        Extra::Len(l) => {
            if base != 0 {
                format!("{disp}({l},R{base})")
            } else {
                format!("{disp}({l})")
            }
        }
        Extra::LenReg(r) => {
            if base != 0 {
                format!("{disp}(R{r},R{base})")
            } else {
                format!("{disp}(R{r})")
            }
        }
        Extra::Vec(v) => {
            if base != 0 {
                format!("{disp}(V{v},R{base})")
            } else {
                format!("{disp}(V{v})")
            }
        }
    }
}

/// Evaluates the instruction's operand-length hint.
fn eval_hint(instr: &Instruction, parsed: &FieldValues) -> u32 {
    match instr.hint {
        LengthHint::None => 0,
        LengthHint::Bytes(n) => u32::from(n),
        LengthHint::LenPlusOne(f) => parsed.value(f) + 1,
        LengthHint::Multiple(r1, r3, n) => {
            let span = (parsed.value(r3) + 16 - parsed.value(r1)) & 0xF;
            (1 + span) * u32::from(n)
        }
        LengthHint::MaskLen(m) => (parsed.value(m) & 0xF).count_ones(),
    }
}

impl Disassembler<'_> {
    /// Applies the semantic flag: extended mnemonics, mask dropping,
    /// rotate triples, and the SVC comment.
    fn postprocess(
        &mut self,
        instr: &Instruction,
        parsed: &FieldValues,
        mut operands: Vec<(String, bool)>,
    ) -> (String, Vec<String>, String) {
        let mut mnemonic = instr.mnemonic.clone();
        let mut comment = instr.description.clone();
        let mut drop_mask = false;

        match instr.flag {
            Flag::Branch | Flag::RelBranch => {
                let mask = parsed.value(Field::M1);
                let kind = if instr.flag == Flag::Branch {
                    if instr.format.name == "RRm" {
                        BranchKind::Bcr
                    } else {
                        BranchKind::Bc
                    }
                } else if parsed.width(Field::Ri2) == 8 {
                    BranchKind::Brcl
                } else {
                    BranchKind::Brc
                };
                if let Some(ext) = extended::branch(kind, self.class, mask) {
                    mnemonic = ext;
                    drop_mask = true;
                }
            }
            Flag::CompareJump => {
                if let Some(suffix) = extended::compare_jump_suffix(parsed.value(Field::M3)) {
                    mnemonic.push_str(suffix);
                    drop_mask = true;
                }
            }
            Flag::OnCondition => {
                if let Some(suffix) = extended::on_condition_suffix(parsed.value(Field::M3)) {
                    mnemonic.push_str(suffix);
                    drop_mask = true;
                }
            }
            Flag::Select => {
                if let Some(suffix) = extended::on_condition_suffix(parsed.value(Field::M4)) {
                    mnemonic.push_str(suffix);
                    drop_mask = true;
                }
            }
            Flag::Rotate => {
                let (i3, i4, i5) = (
                    parsed.value(Field::I3),
                    parsed.value(Field::I4),
                    parsed.value(Field::I5),
                );
                if let Some(ext) = extended::rotate_triple(&mnemonic, i3, i4, i5) {
                    mnemonic = ext.to_string();
                    operands.truncate(2);
                } else if i4 >= 0x80 {
                    mnemonic.push('Z');
                    if let Some(slot) = operands.get_mut(3) {
                        slot.0 = fmt_u(i4 & 0x7F);
                    }
                }
            }
            _ => {}
        }

        if mnemonic == "SVC" {
            if let Some(desc) = svc_description(parsed.value(Field::I1)) {
                comment = desc.to_string();
            }
        }

        let operands = operands
            .into_iter()
            .filter(|(_, mask)| !(drop_mask && *mask))
            .map(|(text, _)| text)
            .collect();
        (mnemonic, operands, comment)
    }
}

#[cfg(test)]
mod tests {
    use super::{explicit_form, fmt_u, long_disp, Extra};
    use crate::fields::{parse, Field};

    #[test]
    fn unsigned_rendering_tiers() {
        assert_eq!(fmt_u(0), "0");
        assert_eq!(fmt_u(15), "15");
        assert_eq!(fmt_u(0x40), "C' '");
        assert_eq!(fmt_u(0xC1), "C'A'");
        assert_eq!(fmt_u(0x7D), "C''''", "apostrophe doubles");
        assert_eq!(fmt_u(0x00FF), "X'FF'");
        assert_eq!(fmt_u(0x8000), "X'8000'");
    }

    #[test]
    fn long_displacements_are_signed_20_bit() {
        let template = [
            (Field::Op, 2),
            (Field::R1, 1),
            (Field::R3, 1),
            (Field::B2, 1),
            (Field::Dl2, 3),
            (Field::Dh2, 2),
            (Field::Op, 2),
        ];
        let mut window = [0u8; 12];
        for (i, c) in "EB14DFF8FF04".chars().enumerate() {
            window[i] = c.to_digit(16).unwrap() as u8;
        }
        let parsed = parse(&template, &window);
        // DL=FF8, DH=FF -> 0xFFFF8 -> -8
        assert_eq!(long_disp(&parsed, Field::Dl2, Field::Dh2), -8);
    }

    #[test]
    fn explicit_forms_omit_zero_parts() {
        assert_eq!(explicit_form(16, 12, &Extra::Index(0)), "16(,R12)");
        assert_eq!(explicit_form(16, 12, &Extra::Index(5)), "16(R5,R12)");
        assert_eq!(explicit_form(16, 0, &Extra::Index(5)), "16(R5)");
        assert_eq!(explicit_form(4, 0, &Extra::Index(0)), "4");
        assert_eq!(explicit_form(4, 0, &Extra::None), "4");
        assert_eq!(explicit_form(4, 13, &Extra::None), "4(R13)");
        assert_eq!(explicit_form(0, 13, &Extra::Len(12)), "0(12,R13)");
    }
}
