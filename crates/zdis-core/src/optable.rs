//! The instruction table: embedded definition, load-time validation, and
//! opcode probing.
//!
//! Instructions are parsed once from `optable.txt`. Each line carries the
//! opcode (2, 3, or 4 hex digits), mnemonic, format name, semantic flag,
//! operand-length hint, and description. Validation failures are fatal
//! [`TableError`]s; probing is infallible and returns the first matching
//! table entry in the fixed aa / ccc / dddd / bbbb order.

use std::collections::HashMap;

use crate::diag::TableError;
use crate::fields::Field;
use crate::formats::{self, Format, LengthHint};

/// The embedded instruction table source.
const TABLE_TEXT: &str = include_str!("optable.txt");

/// Semantic flag of an instruction, steering extended-mnemonic
/// post-processing and condition-class tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// No special handling.
    None,
    /// Arithmetic; sets the preceding class to `A`.
    Arith,
    /// Compare; sets the preceding class to `C`.
    Compare,
    /// Test under mask; sets the preceding class to `M`.
    Mask,
    /// Conditional branch (`BC`/`BCR`); extended mnemonic by mask.
    Branch,
    /// Relative conditional branch (`BRC`/`BRCL`).
    RelBranch,
    /// Compare and jump/branch; extended mnemonic suffixed by the mask.
    CompareJump,
    /// Jump on index; relative target, no substitution.
    JumpIndex,
    /// Load/store on condition; extended mnemonic by mask.
    OnCondition,
    /// Select; extended mnemonic by mask, M4 dropped.
    Select,
    /// Rotate-then-insert family; triple mapping and `Z` suffix.
    Rotate,
    /// 16-bit relative storage/branch operand.
    Rel4,
    /// 32-bit relative storage/branch operand.
    Rel8,
    /// Sets the condition code only; clears the preceding class.
    CcOnly,
}

impl Flag {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "." => Self::None,
            "A" => Self::Arith,
            "C" => Self::Compare,
            "M" => Self::Mask,
            "B" => Self::Branch,
            "R" => Self::RelBranch,
            "CJ" => Self::CompareJump,
            "JX" => Self::JumpIndex,
            "O" => Self::OnCondition,
            "S" => Self::Select,
            "RO" => Self::Rotate,
            "R4" => Self::Rel4,
            "R8" => Self::Rel8,
            "c" => Self::CcOnly,
            _ => return None,
        })
    }
}

fn parse_hint(token: &str) -> Option<LengthHint> {
    Some(match token {
        "-" => LengthHint::None,
        "1" => LengthHint::Bytes(1),
        "2" => LengthHint::Bytes(2),
        "4" => LengthHint::Bytes(4),
        "8" => LengthHint::Bytes(8),
        "16" => LengthHint::Bytes(16),
        "l1" => LengthHint::LenPlusOne(Field::L1),
        "l2" => LengthHint::LenPlusOne(Field::L2),
        "hm4" => LengthHint::Multiple(Field::R1, Field::R3, 4),
        "hm8" => LengthHint::Multiple(Field::R1, Field::R3, 8),
        "ml3" => LengthHint::MaskLen(Field::M3),
        _ => return None,
    })
}

/// One instruction definition.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Opcode hex digits (2, 3, or 4).
    pub opcode: String,
    /// Assembler mnemonic.
    pub mnemonic: String,
    /// The parse/emit format.
    pub format: &'static Format,
    /// Semantic flag.
    pub flag: Flag,
    /// Operand length hint.
    pub hint: LengthHint,
    /// Human-readable description, used as the trailing comment.
    pub description: String,
}

/// The loaded and validated instruction tables.
#[derive(Debug)]
pub struct OpcodeTables {
    instructions: Vec<Instruction>,
    by_opcode: HashMap<String, usize>,
}

impl OpcodeTables {
    /// Loads the embedded table.
    ///
    /// # Errors
    ///
    /// Returns a [`TableError`] when the embedded definition is internally
    /// inconsistent (DIS0002 through DIS0005). This is a programmer error,
    /// not a function of user input.
    pub fn load() -> Result<Self, TableError> {
        Self::parse(TABLE_TEXT)
    }

    fn parse(text: &str) -> Result<Self, TableError> {
        for format in formats::FORMATS {
            let covered = format.template_nibbles();
            if covered != u32::from(format.nibbles) {
                return Err(TableError::TemplateMismatch {
                    format: format.name.to_string(),
                    template: covered,
                    length: u32::from(format.nibbles),
                });
            }
        }

        let mut instructions = Vec::new();
        let mut by_opcode = HashMap::new();
        let mut by_mnemonic: HashMap<String, usize> = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(opcode), Some(mnemonic), Some(format_name), Some(flag), Some(hint)) = (
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next(),
            ) else {
                return Err(TableError::MalformedLine(line.to_string()));
            };
            let description = parts.collect::<Vec<_>>().join(" ");

            if !(2..=4).contains(&opcode.len())
                || !opcode.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(TableError::MalformedLine(line.to_string()));
            }
            let flag = Flag::parse(flag)
                .ok_or_else(|| TableError::MalformedLine(line.to_string()))?;
            let hint = parse_hint(hint)
                .ok_or_else(|| TableError::MalformedLine(line.to_string()))?;
            let format = formats::by_name(format_name).ok_or_else(|| TableError::UnknownFormat {
                mnemonic: mnemonic.to_string(),
                format: format_name.to_string(),
            })?;

            let index = instructions.len();
            if by_opcode.insert(opcode.to_string(), index).is_some() {
                return Err(TableError::DuplicateOpcode(opcode.to_string()));
            }
            if by_mnemonic.insert(mnemonic.to_string(), index).is_some() {
                return Err(TableError::DuplicateMnemonic(mnemonic.to_string()));
            }
            instructions.push(Instruction {
                opcode: opcode.to_string(),
                mnemonic: mnemonic.to_string(),
                format,
                flag,
                hint,
                description,
            });
        }

        Ok(Self {
            instructions,
            by_opcode,
        })
    }

    /// All loaded instruction definitions, in table order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Probes a 12-nibble window for an instruction.
    ///
    /// Probe order is load-bearing: first byte (`aa`), first byte plus
    /// fourth nibble (`ccc`), first and last bytes (`dddd`, only when the
    /// first nibble is `E` and the first byte is not `E5`), then the first
    /// two bytes (`bbbb`). The first table hit wins.
    #[must_use]
    pub fn probe(&self, window: &[u8; 12]) -> Option<&Instruction> {
        let hex = |n: u8| char::from_digit(u32::from(n), 16).unwrap_or('0').to_ascii_uppercase();
        let aa: String = [hex(window[0]), hex(window[1])].iter().collect();
        if let Some(&i) = self.by_opcode.get(&aa) {
            return Some(&self.instructions[i]);
        }
        let ccc: String = [hex(window[0]), hex(window[1]), hex(window[3])].iter().collect();
        if let Some(&i) = self.by_opcode.get(&ccc) {
            return Some(&self.instructions[i]);
        }
        if window[0] == 0xE && window[1] != 0x5 {
            let dddd: String = [hex(window[0]), hex(window[1]), hex(window[10]), hex(window[11])]
                .iter()
                .collect();
            if let Some(&i) = self.by_opcode.get(&dddd) {
                return Some(&self.instructions[i]);
            }
        }
        let bbbb: String = window[..4].iter().map(|&n| hex(n)).collect();
        self.by_opcode.get(&bbbb).map(|&i| &self.instructions[i])
    }
}

/// Known supervisor-call numbers and the services they invoke.
static SVC_DESCRIPTIONS: &[(u32, &str)] = &[
    (0, "EXCP"),
    (1, "WAIT"),
    (2, "POST"),
    (3, "EXIT"),
    (4, "GETMAIN"),
    (5, "FREEMAIN"),
    (6, "LINK"),
    (7, "XCTL"),
    (8, "LOAD"),
    (9, "DELETE"),
    (10, "GETMAIN/FREEMAIN R"),
    (11, "TIME"),
    (12, "SYNCH"),
    (13, "ABEND"),
    (14, "SPIE"),
    (18, "BLDL/FIND"),
    (19, "OPEN"),
    (20, "CLOSE"),
    (21, "STOW"),
    (22, "OPEN TYPE=J"),
    (23, "CLOSE TYPE=T"),
    (24, "DEVTYPE"),
    (26, "CATALOG/LOCATE"),
    (33, "IOHALT"),
    (34, "MGCR/QEDIT"),
    (35, "WTO/WTOR"),
    (36, "WTL"),
    (40, "EXTRACT"),
    (41, "IDENTIFY"),
    (42, "ATTACH"),
    (44, "CHAP"),
    (46, "TTIMER"),
    (47, "STIMER"),
    (48, "DEQ"),
    (51, "SNAP/SDUMP"),
    (56, "ENQ"),
    (60, "STAE/ESTAE"),
    (62, "DETACH"),
    (64, "RDJFCB"),
    (99, "DYNALLOC"),
    (109, "ESR TYPE 3"),
    (116, "ESR TYPE 1"),
    (120, "GETMAIN/FREEMAIN RU"),
    (122, "ESR TYPE 2"),
    (130, "RACHECK"),
    (131, "RACINIT"),
    (132, "RACLIST"),
    (133, "RACDEF"),
];

/// Description of a supervisor-call number, if known.
#[must_use]
pub fn svc_description(number: u32) -> Option<&'static str> {
    SVC_DESCRIPTIONS
        .iter()
        .find(|&&(n, _)| n == number)
        .map(|&(_, d)| d)
}

#[cfg(test)]
mod tests {
    use super::{svc_description, Flag, OpcodeTables};
    use crate::formats::LengthHint;

    fn window(nibbles: &str) -> [u8; 12] {
        let mut out = [0u8; 12];
        for (i, c) in nibbles.chars().enumerate() {
            out[i] = c.to_digit(16).expect("hex nibble") as u8;
        }
        out
    }

    #[test]
    fn embedded_table_loads() {
        let tables = OpcodeTables::load().expect("embedded table must validate");
        assert!(tables.instructions().len() > 300);
    }

    #[test]
    fn probe_first_byte() {
        let tables = OpcodeTables::load().unwrap();
        let instr = tables.probe(&window("18CF")).expect("LR");
        assert_eq!(instr.mnemonic, "LR");
        assert_eq!(instr.format.name, "RR");
    }

    #[test]
    fn probe_first_byte_plus_fourth_nibble() {
        let tables = OpcodeTables::load().unwrap();
        let instr = tables.probe(&window("A7F40008")).expect("BRC");
        assert_eq!(instr.mnemonic, "BRC");
        let instr = tables.probe(&window("A71A0001")).expect("AHI");
        assert_eq!(instr.mnemonic, "AHI");
    }

    #[test]
    fn probe_split_opcode_for_e_prefix() {
        let tables = OpcodeTables::load().unwrap();
        let instr = tables.probe(&window("E31012345604")).expect("LG");
        assert_eq!(instr.mnemonic, "LG");
        assert_eq!(instr.format.name, "RXY");
    }

    #[test]
    fn e5_prefix_skips_split_probe() {
        // E500 must match LASP through the first-two-bytes probe, not the
        // first+last split (which would look up E5 + trailing byte).
        let tables = OpcodeTables::load().unwrap();
        let instr = tables.probe(&window("E50010001000")).expect("LASP");
        assert_eq!(instr.mnemonic, "LASP");
    }

    #[test]
    fn probe_first_two_bytes() {
        let tables = OpcodeTables::load().unwrap();
        let instr = tables.probe(&window("B904001F")).expect("LGR");
        assert_eq!(instr.mnemonic, "LGR");
        let instr = tables.probe(&window("0101")).expect("PR");
        assert_eq!(instr.mnemonic, "PR");
    }

    #[test]
    fn probe_unknown_returns_none() {
        let tables = OpcodeTables::load().unwrap();
        assert!(tables.probe(&window("0000")).is_none());
        assert!(tables.probe(&window("FFFF")).is_none());
    }

    #[test]
    fn flags_and_hints_parse() {
        let tables = OpcodeTables::load().unwrap();
        let lm = tables.probe(&window("98ECD00C")).expect("LM");
        assert_eq!(lm.flag, Flag::None);
        assert!(matches!(lm.hint, LengthHint::Multiple(_, _, 4)));
        let mvc = tables.probe(&window("D203")).expect("MVC");
        assert!(matches!(mvc.hint, LengthHint::LenPlusOne(_)));
        let tm = tables.probe(&window("91805000")).expect("TM");
        assert_eq!(tm.flag, Flag::Mask);
    }

    #[test]
    fn duplicate_opcode_is_rejected() {
        let text = "18 LR RR . - Load\n18 LRX RR . - Load again\n";
        let err = OpcodeTables::parse(text).unwrap_err();
        assert!(err.to_string().starts_with("DIS0004"));
    }

    #[test]
    fn duplicate_mnemonic_is_rejected() {
        let text = "18 LR RR . - Load\n19 LR RR . - Load again\n";
        let err = OpcodeTables::parse(text).unwrap_err();
        assert!(err.to_string().starts_with("DIS0003"));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let text = "18 LR ZZ . - Load\n";
        let err = OpcodeTables::parse(text).unwrap_err();
        assert!(err.to_string().starts_with("DIS0005"));
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(OpcodeTables::parse("18 LR RR\n").is_err());
        assert!(OpcodeTables::parse("XYZZY LR RR . -\n").is_err());
        assert!(OpcodeTables::parse("18 LR RR q -\n").is_err());
    }

    #[test]
    fn svc_descriptions_resolve() {
        assert_eq!(svc_description(19), Some("OPEN"));
        assert_eq!(svc_description(35), Some("WTO/WTOR"));
        assert_eq!(svc_description(200), None);
    }
}
