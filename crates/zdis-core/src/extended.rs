//! Extended-mnemonic resolution.
//!
//! The generic conditional instructions carry a four-bit mask whose
//! human-friendly alias depends on the kind of instruction that set the
//! condition code. Resolution is a nested lookup over (instruction kind,
//! preceding class, mask); a miss leaves the generic mnemonic in place.

/// Condition-code class of the most recently emitted instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CcClass {
    /// No usable context.
    #[default]
    None,
    /// Set by an arithmetic instruction.
    Arith,
    /// Set by a compare.
    Compare,
    /// Set by a test under mask.
    Mask,
}

/// The four conditional-branch instruction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// `BC` - branch on condition, storage target.
    Bc,
    /// `BCR` - branch on condition, register target.
    Bcr,
    /// `BRC` - branch relative on condition.
    Brc,
    /// `BRCL` - branch relative on condition, long offset.
    Brcl,
}

impl BranchKind {
    const fn unconditional(self) -> &'static str {
        match self {
            Self::Bc => "B",
            Self::Bcr => "BR",
            Self::Brc => "J",
            Self::Brcl => "JLU",
        }
    }

    const fn nop(self) -> &'static str {
        match self {
            Self::Bc => "NOP",
            Self::Bcr => "NOPR",
            Self::Brc => "JNOP",
            Self::Brcl => "JLNOP",
        }
    }

    fn conditional(self, suffix: &str) -> String {
        match self {
            Self::Bc => format!("B{suffix}"),
            Self::Bcr => format!("B{suffix}R"),
            Self::Brc => format!("J{suffix}"),
            Self::Brcl => format!("JL{suffix}"),
        }
    }
}

/// Condition suffix for a branch mask under a given class.
fn class_suffix(class: CcClass, mask: u32) -> Option<&'static str> {
    match class {
        CcClass::Compare => match mask {
            8 => Some("E"),
            7 => Some("NE"),
            4 => Some("L"),
            11 => Some("NL"),
            2 => Some("H"),
            13 => Some("NH"),
            _ => None,
        },
        CcClass::Arith => match mask {
            8 => Some("Z"),
            7 => Some("NZ"),
            4 => Some("M"),
            11 => Some("NM"),
            2 => Some("P"),
            13 => Some("NP"),
            1 => Some("O"),
            14 => Some("NO"),
            _ => None,
        },
        CcClass::Mask => match mask {
            1 => Some("O"),
            4 => Some("M"),
            8 => Some("Z"),
            7 => Some("NZ"),
            11 => Some("NM"),
            14 => Some("NO"),
            _ => None,
        },
        CcClass::None => None,
    }
}

/// Resolves an extended branch mnemonic.
///
/// Mask 0 and mask 15 always substitute (`NOP*` and the unconditional
/// form); other masks substitute only when the preceding class yields a
/// standard suffix. `None` means the generic mnemonic stands.
#[must_use]
pub fn branch(kind: BranchKind, class: CcClass, mask: u32) -> Option<String> {
    match mask {
        0 => Some(kind.nop().to_string()),
        15 => Some(kind.unconditional().to_string()),
        m => class_suffix(class, m).map(|s| kind.conditional(s)),
    }
}

/// Condition suffix for compare-and-branch masks.
///
/// These compare two operands directly, so the suffix set is fixed and
/// independent of the preceding class.
#[must_use]
pub const fn compare_jump_suffix(mask: u32) -> Option<&'static str> {
    match mask {
        8 => Some("E"),
        4 => Some("L"),
        2 => Some("H"),
        6 => Some("NE"),
        10 => Some("NL"),
        12 => Some("NH"),
        _ => None,
    }
}

/// Condition suffix for load/store-on-condition and select masks.
#[must_use]
pub const fn on_condition_suffix(mask: u32) -> Option<&'static str> {
    match mask {
        8 => Some("E"),
        7 => Some("NE"),
        4 => Some("L"),
        11 => Some("NL"),
        2 => Some("H"),
        13 => Some("NH"),
        1 => Some("O"),
        14 => Some("NO"),
        _ => None,
    }
}

/// Rotate triples with dedicated load mnemonics.
///
/// Keyed by (base mnemonic, I3, I4 with the zero flag stripped, I5); all
/// entries require the zero flag. Unknown triples keep the base rotate
/// form, which reassembles identically.
static ROTATE_TRIPLES: &[(&str, u32, u32, u32, &str)] = &[
    ("RISBHG", 0, 31, 0, "LHHR"),
    ("RISBHG", 0, 31, 32, "LHLR"),
    ("RISBHG", 16, 31, 0, "LLHHHR"),
    ("RISBHG", 16, 31, 32, "LLHLHR"),
    ("RISBHG", 24, 31, 0, "LLCHHR"),
    ("RISBHG", 24, 31, 32, "LLCHLR"),
    ("RISBLG", 32, 63, 32, "LLHFR"),
];

/// Resolves a rotate triple to its dedicated two-operand mnemonic.
#[must_use]
pub fn rotate_triple(base: &str, i3: u32, i4: u32, i5: u32) -> Option<&'static str> {
    if i4 < 0x80 {
        return None;
    }
    let masked = i4 & 0x7F;
    ROTATE_TRIPLES
        .iter()
        .find(|&&(b, a, m, s, _)| b == base && a == i3 && m == masked && s == i5)
        .map(|&(_, _, _, _, ext)| ext)
}
