//! Instruction format templates and operand emission recipes.
//!
//! Each format pairs a parse template (ordered fields with nibble widths,
//! opcode nibbles included) with a typed emission recipe. The recipe
//! variants are the operand-generating helpers of the instruction table:
//! register/vector names, immediates in several renderings, and the
//! base+displacement combinations that translate against bound registers.

use crate::fields::Field;

/// One element of a format's operand emission recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// General register, `Rn`.
    R(Field),
    /// Vector register, `Vn` (RXB-extended).
    V(Field),
    /// Unsigned immediate: small decimal, printable `C'c'`, else `X'..'`.
    U(Field),
    /// Signed immediate, sign-extended from the field's nibble width.
    S(Field),
    /// Hex immediate zero-padded to the field's nibble width.
    X(Field),
    /// Four-bit mask as `B'bbbb'`.
    M(Field),
    /// Four-bit mask as `B'bbbb'`, omitted entirely when zero.
    Om(Field),
    /// Population count of a four-bit mask, as decimal.
    Ml(Field),
    /// Displacement + base, translated against bound registers.
    Db { d: Field, b: Field },
    /// `Db` with the untranslated displacement rendered signed.
    Dbs { d: Field, b: Field },
    /// 20-bit long displacement (low/high parts) + base.
    Ldb { dl: Field, dh: Field, b: Field },
    /// `Ldb` with the untranslated displacement rendered signed.
    Ldbs { dl: Field, dh: Field, b: Field },
    /// Displacement + index + base.
    Dxb { d: Field, x: Field, b: Field },
    /// Long displacement + index + base.
    Ldxb { dl: Field, dh: Field, x: Field, b: Field },
    /// Displacement + explicit length (L+1) + base.
    Dlb { d: Field, l: Field, b: Field },
    /// Displacement + register-named length + base (move-with-key forms).
    Drb { d: Field, r: Field, b: Field },
    /// Displacement + vector index + base (vector gather/scatter).
    Dvb { d: Field, v: Field, b: Field },
    /// Relative halfword offset resolved to a target label.
    Rel(Field),
}

/// Per-instruction operand length hint, a pure function of parsed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthHint {
    /// No implied storage operand length.
    #[default]
    None,
    /// A fixed byte count.
    Bytes(u8),
    /// A length field plus one (SS-format `L`, `L1`).
    LenPlusOne(Field),
    /// Load/store-multiple over `R1..R3` of n-byte elements:
    /// `(1 + ((R3 - R1) mod 16)) * n`.
    Multiple(Field, Field, u8),
    /// Population count of a mask field (insert/store characters).
    MaskLen(Field),
}

/// A named instruction format.
#[derive(Debug, Clone, Copy)]
pub struct Format {
    /// Format name as used by the instruction table.
    pub name: &'static str,
    /// Total encoded length in nibbles (4, 8, or 12).
    pub nibbles: u8,
    /// Ordered parse template; widths must sum to `nibbles`.
    pub template: &'static [(Field, u8)],
    /// Operand emission recipe.
    pub recipe: &'static [Operand],
}

impl Format {
    /// Encoded instruction length in bytes.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        (self.nibbles / 2) as usize
    }

    /// Sum of the template's nibble widths.
    #[must_use]
    pub fn template_nibbles(&self) -> u32 {
        self.template.iter().map(|&(_, w)| u32::from(w)).sum()
    }
}

use Field as F;
use Operand as O;

/// The static format table.
pub static FORMATS: &[Format] = &[
    // -- 2-byte formats ---------------------------------------------------
    Format {
        name: "E",
        nibbles: 4,
        template: &[(F::Op, 4)],
        recipe: &[],
    },
    Format {
        name: "I",
        nibbles: 4,
        template: &[(F::Op, 2), (F::I1, 2)],
        recipe: &[O::U(F::I1)],
    },
    Format {
        name: "RR",
        nibbles: 4,
        template: &[(F::Op, 2), (F::R1, 1), (F::R2, 1)],
        recipe: &[O::R(F::R1), O::R(F::R2)],
    },
    Format {
        name: "RR1",
        nibbles: 4,
        template: &[(F::Op, 2), (F::R1, 1), (F::Pad, 1)],
        recipe: &[O::R(F::R1)],
    },
    Format {
        name: "RRm",
        nibbles: 4,
        template: &[(F::Op, 2), (F::M1, 1), (F::R2, 1)],
        recipe: &[O::U(F::M1), O::R(F::R2)],
    },
    // -- 4-byte formats ---------------------------------------------------
    Format {
        name: "RX",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::X2, 1), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::R(F::R1), O::Dxb { d: F::D2, x: F::X2, b: F::B2 }],
    },
    Format {
        name: "RXm",
        nibbles: 8,
        template: &[(F::Op, 2), (F::M1, 1), (F::X2, 1), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::U(F::M1), O::Dxb { d: F::D2, x: F::X2, b: F::B2 }],
    },
    Format {
        name: "RS",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::R3, 1), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::R(F::R1), O::R(F::R3), O::Db { d: F::D2, b: F::B2 }],
    },
    Format {
        name: "RSs",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::Pad, 1), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::R(F::R1), O::Db { d: F::D2, b: F::B2 }],
    },
    Format {
        name: "RSm",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::M3, 1), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::R(F::R1), O::M(F::M3), O::Db { d: F::D2, b: F::B2 }],
    },
    Format {
        name: "RSI",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::R3, 1), (F::Ri2, 4)],
        recipe: &[O::R(F::R1), O::R(F::R3), O::Rel(F::Ri2)],
    },
    Format {
        name: "RIa",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::Op, 1), (F::I2, 4)],
        recipe: &[O::R(F::R1), O::S(F::I2)],
    },
    Format {
        name: "RIx",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::Op, 1), (F::I2, 4)],
        recipe: &[O::R(F::R1), O::X(F::I2)],
    },
    Format {
        name: "RIb",
        nibbles: 8,
        template: &[(F::Op, 2), (F::R1, 1), (F::Op, 1), (F::Ri2, 4)],
        recipe: &[O::R(F::R1), O::Rel(F::Ri2)],
    },
    Format {
        name: "RIc",
        nibbles: 8,
        template: &[(F::Op, 2), (F::M1, 1), (F::Op, 1), (F::Ri2, 4)],
        recipe: &[O::U(F::M1), O::Rel(F::Ri2)],
    },
    Format {
        name: "SI",
        nibbles: 8,
        template: &[(F::Op, 2), (F::I2, 2), (F::B1, 1), (F::D1, 3)],
        recipe: &[O::Db { d: F::D1, b: F::B1 }, O::U(F::I2)],
    },
    Format {
        name: "SIn",
        nibbles: 8,
        template: &[(F::Op, 2), (F::Pad, 2), (F::B1, 1), (F::D1, 3)],
        recipe: &[O::Db { d: F::D1, b: F::B1 }],
    },
    Format {
        name: "S",
        nibbles: 8,
        template: &[(F::Op, 4), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::Db { d: F::D2, b: F::B2 }],
    },
    Format {
        name: "RRE",
        nibbles: 8,
        template: &[(F::Op, 4), (F::Pad, 2), (F::R1, 1), (F::R2, 1)],
        recipe: &[O::R(F::R1), O::R(F::R2)],
    },
    Format {
        name: "RRE1",
        nibbles: 8,
        template: &[(F::Op, 4), (F::Pad, 2), (F::R1, 1), (F::Pad, 1)],
        recipe: &[O::R(F::R1)],
    },
    Format {
        name: "RRE0",
        nibbles: 8,
        template: &[(F::Op, 4), (F::Pad, 4)],
        recipe: &[],
    },
    Format {
        name: "RRFa",
        nibbles: 8,
        template: &[(F::Op, 4), (F::R3, 1), (F::Pad, 1), (F::R1, 1), (F::R2, 1)],
        recipe: &[O::R(F::R1), O::R(F::R2), O::R(F::R3)],
    },
    Format {
        name: "RRFsel",
        nibbles: 8,
        template: &[(F::Op, 4), (F::R3, 1), (F::M4, 1), (F::R1, 1), (F::R2, 1)],
        recipe: &[O::R(F::R1), O::R(F::R2), O::R(F::R3), O::U(F::M4)],
    },
    Format {
        name: "RRFc",
        nibbles: 8,
        template: &[(F::Op, 4), (F::M3, 1), (F::Pad, 1), (F::R1, 1), (F::R2, 1)],
        recipe: &[O::R(F::R1), O::R(F::R2), O::U(F::M3)],
    },
    // -- 6-byte formats ---------------------------------------------------
    Format {
        name: "RXY",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::X2, 1),
            (F::B2, 1),
            (F::Dl2, 3),
            (F::Dh2, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::Ldxb { dl: F::Dl2, dh: F::Dh2, x: F::X2, b: F::B2 }],
    },
    Format {
        name: "RSY",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::R3, 1),
            (F::B2, 1),
            (F::Dl2, 3),
            (F::Dh2, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::R(F::R3), O::Ldb { dl: F::Dl2, dh: F::Dh2, b: F::B2 }],
    },
    Format {
        name: "RSYm",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::M3, 1),
            (F::B2, 1),
            (F::Dl2, 3),
            (F::Dh2, 2),
            (F::Op, 2),
        ],
        recipe: &[
            O::R(F::R1),
            O::Ldb { dl: F::Dl2, dh: F::Dh2, b: F::B2 },
            O::U(F::M3),
        ],
    },
    Format {
        name: "SIY",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::I2, 2),
            (F::B1, 1),
            (F::Dl1, 3),
            (F::Dh1, 2),
            (F::Op, 2),
        ],
        recipe: &[O::Ldb { dl: F::Dl1, dh: F::Dh1, b: F::B1 }, O::U(F::I2)],
    },
    Format {
        name: "SIYs",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::I2, 2),
            (F::B1, 1),
            (F::Dl1, 3),
            (F::Dh1, 2),
            (F::Op, 2),
        ],
        recipe: &[O::Ldb { dl: F::Dl1, dh: F::Dh1, b: F::B1 }, O::S(F::I2)],
    },
    Format {
        name: "SIL",
        nibbles: 12,
        template: &[(F::Op, 4), (F::B1, 1), (F::D1, 3), (F::I2, 4)],
        recipe: &[O::Db { d: F::D1, b: F::B1 }, O::S(F::I2)],
    },
    Format {
        name: "SILu",
        nibbles: 12,
        template: &[(F::Op, 4), (F::B1, 1), (F::D1, 3), (F::I2, 4)],
        recipe: &[O::Db { d: F::D1, b: F::B1 }, O::U(F::I2)],
    },
    Format {
        name: "SSE",
        nibbles: 12,
        template: &[(F::Op, 4), (F::B1, 1), (F::D1, 3), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::Db { d: F::D1, b: F::B1 }, O::Db { d: F::D2, b: F::B2 }],
    },
    Format {
        name: "SSa",
        nibbles: 12,
        template: &[(F::Op, 2), (F::L1, 2), (F::B1, 1), (F::D1, 3), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::Dlb { d: F::D1, l: F::L1, b: F::B1 }, O::Db { d: F::D2, b: F::B2 }],
    },
    Format {
        name: "SSb",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::L1, 1),
            (F::L2, 1),
            (F::B1, 1),
            (F::D1, 3),
            (F::B2, 1),
            (F::D2, 3),
        ],
        recipe: &[
            O::Dlb { d: F::D1, l: F::L1, b: F::B1 },
            O::Dlb { d: F::D2, l: F::L2, b: F::B2 },
        ],
    },
    Format {
        name: "SSc",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::L1, 1),
            (F::I3, 1),
            (F::B1, 1),
            (F::D1, 3),
            (F::B2, 1),
            (F::D2, 3),
        ],
        recipe: &[
            O::Dlb { d: F::D1, l: F::L1, b: F::B1 },
            O::Db { d: F::D2, b: F::B2 },
            O::U(F::I3),
        ],
    },
    Format {
        name: "SSd",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::R3, 1),
            (F::B1, 1),
            (F::D1, 3),
            (F::B2, 1),
            (F::D2, 3),
        ],
        recipe: &[
            O::Drb { d: F::D1, r: F::R1, b: F::B1 },
            O::Db { d: F::D2, b: F::B2 },
            O::R(F::R3),
        ],
    },
    Format {
        name: "SSf",
        nibbles: 12,
        template: &[(F::Op, 2), (F::L2, 2), (F::B1, 1), (F::D1, 3), (F::B2, 1), (F::D2, 3)],
        recipe: &[O::Db { d: F::D1, b: F::B1 }, O::Dlb { d: F::D2, l: F::L2, b: F::B2 }],
    },
    Format {
        name: "RIEb",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::R2, 1),
            (F::Ri4, 4),
            (F::M3, 1),
            (F::Pad, 1),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::R(F::R2), O::M(F::M3), O::Rel(F::Ri4)],
    },
    Format {
        name: "RIEc",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::M3, 1),
            (F::Ri4, 4),
            (F::I2, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::S(F::I2), O::M(F::M3), O::Rel(F::Ri4)],
    },
    Format {
        name: "RIEcu",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::M3, 1),
            (F::Ri4, 4),
            (F::I2, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::U(F::I2), O::M(F::M3), O::Rel(F::Ri4)],
    },
    Format {
        name: "RIEd",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::R3, 1),
            (F::I2, 4),
            (F::Pad, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::R(F::R3), O::S(F::I2)],
    },
    Format {
        name: "RIEe",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::R3, 1),
            (F::Ri2, 4),
            (F::Pad, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::R(F::R3), O::Rel(F::Ri2)],
    },
    Format {
        name: "RIEf",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::R2, 1),
            (F::I3, 2),
            (F::I4, 2),
            (F::I5, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::R(F::R2), O::U(F::I3), O::U(F::I4), O::U(F::I5)],
    },
    Format {
        name: "RIEg",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::M3, 1),
            (F::I2, 4),
            (F::Pad, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::S(F::I2), O::U(F::M3)],
    },
    Format {
        name: "RILa",
        nibbles: 12,
        template: &[(F::Op, 2), (F::R1, 1), (F::Op, 1), (F::I2, 8)],
        recipe: &[O::R(F::R1), O::S(F::I2)],
    },
    Format {
        name: "RILx",
        nibbles: 12,
        template: &[(F::Op, 2), (F::R1, 1), (F::Op, 1), (F::I2, 8)],
        recipe: &[O::R(F::R1), O::X(F::I2)],
    },
    Format {
        name: "RILu",
        nibbles: 12,
        template: &[(F::Op, 2), (F::R1, 1), (F::Op, 1), (F::I2, 8)],
        recipe: &[O::R(F::R1), O::U(F::I2)],
    },
    Format {
        name: "RILb",
        nibbles: 12,
        template: &[(F::Op, 2), (F::R1, 1), (F::Op, 1), (F::Ri2, 8)],
        recipe: &[O::R(F::R1), O::Rel(F::Ri2)],
    },
    Format {
        name: "RILc",
        nibbles: 12,
        template: &[(F::Op, 2), (F::M1, 1), (F::Op, 1), (F::Ri2, 8)],
        recipe: &[O::U(F::M1), O::Rel(F::Ri2)],
    },
    Format {
        name: "RRS",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::R2, 1),
            (F::B4, 1),
            (F::D4, 3),
            (F::M3, 1),
            (F::Pad, 1),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::R(F::R2), O::M(F::M3), O::Db { d: F::D4, b: F::B4 }],
    },
    Format {
        name: "RIS",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::M3, 1),
            (F::B4, 1),
            (F::D4, 3),
            (F::I2, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::S(F::I2), O::M(F::M3), O::Db { d: F::D4, b: F::B4 }],
    },
    Format {
        name: "RISu",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::R1, 1),
            (F::M3, 1),
            (F::B4, 1),
            (F::D4, 3),
            (F::I2, 2),
            (F::Op, 2),
        ],
        recipe: &[O::R(F::R1), O::U(F::I2), O::M(F::M3), O::Db { d: F::D4, b: F::B4 }],
    },
    // -- vector formats ---------------------------------------------------
    Format {
        name: "VRX",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::V1, 1),
            (F::X2, 1),
            (F::B2, 1),
            (F::D2, 3),
            (F::M3, 1),
            (F::Rxb, 1),
            (F::Op, 2),
        ],
        recipe: &[O::V(F::V1), O::Dxb { d: F::D2, x: F::X2, b: F::B2 }, O::Om(F::M3)],
    },
    Format {
        name: "VRSa",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::V1, 1),
            (F::V3, 1),
            (F::B2, 1),
            (F::D2, 3),
            (F::M4, 1),
            (F::Rxb, 1),
            (F::Op, 2),
        ],
        recipe: &[O::V(F::V1), O::V(F::V3), O::Db { d: F::D2, b: F::B2 }, O::Om(F::M4)],
    },
    Format {
        name: "VRRa",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::V1, 1),
            (F::V2, 1),
            (F::Pad, 2),
            (F::M5, 1),
            (F::M4, 1),
            (F::M3, 1),
            (F::Rxb, 1),
            (F::Op, 2),
        ],
        recipe: &[O::V(F::V1), O::V(F::V2)],
    },
    Format {
        name: "VRRc",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::V1, 1),
            (F::V2, 1),
            (F::V3, 1),
            (F::Pad, 1),
            (F::M6, 1),
            (F::M5, 1),
            (F::M4, 1),
            (F::Rxb, 1),
            (F::Op, 2),
        ],
        recipe: &[O::V(F::V1), O::V(F::V2), O::V(F::V3), O::U(F::M4)],
    },
    Format {
        name: "VRV",
        nibbles: 12,
        template: &[
            (F::Op, 2),
            (F::V1, 1),
            (F::V2, 1),
            (F::B2, 1),
            (F::D2, 3),
            (F::M3, 1),
            (F::Rxb, 1),
            (F::Op, 2),
        ],
        recipe: &[O::V(F::V1), O::Dvb { d: F::D2, v: F::V2, b: F::B2 }, O::U(F::M3)],
    },
];

/// Looks up a format by name.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static Format> {
    FORMATS.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::{by_name, FORMATS};

    #[test]
    fn every_template_covers_its_length() {
        for format in FORMATS {
            assert_eq!(
                format.template_nibbles(),
                u32::from(format.nibbles),
                "format {} template does not cover its length",
                format.name
            );
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, a) in FORMATS.iter().enumerate() {
            for b in &FORMATS[i + 1..] {
                assert_ne!(a.name, b.name, "duplicate format name");
            }
        }
    }

    #[test]
    fn byte_lengths_are_2_4_or_6() {
        for format in FORMATS {
            assert!(matches!(format.bytes(), 2 | 4 | 6), "format {}", format.name);
        }
    }

    #[test]
    fn lookup_by_name() {
        assert!(by_name("RR").is_some());
        assert!(by_name("RXY").is_some());
        assert!(by_name("nope").is_none());
    }
}
