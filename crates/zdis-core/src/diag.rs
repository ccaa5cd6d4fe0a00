//! Diagnostic codes and fatal table-load errors.
//!
//! Recoverable decode conditions never abort the engine; they are emitted
//! as in-band `*` comment lines carrying a stable `DISnnnn` code. Only a
//! malformed embedded opcode table is fatal, surfaced as [`TableError`]
//! before any decoding starts.

use thiserror::Error;

/// Fatal errors raised while loading the embedded opcode/format tables.
///
/// These indicate a programmer error in the table source, not bad user
/// input, and carry the stable diagnostic codes DIS0002 through DIS0005.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A format's parse-template nibble widths do not sum to its length.
    #[error("DIS0002 format {format}: template covers {template} nibbles, length is {length}")]
    TemplateMismatch {
        /// The offending format name.
        format: String,
        /// Sum of the template's nibble widths.
        template: u32,
        /// The declared format length in nibbles.
        length: u32,
    },
    /// The same mnemonic appears on two table lines.
    #[error("DIS0003 duplicate mnemonic {0}")]
    DuplicateMnemonic(String),
    /// The same opcode appears on two table lines.
    #[error("DIS0004 duplicate opcode {0}")]
    DuplicateOpcode(String),
    /// An instruction names a format that is not defined.
    #[error("DIS0005 instruction {mnemonic}: unknown format {format}")]
    UnknownFormat {
        /// The instruction mnemonic.
        mnemonic: String,
        /// The unknown format name.
        format: String,
    },
    /// A table line could not be tokenized at all.
    #[error("DIS0002 malformed table line: {0}")]
    MalformedLine(String),
}

/// In-band diagnostic codes for recoverable decode conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagCode {
    /// A slice or annotation could not be interpreted (DIS0001).
    UnparseableData,
    /// A non-hex character appeared inside a presumed hex run (DIS0006).
    InvalidHex,
    /// A hex run had odd nibble length (DIS0007).
    OddHex,
}

impl DiagCode {
    /// The stable code string for this diagnostic.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UnparseableData => "DIS0001",
            Self::InvalidHex => "DIS0006",
            Self::OddHex => "DIS0007",
        }
    }

    /// Formats this diagnostic as a comment line body.
    #[must_use]
    pub fn comment(self, detail: &str) -> String {
        match self {
            Self::UnparseableData => format!("* {} UNPARSEABLE DATA: {detail}", self.code()),
            Self::InvalidHex => format!("* {} INVALID HEX SKIPPED: {detail}", self.code()),
            Self::OddHex => format!("* {} ODD LENGTH HEX IGNORED: {detail}", self.code()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagCode, TableError};

    #[test]
    fn table_errors_carry_stable_codes() {
        let err = TableError::TemplateMismatch {
            format: "RR".into(),
            template: 6,
            length: 4,
        };
        assert!(err.to_string().starts_with("DIS0002"));
        assert!(TableError::DuplicateMnemonic("LR".into())
            .to_string()
            .starts_with("DIS0003"));
        assert!(TableError::DuplicateOpcode("18".into())
            .to_string()
            .starts_with("DIS0004"));
        let err = TableError::UnknownFormat {
            mnemonic: "LR".into(),
            format: "ZZ".into(),
        };
        assert!(err.to_string().starts_with("DIS0005"));
    }

    #[test]
    fn diag_comments_embed_code_and_detail() {
        let line = DiagCode::OddHex.comment("18C");
        assert!(line.starts_with("* DIS0007"));
        assert!(line.ends_with("18C"));
        assert!(DiagCode::InvalidHex.comment("18GZ").contains("DIS0006"));
        assert!(DiagCode::UnparseableData.comment("x").contains("DIS0001"));
    }
}
