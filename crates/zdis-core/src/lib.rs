//! Annotation-driven iterative disassembler engine for z/Architecture
//! object code.
//!
//! The engine consumes a stream of hex bytes interleaved with steering
//! annotations (action characters and parenthesized tags) and emits an
//! assembler source listing suitable for reassembly. Decoding never
//! aborts: unknown opcodes and malformed runs become in-band diagnostic
//! statements, and the completion [`Summary`] reports what needs another
//! annotation pass.

/// The code decoder.
pub mod code;
/// The data decoder and automatic detection.
pub mod data;
/// Diagnostic codes and table-load errors.
pub mod diag;
/// Register base bindings and DSECT field inference.
pub mod dsect;
/// EBCDIC classification and display mapping.
pub mod ebcdic;
/// The engine driver and finalization.
pub mod engine;
/// Extended-mnemonic resolution.
pub mod extended;
/// Instruction field names and parsed values.
pub mod fields;
/// Format templates and operand emission recipes.
pub mod formats;
/// The location and label registry.
pub mod labels;
/// The embedded instruction table.
pub mod optable;
/// Output statements and line rendering.
pub mod statement;
/// Optional frequency statistics.
pub mod stats;
/// Input scanning and annotation parsing.
pub mod tags;

pub use diag::{DiagCode, TableError};
pub use engine::{Disassembler, Listing, Options, Summary};
pub use optable::OpcodeTables;
pub use statement::Statement;
