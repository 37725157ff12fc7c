//! axx: a general-purpose, retargetable table-driven assembler.
//!
//! The target instruction set lives entirely in a pattern file read at
//! startup; this crate never hard-codes a mnemonic. See [`pattern`] for the
//! pattern-file format and [`driver`] for the two-pass assembly pipeline.

pub mod cli;
pub mod context;
pub mod directives;
pub mod driver;
pub mod emit;
pub mod error;
pub mod expr;
pub mod float;
pub mod lex;
pub mod logging;
pub mod matcher;
pub mod pattern;
pub mod vliw;
