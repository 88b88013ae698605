//! Card assembler for the Roomba VM.

/// Source-to-program pipeline.
pub mod assembler;
/// Structured assembly diagnostics.
pub mod errors;
/// Mnemonic, flag and register resolution against the core tables.
pub mod mnemonic;
/// Line parser for cards, labels and instructions.
pub mod parser;
/// Source loading and literate Markdown extraction.
pub mod source;
/// Card layout and symbol resolution.
pub mod symbols;

pub use assembler::{assemble, assemble_source, Assembly, CardInfo, ListingEntry};
pub use errors::{AssembleError, AssembleErrorKind, AssembleWarning, ErrorCollection, SourceLoc};

#[cfg(test)]
use tempfile as _;
