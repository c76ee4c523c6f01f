//! Structured-data reader
//!
//! Reads the literal syntax written by the structured-data writer.

pub mod lexer;
pub mod structured;

// Re-exports
pub use lexer::{Lexer, Token};
pub use structured::parse_structured;
