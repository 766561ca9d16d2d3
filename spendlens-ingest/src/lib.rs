//! spendlens-ingest: statement file discovery, decoding and OFX parsing.

pub mod types;
pub mod parsers;
pub mod scan;

pub use types::{StatementTransaction, StatementKind};
pub use scan::{decode_statement_bytes, read_statement_dir, DirScan, FileFailure};
