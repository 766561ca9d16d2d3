//! Directory scan: find statement files, decode and parse each one.
//!
//! A single unreadable or malformed statement does not abort the scan; it is
//! logged and reported in [`DirScan::failures`].

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::parsers::parse_ofx_text;
use crate::types::StatementTransaction;

pub const STATEMENT_EXTENSIONS: &[&str] = &["ofx"];

#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Accumulated result of reading every statement file in a directory.
#[derive(Debug, Clone, Default)]
pub struct DirScan {
    /// Files that parsed, in the order they were read.
    pub files_read: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    /// All transactions, in file order then document order.
    pub transactions: Vec<StatementTransaction>,
}

/// UTF-8 when valid, otherwise ISO-8859-1 (every byte maps to U+0000..U+00FF).
pub fn decode_statement_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

pub fn is_statement_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            STATEMENT_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Parse a single statement file.
pub fn read_statement_file(path: &Path) -> Result<Vec<StatementTransaction>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = decode_statement_bytes(&bytes);
    parse_ofx_text(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Read every statement file in `dir` (non-recursive), sorted by file name.
pub fn read_statement_dir(dir: &Path) -> Result<DirScan> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("listing statements in {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("listing statements in {}", dir.display()))?
            .path();
        if path.is_file() && is_statement_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut scan = DirScan::default();
    for path in paths {
        match read_statement_file(&path) {
            Ok(txns) => {
                debug!("{}: {} transactions", path.display(), txns.len());
                scan.transactions.extend(txns);
                scan.files_read.push(path);
            }
            Err(e) => {
                warn!("skipping {}: {:#}", path.display(), e);
                scan.failures.push(FileFailure {
                    path,
                    message: format!("{e:#}"),
                });
            }
        }
    }

    info!(
        "read {} statement file(s) from {} ({} failed), {} transactions",
        scan.files_read.len(),
        dir.display(),
        scan.failures.len(),
        scan.transactions.len()
    );

    Ok(scan)
}
