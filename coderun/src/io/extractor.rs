//! Code extraction: one file to the code units a session should run.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::dialect::{Dialect, ExtensionTable, FileKind};
use crate::core::fence::{parse_fenced_blocks, select_blocks};
use crate::core::types::{CodeUnit, Expectation};

/// Extracts units of a single dialect.
#[derive(Debug, Clone)]
pub struct Extractor {
    dialect: Dialect,
    extensions: ExtensionTable,
}

impl Extractor {
    pub fn new(dialect: Dialect, extensions: ExtensionTable) -> Self {
        Self {
            dialect,
            extensions,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Units of `path` in document order.
    ///
    /// Files of unknown type, or source files of another dialect, yield no units.
    pub fn extract(&self, path: &Path) -> Result<Vec<CodeUnit>> {
        let kind = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.extensions.lookup(ext));

        match kind {
            Some(FileKind::Source(dialect)) if dialect == self.dialect => {
                let code = read(path)?;
                if code.trim().is_empty() {
                    return Ok(Vec::new());
                }
                Ok(vec![CodeUnit {
                    path: path.to_path_buf(),
                    dialect,
                    block: None,
                    expect: Expectation::Success,
                    code,
                }])
            }
            Some(FileKind::Source(other)) => {
                debug!(path = %path.display(), dialect = %other, "source file for another dialect");
                Ok(Vec::new())
            }
            Some(FileKind::Documentation) => self.extract_blocks(path),
            None => {
                debug!(path = %path.display(), "unsupported file type");
                Ok(Vec::new())
            }
        }
    }

    fn extract_blocks(&self, path: &Path) -> Result<Vec<CodeUnit>> {
        let text = read(path)?;
        let doc = parse_fenced_blocks(&text);
        if let Some(block) = doc.unterminated {
            warn!(path = %path.display(), block, "unterminated code fence, block dropped");
        }
        let units: Vec<CodeUnit> = select_blocks(&doc.blocks, self.dialect)
            .into_iter()
            .map(|payload| CodeUnit {
                path: path.to_path_buf(),
                dialect: self.dialect,
                block: Some(payload.block),
                expect: payload.expect,
                code: payload.code,
            })
            .collect();
        debug!(
            path = %path.display(),
            blocks = doc.blocks.len(),
            units = units.len(),
            "extracted blocks"
        );
        Ok(units)
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
