//! Supported execution dialects and their lookup tables.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Language the remote runtime interprets submitted code as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Python,
    Groovy,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::Python, Dialect::Groovy];

    /// Session kind sent to the remote runtime, also the fence tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Python => "python",
            Dialect::Groovy => "groovy",
        }
    }

    /// Map a fenced block's language tag to a dialect.
    ///
    /// Tags are matched case-insensitively. Unknown tags return `None`.
    pub fn from_tag(tag: &str) -> Option<Dialect> {
        Dialect::ALL
            .into_iter()
            .find(|dialect| dialect.as_str().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Dialect::from_tag(s).ok_or_else(|| {
            anyhow!(
                "unsupported session kind {s:?} (expected one of: {})",
                Dialect::ALL.map(Dialect::as_str).join(", ")
            )
        })
    }
}

/// What a file extension means to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Whole file is one payload in this dialect.
    Source(Dialect),
    /// Documentation file scanned for fenced code blocks.
    Documentation,
}

/// Extension lookup table built from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionTable {
    entries: Vec<(String, FileKind)>,
}

impl ExtensionTable {
    /// Build a table. Extensions are stored lowercase without a leading dot.
    ///
    /// Earlier entries win when an extension is listed twice.
    pub fn new<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, FileKind)>,
    {
        let mut table = Vec::new();
        for (ext, kind) in entries {
            let ext = normalize_extension(ext);
            if ext.is_empty() || table.iter().any(|(known, _)| *known == ext) {
                continue;
            }
            table.push((ext, kind));
        }
        Self { entries: table }
    }

    pub fn lookup(&self, ext: &str) -> Option<FileKind> {
        let ext = normalize_extension(ext);
        self.entries
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, kind)| *kind)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_case_insensitively() {
        assert_eq!(Dialect::from_tag("python"), Some(Dialect::Python));
        assert_eq!(Dialect::from_tag("Groovy"), Some(Dialect::Groovy));
        assert_eq!(Dialect::from_tag("rust"), None);
        assert_eq!(Dialect::from_tag(""), None);
    }

    #[test]
    fn from_str_rejects_unknown_session_kind() {
        let err = "cobol".parse::<Dialect>().unwrap_err();
        assert!(err.to_string().contains("python, groovy"));
    }

    #[test]
    fn extension_table_normalizes_and_keeps_first_entry() {
        let table = ExtensionTable::new([
            (".PY", FileKind::Source(Dialect::Python)),
            ("py", FileKind::Documentation),
            ("md", FileKind::Documentation),
        ]);
        assert_eq!(table.lookup("py"), Some(FileKind::Source(Dialect::Python)));
        assert_eq!(table.lookup(".Md"), Some(FileKind::Documentation));
        assert_eq!(table.lookup("txt"), None);
    }
}
