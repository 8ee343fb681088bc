use crate::error::ShelfError;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only registry of message identifiers that already have an
/// archived file. The in-memory set only ever learns an identifier after the
/// matching line is on disk.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    seen: BTreeSet<String>,
}

impl Ledger {
    pub fn load(path: &Path) -> Result<Self> {
        let mut seen = BTreeSet::new();
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read ledger {}", path.display()))?;
            for line in raw.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                seen.insert(trimmed.to_string());
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            seen,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.seen.contains(identifier.trim())
    }

    pub fn record(&mut self, identifier: &str) -> Result<(), ShelfError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || identifier.contains(['\n', '\r']) {
            return Err(ShelfError::InvalidIdentifier(identifier.to_string()));
        }
        if self.seen.contains(identifier) {
            return Ok(());
        }

        self.append_line(identifier)
            .map_err(|source| ShelfError::LedgerWrite {
                identifier: identifier.to_string(),
                path: self.path.clone(),
                source,
            })?;
        self.seen.insert(identifier.to_string());
        Ok(())
    }

    fn append_line(&self, identifier: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("{identifier}\n").as_bytes())?;
        file.sync_data()
    }
}

/// Raw line count and duplicated lines, for consistency checks.
pub fn scan_lines(path: &Path) -> Result<(usize, Vec<String>)> {
    if !path.exists() {
        return Ok((0, Vec::new()));
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    let mut count = 0usize;
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        count += 1;
        if !seen.insert(line) {
            duplicates.push(line.to_string());
        }
    }
    Ok((count, duplicates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_as_empty() {
        let tmp = tempdir().expect("tempdir");
        let ledger = Ledger::load(&tmp.path().join(".uid_track")).expect("load");
        assert!(ledger.is_empty());
        assert!(!ledger.contains("<a@x>"));
    }

    #[test]
    fn recorded_identifier_survives_reload() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join(".uid_track");

        let mut ledger = Ledger::load(&path).expect("load");
        ledger.record("<one@example.com>").expect("record");
        assert!(ledger.contains("<one@example.com>"));
        drop(ledger);

        let reloaded = Ledger::load(&path).expect("reload");
        assert!(reloaded.contains("<one@example.com>"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn record_appends_without_rewriting_existing_lines() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join(".uid_track");
        fs::write(&path, "<old@x>\n\n").expect("seed ledger");

        let mut ledger = Ledger::load(&path).expect("load");
        ledger.record("<new@x>").expect("record");
        ledger.record("<new@x>").expect("record again is a no-op");

        let raw = fs::read_to_string(&path).expect("read");
        assert_eq!(raw, "<old@x>\n\n<new@x>\n");
    }

    #[test]
    fn multiline_identifier_is_rejected_and_not_seen() {
        let tmp = tempdir().expect("tempdir");
        let mut ledger = Ledger::load(&tmp.path().join(".uid_track")).expect("load");
        let err = ledger.record("<a@x>\n<b@x>").expect_err("must reject");
        assert!(matches!(err, ShelfError::InvalidIdentifier(_)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn failed_append_leaves_identifier_unseen() {
        let tmp = tempdir().expect("tempdir");
        // A directory where the ledger file should be makes the append fail.
        let path = tmp.path().join("ledger-as-dir");
        fs::create_dir_all(&path).expect("mkdir");

        let mut ledger = Ledger {
            path: path.clone(),
            seen: BTreeSet::new(),
        };
        let err = ledger.record("<a@x>").expect_err("append must fail");
        assert!(matches!(err, ShelfError::LedgerWrite { .. }));
        assert!(!ledger.contains("<a@x>"));
    }

    #[test]
    fn scan_lines_reports_duplicates() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join(".uid_track");
        fs::write(&path, "<a>\n<b>\n<a>\n").expect("write");
        let (count, dups) = scan_lines(&path).expect("scan");
        assert_eq!(count, 3);
        assert_eq!(dups, vec!["<a>".to_string()]);
    }
}
