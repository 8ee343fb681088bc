use crate::shelf::message::{self, MessageRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Where messages come from. A failure from any method aborts the pass.
pub trait MessageSource {
    type Handle: Display;

    fn list_handles(&mut self) -> Result<Vec<Self::Handle>>;

    /// Identifier known without downloading the whole message, if the source
    /// can tell cheaply.
    fn peek_identifier(&mut self, _handle: &Self::Handle) -> Result<Option<String>> {
        Ok(None)
    }

    fn fetch(&mut self, handle: &Self::Handle) -> Result<MessageRecord>;
}

/// Reads `*.eml` files from a local directory, in name order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn modified_at(path: &Path) -> DateTime<FixedOffset> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(UNIX_EPOCH);
    DateTime::<Local>::from(modified).fixed_offset()
}

impl MessageSource for DirectorySource {
    type Handle = DisplayPath;

    fn list_handles(&mut self) -> Result<Vec<DisplayPath>> {
        let read_dir = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read {}", self.dir.display()))?;
        let mut out = Vec::new();
        for entry in read_dir {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_eml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"));
            if is_eml {
                out.push(DisplayPath(path));
            }
        }
        out.sort();
        Ok(out)
    }

    fn fetch(&mut self, handle: &DisplayPath) -> Result<MessageRecord> {
        let raw = fs::read(&handle.0)
            .with_context(|| format!("failed to read {}", handle.0.display()))?;
        message::parse_message(&raw, None, modified_at(&handle.0))
            .with_context(|| format!("failed to parse {}", handle.0.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DisplayPath(pub PathBuf);

impl Display for DisplayPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
