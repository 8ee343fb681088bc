use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::commands::{CommandReport, status};
use crate::shelf::ledger;
use crate::shelf::paths::resolve_paths;

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub strict: bool,
}

#[derive(Debug, Default)]
struct StorageScan {
    primaries: usize,
    leftover_temps: Vec<String>,
    unlinked: Vec<String>,
}

fn scan_storage(dir: &Path) -> Result<StorageScan> {
    let mut scan = StorageScan::default();
    if !dir.exists() {
        return Ok(scan);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(".tmp") {
            scan.leftover_temps.push(name);
            continue;
        }
        if name.starts_with('.') {
            continue;
        }
        scan.primaries += 1;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            if meta.nlink() == 1 {
                scan.unlinked.push(name);
            }
        }
    }
    scan.leftover_temps.sort();
    scan.unlinked.sort();
    Ok(scan)
}

pub fn run(opts: &VerifyOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("verify");

    let (entries, duplicates) = ledger::scan_lines(&paths.ledger_file)?;
    report.detail(format!("ledger.lines={entries}"));
    for dup in &duplicates {
        report.issue(format!("ledger lists identifier twice: {dup}"));
    }

    let scan = scan_storage(&paths.storage_dir)?;
    report.detail(format!("storage.primaries={}", scan.primaries));
    if scan.primaries > entries {
        // A failed ledger append leaves the stored copy behind.
        report.detail(format!(
            "storage holds {} file(s) more than the ledger",
            scan.primaries - entries
        ));
    }
    for temp in &scan.leftover_temps {
        report.issue(format!("interrupted write left {temp} in storage"));
    }

    // Hard-linked views raise the link count; symlinked ones do not.
    report.detail(format!("storage.without_hard_links={}", scan.unlinked.len()));
    if opts.strict {
        for name in &scan.unlinked {
            report.detail(format!("  no hard link: {name}"));
        }
    }

    report.merge(status::run()?);

    if opts.strict && !report.ok {
        report.issue("strict verify failed");
    }

    Ok(report)
}
