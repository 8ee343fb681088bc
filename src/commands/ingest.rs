use anyhow::Result;
use std::path::Path;

use crate::commands::{CommandReport, report_batch};
use crate::shelf::config::load_config;
use crate::shelf::paths::resolve_paths;
use crate::shelf::source::DirectorySource;
use crate::shelf::watcher;

pub fn run(dir: &Path) -> Result<CommandReport> {
    let mut report = CommandReport::new("ingest");
    report.detail(format!("source_dir={}", dir.display()));

    if !dir.is_dir() {
        report.issue(format!("source dir does not exist: {}", dir.display()));
        return Ok(report);
    }

    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    report.detail(format!("storage_dir={}", paths.storage_dir.display()));
    report.detail(format!("views_dir={}", paths.views_dir.display()));

    let mut source = DirectorySource::new(dir);
    let batch = watcher::ingest_dir(&paths, &cfg, &mut source)?;
    report_batch(&mut report, &batch);
    Ok(report)
}
