use anyhow::Result;

use crate::commands::{CommandReport, report_batch};
use crate::shelf::config::load_config;
use crate::shelf::paths::resolve_paths;
use crate::shelf::watcher;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub once: bool,
    pub daemon: bool,
}

pub fn run(opts: &FetchOptions) -> Result<CommandReport> {
    let mut report = CommandReport::new("fetch");

    if opts.once && opts.daemon {
        report.issue("invalid flags: use only one of --once or --daemon");
        return Ok(report);
    }

    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    report.detail(format!("imap={}:{}", cfg.imap.host, cfg.imap.port));
    report.detail(format!("mailbox={}", cfg.imap.mailbox));
    report.detail(format!("storage_dir={}", paths.storage_dir.display()));

    if opts.daemon {
        report.detail(format!(
            "polling every {}s",
            cfg.watcher.poll_interval_secs
        ));
        watcher::run_daemon(&paths, &cfg)?;
        return Ok(report);
    }

    let batch = watcher::run_once(&paths, &cfg)?;
    report_batch(&mut report, &batch);
    Ok(report)
}
