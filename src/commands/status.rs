use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::shelf::config::load_config;
use crate::shelf::ledger::Ledger;
use crate::shelf::lock;
use crate::shelf::paths::resolve_paths;
use crate::shelf::util::pid_alive;

include!(concat!(env!("OUT_DIR"), "/env_allowlist.rs"));

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("shelf_home={}", paths.shelf_home.display()));
    report.detail(format!("storage_dir={}", paths.storage_dir.display()));
    report.detail(format!("views_dir={}", paths.views_dir.display()));
    report.detail(format!("ledger_file={}", paths.ledger_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));

    match load_config(&paths) {
        Ok(cfg) => {
            report.detail(format!("imap={}:{}", cfg.imap.host, cfg.imap.port));
            report.detail(format!("imap.user={}", cfg.imap.user));
            report.detail(format!("imap.mailbox={}", cfg.imap.mailbox));
            report.detail(format!(
                "poll_interval_secs={}",
                cfg.watcher.poll_interval_secs
            ));
            report.detail(format!("views={}", cfg.views.enabled.join(",")));
            report.detail(format!("link_mode={}", cfg.views.link_mode));
            if let Some(tz) = &cfg.views.timeline_timezone {
                report.detail(format!("timeline_timezone={tz}"));
            }
        }
        Err(err) => report.issue(format!("config invalid: {err:#}")),
    }

    match Ledger::load(&paths.ledger_file) {
        Ok(ledger) => report.detail(format!("ledger.entries={}", ledger.len())),
        Err(err) => report.issue(format!("ledger unreadable: {err:#}")),
    }

    match lock::read_payload(&paths) {
        Ok(Some(payload)) => {
            report.detail(format!("lock.pid={}", payload.pid));
            report.detail(format!("lock.start_time={}", payload.start_time));
            if pid_alive(payload.pid) {
                report.detail("lock.process=alive");
            } else {
                report.issue(format!("lock.process=dead (stale lock, pid {})", payload.pid));
            }
            if payload.build_uuid != env!("BUILD_UUID") {
                report.detail(format!(
                    "lock.build_mismatch (lock={} current={})",
                    payload.build_uuid,
                    env!("BUILD_UUID")
                ));
            }
        }
        Ok(None) => report.detail("lock=free"),
        Err(err) => report.issue(format!("lock unreadable: {err:#}")),
    }

    let overrides: Vec<&str> = GENERATED_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var_os(key).is_some())
        .collect();
    report.detail(format!("env_overrides={}", overrides.join(",")));

    Ok(report)
}
