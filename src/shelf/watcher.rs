use crate::imap::client::ImapSource;
use crate::shelf::archiver::{Archiver, BatchOutcome};
use crate::shelf::audit;
use crate::shelf::config::ShelfConfig;
use crate::shelf::ledger::Ledger;
use crate::shelf::lock::ArchiveLock;
use crate::shelf::paths::ShelfPaths;
use crate::shelf::source::MessageSource;
use anyhow::{Context, Result};
use std::thread;
use std::time::Duration;

/// Run one archiving pass over `source` and leave a line in the audit log
/// either way.
pub fn archive_from<S: MessageSource>(
    paths: &ShelfPaths,
    cfg: &ShelfConfig,
    ledger: &mut Ledger,
    source: &mut S,
) -> Result<BatchOutcome> {
    let views = cfg.build_views()?;
    let mut archiver = Archiver::new(
        &paths.storage_dir,
        &paths.views_dir,
        views,
        cfg.link_mode()?,
        ledger,
    );

    match archiver.run_batch(source) {
        Ok(batch) => {
            audit::append_event(
                paths,
                "pass",
                batch.status(),
                &format!(
                    "scanned={} stored={} skipped={} failed={} link_failures={}",
                    batch.scanned, batch.stored, batch.skipped, batch.failed, batch.link_failures
                ),
            )?;
            Ok(batch)
        }
        Err(err) => {
            audit::append_event(paths, "pass", "failed", &format!("{err:#}"))?;
            Err(err)
        }
    }
}

fn imap_pass(paths: &ShelfPaths, cfg: &ShelfConfig, ledger: &mut Ledger) -> Result<BatchOutcome> {
    let mut source = ImapSource::connect(&cfg.imap)
        .map_err(|err| crate::error::ShelfError::Transport(format!("{err:#}")))?;
    let batch = archive_from(paths, cfg, ledger, &mut source)?;
    if let Err(err) = source.logout() {
        log::warn!("imap logout failed: {err:#}");
    }
    Ok(batch)
}

fn load_ledger(paths: &ShelfPaths) -> Result<Ledger> {
    let ledger = Ledger::load(&paths.ledger_file)?;
    log::info!(
        "ledger {} holds {} identifier(s)",
        ledger.path().display(),
        ledger.len()
    );
    Ok(ledger)
}

pub fn run_once(paths: &ShelfPaths, cfg: &ShelfConfig) -> Result<BatchOutcome> {
    let _lock = ArchiveLock::acquire(paths)?;
    let mut ledger = load_ledger(paths)?;
    imap_pass(paths, cfg, &mut ledger)
}

/// Poll forever. A failed pass is logged and retried after the poll interval;
/// only local setup errors end the loop.
pub fn run_daemon(paths: &ShelfPaths, cfg: &ShelfConfig) -> Result<()> {
    let lock = ArchiveLock::acquire(paths)?;
    log::info!("daemon holds {}", lock.path().display());
    let mut ledger = load_ledger(paths)?;
    let sleep_for = Duration::from_secs(cfg.watcher.poll_interval_secs);

    loop {
        if let Err(err) = imap_pass(paths, cfg, &mut ledger) {
            log::error!("pass aborted: {err:#}");
        }
        thread::sleep(sleep_for);
    }
}

pub fn ingest_dir<S: MessageSource>(
    paths: &ShelfPaths,
    cfg: &ShelfConfig,
    source: &mut S,
) -> Result<BatchOutcome> {
    let _lock = ArchiveLock::acquire(paths)?;
    let mut ledger = load_ledger(paths)?;
    archive_from(paths, cfg, &mut ledger, source).context("ingest pass failed")
}
