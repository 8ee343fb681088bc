use crate::error::ShelfError;
use crate::shelf::ledger::Ledger;
use crate::shelf::message::MessageRecord;
use crate::shelf::naming;
use crate::shelf::source::MessageSource;
use crate::shelf::store;
use crate::shelf::views::{self, LinkMode, LinkOutcome, View};
use crate::shelf::warn::{self, WarnEvent};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ViewLinkReport {
    pub view: String,
    pub destination: PathBuf,
    pub result: Result<LinkOutcome, String>,
}

#[derive(Debug, Clone)]
pub enum MessageOutcome {
    Skipped {
        identifier: String,
    },
    Stored {
        identifier: String,
        file: String,
        links: Vec<ViewLinkReport>,
    },
    Failed {
        identifier: String,
        error: String,
    },
}

impl MessageOutcome {
    pub fn link_failures(&self) -> usize {
        match self {
            Self::Stored { links, .. } => links.iter().filter(|l| l.result.is_err()).count(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub scanned: usize,
    pub skipped: usize,
    pub stored: usize,
    pub failed: usize,
    pub link_failures: usize,
    pub messages: Vec<MessageOutcome>,
}

impl BatchOutcome {
    pub fn status(&self) -> &'static str {
        if self.failed == 0 && self.link_failures == 0 {
            "ok"
        } else {
            "degraded"
        }
    }

    fn push(&mut self, outcome: MessageOutcome) {
        self.scanned += 1;
        match &outcome {
            MessageOutcome::Skipped { .. } => self.skipped += 1,
            MessageOutcome::Stored { .. } => {
                self.stored += 1;
                self.link_failures += outcome.link_failures();
            }
            MessageOutcome::Failed { .. } => self.failed += 1,
        }
        self.messages.push(outcome);
    }
}

/// Archives messages into primary storage once each and links them into the
/// configured views. The ledger is borrowed for the archiver's lifetime, so
/// every check-then-record goes through this one owner.
pub struct Archiver<'a> {
    storage_dir: PathBuf,
    views_dir: PathBuf,
    views: Vec<Box<dyn View>>,
    link_mode: LinkMode,
    ledger: &'a mut Ledger,
}

impl<'a> Archiver<'a> {
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        views_dir: impl Into<PathBuf>,
        views: Vec<Box<dyn View>>,
        link_mode: LinkMode,
        ledger: &'a mut Ledger,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            views_dir: views_dir.into(),
            views,
            link_mode,
            ledger,
        }
    }

    pub fn archive_message(&mut self, message: &MessageRecord) -> MessageOutcome {
        let identifier = message.identifier.clone();
        if self.ledger.contains(&identifier) {
            log::debug!("already archived: {identifier}");
            return MessageOutcome::Skipped { identifier };
        }

        let base = naming::base_name(&message.sender, &message.subject);
        let stored = match store::write_message(
            &self.storage_dir,
            &base,
            &message.body,
            &identifier,
            self.ledger,
        ) {
            Ok(stored) => stored,
            Err(err) => {
                warn::emit(WarnEvent {
                    code: err.code().as_str(),
                    stage: "store",
                    action: "write-message",
                    identifier: &identifier,
                    file: &base,
                    retry: "retry-next-pass",
                    reason: match err {
                        ShelfError::LedgerWrite { .. } => "ledger-append-failed-orphan-left",
                        _ => "store-write-failed",
                    },
                    err: &err.to_string(),
                });
                return MessageOutcome::Failed {
                    identifier,
                    error: err.to_string(),
                };
            }
        };
        log::info!("archived {identifier} as {}", stored.name);

        let links = self
            .views
            .iter()
            .map(|view| self.link_view(view.as_ref(), message, &stored.name))
            .collect();

        MessageOutcome::Stored {
            identifier,
            file: stored.name,
            links,
        }
    }

    fn link_view(&self, view: &dyn View, message: &MessageRecord, file: &str) -> ViewLinkReport {
        let view_dir = self.views_dir.join(view.directory(message));
        let destination = view_dir.join(file);
        let result = views::ensure_link(&self.storage_dir, file, &view_dir, self.link_mode);
        if let Err(err) = &result {
            warn::emit(WarnEvent {
                code: err.code().as_str(),
                stage: "link",
                action: "ensure-link",
                identifier: &message.identifier,
                file,
                retry: "manual",
                reason: view.name(),
                err: &err.to_string(),
            });
        }
        ViewLinkReport {
            view: view.name().to_string(),
            destination,
            result: result.map_err(|err| err.to_string()),
        }
    }

    /// One polling pass over `source`. Listing or fetch failures abort the
    /// pass; everything archived before the failure stays archived.
    pub fn run_batch<S: MessageSource>(&mut self, source: &mut S) -> Result<BatchOutcome> {
        let handles = source
            .list_handles()
            .map_err(|err| ShelfError::Transport(format!("{err:#}")))?;
        log::info!("pass started: {} message(s) listed", handles.len());

        let mut out = BatchOutcome::default();
        for handle in handles {
            let peeked = source
                .peek_identifier(&handle)
                .map_err(|err| ShelfError::Transport(format!("{handle}: {err:#}")))?;
            if let Some(identifier) = peeked
                && self.ledger.contains(&identifier)
            {
                out.push(MessageOutcome::Skipped { identifier });
                continue;
            }

            let message = source
                .fetch(&handle)
                .map_err(|err| ShelfError::Transport(format!("{handle}: {err:#}")))?;
            out.push(self.archive_message(&message));
        }

        log::info!(
            "pass finished: scanned={} stored={} skipped={} failed={} link_failures={}",
            out.scanned,
            out.stored,
            out.skipped,
            out.failed,
            out.link_failures
        );
        Ok(out)
    }
}
