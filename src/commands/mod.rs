pub mod fetch;
pub mod ingest;
pub mod status;
pub mod verify;

use crate::shelf::archiver::{BatchOutcome, MessageOutcome};
use crate::shelf::views::LinkOutcome;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

/// Per-message lines for a finished pass. Skipped messages only count.
pub fn report_batch(report: &mut CommandReport, batch: &BatchOutcome) {
    report.detail(format!("batch.scanned={}", batch.scanned));
    report.detail(format!("batch.stored={}", batch.stored));
    report.detail(format!("batch.skipped={}", batch.skipped));
    report.detail(format!("batch.failed={}", batch.failed));
    report.detail(format!("batch.link_failures={}", batch.link_failures));

    for message in &batch.messages {
        match message {
            MessageOutcome::Skipped { .. } => {}
            MessageOutcome::Stored {
                identifier,
                file,
                links,
            } => {
                report.detail(format!("stored identifier={identifier} file={file}"));
                for link in links {
                    match &link.result {
                        Ok(LinkOutcome::Created) => report.detail(format!(
                            "  view={} linked={}",
                            link.view,
                            link.destination.display()
                        )),
                        Ok(LinkOutcome::AlreadyPresent) => report.detail(format!(
                            "  view={} present={}",
                            link.view,
                            link.destination.display()
                        )),
                        Err(err) => report.issue(format!(
                            "view {} for {file} not linked: {err}",
                            link.view
                        )),
                    }
                }
            }
            MessageOutcome::Failed { identifier, error } => {
                report.issue(format!("failed identifier={identifier} error={error}"));
            }
        }
    }
}
