use crate::error::ShelfError;
use crate::shelf::paths::ShelfPaths;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "mailshelf.lock";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockPayload {
    pub pid: u32,
    pub build_uuid: String,
    pub start_time: String,
}

/// Exclusive hold on the archive for one process. Released on drop.
#[derive(Debug)]
pub struct ArchiveLock {
    file: File,
    path: PathBuf,
}

pub fn lock_path(paths: &ShelfPaths) -> PathBuf {
    paths.logs_dir.join(LOCK_FILE)
}

impl ArchiveLock {
    pub fn acquire(paths: &ShelfPaths) -> Result<Self> {
        let path = lock_path(paths);
        fs::create_dir_all(&paths.logs_dir)
            .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(ShelfError::Locked(path).into());
        }

        let payload = LockPayload {
            pid: std::process::id(),
            build_uuid: env!("BUILD_UUID").to_string(),
            start_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serde_json::to_string(&payload)?.as_bytes())?;
        file.sync_data()?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArchiveLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
    }
}

pub fn read_payload(paths: &ShelfPaths) -> Result<Option<LockPayload>> {
    let path = lock_path(paths);
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let payload = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(payload))
}
