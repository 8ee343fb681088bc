use crate::error::ShelfError;
use crate::shelf::ledger::Ledger;
use crate::shelf::naming;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const MAX_PERSIST_RACES: usize = 8;

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Name relative to the storage root.
    pub name: String,
    pub path: PathBuf,
}

fn occupied(storage_dir: &Path, name: &str) -> bool {
    fs::symlink_metadata(storage_dir.join(name)).is_ok()
}

fn storage_err(path: &Path) -> impl FnOnce(std::io::Error) -> ShelfError + '_ {
    move |source| ShelfError::StorageWrite {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
fn set_archive_mode(file: &fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    // Temp files start at 0600.
    file.set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_archive_mode(_file: &fs::File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

fn write_temp(storage_dir: &Path, body: &str) -> Result<NamedTempFile, ShelfError> {
    let mut tmp = NamedTempFile::new_in(storage_dir).map_err(storage_err(storage_dir))?;
    tmp.write_all(body.as_bytes())
        .and_then(|_| set_archive_mode(tmp.as_file()))
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(storage_err(tmp.path()))?;
    Ok(tmp)
}

/// Write `body` under a collision-free name derived from `base`, then record
/// `identifier` in the ledger. The ledger is only touched once the file is
/// durable; a ledger failure leaves the file in place as an orphan.
pub fn write_message(
    storage_dir: &Path,
    base: &str,
    body: &str,
    identifier: &str,
    ledger: &mut Ledger,
) -> Result<StoredFile, ShelfError> {
    fs::create_dir_all(storage_dir).map_err(storage_err(storage_dir))?;

    let mut tmp = write_temp(storage_dir, body)?;
    let mut races = 0usize;
    let stored = loop {
        let name = naming::resolve(base, |candidate| occupied(storage_dir, candidate))?;
        let path = storage_dir.join(&name);
        match tmp.persist_noclobber(&path) {
            Ok(_) => break StoredFile { name, path },
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists && races < MAX_PERSIST_RACES => {
                races += 1;
                log::debug!("lost race for {}, resolving again", path.display());
                tmp = err.file;
            }
            Err(err) => return Err(storage_err(&path)(err.error)),
        }
    };
    sync_dir(storage_dir).map_err(storage_err(storage_dir))?;

    ledger.record(identifier)?;
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_body_and_records_identifier() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().join("mailbox");
        let mut ledger = Ledger::load(&storage.join(".uid_track")).expect("ledger");

        let stored =
            write_message(&storage, "a@x-Hi", "hello\n", "<1@x>", &mut ledger).expect("write");

        assert_eq!(stored.name, "a@x-Hi");
        assert_eq!(fs::read_to_string(&stored.path).expect("read"), "hello\n");
        assert!(ledger.contains("<1@x>"));
        let reloaded = Ledger::load(&storage.join(".uid_track")).expect("reload");
        assert!(reloaded.contains("<1@x>"));
    }

    #[cfg(unix)]
    #[test]
    fn archived_file_and_its_hard_link_are_readable_by_others() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().join("mailbox");
        let mut ledger = Ledger::load(&storage.join(".uid_track")).expect("ledger");
        let stored = write_message(&storage, "a-b", "x", "<1>", &mut ledger).expect("write");

        let mode = fs::metadata(&stored.path).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o644);

        let view = tmp.path().join("view-entry");
        fs::hard_link(&stored.path, &view).expect("link");
        let mode = fs::metadata(&view).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn same_base_gets_numbered_names() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().to_path_buf();
        let mut ledger = Ledger::load(&storage.join(".uid_track")).expect("ledger");

        let names: Vec<String> = ["<1>", "<2>", "<3>"]
            .iter()
            .map(|id| {
                write_message(&storage, "a-b", id, id, &mut ledger)
                    .expect("write")
                    .name
            })
            .collect();

        assert_eq!(names, vec!["a-b", "a-b[1]", "a-b[2]"]);
        assert_eq!(fs::read_to_string(storage.join("a-b[1]")).expect("read"), "<2>");
    }

    #[test]
    fn no_temp_files_are_left_behind() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().to_path_buf();
        let mut ledger = Ledger::load(&storage.join("ledger")).expect("ledger");
        write_message(&storage, "a-b", "x", "<1>", &mut ledger).expect("write");

        let leftovers = fs::read_dir(&storage)
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn ledger_failure_keeps_file_but_not_identifier() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().join("mailbox");
        let ledger_path = tmp.path().join(".uid_track");
        let mut ledger = Ledger::load(&ledger_path).expect("ledger");
        // A directory in place of the ledger file makes the append fail.
        fs::create_dir_all(&ledger_path).expect("block ledger path");

        let err = write_message(&storage, "a-b", "body", "<1>", &mut ledger)
            .expect_err("ledger append must fail");
        assert!(matches!(err, ShelfError::LedgerWrite { .. }));
        assert!(storage.join("a-b").exists());
        assert!(!ledger.contains("<1>"));

        // The retry on the next pass archives a second, disambiguated copy.
        fs::remove_dir(&ledger_path).expect("unblock ledger path");
        let stored = write_message(&storage, "a-b", "body", "<1>", &mut ledger).expect("retry");
        assert_eq!(stored.name, "a-b[1]");
    }
}
