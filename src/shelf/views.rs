use crate::error::ShelfError;
use crate::shelf::message::MessageRecord;
use crate::shelf::naming::sanitize_component;
use chrono::Datelike;
use chrono_tz::Tz;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Hard,
    Symbolic,
    /// Hard link, with a symbolic link when the view is on another device.
    Auto,
}

impl LinkMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hard" => Some(Self::Hard),
            "symbolic" | "symlink" => Some(Self::Symbolic),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Symbolic => "symbolic",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    AlreadyPresent,
}

/// An organizational projection of the archive. A view only decides where
/// a message belongs; linking is the same for every view.
pub trait View {
    fn name(&self) -> &str;
    /// Directory for `message`, relative to the views root.
    fn directory(&self, message: &MessageRecord) -> PathBuf;
}

#[derive(Debug, Clone, Default)]
pub struct TimelineView {
    pub timezone: Option<Tz>,
}

impl View for TimelineView {
    fn name(&self) -> &str {
        "timeline"
    }

    fn directory(&self, message: &MessageRecord) -> PathBuf {
        let date = match self.timezone {
            Some(tz) => message.delivery_date.with_timezone(&tz).date_naive(),
            None => message.delivery_date.date_naive(),
        };
        PathBuf::from("timeline")
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SenderView;

impl View for SenderView {
    fn name(&self) -> &str {
        "sender"
    }

    fn directory(&self, message: &MessageRecord) -> PathBuf {
        PathBuf::from("sender").join(sanitize_component(&message.sender))
    }
}

/// Mirrors the remote folder hierarchy; messages without a folder land in
/// `folder/unfiled`.
#[derive(Debug, Clone, Default)]
pub struct FolderView;

impl View for FolderView {
    fn name(&self) -> &str {
        "folder"
    }

    fn directory(&self, message: &MessageRecord) -> PathBuf {
        let mut dir = PathBuf::from("folder");
        let segments = message
            .folder
            .as_deref()
            .map(|f| {
                f.split(['/', '.'])
                    .filter(|s| !s.trim().is_empty())
                    .map(sanitize_component)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if segments.is_empty() {
            dir.push("unfiled");
        }
        for segment in segments {
            dir.push(segment);
        }
        dir
    }
}

pub fn view_by_name(name: &str, timezone: Option<Tz>) -> Option<Box<dyn View>> {
    match name.trim() {
        "timeline" => Some(Box::new(TimelineView { timezone })),
        "sender" => Some(Box::new(SenderView)),
        "folder" => Some(Box::new(FolderView)),
        _ => None,
    }
}

#[cfg(unix)]
fn symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, destination)
}

#[cfg(windows)]
fn symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, destination)
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn create_reference(source: &Path, destination: &Path, mode: LinkMode) -> io::Result<()> {
    match mode {
        LinkMode::Hard => fs::hard_link(source, destination),
        LinkMode::Symbolic => symlink(&absolute(source)?, destination),
        LinkMode::Auto => match fs::hard_link(source, destination) {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.kind(), ErrorKind::CrossesDevices | ErrorKind::Unsupported) => {
                log::debug!(
                    "hard link unavailable for {} ({err}); using a symbolic link",
                    destination.display()
                );
                symlink(&absolute(source)?, destination)
            }
            Err(err) => Err(err),
        },
    }
}

/// Make sure `view_dir/archived_name` refers to the archived file in
/// `storage_dir`. An existing entry at the destination counts as done.
pub fn ensure_link(
    storage_dir: &Path,
    archived_name: &str,
    view_dir: &Path,
    mode: LinkMode,
) -> Result<LinkOutcome, ShelfError> {
    let destination = view_dir.join(archived_name);
    let link_err = |source| ShelfError::Link {
        destination: destination.clone(),
        source,
    };

    fs::create_dir_all(view_dir).map_err(link_err)?;
    if fs::symlink_metadata(&destination).is_ok() {
        return Ok(LinkOutcome::AlreadyPresent);
    }

    match create_reference(&storage_dir.join(archived_name), &destination, mode) {
        Ok(()) => Ok(LinkOutcome::Created),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(LinkOutcome::AlreadyPresent),
        Err(err) => Err(link_err(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use tempfile::tempdir;

    fn message(sender: &str, date: &str, folder: Option<&str>) -> MessageRecord {
        MessageRecord {
            identifier: "<id@x>".to_string(),
            sender: sender.to_string(),
            subject: "Hi".to_string(),
            delivery_date: DateTime::parse_from_rfc3339(date).expect("date"),
            body: "body".to_string(),
            folder: folder.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn timeline_uses_header_offset_by_default() {
        let msg = message("a@x", "2024-03-05T23:30:00-08:00", None);
        assert_eq!(
            TimelineView::default().directory(&msg),
            PathBuf::from("timeline/2024/03/05")
        );
    }

    #[test]
    fn timeline_can_convert_to_configured_zone() {
        let msg = message("a@x", "2024-03-05T23:30:00-08:00", None);
        let view = TimelineView {
            timezone: Some(chrono_tz::Europe::Berlin),
        };
        assert_eq!(view.directory(&msg), PathBuf::from("timeline/2024/03/06"));
    }

    #[test]
    fn sender_and_folder_directories() {
        let msg = message("a@x", "2024-03-05T10:00:00Z", Some("Work/Projects"));
        assert_eq!(SenderView.directory(&msg), PathBuf::from("sender/a@x"));
        assert_eq!(
            FolderView.directory(&msg),
            PathBuf::from("folder/Work/Projects")
        );
        let unfiled = message("a@x", "2024-03-05T10:00:00Z", None);
        assert_eq!(FolderView.directory(&unfiled), PathBuf::from("folder/unfiled"));
    }

    #[test]
    fn ensure_link_is_idempotent_and_shares_content() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().join("mailbox");
        fs::create_dir_all(&storage).expect("mkdir");
        fs::write(storage.join("a@x-Hi"), "hello").expect("write");
        let view_dir = tmp.path().join("views/sender/a@x");

        let first = ensure_link(&storage, "a@x-Hi", &view_dir, LinkMode::Hard).expect("link");
        let second = ensure_link(&storage, "a@x-Hi", &view_dir, LinkMode::Hard).expect("relink");
        assert_eq!(first, LinkOutcome::Created);
        assert_eq!(second, LinkOutcome::AlreadyPresent);

        let entries = fs::read_dir(&view_dir).expect("read dir").count();
        assert_eq!(entries, 1);
        assert_eq!(
            fs::read_to_string(view_dir.join("a@x-Hi")).expect("read link"),
            "hello"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let primary = fs::metadata(storage.join("a@x-Hi")).expect("meta");
            let linked = fs::metadata(view_dir.join("a@x-Hi")).expect("meta");
            assert_eq!(primary.ino(), linked.ino());
            assert_eq!(primary.nlink(), 2);
        }
    }

    #[test]
    fn removing_view_entry_keeps_primary() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().join("mailbox");
        fs::create_dir_all(&storage).expect("mkdir");
        fs::write(storage.join("m"), "content").expect("write");
        let view_dir = tmp.path().join("timeline/2024/01/01");

        ensure_link(&storage, "m", &view_dir, LinkMode::Auto).expect("link");
        fs::remove_file(view_dir.join("m")).expect("remove view entry");
        assert_eq!(fs::read_to_string(storage.join("m")).expect("read"), "content");
    }

    #[cfg(unix)]
    #[test]
    fn symbolic_mode_points_at_primary() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().join("mailbox");
        fs::create_dir_all(&storage).expect("mkdir");
        fs::write(storage.join("m"), "content").expect("write");
        let view_dir = tmp.path().join("sender/a@x");

        ensure_link(&storage, "m", &view_dir, LinkMode::Symbolic).expect("link");
        let meta = fs::symlink_metadata(view_dir.join("m")).expect("meta");
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_to_string(view_dir.join("m")).expect("read"), "content");
    }

    #[test]
    fn blocked_view_directory_reports_link_error() {
        let tmp = tempdir().expect("tempdir");
        let storage = tmp.path().join("mailbox");
        fs::create_dir_all(&storage).expect("mkdir");
        fs::write(storage.join("m"), "content").expect("write");
        let blocker = tmp.path().join("sender");
        fs::write(&blocker, "not a directory").expect("write blocker");

        let err = ensure_link(&storage, "m", &blocker.join("a@x"), LinkMode::Hard)
            .expect_err("must fail");
        assert!(matches!(err, ShelfError::Link { .. }));
    }

    #[test]
    fn link_mode_parsing() {
        assert_eq!(LinkMode::parse("Hard"), Some(LinkMode::Hard));
        assert_eq!(LinkMode::parse("symlink"), Some(LinkMode::Symbolic));
        assert_eq!(LinkMode::parse("copy"), None);
    }
}
