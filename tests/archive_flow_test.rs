use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_eml(dir: &Path, file: &str, id: &str, from: &str, subject: &str, date: &str) {
    let raw = format!(
        "Message-ID: {id}\r\nFrom: {from}\r\nSubject: {subject}\r\nDate: {date}\r\n\r\nbody of {id}\r\n"
    );
    fs::write(dir.join(file), raw).expect("write eml");
}

fn seed_inbox(dir: &Path) {
    fs::create_dir_all(dir).expect("mkdir inbox");
    write_eml(
        dir,
        "01.eml",
        "<one@x>",
        "Alice <alice@x>",
        "Hi",
        "Mon, 4 Mar 2024 10:00:00 +0000",
    );
    write_eml(
        dir,
        "02.eml",
        "<two@x>",
        "alice@x",
        "Hi",
        "Mon, 4 Mar 2024 11:30:00 +0000",
    );
    write_eml(
        dir,
        "03.eml",
        "<three@y>",
        "Bob <BOB@y>",
        "Lunch",
        "Tue, 5 Mar 2024 09:15:00 +0000",
    );
}

fn primary_names(storage: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(storage)
        .expect("read storage")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

#[test]
fn ingest_archives_once_and_builds_views() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("shelf");
    let inbox = tmp.path().join("inbox");
    seed_inbox(&inbox);

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", &home)
        .env("MAILSHELF_LINK_MODE", "hard")
        .arg("ingest")
        .arg(&inbox)
        .assert()
        .success()
        .stdout(predicate::str::contains("batch.stored=3"));

    let storage = home.join("mailbox");
    assert_eq!(
        primary_names(&storage),
        vec!["alice@x-Hi", "alice@x-Hi[1]", "bob@y-Lunch"]
    );
    let first = fs::read_to_string(storage.join("alice@x-Hi")).expect("read");
    assert!(first.starts_with("body of <one@x>"));

    let views = storage.join("home");
    let day = views.join("timeline/2024/03/04");
    assert!(day.join("alice@x-Hi").is_file());
    assert!(day.join("alice@x-Hi[1]").is_file());
    assert!(views.join("timeline/2024/03/05/bob@y-Lunch").is_file());
    assert!(views.join("sender/alice@x/alice@x-Hi[1]").is_file());
    assert!(views.join("sender/bob@y/bob@y-Lunch").is_file());

    let ledger = fs::read_to_string(storage.join(".uid_track")).expect("ledger");
    assert_eq!(ledger.lines().count(), 3);
    assert!(ledger.contains("<three@y>"));

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", &home)
        .env("MAILSHELF_LINK_MODE", "hard")
        .arg("ingest")
        .arg(&inbox)
        .assert()
        .success()
        .stdout(predicate::str::contains("batch.stored=0"))
        .stdout(predicate::str::contains("batch.skipped=3"));

    assert_eq!(primary_names(&storage).len(), 3);
    let ledger = fs::read_to_string(storage.join(".uid_track")).expect("ledger");
    assert_eq!(ledger.lines().count(), 3);

    let audit = fs::read_to_string(home.join("logs/audit.log")).expect("audit log");
    assert_eq!(audit.lines().count(), 2);
}

#[test]
fn verify_and_status_report_archive_state() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("shelf");
    let inbox = tmp.path().join("inbox");
    seed_inbox(&inbox);

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", &home)
        .arg("ingest")
        .arg(&inbox)
        .assert()
        .success();

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", &home)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("ledger.lines=3"))
        .stdout(predicate::str::contains("storage.primaries=3"));

    let output = assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", &home)
        .env("MAILSHELF_WARN", "1")
        .arg("status")
        .arg("--json")
        .output()
        .expect("run status");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["command"], "status");
    assert_eq!(report["ok"], true);
    let details = report["details"].as_array().expect("details");
    assert!(details.iter().any(|d| d == "ledger.entries=3"));
    assert!(details.iter().any(|d| d == "lock=free"));
    let overrides = details
        .iter()
        .filter_map(|d| d.as_str())
        .find_map(|d| d.strip_prefix("env_overrides="))
        .expect("env_overrides line");
    assert!(overrides.split(',').any(|key| key == "MAILSHELF_HOME"));
    assert!(!overrides.contains("MAILSHELF_WARN"));
}

#[test]
fn verify_flags_interrupted_writes() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("shelf");
    let storage = home.join("mailbox");
    fs::create_dir_all(&storage).expect("mkdir storage");
    fs::write(storage.join(".tmpXyZ789"), "half a message").expect("write temp");

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", &home)
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains(".tmpXyZ789"));
}

#[test]
fn ingest_rejects_missing_directory() {
    let tmp = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", tmp.path().join("shelf"))
        .arg("ingest")
        .arg(tmp.path().join("nope"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("source dir does not exist"));
}

#[test]
fn fetch_refuses_conflicting_flags() {
    let tmp = tempdir().expect("tempdir");

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", tmp.path().join("shelf"))
        .arg("fetch")
        .arg("--once")
        .arg("--daemon")
        .assert()
        .failure()
        .stdout(predicate::str::contains("use only one of --once or --daemon"));
}

#[test]
fn fetch_fails_when_server_is_unreachable() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path().join("shelf");

    assert_cmd::cargo::cargo_bin_cmd!("mailshelf")
        .current_dir(tmp.path())
        .env("MAILSHELF_HOME", &home)
        .env("MAILSHELF_IMAP_HOST", "127.0.0.1")
        .env("MAILSHELF_IMAP_PORT", "1")
        .env("MAILSHELF_IMAP_USER", "someone")
        .env("MAILSHELF_IMAP_PASSWORD", "secret")
        .env("MAILSHELF_IMAP_TIMEOUT_SECS", "2")
        .arg("fetch")
        .arg("--once")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));

    assert!(!home.join("mailbox/.uid_track").exists());
}
