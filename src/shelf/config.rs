use crate::error::ShelfError;
use crate::shelf::paths::ShelfPaths;
use crate::shelf::views::{self, LinkMode, View};
use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const KNOWN_VIEWS: &[&str] = &["timeline", "sender", "folder"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password_file: String,
    pub mailbox: String,
    pub timeout_secs: u64,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: "imap.fastmail.com".to_string(),
            port: 993,
            user: String::new(),
            password_file: "/run/secrets/mailshelf_imap_password".to_string(),
            mailbox: "INBOX".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub poll_interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub enabled: Vec<String>,
    pub link_mode: String,
    pub timeline_timezone: Option<String>,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["timeline".to_string(), "sender".to_string()],
            link_mode: "auto".to_string(),
            timeline_timezone: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShelfConfig {
    pub imap: ImapConfig,
    pub watcher: WatcherConfig,
    pub views: ViewsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialShelfConfig {
    imap: Option<ImapConfig>,
    watcher: Option<WatcherConfig>,
    views: Option<ViewsConfig>,
}

impl ShelfConfig {
    pub fn link_mode(&self) -> Result<LinkMode> {
        LinkMode::parse(&self.views.link_mode).ok_or_else(|| {
            anyhow!(
                "invalid link mode `{}`: use hard, symbolic or auto",
                self.views.link_mode
            )
        })
    }

    pub fn timeline_timezone(&self) -> Result<Option<Tz>> {
        match self.views.timeline_timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => name
                .parse::<Tz>()
                .map(Some)
                .map_err(|err| anyhow!("invalid timeline time zone `{name}`: {err}")),
        }
    }

    pub fn build_views(&self) -> Result<Vec<Box<dyn View>>> {
        let timezone = self.timeline_timezone()?;
        self.views
            .enabled
            .iter()
            .map(|name| {
                views::view_by_name(name, timezone)
                    .ok_or_else(|| anyhow!("unknown view `{name}`"))
            })
            .collect()
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u16(var: &str, fallback: u16) -> u16 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u16>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        Err(_) => fallback.to_vec(),
    }
}

pub fn validate(cfg: &ShelfConfig) -> Result<()> {
    if cfg.watcher.poll_interval_secs == 0 {
        return Err(anyhow!("invalid poll interval: must be >= 1 second"));
    }
    if cfg.imap.port == 0 {
        return Err(anyhow!("invalid imap port: must be non-zero"));
    }
    if cfg.imap.timeout_secs == 0 {
        return Err(anyhow!("invalid imap timeout: must be >= 1 second"));
    }
    if cfg.imap.mailbox.trim().is_empty() {
        return Err(anyhow!("invalid imap mailbox: cannot be empty"));
    }
    if cfg.views.enabled.is_empty() {
        return Err(anyhow!("invalid views: enable at least one view"));
    }
    for name in &cfg.views.enabled {
        if !KNOWN_VIEWS.contains(&name.trim()) {
            return Err(anyhow!(
                "invalid view `{name}`: use {}",
                KNOWN_VIEWS.join(", ")
            ));
        }
    }
    cfg.link_mode()?;
    cfg.timeline_timezone()?;
    Ok(())
}

fn resolve_config_path(paths: &ShelfPaths) -> PathBuf {
    if let Ok(custom) = env::var("MAILSHELF_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    paths.shelf_home.join("mailshelf.toml")
}

fn merge_toml(base: &mut ShelfConfig, raw: &str) -> Result<()> {
    let parsed: PartialShelfConfig = toml::from_str(raw)?;
    if let Some(imap) = parsed.imap {
        base.imap = imap;
    }
    if let Some(watcher) = parsed.watcher {
        base.watcher = watcher;
    }
    if let Some(views) = parsed.views {
        base.views = views;
    }
    Ok(())
}

fn merge_file_config(paths: &ShelfPaths, base: &mut ShelfConfig) -> Result<()> {
    let path = resolve_config_path(paths);
    if !path.exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse mailshelf config {}: {err}", path.display()))
}

fn apply_env_overrides(cfg: &mut ShelfConfig) {
    cfg.imap.host = env_or_string("MAILSHELF_IMAP_HOST", &cfg.imap.host);
    cfg.imap.port = env_or_u16("MAILSHELF_IMAP_PORT", cfg.imap.port);
    cfg.imap.user = env_or_string("MAILSHELF_IMAP_USER", &cfg.imap.user);
    cfg.imap.password_file =
        env_or_string("MAILSHELF_IMAP_PASSWORD_FILE", &cfg.imap.password_file);
    cfg.imap.mailbox = env_or_string("MAILSHELF_IMAP_MAILBOX", &cfg.imap.mailbox);
    cfg.imap.timeout_secs = env_or_u64("MAILSHELF_IMAP_TIMEOUT_SECS", cfg.imap.timeout_secs);
    cfg.watcher.poll_interval_secs =
        env_or_u64("MAILSHELF_POLL_INTERVAL_SECS", cfg.watcher.poll_interval_secs);
    cfg.views.enabled = env_or_csv("MAILSHELF_VIEWS", &cfg.views.enabled);
    cfg.views.link_mode = env_or_string("MAILSHELF_LINK_MODE", &cfg.views.link_mode);
    if let Ok(tz) = env::var("MAILSHELF_TIMELINE_TZ") {
        cfg.views.timeline_timezone = Some(tz.trim().to_string()).filter(|s| !s.is_empty());
    }
}

pub fn load_config(paths: &ShelfPaths) -> Result<ShelfConfig> {
    let mut cfg = ShelfConfig::default();
    merge_file_config(paths, &mut cfg)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg).map_err(|err| ShelfError::InvalidConfig(format!("{err:#}")))?;
    Ok(cfg)
}
