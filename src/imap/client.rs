use crate::shelf::config::ImapConfig;
use crate::shelf::message::{self, MessageRecord};
use crate::shelf::source::MessageSource;
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use native_tls::{TlsConnector, TlsStream};
use std::env;
use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

type ImapSession = ::imap::Session<TlsStream<TcpStream>>;

fn resolve_password(cfg: &ImapConfig) -> Result<String> {
    if let Ok(password) = env::var("MAILSHELF_IMAP_PASSWORD")
        && !password.is_empty()
    {
        return Ok(password);
    }
    let raw = fs::read_to_string(&cfg.password_file)
        .with_context(|| format!("failed to read imap password file {}", cfg.password_file))?;
    let password = raw.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("imap password file {} is empty", cfg.password_file);
    }
    Ok(password)
}

fn open_tls(cfg: &ImapConfig) -> Result<TlsStream<TcpStream>> {
    let timeout = Duration::from_secs(cfg.timeout_secs);
    let addr = (cfg.host.as_str(), cfg.port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {}:{}", cfg.host, cfg.port))?
        .next()
        .ok_or_else(|| anyhow!("no address for {}:{}", cfg.host, cfg.port))?;
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .with_context(|| format!("failed to connect to {}:{}", cfg.host, cfg.port))?;
    tcp.set_read_timeout(Some(timeout))?;
    tcp.set_write_timeout(Some(timeout))?;

    let tls = TlsConnector::builder().build()?;
    tls.connect(cfg.host.as_str(), tcp)
        .map_err(|err| anyhow!("tls handshake with {} failed: {err}", cfg.host))
}

/// The response that belongs to `uid`. Servers may interleave unsolicited
/// FETCH responses (flag changes on other messages) with the one requested.
fn response_for_uid<T>(
    responses: impl IntoIterator<Item = T>,
    uid: u32,
    uid_of: impl Fn(&T) -> Option<u32>,
) -> Option<T> {
    responses.into_iter().find(|r| uid_of(r) == Some(uid))
}

/// IMAP mailbox as a message source. Messages are addressed by UID and read
/// with `BODY.PEEK`, so the server-side `\Seen` flag is left alone.
pub struct ImapSource {
    session: ImapSession,
    mailbox: String,
}

impl ImapSource {
    pub fn connect(cfg: &ImapConfig) -> Result<Self> {
        if cfg.user.trim().is_empty() {
            anyhow::bail!("imap user is not configured (set MAILSHELF_IMAP_USER)");
        }
        let password = resolve_password(cfg)?;

        log::info!("connecting to {}:{} as {}", cfg.host, cfg.port, cfg.user);
        let mut client = ::imap::Client::new(open_tls(cfg)?);
        client
            .read_greeting()
            .with_context(|| format!("no greeting from {}", cfg.host))?;
        let mut session = client
            .login(cfg.user.as_str(), password.as_str())
            .map_err(|(err, _client)| anyhow!("imap login for {} failed: {err}", cfg.user))?;
        session
            .select(&cfg.mailbox)
            .with_context(|| format!("failed to select {}", cfg.mailbox))?;

        Ok(Self {
            session,
            mailbox: cfg.mailbox.clone(),
        })
    }

    pub fn logout(mut self) -> Result<()> {
        self.session.logout()?;
        Ok(())
    }
}

impl MessageSource for ImapSource {
    type Handle = u32;

    fn list_handles(&mut self) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self
            .session
            .uid_search("ALL")
            .context("imap UID SEARCH failed")?
            .into_iter()
            .collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn peek_identifier(&mut self, uid: &u32) -> Result<Option<String>> {
        let fetches = self
            .session
            .uid_fetch(uid.to_string(), "(UID BODY.PEEK[HEADER])")
            .with_context(|| format!("imap header fetch for UID {uid} failed"))?;
        Ok(response_for_uid(fetches.iter(), *uid, |f| f.uid)
            .and_then(|f| f.header())
            .and_then(message::identifier_from_headers))
    }

    fn fetch(&mut self, uid: &u32) -> Result<MessageRecord> {
        let fetches = self
            .session
            .uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")
            .with_context(|| format!("imap fetch for UID {uid} failed"))?;
        let raw = response_for_uid(fetches.iter(), *uid, |f| f.uid)
            .and_then(|f| f.body())
            .ok_or_else(|| anyhow!("UID {uid}: server returned no body"))?;
        message::parse_message(raw, Some(&self.mailbox), Utc::now().fixed_offset())
    }
}
