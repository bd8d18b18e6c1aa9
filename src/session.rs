//! The per-account session manager.
//!
//! A [`Session`] owns at most one authenticated [`Protocol`] handle and layers the sorter's
//! mailbox semantics on top of it: every operation selects the mailbox it works on, selection
//! can create a missing mailbox, and moves recover from a missing destination.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::client_builder::TlsMode;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::protocol::{Connector, FetchQuery, ImapConnector, Protocol, SearchCriteria, StoreOp};
use crate::types::{Flag, Mailbox, Name, Uid};

/// How to reach and authenticate against one IMAP server.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// TLS from the first byte.
    #[serde(default)]
    pub imaps: bool,
    /// Upgrade a plaintext connection; defaults to on when `imaps` is off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starttls: Option<bool>,
    /// Defaults to on.
    #[serde(default, rename = "tlsverify", skip_serializing_if = "Option::is_none")]
    pub tls_verify: Option<bool>,
    /// PEM file whose certificates replace the system trust store.
    #[serde(default, rename = "cacertfile", skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(Error::Config("server not set in account config".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("port is not set in account config".into()));
        }
        if self.username.is_empty() {
            return Err(Error::Config("username not set in account config".into()));
        }
        Ok(())
    }

    pub fn tls_mode(&self) -> TlsMode {
        if self.imaps {
            TlsMode::Implicit
        } else if self.starttls.unwrap_or(true) {
            TlsMode::StartTls
        } else {
            TlsMode::Plaintext
        }
    }

    pub fn tls_verify(&self) -> bool {
        self.tls_verify.unwrap_or(true)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("imaps", &self.imaps)
            .field("starttls", &self.starttls)
            .field("tls_verify", &self.tls_verify)
            .field("ca_file", &self.ca_file)
            .finish()
    }
}

/// A session bound to one account. Either disconnected or holding a live, authenticated handle.
pub struct Session {
    settings: ConnectionConfig,
    connector: Box<dyn Connector>,
    protocol: Option<Box<dyn Protocol>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("settings", &self.settings)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Session {
    /// A disconnected session that dials the configured server over TCP.
    pub fn new(settings: ConnectionConfig) -> Self {
        Session::with_connector(settings, ImapConnector)
    }

    pub fn with_connector<C: Connector + 'static>(settings: ConnectionConfig, connector: C) -> Self {
        Session {
            settings,
            connector: Box::new(connector),
            protocol: None,
        }
    }

    pub fn settings(&self) -> &ConnectionConfig {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.protocol.is_some()
    }

    /// Validates the settings, connects and authenticates. Replaces any existing handle without
    /// logging it out.
    pub fn connect(&mut self) -> Result<()> {
        self.settings.validate()?;
        let protocol = self.connector.connect(&self.settings).map_err(|e| {
            error!(
                server = %self.settings.server,
                username = %self.settings.username,
                error = %e,
                "failed to connect to server"
            );
            e
        })?;
        info!(
            server = %self.settings.server,
            username = %self.settings.username,
            "connected"
        );
        self.protocol = Some(protocol);
        Ok(())
    }

    /// Logs out. A no-op without a session; the handle is released even when LOGOUT fails.
    pub fn disconnect(&mut self) -> Result<()> {
        match self.protocol.take() {
            Some(mut protocol) => {
                debug!(server = %self.settings.server, "logging out");
                protocol.logout()
            }
            None => Ok(()),
        }
    }

    /// Drops the current handle, if any, and connects again.
    pub fn reconnect(&mut self) -> Result<()> {
        if let Err(e) = self.disconnect() {
            debug!(error = %e, "ignoring logout failure before reconnect");
        }
        self.connect()
    }

    fn conn(&mut self) -> Result<&mut Box<dyn Protocol>> {
        self.protocol.as_mut().ok_or(Error::NotConnected)
    }

    /// Selects (or, when `read_only`, examines) a mailbox. With `auto_create`, a missing mailbox
    /// is created and selection retried once.
    pub fn select_mailbox(&mut self, name: &str, read_only: bool, auto_create: bool) -> Result<Mailbox> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let conn = self.conn()?;
            let selected = if read_only {
                conn.examine(name)
            } else {
                conn.select(name)
            };
            match selected {
                Err(e) if auto_create && attempts == 1 && e.is_mailbox_missing() => {
                    info!(mailbox = name, "mailbox does not exist, creating it");
                    self.create_mailbox(name)?;
                }
                other => return other,
            }
        }
    }

    pub fn create_mailbox(&mut self, name: &str) -> Result<()> {
        info!(mailbox = name, "creating mailbox");
        self.conn()?.create(name).map_err(|e| {
            error!(mailbox = name, error = %e, "failed to create mailbox");
            e
        })
    }

    pub fn delete_mailbox(&mut self, name: &str) -> Result<()> {
        info!(mailbox = name, "deleting mailbox");
        self.conn()?.delete(name).map_err(|e| {
            error!(mailbox = name, error = %e, "failed to delete mailbox");
            e
        })
    }

    /// All mailboxes by name.
    pub fn list(&mut self) -> Result<BTreeMap<String, Name>> {
        let names = self.conn()?.list()?;
        Ok(names
            .into_iter()
            .map(|name| (name.name().to_string(), name))
            .collect())
    }

    /// UIDs in `mailbox` carrying all of `with_flags` and none of `without_flags`, ascending.
    pub fn search(&mut self, mailbox: &str, with_flags: &[Flag], without_flags: &[Flag]) -> Result<Vec<Uid>> {
        self.select_mailbox(mailbox, true, false).map_err(|e| {
            error!(mailbox, error = %e, "failed to open mailbox for searching");
            e
        })?;
        let criteria = SearchCriteria::new(with_flags, without_flags);
        self.conn()?.search(&criteria)
    }

    /// Fetches and normalizes the headers of `uids` without marking them seen.
    pub fn fetch(&mut self, mailbox: &str, uids: &[Uid]) -> Result<Vec<Message>> {
        self.select_mailbox(mailbox, true, false).map_err(|e| {
            error!(mailbox, error = %e, "failed to open mailbox for fetching");
            e
        })?;
        let fetches = self.conn()?.fetch(uids, FetchQuery::Headers)?;
        fetches
            .into_iter()
            .filter(|fetch| {
                let requested = fetch.uid.map_or(false, |uid| uids.contains(&uid));
                if !requested || fetch.header.is_none() {
                    trace!(mailbox, message = fetch.message, uid = ?fetch.uid, "ignoring unrequested fetch");
                    return false;
                }
                true
            })
            .map(|fetch| {
                let uid = fetch.uid;
                Message::from_fetch(fetch).map_err(|e| {
                    error!(mailbox, uid = ?uid, error = %e, "failed to parse message headers");
                    e
                })
            })
            .collect()
    }

    pub fn search_and_fetch(
        &mut self,
        mailbox: &str,
        with_flags: &[Flag],
        without_flags: &[Flag],
    ) -> Result<Vec<Message>> {
        let uids = self.search(mailbox, with_flags, without_flags)?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch(mailbox, &uids)
    }

    pub fn set_flags(
        &mut self,
        mailbox: &str,
        uids: &[Uid],
        op: StoreOp,
        flags: &[Flag],
        expunge: bool,
    ) -> Result<()> {
        self.select_mailbox(mailbox, false, false).map_err(|e| {
            error!(mailbox, error = %e, "failed to open mailbox to set message flags");
            e
        })?;
        let conn = self.conn()?;
        conn.store(uids, op, flags).map_err(|e| {
            error!(mailbox, error = %e, "failed to set message flags");
            e
        })?;
        if expunge {
            conn.expunge()?;
        }
        Ok(())
    }

    /// Current flags of one message; empty when the UID does not exist.
    pub fn get_flags(&mut self, mailbox: &str, uid: Uid) -> Result<Vec<Flag>> {
        self.select_mailbox(mailbox, true, false)?;
        let fetches = self.conn()?.fetch(&[uid], FetchQuery::Flags)?;
        Ok(fetches
            .into_iter()
            .filter(|fetch| fetch.uid == Some(uid))
            .last()
            .map(|fetch| fetch.flags)
            .unwrap_or_default())
    }

    pub fn delete_msgs(&mut self, mailbox: &str, uids: &[Uid], expunge: bool) -> Result<()> {
        self.set_flags(mailbox, uids, StoreOp::Add, &[Flag::Deleted], expunge)
    }

    /// Appends a message, creating the mailbox first if needed.
    pub fn upload(&mut self, mailbox: &str, content: &[u8], flags: &[Flag]) -> Result<()> {
        self.select_mailbox(mailbox, false, true)?;
        self.conn()?.append(mailbox, flags, content).map_err(|e| {
            error!(mailbox, error = %e, "failed to upload message to mailbox");
            e
        })
    }

    /// Moves `uids` from `from` to `to`, creating `to` when it is confirmed missing. Returns the
    /// destination UID of the first message if the server reported one.
    pub fn move_msgs(&mut self, uids: &[Uid], from: &str, to: &str) -> Result<Option<Uid>> {
        self.select_mailbox(from, false, false).map_err(|e| {
            error!(source = from, destination = to, error = %e, "failed to open mailbox to move messages");
            e
        })?;

        let mut created = false;
        loop {
            let err = match self.move_once(uids, to) {
                Ok(uid) => return Ok(uid),
                Err(e) => e,
            };
            if created || !err.is_mailbox_missing() {
                error!(source = from, destination = to, error = %err, "failed to move messages");
                return Err(err);
            }
            if self.list()?.contains_key(to) {
                warn!(destination = to, "server reported a missing mailbox that is listed");
                return Err(err);
            }
            self.create_mailbox(to)?;
            created = true;
        }
    }

    fn move_once(&mut self, uids: &[Uid], to: &str) -> Result<Option<Uid>> {
        let conn = self.conn()?;
        match conn.mv(uids, to) {
            Err(Error::Bad(reason)) => {
                debug!(destination = to, %reason, "MOVE rejected, falling back to COPY and EXPUNGE");
                let uid = conn.copy(uids, to)?;
                conn.store(uids, StoreOp::Add, &[Flag::Deleted])?;
                match conn.uid_expunge(uids) {
                    Err(Error::Bad(reason)) => {
                        debug!(%reason, "UID EXPUNGE rejected, expunging the whole mailbox");
                        conn.expunge()?;
                    }
                    other => other?,
                }
                Ok(uid)
            }
            other => other,
        }
    }
}
