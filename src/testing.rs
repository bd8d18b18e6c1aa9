//! Enable the test_helpers feature to use these helpers outside this crate's own tests.
//!
//! [`MemoryServer`] is an in-memory IMAP account implementing [`Connector`]; every session it
//! opens shares the same mailboxes, so a test can drive a [`Session`](crate::Session) and then
//! inspect what the server holds. Faults can be injected: dropped connections, servers without
//! `MOVE` or `UID EXPUNGE`, refused connections, and mailboxes that are reported missing or
//! hidden from `LIST`.
//!
//! The `fetches`, `names` and `mailbox` modules build response objects from raw server output.
//!
//! ```toml
//! [dev-dependencies]
//! mailsort = { version = "0.1", features = ["test_helpers"] }
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::protocol::{Connector, FetchQuery, Protocol, SearchCriteria, StoreOp};
use crate::session::ConnectionConfig;
use crate::types::{Fetch, Flag, Mailbox, Name, Uid};

/// Builds [`Fetch`]es from `* n FETCH` lines.
pub mod fetches {
    use crate::types::Fetch;

    /// For example `* 24 FETCH (FLAGS (\\Seen) UID 4827943)\r\n`.
    pub fn parse(input: impl Into<Vec<u8>>) -> Vec<Fetch> {
        crate::parse::parse_fetches(&input.into()).unwrap()
    }
}

/// Builds [`Name`](crate::types::Name)s from `* LIST` lines.
pub mod names {
    use crate::types::Name;

    /// For example `* LIST (\\HasNoChildren) "." "INBOX"\r\n`.
    pub fn parse(input: impl Into<Vec<u8>>) -> Vec<Name> {
        crate::parse::parse_names(&input.into()).unwrap()
    }
}

/// Builds a [`Mailbox`](crate::types::Mailbox) from `SELECT` output.
pub mod mailbox {
    use crate::types::Mailbox;

    pub fn parse(input: impl Into<Vec<u8>>) -> Mailbox {
        crate::parse::parse_mailbox(&input.into()).unwrap()
    }
}

const DEFAULT_PASSWORD: &str = "test";

#[derive(Debug)]
struct StoredMessage {
    uid: Uid,
    flags: Vec<Flag>,
    content: Vec<u8>,
}

impl StoredMessage {
    fn header(&self) -> Vec<u8> {
        match self.content.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(end) => self.content[..end + 4].to_vec(),
            None => self.content.clone(),
        }
    }
}

#[derive(Debug)]
struct StoredMailbox {
    uid_next: Uid,
    messages: Vec<StoredMessage>,
}

impl Default for StoredMailbox {
    fn default() -> Self {
        StoredMailbox {
            uid_next: 1,
            messages: Vec::new(),
        }
    }
}

impl StoredMailbox {
    fn push(&mut self, flags: Vec<Flag>, content: Vec<u8>) -> Uid {
        let uid = self.uid_next;
        self.uid_next += 1;
        self.messages.push(StoredMessage {
            uid,
            flags,
            content,
        });
        uid
    }
}

#[derive(Debug)]
struct State {
    mailboxes: BTreeMap<String, StoredMailbox>,
    password: String,
    generation: u64,
    connections: usize,
    refuse: bool,
    move_supported: bool,
    uidplus_supported: bool,
    reported_missing: BTreeSet<String>,
    hidden: BTreeSet<String>,
}

impl State {
    fn missing(name: &str) -> Error {
        Error::MailboxMissing(format!("Mailbox doesn't exist: {}", name))
    }

    fn mailbox(&mut self, name: &str) -> Result<&mut StoredMailbox> {
        if self.reported_missing.contains(name) {
            return Err(State::missing(name));
        }
        self.mailboxes
            .get_mut(name)
            .ok_or_else(|| State::missing(name))
    }
}

fn normalize(flags: &[Flag]) -> Vec<Flag> {
    let mut out: Vec<Flag> = Vec::new();
    for flag in flags {
        let flag = match flag {
            Flag::Custom(keyword) => Flag::Custom(keyword.to_lowercase()),
            system => system.clone(),
        };
        if !out.contains(&flag) {
            out.push(flag);
        }
    }
    out
}

/// An in-memory IMAP account. Clones share state.
#[derive(Clone, Debug)]
pub struct MemoryServer {
    state: Rc<RefCell<State>>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        MemoryServer::new()
    }
}

impl MemoryServer {
    /// An account with an empty `INBOX` that accepts any user with the password `test`.
    pub fn new() -> Self {
        let mut mailboxes = BTreeMap::new();
        mailboxes.insert("INBOX".to_string(), StoredMailbox::default());
        MemoryServer {
            state: Rc::new(RefCell::new(State {
                mailboxes,
                password: DEFAULT_PASSWORD.to_string(),
                generation: 0,
                connections: 0,
                refuse: false,
                move_supported: true,
                uidplus_supported: true,
                reported_missing: BTreeSet::new(),
                hidden: BTreeSet::new(),
            })),
        }
    }

    pub fn with_password(self, password: &str) -> Self {
        self.state.borrow_mut().password = password.to_string();
        self
    }

    /// Stores a message, creating the mailbox if needed. Returns its UID.
    pub fn deliver(&self, mailbox: &str, content: &[u8], flags: &[Flag]) -> Uid {
        self.state
            .borrow_mut()
            .mailboxes
            .entry(mailbox.to_string())
            .or_default()
            .push(normalize(flags), content.to_vec())
    }

    pub fn create_mailbox(&self, name: &str) {
        self.state
            .borrow_mut()
            .mailboxes
            .entry(name.to_string())
            .or_default();
    }

    /// UIDs in a mailbox, ascending. Empty when the mailbox does not exist.
    pub fn uids(&self, mailbox: &str) -> Vec<Uid> {
        self.state
            .borrow()
            .mailboxes
            .get(mailbox)
            .map(|m| m.messages.iter().map(|msg| msg.uid).collect())
            .unwrap_or_default()
    }

    pub fn flags(&self, mailbox: &str, uid: Uid) -> Vec<Flag> {
        self.state
            .borrow()
            .mailboxes
            .get(mailbox)
            .and_then(|m| m.messages.iter().find(|msg| msg.uid == uid))
            .map(|msg| msg.flags.clone())
            .unwrap_or_default()
    }

    pub fn mailbox_names(&self) -> Vec<String> {
        self.state.borrow().mailboxes.keys().cloned().collect()
    }

    /// Number of successful logins so far.
    pub fn connections(&self) -> usize {
        self.state.borrow().connections
    }

    /// Breaks every open session; later commands on them fail with a lost connection.
    pub fn drop_connection(&self) {
        self.state.borrow_mut().generation += 1;
    }

    /// Makes new connection attempts fail at the transport level.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.borrow_mut().refuse = refuse;
    }

    /// Answers `MOVE` with BAD, like a server without RFC 6851.
    pub fn disable_move(&self) {
        self.state.borrow_mut().move_supported = false;
    }

    /// Answers `UID EXPUNGE` with BAD, like a server without UIDPLUS.
    pub fn disable_uidplus(&self) {
        self.state.borrow_mut().uidplus_supported = false;
    }

    /// Reports the mailbox as missing to every command, whether it exists or not.
    pub fn report_missing(&self, name: &str) {
        self.state
            .borrow_mut()
            .reported_missing
            .insert(name.to_string());
    }

    /// Leaves the mailbox out of `LIST` responses.
    pub fn hide_from_listing(&self, name: &str) {
        self.state.borrow_mut().hidden.insert(name.to_string());
    }
}

impl Connector for MemoryServer {
    fn connect(&self, settings: &ConnectionConfig) -> Result<Box<dyn Protocol>> {
        let mut state = self.state.borrow_mut();
        if state.refuse {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        if settings.password != state.password {
            return Err(Error::Auth("Authentication failed.".into()));
        }
        state.connections += 1;
        Ok(Box::new(MemorySession {
            state: Rc::clone(&self.state),
            generation: state.generation,
            logged_out: false,
            selected: None,
            read_only: false,
        }))
    }
}

/// One authenticated session against a [`MemoryServer`].
#[derive(Debug)]
pub struct MemorySession {
    state: Rc<RefCell<State>>,
    generation: u64,
    logged_out: bool,
    selected: Option<String>,
    read_only: bool,
}

impl MemorySession {
    fn check(&self) -> Result<()> {
        if self.logged_out {
            return Err(Error::NotConnected);
        }
        if self.state.borrow().generation != self.generation {
            return Err(Error::ConnectionLost);
        }
        Ok(())
    }

    fn selected(&self) -> Result<String> {
        self.check()?;
        self.selected
            .clone()
            .ok_or_else(|| Error::Bad("No mailbox selected".into()))
    }

    fn writable(&self) -> Result<String> {
        let selected = self.selected()?;
        if self.read_only {
            return Err(Error::No("Mailbox is read-only".into()));
        }
        Ok(selected)
    }

    fn open(&mut self, name: &str, read_only: bool) -> Result<Mailbox> {
        self.check()?;
        self.selected = None;
        let mut state = self.state.borrow_mut();
        let mailbox = state.mailbox(name)?;
        let exists = mailbox.messages.len() as u32;
        let uid_next = mailbox.uid_next;
        self.selected = Some(name.to_string());
        self.read_only = read_only;
        Ok(Mailbox {
            exists,
            uid_next: Some(uid_next),
            uid_validity: Some(1),
            read_only,
            ..Mailbox::default()
        })
    }

    fn copy_into(&mut self, uids: &[Uid], to: &str, remove: bool) -> Result<Option<Uid>> {
        let from = self.writable()?;
        let mut state = self.state.borrow_mut();
        state.mailbox(to)?;

        let source = state.mailbox(&from)?;
        let picked: Vec<(Vec<Flag>, Vec<u8>)> = source
            .messages
            .iter()
            .filter(|msg| uids.contains(&msg.uid))
            .map(|msg| (msg.flags.clone(), msg.content.clone()))
            .collect();
        if remove {
            source.messages.retain(|msg| !uids.contains(&msg.uid));
        }

        let destination = state.mailbox(to)?;
        let mut first = None;
        for (flags, content) in picked {
            let flags = flags.into_iter().filter(|f| *f != Flag::Recent).collect();
            let uid = destination.push(flags, content);
            first.get_or_insert(uid);
        }
        Ok(first)
    }
}

impl Protocol for MemorySession {
    fn select(&mut self, mailbox: &str) -> Result<Mailbox> {
        self.open(mailbox, false)
    }

    fn examine(&mut self, mailbox: &str) -> Result<Mailbox> {
        self.open(mailbox, true)
    }

    fn create(&mut self, mailbox: &str) -> Result<()> {
        self.check()?;
        let mut state = self.state.borrow_mut();
        if state.mailboxes.contains_key(mailbox) {
            return Err(Error::No("Mailbox already exists".into()));
        }
        state
            .mailboxes
            .insert(mailbox.to_string(), StoredMailbox::default());
        Ok(())
    }

    fn delete(&mut self, mailbox: &str) -> Result<()> {
        self.check()?;
        let mut state = self.state.borrow_mut();
        state.mailbox(mailbox)?;
        state.mailboxes.remove(mailbox);
        if self.selected.as_deref() == Some(mailbox) {
            self.selected = None;
        }
        Ok(())
    }

    fn list(&mut self) -> Result<Vec<Name>> {
        self.check()?;
        let state = self.state.borrow();
        Ok(state
            .mailboxes
            .keys()
            .filter(|name| !state.hidden.contains(*name))
            .map(|name| Name::new(name.as_str(), Some("/"), Vec::new()))
            .collect())
    }

    fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<Uid>> {
        let selected = self.selected()?;
        let mut state = self.state.borrow_mut();
        Ok(state
            .mailbox(&selected)?
            .messages
            .iter()
            .filter(|msg| criteria.matches(&msg.flags))
            .map(|msg| msg.uid)
            .collect())
    }

    fn fetch(&mut self, uids: &[Uid], query: FetchQuery) -> Result<Vec<Fetch>> {
        let selected = self.selected()?;
        let mut state = self.state.borrow_mut();
        Ok(state
            .mailbox(&selected)?
            .messages
            .iter()
            .enumerate()
            .filter(|(_, msg)| uids.contains(&msg.uid))
            .map(|(i, msg)| Fetch {
                message: i as u32 + 1,
                uid: Some(msg.uid),
                flags: msg.flags.clone(),
                envelope: None,
                header: match query {
                    FetchQuery::Headers => Some(msg.header()),
                    FetchQuery::Flags => None,
                },
            })
            .collect())
    }

    fn store(&mut self, uids: &[Uid], op: StoreOp, flags: &[Flag]) -> Result<()> {
        let selected = self.writable()?;
        let flags = normalize(flags);
        let mut state = self.state.borrow_mut();
        for msg in state.mailbox(&selected)?.messages.iter_mut() {
            if !uids.contains(&msg.uid) {
                continue;
            }
            match op {
                StoreOp::Add => {
                    for flag in &flags {
                        if !msg.flags.contains(flag) {
                            msg.flags.push(flag.clone());
                        }
                    }
                }
                StoreOp::Remove => msg.flags.retain(|f| !flags.contains(f)),
                StoreOp::Replace => msg.flags = flags.clone(),
            }
        }
        Ok(())
    }

    fn copy(&mut self, uids: &[Uid], mailbox: &str) -> Result<Option<Uid>> {
        self.copy_into(uids, mailbox, false)
    }

    fn mv(&mut self, uids: &[Uid], mailbox: &str) -> Result<Option<Uid>> {
        self.check()?;
        if !self.state.borrow().move_supported {
            return Err(Error::Bad("Unknown command MOVE".into()));
        }
        self.copy_into(uids, mailbox, true)
    }

    fn expunge(&mut self) -> Result<()> {
        let selected = self.writable()?;
        let mut state = self.state.borrow_mut();
        state
            .mailbox(&selected)?
            .messages
            .retain(|msg| !msg.flags.contains(&Flag::Deleted));
        Ok(())
    }

    fn uid_expunge(&mut self, uids: &[Uid]) -> Result<()> {
        let selected = self.writable()?;
        let mut state = self.state.borrow_mut();
        if !state.uidplus_supported {
            return Err(Error::Bad("Unknown command UID EXPUNGE".into()));
        }
        state
            .mailbox(&selected)?
            .messages
            .retain(|msg| !(uids.contains(&msg.uid) && msg.flags.contains(&Flag::Deleted)));
        Ok(())
    }

    fn append(&mut self, mailbox: &str, flags: &[Flag], content: &[u8]) -> Result<()> {
        self.check()?;
        let mut state = self.state.borrow_mut();
        state
            .mailbox(mailbox)?
            .push(normalize(flags), content.to_vec());
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.check()?;
        self.logged_out = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(server: &MemoryServer) -> Box<dyn Protocol> {
        let settings = ConnectionConfig {
            password: DEFAULT_PASSWORD.into(),
            ..ConnectionConfig::default()
        };
        server.connect(&settings).unwrap()
    }

    #[test]
    fn copy_keeps_source() {
        let server = MemoryServer::new();
        server.deliver("INBOX", b"a\r\n\r\n", &[Flag::Recent, Flag::Seen]);
        server.create_mailbox("Other");
        let mut conn = connect(&server);
        conn.select("INBOX").unwrap();
        assert_eq!(conn.copy(&[1], "Other").unwrap(), Some(1));
        assert_eq!(server.uids("INBOX"), vec![1]);
        assert_eq!(server.flags("Other", 1), vec![Flag::Seen]);
    }

    #[test]
    fn examine_is_read_only() {
        let server = MemoryServer::new();
        server.deliver("INBOX", b"a\r\n\r\n", &[]);
        let mut conn = connect(&server);
        assert!(conn.examine("INBOX").unwrap().read_only);
        assert!(matches!(
            conn.store(&[1], StoreOp::Add, &[Flag::Seen]),
            Err(Error::No(_))
        ));
    }

    #[test]
    fn keywords_are_lowercased() {
        let server = MemoryServer::new();
        server.deliver("INBOX", b"a\r\n\r\n", &["$MailFlagBit0".into(), "$mailflagbit0".into()]);
        assert_eq!(
            server.flags("INBOX", 1),
            vec![Flag::Custom("$mailflagbit0".into())]
        );
    }

    #[test]
    fn dropped_connection() {
        let server = MemoryServer::new();
        let mut conn = connect(&server);
        server.drop_connection();
        assert!(conn.list().unwrap_err().is_disconnect());
        let mut conn = connect(&server);
        assert!(conn.list().is_ok());
    }

    #[test]
    fn header_section() {
        let server = MemoryServer::new();
        server.deliver("INBOX", b"Subject: x\r\n\r\nbody", &[]);
        let mut conn = connect(&server);
        conn.examine("INBOX").unwrap();
        let fetches = conn.fetch(&[1], FetchQuery::Headers).unwrap();
        assert_eq!(fetches[0].header.as_deref(), Some(&b"Subject: x\r\n\r\n"[..]));
    }

    #[test]
    fn wire_helpers() {
        let fetches = fetches::parse("* 24 FETCH (FLAGS (\\Seen) UID 4827943)\r\n");
        assert_eq!(fetches[0].flags, vec![Flag::Seen]);
        let names = names::parse("* LIST (\\HasNoChildren) \".\" \"INBOX\"\r\n");
        assert_eq!(names[0].delimiter(), Some("."));
        let mailbox = mailbox::parse("* 3 EXISTS\r\n* OK [UIDNEXT 4] Predicted next UID\r\n");
        assert_eq!(mailbox.exists, 3);
        assert_eq!(mailbox.uid_next, Some(4));
    }
}
