//! The session primitives the sorter needs from an IMAP server, as a trait so that the session
//! manager can run against a live [`Client`] or the in-memory server used in tests.

use std::fmt;
use std::io::{Read, Write};

use tracing::enabled;

use crate::client::{validate_flags, Client};
use crate::client_builder::ClientBuilder;
use crate::error::Result;
use crate::session::ConnectionConfig;
use crate::types::{Fetch, Flag, Mailbox, Name, Uid};
use crate::utils::{iter_join, uid_set};

/// Flag criteria for `UID SEARCH`. Empty criteria match every message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub with_flags: Vec<Flag>,
    pub without_flags: Vec<Flag>,
}

impl SearchCriteria {
    pub fn new(with_flags: &[Flag], without_flags: &[Flag]) -> Self {
        SearchCriteria {
            with_flags: with_flags.to_vec(),
            without_flags: without_flags.to_vec(),
        }
    }

    /// Whether a message carrying `flags` satisfies these criteria.
    pub fn matches(&self, flags: &[Flag]) -> bool {
        self.with_flags.iter().all(|f| flags.contains(f))
            && !self.without_flags.iter().any(|f| flags.contains(f))
    }
}

fn search_key(flag: &Flag, present: bool) -> String {
    let (with, without) = match *flag {
        Flag::Seen => ("SEEN", "UNSEEN"),
        Flag::Answered => ("ANSWERED", "UNANSWERED"),
        Flag::Flagged => ("FLAGGED", "UNFLAGGED"),
        Flag::Deleted => ("DELETED", "UNDELETED"),
        Flag::Draft => ("DRAFT", "UNDRAFT"),
        Flag::Recent => ("RECENT", "OLD"),
        ref keyword => {
            let verb = if present { "KEYWORD" } else { "UNKEYWORD" };
            return format!("{} {}", verb, keyword);
        }
    };
    let key = if present { with } else { without };
    key.to_string()
}

impl fmt::Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.with_flags.is_empty() && self.without_flags.is_empty() {
            return f.write_str("ALL");
        }
        let keys = self
            .with_flags
            .iter()
            .map(|flag| search_key(flag, true))
            .chain(self.without_flags.iter().map(|flag| search_key(flag, false)));
        f.write_str(&iter_join(keys, " "))
    }
}

/// How `STORE` combines the given flags with the message's current ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Add,
    Remove,
    Replace,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            StoreOp::Add => "+FLAGS",
            StoreOp::Remove => "-FLAGS",
            StoreOp::Replace => "FLAGS",
        })
    }
}

/// The data items of a `UID FETCH`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchQuery {
    /// UID, flags, envelope and the header block. Never sets `\Seen`.
    Headers,
    /// UID and flags only.
    Flags,
}

impl fmt::Display for FetchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            FetchQuery::Headers => "(UID FLAGS ENVELOPE BODY.PEEK[HEADER])",
            FetchQuery::Flags => "(UID FLAGS)",
        })
    }
}

/// An authenticated IMAP session. Mailbox names are UTF-8; UIDs refer to the selected mailbox.
///
/// Implementations report a missing mailbox as [`Error::MailboxMissing`](crate::Error) (or a NO
/// whose text says so), a dead connection as a disconnect-class error, and any other rejection
/// as [`Error::No`](crate::Error)/[`Error::Bad`](crate::Error).
pub trait Protocol {
    fn select(&mut self, mailbox: &str) -> Result<Mailbox>;
    fn examine(&mut self, mailbox: &str) -> Result<Mailbox>;
    fn create(&mut self, mailbox: &str) -> Result<()>;
    fn delete(&mut self, mailbox: &str) -> Result<()>;
    /// All mailboxes visible to the user.
    fn list(&mut self) -> Result<Vec<Name>>;
    fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<Uid>>;
    fn fetch(&mut self, uids: &[Uid], query: FetchQuery) -> Result<Vec<Fetch>>;
    fn store(&mut self, uids: &[Uid], op: StoreOp, flags: &[Flag]) -> Result<()>;
    /// Returns the destination UID of the first message when the server reports it.
    fn copy(&mut self, uids: &[Uid], mailbox: &str) -> Result<Option<Uid>>;
    /// Returns the destination UID of the first message when the server reports it.
    fn mv(&mut self, uids: &[Uid], mailbox: &str) -> Result<Option<Uid>>;
    fn expunge(&mut self) -> Result<()>;
    /// Expunges only `uids`. Servers without UIDPLUS reject it with BAD.
    fn uid_expunge(&mut self, uids: &[Uid]) -> Result<()>;
    fn append(&mut self, mailbox: &str, flags: &[Flag], content: &[u8]) -> Result<()>;
    fn logout(&mut self) -> Result<()>;
}

impl<T: Read + Write> Protocol for Client<T> {
    fn select(&mut self, mailbox: &str) -> Result<Mailbox> {
        Client::select(self, mailbox)
    }

    fn examine(&mut self, mailbox: &str) -> Result<Mailbox> {
        Client::examine(self, mailbox)
    }

    fn create(&mut self, mailbox: &str) -> Result<()> {
        Client::create(self, mailbox)
    }

    fn delete(&mut self, mailbox: &str) -> Result<()> {
        Client::delete(self, mailbox)
    }

    fn list(&mut self) -> Result<Vec<Name>> {
        Client::list(self, "", "*")
    }

    fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<Uid>> {
        self.uid_search(&criteria.to_string())
    }

    fn fetch(&mut self, uids: &[Uid], query: FetchQuery) -> Result<Vec<Fetch>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        self.uid_fetch(&uid_set(uids), &query.to_string())
    }

    fn store(&mut self, uids: &[Uid], op: StoreOp, flags: &[Flag]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        let query = format!("{}.SILENT ({})", op, validate_flags(flags)?);
        self.uid_store(&uid_set(uids), &query).map(|_| ())
    }

    fn copy(&mut self, uids: &[Uid], mailbox: &str) -> Result<Option<Uid>> {
        self.uid_copy(&uid_set(uids), mailbox)
    }

    fn mv(&mut self, uids: &[Uid], mailbox: &str) -> Result<Option<Uid>> {
        self.uid_mv(&uid_set(uids), mailbox)
    }

    fn expunge(&mut self) -> Result<()> {
        Client::expunge(self)
    }

    fn uid_expunge(&mut self, uids: &[Uid]) -> Result<()> {
        if uids.is_empty() {
            return Ok(());
        }
        Client::uid_expunge(self, &uid_set(uids))
    }

    fn append(&mut self, mailbox: &str, flags: &[Flag], content: &[u8]) -> Result<()> {
        Client::append(self, mailbox, flags, content)
    }

    fn logout(&mut self) -> Result<()> {
        Client::logout(self)
    }
}

/// Opens authenticated sessions.
pub trait Connector {
    fn connect(&self, settings: &ConnectionConfig) -> Result<Box<dyn Protocol>>;
}

/// Dials the configured server over TCP with the TLS policy of the connection settings.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImapConnector;

impl Connector for ImapConnector {
    fn connect(&self, settings: &ConnectionConfig) -> Result<Box<dyn Protocol>> {
        let mut client = ClientBuilder::new(settings.server.as_str(), settings.port)
            .mode(settings.tls_mode())
            .tls_verify(settings.tls_verify())
            .ca_file(settings.ca_file.as_deref())
            .connect()?;
        client.debug = enabled!(tracing::Level::TRACE);
        client.login(&settings.username, &settings.password)?;
        Ok(Box::new(client))
    }
}
