//! Rule-based sorting of IMAP mailboxes.
//!
//! `mailsort` watches an input mailbox for messages that are neither `\Seen` nor `\Flagged`,
//! evaluates each account's filters against their normalized headers and applies the first
//! matching filter's commands: move, add/remove flags, or replace all flags. Messages no filter
//! matched are flagged in place or moved to a fallback mailbox.
//!
//! # Usage
//!
//! ```no_run
//! use mailsort::filter::{evaluate_filter_sets_on_msgs, Commands, Filter, FilterSet};
//! use mailsort::rule::{Predicate, Rule};
//! use mailsort::{ConnectionConfig, Flag, Session};
//!
//! # fn main() -> mailsort::Result<()> {
//! let mut session = Session::new(ConnectionConfig {
//!     server: "imap.example.com".into(),
//!     port: 993,
//!     username: "me@example.com".into(),
//!     password: "secret".into(),
//!     imaps: true,
//!     ..ConnectionConfig::default()
//! });
//! session.connect()?;
//!
//! let mut filters = FilterSet::new();
//! filters.insert(
//!     "newsletters".into(),
//!     Filter {
//!         commands: Commands {
//!             move_to: Some("News".into()),
//!             ..Commands::default()
//!         },
//!         rules: vec![Rule::new().with("or", vec![Predicate::new("from", "news@")])],
//!         ..Filter::default()
//!     },
//! );
//!
//! let outcome = evaluate_filter_sets_on_msgs(
//!     &mut session,
//!     "INBOX",
//!     &[Flag::Seen, Flag::Flagged],
//!     "INBOX",
//!     &filters,
//! )?;
//! println!("{} sorted, {} left for review", outcome.matched, outcome.fallback);
//! session.disconnect()?;
//! # Ok(())
//! # }
//! ```
//!
//! The IMAP layer underneath is usable on its own through [`ClientBuilder`] and
//! [`client::Client`].

mod parse;
mod types;
mod utils;

pub mod client;
mod client_builder;
mod conn;
pub mod config;
pub mod driver;
pub mod error;
pub mod filter;
pub mod logging;
pub mod message;
pub mod protocol;
pub mod rule;
pub mod session;
pub mod utf7;

pub use crate::client_builder::{ClientBuilder, TlsMode};
pub use crate::conn::{Connection, ImapConnection};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::session::{ConnectionConfig, Session};
pub use crate::types::*;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

#[cfg(test)]
mod mock_stream;
