//! This module contains types used throughout the IMAP protocol layer.

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message, which forms a value that will not refer to any other
/// message in the mailbox. Unique identifiers are assigned in a strictly ascending fashion in the
/// mailbox; unlike message sequence numbers, they are not necessarily contiguous.
///
/// A UID is only meaningful within the mailbox it was obtained from. Moving a message assigns it
/// a new UID in the destination mailbox.
pub type Uid = u32;

/// From section [2.3.1.2 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox. Sequence numbers shift
/// when messages are expunged.
pub type Seq = u32;

mod flag;
pub use self::flag::Flag;

mod mailbox;
pub use self::mailbox::Mailbox;

mod fetch;
pub use self::fetch::{Envelope, Fetch};

mod name;
pub use self::name::{Name, NameAttribute};
