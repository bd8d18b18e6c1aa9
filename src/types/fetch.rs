use super::{Flag, Seq, Uid};

/// An IMAP [`FETCH` response](https://tools.ietf.org/html/rfc3501#section-7.4.2) that contains
/// data about a particular message. This response occurs as the result of a `FETCH` or `STORE`
/// command, as well as by unilateral server decision (e.g., flag updates).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Fetch {
    /// The ordinal number of this message in its containing mailbox.
    pub message: Seq,

    /// A number expressing the unique identifier of the message.
    pub uid: Option<Uid>,

    /// A list of flags that are set for this message.
    pub flags: Vec<Flag>,

    /// The envelope of this message, if `ENVELOPE` was included in the fetch query.
    pub envelope: Option<Envelope>,

    /// The raw header block of this message, if `BODY[HEADER]` (or its `PEEK` form) was
    /// included in the fetch query.
    pub header: Option<Vec<u8>>,
}

/// The parts of the [envelope](https://tools.ietf.org/html/rfc3501#section-7.4.2) structure the
/// sorter uses. Values are the raw server strings; subjects may still be RFC 2047 encoded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Envelope {
    pub date: Option<String>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
}
