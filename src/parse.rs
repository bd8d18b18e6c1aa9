use std::borrow::Cow;

use imap_proto::{self, AttributeValue, MailboxDatum, Response, ResponseCode, Status, UidSetMember};
use tracing::trace;

use super::error::{Error, ParseError, Result};
use super::types::*;
use super::utf7;

enum MapOrNot<'a, T> {
    Map(T),
    Not(Response<'a>),
}

fn parse_many<'a, T, F>(mut lines: &'a [u8], mut map: F) -> Result<Vec<T>>
where
    F: FnMut(Response<'a>) -> Result<MapOrNot<'a, T>>,
{
    let mut things = Vec::new();
    loop {
        if lines.is_empty() {
            break Ok(things);
        }

        match imap_proto::parser::parse_response(lines) {
            Ok((rest, resp)) => {
                lines = rest;

                match map(resp)? {
                    MapOrNot::Map(t) => things.push(t),
                    MapOrNot::Not(resp) => handle_unilateral(resp)?,
                }
            }
            _ => {
                break Err(Error::Parse(ParseError::Invalid(lines.to_vec())));
            }
        }
    }
}

fn string(data: &Cow<'_, [u8]>) -> String {
    String::from_utf8_lossy(data).into_owned()
}

pub fn parse_names(lines: &[u8]) -> Result<Vec<Name>> {
    parse_many(lines, |resp| match resp {
        Response::MailboxData(MailboxDatum::List {
            flags,
            delimiter,
            name,
        }) => Ok(MapOrNot::Map(Name {
            attributes: flags
                .into_iter()
                .map(|f| NameAttribute::from(f.into_owned()))
                .collect(),
            delimiter: delimiter.map(Cow::into_owned),
            name: utf7::decode(&name),
        })),
        resp => Ok(MapOrNot::Not(resp)),
    })
}

pub fn parse_fetches(lines: &[u8]) -> Result<Vec<Fetch>> {
    parse_many(lines, |resp| match resp {
        Response::Fetch(num, attrs) => {
            let mut fetch = Fetch {
                message: num,
                ..Fetch::default()
            };

            for attr in attrs {
                match attr {
                    AttributeValue::Flags(flags) => {
                        fetch
                            .flags
                            .extend(flags.into_iter().map(|f| Flag::from(f.into_owned())));
                    }
                    AttributeValue::Uid(uid) => fetch.uid = Some(uid),
                    AttributeValue::Envelope(env) => {
                        fetch.envelope = Some(Envelope {
                            date: env.date.as_ref().map(string),
                            subject: env.subject.as_ref().map(string),
                            message_id: env.message_id.as_ref().map(string),
                        });
                    }
                    AttributeValue::BodySection { data, .. } => {
                        fetch.header = data.map(Cow::into_owned);
                    }
                    _ => {}
                }
            }

            Ok(MapOrNot::Map(fetch))
        }
        resp => Ok(MapOrNot::Not(resp)),
    })
}

/// Parses the untagged responses of a `UID SEARCH`. UIDs are returned ascending.
pub fn parse_ids(lines: &[u8]) -> Result<Vec<Uid>> {
    let mut ids: Vec<Uid> = parse_many(lines, |resp| match resp {
        Response::MailboxData(MailboxDatum::Search(ids)) => Ok(MapOrNot::Map(ids)),
        resp => Ok(MapOrNot::Not(resp)),
    })?
    .into_iter()
    .flatten()
    .collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Parses the untagged responses of a `SELECT` or `EXAMINE`.
pub fn parse_mailbox(lines: &[u8]) -> Result<Mailbox> {
    let mut mailbox = Mailbox::default();
    parse_many(lines, |resp| {
        match resp {
            Response::Data {
                status: Status::Ok,
                code: Some(code),
                ..
            } => match code {
                ResponseCode::UidValidity(uid) => mailbox.uid_validity = Some(uid),
                ResponseCode::UidNext(unext) => mailbox.uid_next = Some(unext),
                ResponseCode::Unseen(n) => mailbox.unseen = Some(n),
                ResponseCode::PermanentFlags(flags) => mailbox
                    .permanent_flags
                    .extend(flags.into_iter().map(|f| Flag::from(f.into_owned()))),
                ResponseCode::ReadOnly => mailbox.read_only = true,
                _ => {}
            },
            Response::MailboxData(MailboxDatum::Exists(e)) => mailbox.exists = e,
            Response::MailboxData(MailboxDatum::Recent(r)) => mailbox.recent = r,
            Response::MailboxData(MailboxDatum::Flags(flags)) => mailbox
                .flags
                .extend(flags.into_iter().map(|f| Flag::from(f.into_owned()))),
            resp => return Ok(MapOrNot::Not(resp)),
        }
        Ok(MapOrNot::Map(()))
    })?;
    Ok(mailbox)
}

/// Extracts the first destination UID of an untagged `COPYUID` response code, as sent by
/// servers implementing [RFC 6851](https://tools.ietf.org/html/rfc6851) for `UID MOVE`.
pub fn parse_copy_uid(lines: &[u8]) -> Result<Option<Uid>> {
    let found = parse_many(lines, |resp| match resp {
        Response::Data {
            status: Status::Ok,
            code: Some(ResponseCode::CopyUid(_, _, dst)),
            ..
        } => Ok(MapOrNot::Map(first_uid(&dst))),
        resp => Ok(MapOrNot::Not(resp)),
    })?;
    Ok(found.into_iter().flatten().next())
}

pub(crate) fn first_uid(set: &[UidSetMember]) -> Option<Uid> {
    set.first().map(|member| match member {
        UidSetMember::Uid(uid) => *uid,
        UidSetMember::UidRange(range) => *range.start(),
    })
}

/// Anything the command runner can safely ignore: unilateral server responses (see Section 7 of
/// RFC 3501) and informational status lines.
fn handle_unilateral(res: Response<'_>) -> Result<()> {
    match res {
        Response::MailboxData(MailboxDatum::Exists(n)) => trace!(exists = n, "unsolicited"),
        Response::MailboxData(MailboxDatum::Recent(n)) => trace!(recent = n, "unsolicited"),
        Response::MailboxData(MailboxDatum::Flags(_)) => trace!("unsolicited flags"),
        Response::MailboxData(MailboxDatum::Status { .. }) => trace!("unsolicited status"),
        Response::Expunge(n) => trace!(expunge = n, "unsolicited"),
        Response::Fetch(n, _) => trace!(message = n, "unsolicited fetch"),
        Response::Data {
            status: Status::Bye,
            information,
            ..
        } => {
            return Err(Error::Bye(
                information.map(|s| s.into_owned()).unwrap_or_default(),
            ))
        }
        Response::Data { information, .. } => {
            trace!(info = ?information, "untagged status");
        }
        Response::Capabilities(_) => trace!("unsolicited capabilities"),
        res => return Err(Error::Unexpected(format!("{:?}", res))),
    }
    Ok(())
}
