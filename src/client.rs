use std::io::{BufRead, Read, Write};

use bufstream::BufStream;
use imap_proto::{Response, ResponseCode, Status};
use tracing::trace;

use super::error::{Error, ParseError, Result, ValidateError};
use super::parse::{first_uid, parse_copy_uid, parse_fetches, parse_ids, parse_mailbox, parse_names};
use super::types::*;
use super::utf7;
use super::utils::iter_join;

static TAG_PREFIX: &str = "a";
const INITIAL_TAG: u32 = 0;
const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

macro_rules! quote {
    ($x:expr) => {
        format!("\"{}\"", $x.replace(r"\", r"\\").replace("\"", "\\\""))
    };
}

fn validate_str(value: &str) -> Result<String> {
    let quoted = quote!(value);
    if quoted.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if quoted.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(quoted)
}

/// Renders a flag list for STORE and APPEND. Keywords must be IMAP atoms, optionally with a
/// leading backslash.
pub(crate) fn validate_flags(flags: &[Flag]) -> Result<String> {
    for flag in flags {
        if let Flag::Custom(ref keyword) = *flag {
            let atom = keyword.strip_prefix('\\').unwrap_or(keyword.as_str());
            if atom.is_empty() {
                return Err(Error::Validate(ValidateError('\\')));
            }
            if let Some(c) = atom.chars().find(|&c| !is_atom_char(c)) {
                return Err(Error::Validate(ValidateError(c)));
            }
        }
    }
    Ok(iter_join(flags, " "))
}

fn is_atom_char(c: char) -> bool {
    c.is_ascii_graphic() && !matches!(c, '(' | ')' | '{' | '%' | '*' | '"' | '\\' | ']')
}

/// Mailbox names travel in modified UTF-7 and are quoted like any other string.
fn validate_mailbox(name: &str) -> Result<String> {
    validate_str(&utf7::encode(name))
}

/// Stream to interface with the IMAP server. This interface is only for the command stream.
///
/// Every command is tagged `a1`, `a2`, ... and blocks until the server sends the tagged
/// completion for it; untagged data received on the way is collected and parsed afterwards.
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    stream: BufStream<T>,
    tag: u32,
    last_copy_uid: Option<Uid>,
    /// Log every line sent and received at trace level. Note that this includes credentials.
    pub debug: bool,
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client with the underlying stream.
    pub fn new(stream: T) -> Client<T> {
        Client {
            stream: BufStream::new(stream),
            tag: INITIAL_TAG,
            last_copy_uid: None,
            debug: false,
        }
    }

    /// Reads the server greeting. Must be the first thing called on a fresh connection.
    pub fn read_greeting(&mut self) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        if v.starts_with(b"* BYE") {
            return Err(Error::Bye(String::from_utf8_lossy(&v[5..]).trim().to_string()));
        }
        Ok(v)
    }

    /// Gives back the underlying stream, e.g. to wrap it in TLS after `STARTTLS`.
    pub fn into_inner(self) -> Result<T> {
        Ok(self.stream.into_inner()?)
    }

    /// Log in to the IMAP server. A rejection is reported as [`Error::Auth`].
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let command = format!(
            "LOGIN {} {}",
            validate_str(username)?,
            validate_str(password)?
        );
        match self.run_command_and_check_ok(&command) {
            Err(Error::No(msg)) | Err(Error::Bad(msg)) | Err(Error::MailboxMissing(msg)) => {
                Err(Error::Auth(msg))
            }
            other => other,
        }
    }

    /// Selects a mailbox read-write.
    pub fn select(&mut self, mailbox_name: &str) -> Result<Mailbox> {
        self.run_command_and_read_response(&format!("SELECT {}", validate_mailbox(mailbox_name)?))
            .and_then(|lines| parse_mailbox(&lines[..]))
    }

    /// Examine is identical to Select, but the selected mailbox is identified as read-only.
    pub fn examine(&mut self, mailbox_name: &str) -> Result<Mailbox> {
        let mut mailbox = self
            .run_command_and_read_response(&format!(
                "EXAMINE {}",
                validate_mailbox(mailbox_name)?
            ))
            .and_then(|lines| parse_mailbox(&lines[..]))?;
        mailbox.read_only = true;
        Ok(mailbox)
    }

    /// Create creates a mailbox with the given name.
    pub fn create(&mut self, mailbox_name: &str) -> Result<()> {
        self.run_command_and_check_ok(&format!("CREATE {}", validate_mailbox(mailbox_name)?))
    }

    /// Delete permanently removes the mailbox with the given name.
    pub fn delete(&mut self, mailbox_name: &str) -> Result<()> {
        self.run_command_and_check_ok(&format!("DELETE {}", validate_mailbox(mailbox_name)?))
    }

    /// Lists the mailboxes matching `pattern` below `reference`.
    pub fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<Name>> {
        self.run_command_and_read_response(&format!(
            "LIST {} {}",
            validate_str(reference)?,
            validate_str(pattern)?
        ))
        .and_then(|lines| parse_names(&lines[..]))
    }

    /// Searches the selected mailbox, returning matching UIDs in ascending order.
    pub fn uid_search(&mut self, query: &str) -> Result<Vec<Uid>> {
        self.run_command_and_read_response(&format!("UID SEARCH {}", query))
            .and_then(|lines| parse_ids(&lines[..]))
    }

    /// Fetches data items of the messages in `uid_set`.
    pub fn uid_fetch(&mut self, uid_set: &str, query: &str) -> Result<Vec<Fetch>> {
        self.run_command_and_read_response(&format!("UID FETCH {} {}", uid_set, query))
            .and_then(|lines| parse_fetches(&lines[..]))
    }

    /// Alters flags of the messages in `uid_set`; `query` is e.g. `+FLAGS (\Seen)`.
    pub fn uid_store(&mut self, uid_set: &str, query: &str) -> Result<Vec<Fetch>> {
        self.run_command_and_read_response(&format!("UID STORE {} {}", uid_set, query))
            .and_then(|lines| parse_fetches(&lines[..]))
    }

    /// Copies messages to another mailbox. Returns the UID of the first copy when the server
    /// reports it (UIDPLUS).
    pub fn uid_copy(&mut self, uid_set: &str, mailbox_name: &str) -> Result<Option<Uid>> {
        self.run_command_and_check_ok(&format!(
            "UID COPY {} {}",
            uid_set,
            validate_mailbox(mailbox_name)?
        ))?;
        Ok(self.last_copy_uid.take())
    }

    /// Moves messages to another mailbox ([RFC 6851](https://tools.ietf.org/html/rfc6851)).
    /// Returns the UID of the first moved message in the destination when the server reports
    /// it.
    pub fn uid_mv(&mut self, uid_set: &str, mailbox_name: &str) -> Result<Option<Uid>> {
        let lines = self.run_command_and_read_response(&format!(
            "UID MOVE {} {}",
            uid_set,
            validate_mailbox(mailbox_name)?
        ))?;
        Ok(parse_copy_uid(&lines[..])?.or_else(|| self.last_copy_uid.take()))
    }

    /// Permanently removes all messages that have the \Deleted flag set from the selected
    /// mailbox.
    pub fn expunge(&mut self) -> Result<()> {
        self.run_command_and_check_ok("EXPUNGE")
    }

    /// Expunges only the given messages ([RFC 4315](https://tools.ietf.org/html/rfc4315)).
    /// Servers without UIDPLUS answer BAD.
    pub fn uid_expunge(&mut self, uid_set: &str) -> Result<()> {
        self.run_command_and_check_ok(&format!("UID EXPUNGE {}", uid_set))
    }

    /// Logout informs the server that the client is done with the connection.
    pub fn logout(&mut self) -> Result<()> {
        self.run_command_and_check_ok("LOGOUT")
    }

    /// The APPEND command adds a mail to a mailbox.
    pub fn append(&mut self, mailbox_name: &str, flags: &[Flag], content: &[u8]) -> Result<()> {
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" ({})", validate_flags(flags)?)
        };
        self.run_command(&format!(
            "APPEND {}{} {{{}}}",
            validate_mailbox(mailbox_name)?,
            flags,
            content.len()
        ))?;
        let mut v = Vec::new();
        self.readline(&mut v)?;
        if !v.starts_with(b"+") {
            // the server answered with a tagged response instead of a continuation
            self.read_response_onto(&mut v)?;
            return Err(Error::Append);
        }
        self.stream.write_all(content)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        self.read_response().map(|_| ())
    }

    /// Runs a command and checks if it returns OK.
    pub fn run_command_and_check_ok(&mut self, command: &str) -> Result<()> {
        self.run_command_and_read_response(command).map(|_| ())
    }

    /// Runs any command passed to it.
    pub fn run_command(&mut self, untagged_command: &str) -> Result<()> {
        let command = self.create_command(untagged_command);
        self.write_line(command.as_bytes())
    }

    /// Runs a command and returns the untagged response lines that preceded its completion.
    pub fn run_command_and_read_response(&mut self, untagged_command: &str) -> Result<Vec<u8>> {
        self.run_command(untagged_command)?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut v = Vec::new();
        self.read_response_onto(&mut v)?;
        Ok(v)
    }

    fn read_response_onto(&mut self, data: &mut Vec<u8>) -> Result<()> {
        let mut continue_from = None;
        let mut try_first = !data.is_empty();
        let match_tag = format!("{}{}", TAG_PREFIX, self.tag);
        self.last_copy_uid = None;
        loop {
            let line_start = if try_first {
                try_first = false;
                0
            } else {
                let start_new = data.len();
                self.readline(data)?;
                continue_from.take().unwrap_or(start_new)
            };

            let break_with = {
                let line = &data[line_start..];

                match imap_proto::parser::parse_response(line) {
                    Ok((
                        _,
                        Response::Done {
                            tag,
                            status,
                            code,
                            information,
                            ..
                        },
                    )) => {
                        if tag.as_bytes() != match_tag.as_bytes() {
                            Some(Err(Error::Unexpected(format!(
                                "completion for {} while waiting for {}",
                                String::from_utf8_lossy(tag.as_bytes()),
                                match_tag
                            ))))
                        } else {
                            let text = information
                                .map(|s| s.into_owned())
                                .unwrap_or_else(|| "no explanation given".to_string());
                            Some(match status {
                                Status::Ok => {
                                    if let Some(ResponseCode::CopyUid(_, _, ref dst)) = code {
                                        self.last_copy_uid = first_uid(dst);
                                    }
                                    Ok(())
                                }
                                Status::No => Err(Error::from_no(
                                    text,
                                    matches!(code, Some(ResponseCode::TryCreate)),
                                )),
                                Status::Bad => Err(Error::Bad(text)),
                                status => {
                                    Err(Error::Unexpected(format!("{:?}: {}", status, text)))
                                }
                            })
                        }
                    }
                    Ok(..) => None,
                    Err(nom::Err::Incomplete(..)) => {
                        continue_from = Some(line_start);
                        None
                    }
                    _ => Some(Err(Error::Parse(ParseError::Invalid(line.to_vec())))),
                }
            };

            match break_with {
                Some(Ok(())) => {
                    data.truncate(line_start);
                    break Ok(());
                }
                Some(Err(e)) => break Err(e),
                None => {}
            }
        }
    }

    fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        let read = self.stream.read_until(LF, into)?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }

        if self.debug {
            let line = &into[(into.len() - read)..];
            trace!(target: "mailsort::wire", "S: {}", String::from_utf8_lossy(line).trim_end());
        }

        Ok(read)
    }

    fn create_command(&mut self, command: &str) -> String {
        self.tag += 1;
        format!("{}{} {}", TAG_PREFIX, self.tag, command)
    }

    fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        self.stream.write_all(&[CR, LF])?;
        self.stream.flush()?;
        if self.debug {
            trace!(target: "mailsort::wire", "C: {}", String::from_utf8_lossy(buf));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock_stream::MockStream;
    use super::*;

    fn written(client: &Client<MockStream>) -> String {
        String::from_utf8(client.stream.get_ref().written_buf.clone()).unwrap()
    }

    #[test]
    fn read_response() {
        let response = "a0 OK Logged in.\r\n";
        let mock_stream = MockStream::new(response.as_bytes().to_vec());
        let mut client = Client::new(mock_stream);
        let actual_response = client.read_response().unwrap();
        assert_eq!(Vec::<u8>::new(), actual_response);
    }

    #[test]
    fn fetch_body_literal() {
        let response = "a0 OK Logged in.\r\n\
                        * 2 FETCH (BODY[TEXT] {3}\r\nfoo)\r\n\
                        a0 OK FETCH completed\r\n";
        let mock_stream = MockStream::new(response.as_bytes().to_vec());
        let mut client = Client::new(mock_stream);
        client.read_response().unwrap();
        let lines = client.read_response().unwrap();
        assert_eq!(lines, b"* 2 FETCH (BODY[TEXT] {3}\r\nfoo)\r\n".to_vec());
    }

    #[test]
    fn read_greeting() {
        let greeting = "* OK Dovecot ready.\r\n";
        let mock_stream = MockStream::new(greeting.as_bytes().to_vec());
        let mut client = Client::new(mock_stream);
        assert_eq!(client.read_greeting().unwrap(), greeting.as_bytes());
    }

    #[test]
    fn greeting_bye() {
        let mock_stream = MockStream::new(b"* BYE too many connections\r\n".to_vec());
        let mut client = Client::new(mock_stream);
        match client.read_greeting() {
            Err(Error::Bye(text)) => assert_eq!(text, "too many connections"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn readline_delay_read() {
        let greeting = "* OK Dovecot ready.\r\n";
        let mock_stream = MockStream::default()
            .with_buf(greeting.as_bytes().to_vec())
            .with_delay();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        client.readline(&mut v).unwrap();
        assert_eq!(greeting, String::from_utf8(v).unwrap());
    }

    #[test]
    fn readline_eof() {
        let mock_stream = MockStream::default().with_eof();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        let err = client.readline(&mut v).unwrap_err();
        assert!(matches!(err, Error::ConnectionLost));
        assert!(err.is_disconnect());
    }

    #[test]
    fn readline_err() {
        let mock_stream = MockStream::default().with_err();
        let mut client = Client::new(mock_stream);
        let mut v = Vec::new();
        assert!(matches!(client.readline(&mut v), Err(Error::Io(_))));
    }

    #[test]
    fn create_command() {
        let mut imap_stream = Client::new(MockStream::default());
        assert_eq!(imap_stream.create_command("CHECK"), "a1 CHECK");
        assert_eq!(imap_stream.create_command("CHECK"), "a2 CHECK");
    }

    #[test]
    fn login() {
        let response = b"a1 OK Logged in\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.login("username", "password").unwrap();
        assert_eq!(written(&client), "a1 LOGIN \"username\" \"password\"\r\n");
    }

    #[test]
    fn login_rejected_is_auth_error() {
        let response = b"a1 NO Authentication failed.\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        match client.login("username", "wrong") {
            Err(Error::Auth(msg)) => assert_eq!(msg, "Authentication failed."),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn logout() {
        let response = b"* BYE Logging out\r\na1 OK Logout completed.\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.logout().unwrap();
        assert_eq!(written(&client), "a1 LOGOUT\r\n");
    }

    #[test]
    fn select() {
        let response = b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
            * OK [PERMANENTFLAGS (\\* \\Answered \\Flagged \\Deleted \\Draft \\Seen)] Limited\r\n\
            * 1 EXISTS\r\n\
            * 1 RECENT\r\n\
            * OK [UNSEEN 1] First unseen.\r\n\
            * OK [UIDVALIDITY 1257842737] UIDs valid\r\n\
            * OK [UIDNEXT 2] Predicted next UID\r\n\
            a1 OK [READ-WRITE] Select completed.\r\n"
            .to_vec();
        let mut client = Client::new(MockStream::new(response));
        let mailbox = client.select("INBOX").unwrap();
        assert_eq!(written(&client), "a1 SELECT \"INBOX\"\r\n");
        assert_eq!(mailbox.exists, 1);
        assert_eq!(mailbox.uid_next, Some(2));
        assert_eq!(mailbox.permanent_flags.len(), 6);
        assert!(!mailbox.read_only);
    }

    #[test]
    fn examine() {
        let response = b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n\
            * 1 EXISTS\r\n\
            * 1 RECENT\r\n\
            * OK [UIDVALIDITY 1257842737] UIDs valid\r\n\
            a1 OK [READ-ONLY] Select completed.\r\n"
            .to_vec();
        let mut client = Client::new(MockStream::new(response));
        let mailbox = client.examine("INBOX").unwrap();
        assert_eq!(written(&client), "a1 EXAMINE \"INBOX\"\r\n");
        assert_eq!(mailbox.uid_validity, Some(1257842737));
        assert!(mailbox.read_only);
    }

    #[test]
    fn select_missing_mailbox() {
        let response = b"a1 NO Mailbox doesn't exist: Archive\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        let err = client.select("Archive").unwrap_err();
        assert!(err.is_mailbox_missing(), "got {:?}", err);
    }

    #[test]
    fn create_encodes_utf7() {
        let response = b"a1 OK CREATE completed\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.create("Entwürfe").unwrap();
        assert_eq!(written(&client), "a1 CREATE \"Entw&APw-rfe\"\r\n");
    }

    #[test]
    fn delete() {
        let response = b"a1 OK DELETE completed\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.delete("Target").unwrap();
        assert_eq!(written(&client), "a1 DELETE \"Target\"\r\n");
    }

    #[test]
    fn list() {
        let response = b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
            * LIST (\\HasNoChildren) \"/\" \"Target\"\r\n\
            a1 OK LIST completed\r\n"
            .to_vec();
        let mut client = Client::new(MockStream::new(response));
        let names = client.list("", "*").unwrap();
        assert_eq!(written(&client), "a1 LIST \"\" \"*\"\r\n");
        let names: Vec<&str> = names.iter().map(Name::name).collect();
        assert_eq!(names, vec!["INBOX", "Target"]);
    }

    #[test]
    fn uid_search() {
        let response = b"* SEARCH 9 3 4\r\na1 OK SEARCH completed\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        let uids = client.uid_search("UNSEEN UNFLAGGED").unwrap();
        assert_eq!(written(&client), "a1 UID SEARCH UNSEEN UNFLAGGED\r\n");
        assert_eq!(uids, vec![3, 4, 9]);
    }

    #[test]
    fn uid_store() {
        let response = b"* 2 FETCH (FLAGS (\\Deleted \\Seen) UID 4)\r\n\
                         a1 OK STORE completed\r\n"
            .to_vec();
        let mut client = Client::new(MockStream::new(response));
        let fetches = client.uid_store("4", "+FLAGS (\\Deleted)").unwrap();
        assert_eq!(written(&client), "a1 UID STORE 4 +FLAGS (\\Deleted)\r\n");
        assert_eq!(fetches[0].flags, vec![Flag::Deleted, Flag::Seen]);
    }

    #[test]
    fn uid_copy_reports_destination_uid() {
        let response = b"a1 OK [COPYUID 38505 304 3956] Done\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        let uid = client.uid_copy("304", "Target").unwrap();
        assert_eq!(written(&client), "a1 UID COPY 304 \"Target\"\r\n");
        assert_eq!(uid, Some(3956));
    }

    #[test]
    fn uid_mv_reports_destination_uid() {
        let response = b"* OK [COPYUID 432432 42 5] Moved UIDs.\r\n\
                         * 1 EXPUNGE\r\n\
                         a1 OK Move completed.\r\n"
            .to_vec();
        let mut client = Client::new(MockStream::new(response));
        let uid = client.uid_mv("42", "Target").unwrap();
        assert_eq!(written(&client), "a1 UID MOVE 42 \"Target\"\r\n");
        assert_eq!(uid, Some(5));
    }

    #[test]
    fn uid_mv_to_missing_mailbox() {
        let response = b"a1 NO [TRYCREATE] Mailbox doesn't exist: Target\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        let err = client.uid_mv("42", "Target").unwrap_err();
        assert!(matches!(err, Error::MailboxMissing(_)), "got {:?}", err);
    }

    #[test]
    fn uid_mv_unsupported() {
        let response = b"a1 BAD Error in IMAP command UID: Unknown command\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        assert!(matches!(client.uid_mv("1", "Target"), Err(Error::Bad(_))));
    }

    #[test]
    fn uid_fetch() {
        let response = b"* 1 FETCH (UID 3 FLAGS (\\Recent))\r\na1 OK FETCH completed\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        let fetches = client.uid_fetch("3", "(UID FLAGS)").unwrap();
        assert_eq!(written(&client), "a1 UID FETCH 3 (UID FLAGS)\r\n");
        assert_eq!(fetches[0].uid, Some(3));
        assert_eq!(fetches[0].flags, vec![Flag::Recent]);
    }

    #[test]
    fn append() {
        let response = b"+ Ready for literal data\r\na1 OK APPEND completed\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.append("INBOX", &[Flag::Seen], b"hello").unwrap();
        assert_eq!(
            written(&client),
            "a1 APPEND \"INBOX\" (\\Seen) {5}\r\nhello\r\n"
        );
    }

    #[test]
    fn append_to_missing_mailbox() {
        let response = b"a1 NO [TRYCREATE] Mailbox doesn't exist: Nope\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        let err = client.append("Nope", &[], b"hello").unwrap_err();
        assert!(err.is_mailbox_missing(), "got {:?}", err);
    }

    #[test]
    fn append_rejects_keyword_with_space() {
        let mut client = Client::new(MockStream::default());
        let err = client
            .append("INBOX", &[Flag::Custom("two words".into())], b"hello")
            .unwrap_err();
        assert!(matches!(err, Error::Validate(ValidateError(' '))), "got {:?}", err);
        assert_eq!(written(&client), "");
    }

    #[test]
    fn keyword_validation() {
        let ok = [Flag::Seen, Flag::Custom("$MailFlagBit0".into()), Flag::Custom("\\Junk".into())];
        assert_eq!(validate_flags(&ok).unwrap(), "\\Seen $MailFlagBit0 \\Junk");
        for (keyword, bad) in [("a)b", ')'), ("x\r\n", '\r'), ("(", '('), ("", '\\'), ("\\", '\\')] {
            match validate_flags(&[Flag::Custom(keyword.into())]) {
                Err(Error::Validate(ValidateError(c))) => assert_eq!(c, bad, "{:?}", keyword),
                other => panic!("{:?} gave {:?}", keyword, other),
            }
        }
    }

    #[test]
    fn uid_expunge() {
        let response = b"* 3 EXPUNGE\r\na1 OK UID EXPUNGE completed\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.uid_expunge("7:8").unwrap();
        assert_eq!(written(&client), "a1 UID EXPUNGE 7:8\r\n");
    }

    #[test]
    fn expunge() {
        let response = b"* 2 EXPUNGE\r\na1 OK EXPUNGE completed\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        client.expunge().unwrap();
        assert_eq!(written(&client), "a1 EXPUNGE\r\n");
    }

    #[test]
    fn connection_lost_mid_response() {
        let response = b"* SEARCH 1 2\r\n".to_vec();
        let mut client = Client::new(MockStream::new(response));
        assert!(matches!(
            client.uid_search("ALL"),
            Err(Error::ConnectionLost)
        ));
    }

    #[test]
    fn quote_backslash() {
        assert_eq!("\"test\\\\text\"", quote!(r"test\text"));
    }

    #[test]
    fn quote_dquote() {
        assert_eq!("\"test\\\"text\"", quote!("test\"text"));
    }

    #[test]
    fn validate_random() {
        assert_eq!(
            "\"~iCQ_k;>[&\\\"sVCvUW`e<<P!wJ\"",
            &validate_str("~iCQ_k;>[&\"sVCvUW`e<<P!wJ").unwrap()
        );
    }

    #[test]
    fn validate_newline() {
        match validate_str("test\nstring") {
            Err(Error::Validate(ValidateError('\n'))) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn validate_carriage_return() {
        match validate_str("test\rstring") {
            Err(Error::Validate(ValidateError('\r'))) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
