use std::error::Error as StdError;
use std::fmt;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::net::TcpStream;
use std::path::PathBuf;
use std::result;

use bufstream::IntoInnerError as BufError;
use lazy_static::lazy_static;
use mailparse::MailParseError;
use native_tls::Error as TlsError;
use native_tls::HandshakeError as TlsHandshakeError;
use regex::Regex;

pub type Result<T> = result::Result<T, Error>;

lazy_static! {
    // Wording used by Dovecot, Cyrus, Exchange and Zimbra when a mailbox is unknown.
    static ref MAILBOX_MISSING: Regex = Regex::new(
        r"(?i)mailbox (doesn't|does not) exist|unknown mailbox|no folder|no such mailbox|nonexistent"
    )
    .expect("mailbox-missing pattern is valid");
}

/// Every failure the sorter can run into, from configuration through the wire protocol up to
/// rule evaluation.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid configuration, including account connection fields.
    Config(String),
    /// A configuration file could not be parsed.
    ConfigFile { path: PathBuf, source: toml::de::Error },
    /// The CA certificate file could not be read.
    CaFile { path: PathBuf, source: IoError },
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    Io(IoError),
    /// An error from the `native_tls` library during the TLS handshake.
    TlsHandshake(TlsHandshakeError<TcpStream>),
    /// An error from the `native_tls` library while building the connector or managing the
    /// socket.
    Tls(TlsError),
    /// The server rejected the credentials.
    Auth(String),
    /// A NO response from the IMAP server.
    No(String),
    /// A BAD response from the IMAP server.
    Bad(String),
    /// The server reported that the mailbox does not exist.
    MailboxMissing(String),
    /// The server said BYE outside of a LOGOUT.
    Bye(String),
    /// The connection was terminated unexpectedly.
    ConnectionLost,
    /// The session holds no live connection.
    NotConnected,
    /// A response the client did not expect at this point.
    Unexpected(String),
    /// Error parsing a server response.
    Parse(ParseError),
    /// Error validating input data.
    Validate(ValidateError),
    /// The server refused to accept an APPEND literal.
    Append,
    /// A rule pattern is not a valid regular expression.
    Pattern(PatternError),
    /// A rule uses an operator other than `and` or `or`.
    UnsupportedOperator(String),
    /// A rule pattern has a shape other than a string, an integer or a list of those.
    UnsupportedPatternType(String),
    /// A message header could not be parsed.
    HeaderParse(MailParseError),
    /// Connecting an account failed; carries the account identity for reporting.
    Connect {
        account: String,
        server: String,
        username: String,
        source: Box<Error>,
    },
}

/// Coarse classification of an [`Error`], for callers that only need to know which part of the
/// system failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Tls,
    Network,
    Auth,
    Protocol,
    Pattern,
    UnsupportedOperator,
    UnsupportedPatternType,
    HeaderParse,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Error::Config(_) | Error::ConfigFile { .. } | Error::Validate(_) => ErrorKind::Config,
            Error::CaFile { .. } | Error::Tls(_) | Error::TlsHandshake(_) => ErrorKind::Tls,
            Error::Io(_) | Error::ConnectionLost | Error::NotConnected | Error::Bye(_) => {
                ErrorKind::Network
            }
            Error::Auth(_) => ErrorKind::Auth,
            Error::No(_)
            | Error::Bad(_)
            | Error::MailboxMissing(_)
            | Error::Unexpected(_)
            | Error::Parse(_)
            | Error::Append => ErrorKind::Protocol,
            Error::Pattern(_) => ErrorKind::Pattern,
            Error::UnsupportedOperator(_) => ErrorKind::UnsupportedOperator,
            Error::UnsupportedPatternType(_) => ErrorKind::UnsupportedPatternType,
            Error::HeaderParse(_) => ErrorKind::HeaderParse,
            Error::Connect { ref source, .. } => source.kind(),
        }
    }

    /// True when the server told us the mailbox we named does not exist.
    pub fn is_mailbox_missing(&self) -> bool {
        match *self {
            Error::MailboxMissing(_) => true,
            Error::No(ref text) => MAILBOX_MISSING.is_match(text),
            _ => false,
        }
    }

    /// True for failures after which the connection cannot be used anymore.
    pub fn is_disconnect(&self) -> bool {
        match *self {
            Error::ConnectionLost | Error::NotConnected | Error::Bye(_) => true,
            Error::Io(ref e) => matches!(
                e.kind(),
                IoErrorKind::BrokenPipe
                    | IoErrorKind::ConnectionReset
                    | IoErrorKind::ConnectionAborted
                    | IoErrorKind::NotConnected
                    | IoErrorKind::UnexpectedEof
                    | IoErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Classifies the text of a NO response.
    pub(crate) fn from_no(text: String, try_create: bool) -> Error {
        if try_create || MAILBOX_MISSING.is_match(&text) {
            Error::MailboxMissing(text)
        } else {
            Error::No(text)
        }
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Error {
        Error::Io(err)
    }
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

impl From<TlsHandshakeError<TcpStream>> for Error {
    fn from(err: TlsHandshakeError<TcpStream>) -> Error {
        Error::TlsHandshake(err)
    }
}

impl From<TlsError> for Error {
    fn from(err: TlsError) -> Error {
        Error::Tls(err)
    }
}

impl From<MailParseError> for Error {
    fn from(err: MailParseError) -> Error {
        Error::HeaderParse(err)
    }
}

impl From<PatternError> for Error {
    fn from(err: PatternError) -> Error {
        Error::Pattern(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Config(ref msg) => write!(f, "invalid configuration: {}", msg),
            Error::ConfigFile { ref path, ref source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
            Error::CaFile { ref path, ref source } => {
                write!(f, "failed to read CA file {}: {}", path.display(), source)
            }
            Error::Io(ref e) => fmt::Display::fmt(e, f),
            Error::Tls(ref e) => fmt::Display::fmt(e, f),
            Error::TlsHandshake(ref e) => fmt::Display::fmt(e, f),
            Error::Auth(ref msg) => write!(f, "authentication failed: {}", msg),
            Error::No(ref msg) => write!(f, "No Response: {}", msg),
            Error::Bad(ref msg) => write!(f, "Bad Response: {}", msg),
            Error::MailboxMissing(ref msg) => write!(f, "mailbox missing: {}", msg),
            Error::Bye(ref msg) => write!(f, "server closed the connection: {}", msg),
            Error::ConnectionLost => f.write_str("Connection Lost"),
            Error::NotConnected => f.write_str("not connected"),
            Error::Unexpected(ref msg) => write!(f, "unexpected response: {}", msg),
            Error::Parse(ref e) => fmt::Display::fmt(e, f),
            Error::Validate(ref e) => fmt::Display::fmt(e, f),
            Error::Append => f.write_str("Could not append mail to mailbox"),
            Error::Pattern(ref e) => fmt::Display::fmt(e, f),
            Error::UnsupportedOperator(ref op) => {
                write!(f, "rule operator {:?} is unsupported", op)
            }
            Error::UnsupportedPatternType(ref ty) => write!(f, "unsupported pattern type {}", ty),
            Error::HeaderParse(ref e) => write!(f, "failed to parse message headers: {}", e),
            Error::Connect {
                ref account,
                ref server,
                ref username,
                ref source,
            } => write!(
                f,
                "failed to connect account {} ({} on {}): {}",
                account, username, server, source
            ),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            Error::ConfigFile { ref source, .. } => Some(source),
            Error::CaFile { ref source, .. } => Some(source),
            Error::Io(ref e) => Some(e),
            Error::Tls(ref e) => Some(e),
            Error::TlsHandshake(ref e) => Some(e),
            Error::Parse(ref e) => Some(e),
            Error::Validate(ref e) => Some(e),
            Error::Pattern(ref e) => Some(e),
            Error::HeaderParse(ref e) => Some(e),
            Error::Connect { ref source, .. } => Some(&**source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ParseError {
    /// The response could not be parsed at all.
    Invalid(Vec<u8>),
    /// A server string was not valid UTF-8.
    DataNotUtf8(Vec<u8>),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ParseError::Invalid(ref data) => write!(
                f,
                "Unable to parse response: {:?}",
                String::from_utf8_lossy(data)
            ),
            ParseError::DataNotUtf8(_) => f.write_str("Unable to parse data as UTF-8 text"),
        }
    }
}

impl StdError for ParseError {}

// Invalid character found. Expand as needed
#[derive(Debug)]
pub struct ValidateError(pub char);

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // print character in debug form because invalid ones are often whitespaces
        write!(f, "Invalid character in input: {:?}", self.0)
    }
}

impl StdError for ValidateError {}

/// A rule pattern that failed to compile as a regular expression.
#[derive(Debug)]
pub struct PatternError {
    pub pattern: String,
    source: regex::Error,
}

impl PatternError {
    pub(crate) fn new(pattern: &str, source: regex::Error) -> Self {
        PatternError {
            pattern: pattern.to_string(),
            source,
        }
    }

    /// The compiler's explanation, without the echoed pattern and caret lines.
    pub fn reason(&self) -> String {
        let detail = match self.source {
            regex::Error::Syntax(ref msg) => msg
                .lines()
                .rev()
                .find_map(|l| l.trim().strip_prefix("error: "))
                .unwrap_or(msg.as_str())
                .to_string(),
            ref other => other.to_string(),
        };
        match detail.as_str() {
            "unrecognized escape sequence" => "invalid escape sequence".to_string(),
            _ => detail,
        }
    }
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error parsing regexp: {}: `{}`", self.reason(), self.pattern)
    }
}

impl StdError for PatternError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
