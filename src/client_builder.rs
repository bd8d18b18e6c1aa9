use std::fs;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use native_tls::{Certificate, Protocol, TlsConnector};
use tracing::debug;

use crate::client::Client;
use crate::conn::Connection;
use crate::error::{Error, Result};

/// How the transport to the server is secured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (`imaps`, usually port 993).
    Implicit,
    /// Plaintext greeting, then upgraded with `STARTTLS`.
    StartTls,
    /// No TLS at all. Only ever chosen when STARTTLS is explicitly disabled.
    Plaintext,
}

/// A convenience builder for [`Client`] structs over the configured transport.
///
/// ```no_run
/// # use mailsort::{ClientBuilder, TlsMode};
/// # fn main() -> Result<(), mailsort::Error> {
/// let client = ClientBuilder::new("imap.example.com", 143)
///     .mode(TlsMode::StartTls)
///     .ca_file(Some("/etc/ssl/private-ca.pem".as_ref()))
///     .connect()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    mode: TlsMode,
    verify: bool,
    ca_file: Option<PathBuf>,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port. Defaults to implicit TLS
    /// with certificate verification.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            mode: TlsMode::Implicit,
            verify: true,
            ca_file: None,
        }
    }

    pub fn mode(&mut self, mode: TlsMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Disabling verification accepts any certificate and host name.
    pub fn tls_verify(&mut self, verify: bool) -> &mut Self {
        self.verify = verify;
        self
    }

    /// Trust only the PEM certificate(s) in this file instead of the system roots.
    pub fn ca_file(&mut self, path: Option<&Path>) -> &mut Self {
        self.ca_file = path.map(Path::to_path_buf);
        self
    }

    fn tls_connector(&self) -> Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        builder.min_protocol_version(Some(Protocol::Tlsv12));
        if let Some(ref path) = self.ca_file {
            let pem = fs::read(path).map_err(|source| Error::CaFile {
                path: path.clone(),
                source,
            })?;
            builder.add_root_certificate(Certificate::from_pem(&pem)?);
            builder.disable_built_in_roots(true);
        }
        if !self.verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        Ok(builder.build()?)
    }

    /// Dials the server, secures the transport and reads the greeting. The returned client is
    /// not yet authenticated.
    pub fn connect(&mut self) -> Result<Client<Connection>> {
        let domain = self.domain.as_ref();
        debug!(server = domain, port = self.port, mode = ?self.mode, "connecting");

        match self.mode {
            TlsMode::Implicit => {
                let tls = self.tls_connector()?;
                let tcp = TcpStream::connect((domain, self.port))?;
                greet(Box::new(tls.connect(domain, tcp)?))
            }
            TlsMode::StartTls => {
                let tls = self.tls_connector()?;
                let tcp = TcpStream::connect((domain, self.port))?;
                let mut client = Client::new(tcp);
                client.read_greeting()?;
                client.run_command_and_check_ok("STARTTLS")?;
                let tcp = client.into_inner()?;
                let stream: Connection = Box::new(tls.connect(domain, tcp)?);
                Ok(Client::new(stream))
            }
            TlsMode::Plaintext => greet(Box::new(TcpStream::connect((domain, self.port))?)),
        }
    }
}

fn greet(stream: Connection) -> Result<Client<Connection>> {
    let mut client = Client::new(stream);
    client.read_greeting()?;
    Ok(client)
}
