//! The poll loop: sorts every account, sleeps, repeats.

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{evaluate_filter_sets_on_msgs, FilterSet};
use crate::session::Session;
use crate::types::Flag;

/// Messages carrying any of these are left alone.
pub const EXCLUDE_FLAGS: [Flag; 2] = [Flag::Seen, Flag::Flagged];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Stop after one pass over the accounts.
    pub once: bool,
    /// Wait before reconnecting a dropped session.
    pub reconnect_backoff: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions {
            interval: Duration::from_secs(5),
            once: false,
            reconnect_backoff: Duration::from_secs(5),
        }
    }
}

/// One account's session and the filters that apply to it.
pub struct Job {
    pub account: String,
    pub session: Session,
    pub input: String,
    pub fallback: String,
    pub filters: FilterSet,
}

impl Job {
    /// One job per enabled account. Every account needs at least one filter.
    pub fn from_config(config: &Config) -> Result<Vec<Job>> {
        if config.accounts.is_empty() {
            return Err(Error::Config("no enabled accounts configured".into()));
        }
        if config.filters.values().all(|filters| filters.is_empty()) {
            return Err(Error::Config("no filters configured".into()));
        }

        let mut jobs = Vec::new();
        for (name, account) in &config.accounts {
            let filters = match config.filters.get(name) {
                Some(filters) if !filters.is_empty() => filters.clone(),
                _ => {
                    return Err(Error::Config(format!(
                        "no filters configured for account {}",
                        name
                    )))
                }
            };
            jobs.push(Job {
                account: name.clone(),
                session: Session::new(account.connection.clone()),
                input: account.input().to_string(),
                fallback: account.fallback().to_string(),
                filters,
            });
        }
        Ok(jobs)
    }

    fn connect(&mut self) -> Result<()> {
        self.session.connect().map_err(|source| {
            let settings = self.session.settings();
            Error::Connect {
                account: self.account.clone(),
                server: settings.server.clone(),
                username: settings.username.clone(),
                source: Box::new(source),
            }
        })
    }

    fn sort(&mut self) -> Result<()> {
        let outcome = evaluate_filter_sets_on_msgs(
            &mut self.session,
            &self.input,
            &EXCLUDE_FLAGS,
            &self.fallback,
            &self.filters,
        )?;
        if outcome.matched + outcome.fallback > 0 {
            info!(
                account = %self.account,
                matched = outcome.matched,
                fallback = outcome.fallback,
                "sorted messages"
            );
        }
        Ok(())
    }
}

/// Connects every job, then sorts until an unrecoverable error or, with `once`, after one pass.
pub fn run(jobs: &mut [Job], options: &PollOptions) -> Result<()> {
    for job in jobs.iter_mut() {
        job.connect()?;
    }
    let result = poll(jobs, options);
    for job in jobs.iter_mut() {
        if let Err(e) = job.session.disconnect() {
            warn!(account = %job.account, error = %e, "logout failed");
        }
    }
    result
}

fn poll(jobs: &mut [Job], options: &PollOptions) -> Result<()> {
    loop {
        for job in jobs.iter_mut() {
            match job.sort() {
                Ok(()) => {}
                Err(e) if e.is_disconnect() => {
                    warn!(
                        account = %job.account,
                        error = %e,
                        backoff = ?options.reconnect_backoff,
                        "lost connection, reconnecting"
                    );
                    thread::sleep(options.reconnect_backoff);
                    job.connect()?;
                }
                Err(e) => {
                    error!(account = %job.account, error = %e, "sorting failed");
                    return Err(e);
                }
            }
        }
        if options.once {
            return Ok(());
        }
        thread::sleep(options.interval);
    }
}

/// Parses `250ms`, `5s`, `2m`, `1h`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration {:?}", s))?;
    let secs = |factor: u64| {
        n.checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration {:?} is too large", s))
    };
    match unit.trim() {
        "" | "s" => Ok(Duration::from_secs(n)),
        "ms" => Ok(Duration::from_millis(n)),
        "m" => secs(60),
        "h" => secs(3600),
        other => Err(format!("unknown duration unit {:?} in {:?}", other, s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Account;
    use crate::filter::{Commands, Filter};
    use crate::rule::{Predicate, Rule};
    use crate::session::ConnectionConfig;
    use crate::testing::MemoryServer;

    fn options() -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(1),
            once: true,
            reconnect_backoff: Duration::from_millis(1),
        }
    }

    fn settings() -> ConnectionConfig {
        ConnectionConfig {
            server: "imap.example.com".into(),
            port: 143,
            username: "me".into(),
            password: "test".into(),
            ..ConnectionConfig::default()
        }
    }

    fn filters() -> FilterSet {
        let mut filters = FilterSet::new();
        filters.insert(
            "news".into(),
            Filter {
                priority: 0,
                commands: Commands {
                    move_to: Some("News".into()),
                    ..Commands::default()
                },
                rules: vec![Rule::new().with("or", vec![Predicate::new("from", "news@")])],
            },
        );
        filters
    }

    fn job(server: &MemoryServer) -> Job {
        Job {
            account: "work".into(),
            session: Session::with_connector(settings(), server.clone()),
            input: "INBOX".into(),
            fallback: "INBOX".into(),
            filters: filters(),
        }
    }

    const NEWS: &[u8] = b"From: news@example.com\r\nSubject: weekly\r\n\r\n";

    #[test]
    fn one_pass() {
        let server = MemoryServer::new();
        server.deliver("INBOX", NEWS, &[]);
        let mut jobs = vec![job(&server)];
        run(&mut jobs, &options()).unwrap();
        assert_eq!(server.uids("News"), vec![1]);
        assert!(!jobs[0].session.is_connected());
    }

    #[test]
    fn connect_failure_names_the_account() {
        let server = MemoryServer::new();
        server.refuse_connections(true);
        let mut jobs = vec![job(&server)];
        let err = run(&mut jobs, &options()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("work"), "{}", text);
        assert!(text.contains("imap.example.com"), "{}", text);
        assert!(text.contains("me"), "{}", text);
    }

    #[test]
    fn reconnects_once_after_disconnect() {
        let server = MemoryServer::new();
        server.deliver("INBOX", NEWS, &[]);
        let mut jobs = vec![job(&server)];
        jobs[0].connect().unwrap();
        server.drop_connection();

        poll(&mut jobs, &options()).unwrap();
        assert_eq!(server.connections(), 2);
        assert!(jobs[0].session.is_connected());

        poll(&mut jobs, &options()).unwrap();
        assert_eq!(server.uids("News"), vec![1]);
    }

    #[test]
    fn failed_reconnect_is_fatal() {
        let server = MemoryServer::new();
        let mut jobs = vec![job(&server)];
        jobs[0].connect().unwrap();
        server.drop_connection();
        server.refuse_connections(true);
        let err = poll(&mut jobs, &options()).unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
    }

    #[test]
    fn other_errors_stop_the_loop() {
        let server = MemoryServer::new();
        let mut job = job(&server);
        job.input = "Missing".into();
        let mut jobs = vec![job];
        let err = run(&mut jobs, &options()).unwrap_err();
        assert!(err.is_mailbox_missing());
        assert!(!jobs[0].session.is_connected());
    }

    #[test]
    fn jobs_from_config() {
        let mut config = Config::default();
        assert!(Job::from_config(&config).is_err());

        config.accounts.insert(
            "work".into(),
            Account {
                enable: true,
                connection: settings(),
                input: None,
                fallback: Some("Unsorted".into()),
            },
        );
        let err = Job::from_config(&config).err().unwrap();
        assert_eq!(err.to_string(), "invalid configuration: no filters configured");

        config.filters.insert("other".into(), filters());
        let err = Job::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("account work"));

        config.filters.insert("work".into(), filters());
        let jobs = Job::from_config(&config).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].input, "INBOX");
        assert_eq!(jobs[0].fallback, "Unsorted");
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("5"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("3d").is_err());
        assert_eq!(
            parse_duration("18446744073709551615h"),
            Err("duration \"18446744073709551615h\" is too large".to_string())
        );
        assert!(parse_duration("18446744073709551615m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }
}
