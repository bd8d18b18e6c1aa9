//! End-to-end tests against a real IMAP server (GreenMail with auto-created users, where the
//! password equals the user name). Enable with `--features test-full-imap`.

use std::time::{SystemTime, UNIX_EPOCH};

use mailsort::filter::{evaluate_filter_sets_on_msgs, run_commands, Commands, Filter, FilterSet};
use mailsort::protocol::StoreOp;
use mailsort::rule::{Predicate, Rule};
use mailsort::{ClientBuilder, ConnectionConfig, Error, Flag, Session, TlsMode};

fn test_host() -> String {
    std::env::var("TEST_HOST").unwrap_or("127.0.0.1".to_string())
}

fn test_imap_port() -> u16 {
    std::env::var("TEST_IMAP_PORT")
        .unwrap_or("3143".to_string())
        .parse()
        .unwrap_or(3143)
}

fn test_imaps_port() -> u16 {
    std::env::var("TEST_IMAPS_PORT")
        .unwrap_or("3993".to_string())
        .parse()
        .unwrap_or(3993)
}

/// A fresh user per test so tests don't see each other's mail.
fn user(name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{}-{}@localhost", name, nanos)
}

fn settings(user: &str) -> ConnectionConfig {
    ConnectionConfig {
        server: test_host(),
        port: test_imaps_port(),
        username: user.to_string(),
        password: user.to_string(),
        imaps: true,
        tls_verify: Some(false),
        ..ConnectionConfig::default()
    }
}

fn session(user: &str) -> Session {
    let mut session = Session::new(settings(user));
    session.connect().unwrap();
    session
}

fn mail(from: &str, subject: &str) -> Vec<u8> {
    format!(
        "From: {}\r\nTo: me@localhost\r\nSubject: {}\r\nMessage-ID: <{}@localhost>\r\n\r\nbody\r\n",
        from,
        subject,
        subject.replace(' ', "-")
    )
    .into_bytes()
}

#[test]
fn connect_imaps() {
    let user = user("imaps");
    let mut session = session(&user);
    assert!(session.is_connected());
    session.disconnect().unwrap();
    session.disconnect().unwrap();
}

#[test]
fn connect_plaintext() {
    let user = user("plain");
    let mut s = settings(&user);
    s.imaps = false;
    s.starttls = Some(false);
    s.port = test_imap_port();
    let mut session = Session::new(s);
    session.connect().unwrap();
    session.disconnect().unwrap();
}

#[test]
fn connect_bad_password() {
    let user = user("badpass");
    let mut s = settings(&user);
    s.password = "wrong".into();
    let mut session = Session::new(s);
    assert!(matches!(session.connect(), Err(Error::Auth(_))));
}

#[test]
fn connect_unreachable_port() {
    let user = user("unreachable");
    let mut s = settings(&user);
    s.port = 1;
    let err = Session::new(s).connect().unwrap_err();
    assert_eq!(err.kind(), mailsort::ErrorKind::Network);
}

#[test]
fn connect_with_missing_ca_file() {
    let user = user("cafile");
    let mut s = settings(&user);
    s.tls_verify = None;
    s.ca_file = Some("/nonexistent/ca.pem".into());
    let err = Session::new(s).connect().unwrap_err();
    assert_eq!(err.kind(), mailsort::ErrorKind::Tls);
}

#[test]
fn builder_plaintext_greeting() {
    let user = user("builder");
    let mut client = ClientBuilder::new(test_host(), test_imap_port())
        .mode(TlsMode::Plaintext)
        .connect()
        .unwrap();
    client.login(&user, &user).unwrap();
    client.logout().unwrap();
}

#[test]
fn mailbox_lifecycle() {
    let user = user("mailboxes");
    let mut session = session(&user);
    session.create_mailbox("Ünïcödé/Sub").unwrap();
    assert!(session.list().unwrap().contains_key("Ünïcödé/Sub"));
    session.select_mailbox("Ünïcödé/Sub", true, false).unwrap();
    session.delete_mailbox("Ünïcödé/Sub").unwrap();
    assert!(!session.list().unwrap().contains_key("Ünïcödé/Sub"));

    let err = session.select_mailbox("Nope", false, false).unwrap_err();
    assert!(err.is_mailbox_missing(), "{:?}", err);
    session.select_mailbox("Nope", false, true).unwrap();
    assert!(session.list().unwrap().contains_key("Nope"));
}

#[test]
fn upload_search_fetch() {
    let user = user("fetch");
    let mut session = session(&user);
    session
        .upload("INBOX", &mail("Foo Bar <foo@example.com>", "hello world"), &[])
        .unwrap();
    session
        .upload("INBOX", &mail("seen@example.com", "old"), &[Flag::Seen])
        .unwrap();

    let messages = session
        .search_and_fetch("INBOX", &[], &[Flag::Seen, Flag::Flagged])
        .unwrap();
    assert_eq!(messages.len(), 1);
    let headers = &messages[0].headers;
    assert_eq!(
        headers.get("from").unwrap().values(),
        ["foo bar <foo@example.com>".to_string()]
    );
    assert_eq!(
        headers.get("subject").unwrap().values(),
        ["hello world".to_string()]
    );

    // fetching headers must not mark the message seen
    let flags = session.get_flags("INBOX", messages[0].uid).unwrap();
    assert!(!flags.contains(&Flag::Seen));
}

#[test]
fn flags_and_delete() {
    let user = user("flags");
    let mut session = session(&user);
    session.upload("INBOX", &mail("a@example.com", "a"), &[]).unwrap();
    let uid = session.search("INBOX", &[], &[]).unwrap()[0];

    session
        .set_flags("INBOX", &[uid], StoreOp::Add, &["$MailFlagBit0".into(), Flag::Flagged], false)
        .unwrap();
    let flags = session.get_flags("INBOX", uid).unwrap();
    assert!(flags.contains(&Flag::Flagged));
    session
        .set_flags("INBOX", &[uid], StoreOp::Replace, &[Flag::Seen], false)
        .unwrap();
    assert_eq!(session.get_flags("INBOX", uid).unwrap(), vec![Flag::Seen]);

    session.delete_msgs("INBOX", &[uid], true).unwrap();
    assert!(session.search("INBOX", &[], &[]).unwrap().is_empty());
}

#[test]
fn move_then_flag() {
    let user = user("move");
    let mut session = session(&user);
    session.upload("INBOX", &mail("a@example.com", "a"), &[]).unwrap();
    let uid = session.search("INBOX", &[], &[]).unwrap()[0];

    let commands = Commands {
        move_to: Some("Archive/2024".into()),
        add_flags: Some(vec!["\\Flagged".into(), "done".into()]),
        ..Commands::default()
    };
    run_commands(&mut session, "INBOX", uid, &commands).unwrap();

    assert!(session.search("INBOX", &[], &[]).unwrap().is_empty());
    let moved = session.search("Archive/2024", &[Flag::Flagged], &[]).unwrap();
    assert_eq!(moved.len(), 1);
}

#[test]
fn sort_inbox() {
    let user = user("sort");
    let mut session = session(&user);
    for (from, subject) in [
        ("news@example.com", "issue 1"),
        ("news@example.com", "issue 2"),
        ("friend@example.org", "dinner"),
        ("news@example.com", "issue 3"),
    ] {
        session.upload("INBOX", &mail(from, subject), &[]).unwrap();
    }

    let mut filters = FilterSet::new();
    filters.insert(
        "news".into(),
        Filter {
            commands: Commands {
                move_to: Some("Target".into()),
                ..Commands::default()
            },
            rules: vec![Rule::new().with("or", vec![Predicate::new("from", "news@")])],
            ..Filter::default()
        },
    );

    let outcome =
        evaluate_filter_sets_on_msgs(&mut session, "INBOX", &[Flag::Seen, Flag::Flagged], "INBOX", &filters)
            .unwrap();
    assert_eq!(outcome.matched, 3);
    assert_eq!(outcome.fallback, 1);
    assert_eq!(session.search("Target", &[], &[]).unwrap().len(), 3);
    assert_eq!(session.search("INBOX", &[Flag::Flagged], &[]).unwrap().len(), 1);
    session.disconnect().unwrap();
}
