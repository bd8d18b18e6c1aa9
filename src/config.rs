//! Accounts and filters read from TOML.
//!
//! A configuration path is either one TOML file or a directory. Directories are walked
//! recursively in name order; every `*.toml` file is merged into the result, later files
//! replacing accounts and individual filters of the same name. A file named
//! `.mailsort.<account>.pwd` holds the password of `<account>` and is deleted once read.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::filter::FilterSet;
use crate::session::ConnectionConfig;

/// Used for `input` and `fallback` when they are not set.
pub const DEFAULT_MAILBOX: &str = "INBOX";

const PASSWORD_FILE_PREFIX: &str = ".mailsort.";
const PASSWORD_FILE_SUFFIX: &str = ".pwd";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Account {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Mailbox scanned for unsorted messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Where unmatched messages go; flagged in place when equal to `input` or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl Account {
    pub fn input(&self) -> &str {
        match self.input.as_deref() {
            Some(input) if !input.is_empty() => input,
            _ => DEFAULT_MAILBOX,
        }
    }

    pub fn fallback(&self) -> &str {
        self.fallback.as_deref().unwrap_or(DEFAULT_MAILBOX)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    /// Filter sets keyed by account name.
    #[serde(default)]
    pub filters: BTreeMap<String, FilterSet>,
}

impl Config {
    /// Reads, merges and validates the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");

        let mut files = Vec::new();
        let mut passwords = BTreeMap::new();
        if path.is_dir() {
            walk(path, &mut files, &mut passwords)?;
        } else {
            files.push(path.to_path_buf());
        }

        let mut config = Config::default();
        for file in &files {
            debug!(file = %file.display(), "parsing configuration file");
            config.merge(Config::from_file(file)?);
        }
        config.validate(&passwords)
    }

    /// Parses one file without validating it.
    pub fn from_file(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merges `other` into `self`. Accounts are replaced whole; filters one by one.
    pub fn merge(&mut self, other: Config) {
        self.accounts.extend(other.accounts);
        for (account, filters) in other.filters {
            self.filters.entry(account).or_default().extend(filters);
        }
    }

    /// Keeps the enabled accounts, injects passwords read from files and fills in defaults.
    pub fn validate(self, passwords: &BTreeMap<String, String>) -> Result<Config> {
        if self.accounts.is_empty() {
            warn!("no accounts configured");
        }

        let mut accounts = BTreeMap::new();
        for (name, mut account) in self.accounts {
            if !account.enable {
                debug!(account = %name, "skipping disabled account");
                continue;
            }
            if account.connection.server.trim().is_empty() {
                return Err(Error::Config(format!(
                    "server not configured for account {}",
                    name
                )));
            }
            if let Some(password) = passwords.get(&name) {
                debug!(account = %name, "using password from password file");
                account.connection.password = password.clone();
            }
            account.input = Some(account.input().to_string());
            account.fallback = Some(account.fallback().to_string());
            accounts.insert(name, account);
        }

        if self.filters.is_empty() {
            warn!("no filters configured");
        }

        Ok(Config {
            accounts,
            filters: self.filters,
        })
    }
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>, passwords: &mut BTreeMap<String, String>) -> Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, files, passwords)?;
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if let Some(account) = password_file_account(name) {
            let password = read_password_file(&path)?;
            passwords.insert(account.to_string(), password);
        } else if path.extension().map_or(false, |ext| ext == "toml") {
            files.push(path);
        }
    }
    Ok(())
}

fn password_file_account(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(PASSWORD_FILE_PREFIX)?
        .strip_suffix(PASSWORD_FILE_SUFFIX)
        .filter(|account| !account.is_empty())
}

fn read_password_file(path: &Path) -> Result<String> {
    let password = fs::read_to_string(path)?.trim().to_string();
    if password.is_empty() {
        return Err(Error::Config(format!(
            "password file {} is empty",
            path.display()
        )));
    }
    info!(path = %path.display(), "read password file, deleting it");
    fs::remove_file(path)?;
    Ok(password)
}
