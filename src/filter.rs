//! Filters, and the pass that applies them to the unsorted messages of a mailbox.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::protocol::StoreOp;
use crate::rule::{parse_rule_set, Rule};
use crate::session::Session;
use crate::types::{Flag, Uid};

/// What to do with a matching message. Every step is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commands {
    #[serde(rename = "move", default, skip_serializing_if = "Option::is_none")]
    pub move_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_all_flags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    /// Lower runs first; filters of equal priority run in name order.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub commands: Commands,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// The named filters of one account.
pub type FilterSet = BTreeMap<String, Filter>;

/// `filters` in evaluation order: ascending priority, then name.
pub fn ordered(filters: &FilterSet) -> Vec<(&str, &Filter)> {
    let mut ordered: Vec<(&str, &Filter)> = filters
        .iter()
        .map(|(name, filter)| (name.as_str(), filter))
        .collect();
    ordered.sort_by_key(|(_, filter)| filter.priority);
    ordered
}

/// Counts from one evaluation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub matched: usize,
    pub fallback: usize,
}

/// Sorts the messages of `input` that carry none of `exclude_flags`.
///
/// The first filter whose rules match a message has its commands applied. Messages no filter
/// matched are flagged in place when `fallback` is empty or equal to `input`, and moved to
/// `fallback` otherwise. Any error aborts the pass.
pub fn evaluate_filter_sets_on_msgs(
    session: &mut Session,
    input: &str,
    exclude_flags: &[Flag],
    fallback: &str,
    filters: &FilterSet,
) -> Result<Outcome> {
    let messages = session.search_and_fetch(input, &[], exclude_flags)?;
    let filters = ordered(filters);
    let mut outcome = Outcome::default();
    let mut remaining = Vec::new();

    for msg in &messages {
        let message_id = msg.envelope.message_id.as_deref().unwrap_or("");
        info!(uid = msg.uid, message_id, "found new message in input mailbox to sort");

        let mut matched = false;
        for (name, filter) in &filters {
            debug!(uid = msg.uid, filter = name, "evaluating filter");
            if !parse_rule_set(&filter.rules, &msg.headers)? {
                continue;
            }
            info!(uid = msg.uid, message_id, filter = name, commands = ?filter.commands, "filter matched");
            run_commands(session, input, msg.uid, &filter.commands).map_err(|e| {
                error!(uid = msg.uid, message_id, filter = name, error = %e, "failed to run commands on matched message");
                e
            })?;
            matched = true;
            outcome.matched += 1;
            break;
        }

        if !matched {
            debug!(uid = msg.uid, headers = ?msg.headers, "no filter matched, scheduling fallback");
            remaining.push(msg.uid);
        }
    }

    for uid in remaining {
        if fallback.is_empty() || fallback == input {
            info!(uid, mailbox = input, "no filter matched, flagging message");
            session.set_flags(input, &[uid], StoreOp::Add, &[Flag::Flagged], false)?;
        } else {
            info!(uid, mailbox = fallback, "no filter matched, moving message to fallback mailbox");
            session.move_msgs(&[uid], input, fallback)?;
        }
        outcome.fallback += 1;
    }

    Ok(outcome)
}

fn flags(tokens: &[String]) -> Vec<Flag> {
    Flag::from_strs(tokens).collect()
}

/// Applies `commands` to one message: move, then add, remove and replace flags. Flag changes
/// after a move address the message in its new mailbox.
pub fn run_commands(session: &mut Session, from: &str, uid: Uid, commands: &Commands) -> Result<()> {
    let (mailbox, uid) = match commands.move_to {
        Some(ref to) => {
            let moved = session.move_msgs(&[uid], from, to)?;
            (to.as_str(), moved.unwrap_or(uid))
        }
        None => (from, uid),
    };

    if let Some(ref add) = commands.add_flags {
        session.set_flags(mailbox, &[uid], StoreOp::Add, &flags(add), false)?;
    }
    if let Some(ref remove) = commands.remove_flags {
        session.set_flags(mailbox, &[uid], StoreOp::Remove, &flags(remove), false)?;
    }
    if let Some(ref replace) = commands.replace_all_flags {
        session.set_flags(mailbox, &[uid], StoreOp::Replace, &flags(replace), false)?;
    }
    Ok(())
}
