//! The rule language: `and`/`or` operators over header predicates.
//!
//! A rule set matches when any of its rules does. Within a rule, operator entries are visited in
//! name order:
//!
//! - `or` skips predicates whose header is absent and matches on the first predicate that does;
//!   otherwise evaluation falls through to the next operator entry.
//! - `and` fails the whole rule as soon as a header is absent or a predicate does not match, and
//!   matches only if at least one predicate was evaluated.
//!
//! Patterns compare case-insensitively: an empty pattern matches only an empty value, then
//! equality, then substring, and finally the pattern is tried as a regular expression.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::RegexBuilder;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, PatternError, Result};
use crate::message::{HeaderMap, HeaderValue};

/// The pattern side of a predicate. Integers are kept in their decimal form and nested lists are
/// flattened when the configuration is read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Scalar(String),
    List(Vec<String>),
}

impl Pattern {
    pub fn values(&self) -> &[String] {
        match self {
            Pattern::Scalar(value) => std::slice::from_ref(value),
            Pattern::List(values) => values,
        }
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Pattern::Scalar(value.to_string())
    }
}

impl From<Vec<&str>> for Pattern {
    fn from(values: Vec<&str>) -> Self {
        Pattern::List(values.into_iter().map(str::to_string).collect())
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Pattern::Scalar(value) => serializer.serialize_str(value),
            Pattern::List(values) => serializer.collect_seq(values),
        }
    }
}

struct PatternVisitor;

impl PatternVisitor {
    fn unsupported<E: de::Error>(what: &str) -> E {
        E::custom(Error::UnsupportedPatternType(what.to_string()))
    }
}

impl<'de> Visitor<'de> for PatternVisitor {
    type Value = Pattern;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, an integer or a list of those")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Pattern, E> {
        Ok(Pattern::Scalar(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Pattern, E> {
        Ok(Pattern::Scalar(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Pattern, E> {
        Ok(Pattern::Scalar(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Pattern, E> {
        Ok(Pattern::Scalar(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<Pattern, E> {
        Err(Self::unsupported("bool"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<Pattern, E> {
        Err(Self::unsupported("float"))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, _: A) -> std::result::Result<Pattern, A::Error> {
        Err(Self::unsupported("table"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Pattern, A::Error> {
        let mut values = Vec::new();
        while let Some(item) = seq.next_element::<Pattern>()? {
            match item {
                Pattern::Scalar(value) => values.push(value),
                Pattern::List(nested) => values.extend(nested),
            }
        }
        Ok(Pattern::List(values))
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(PatternVisitor)
    }
}

/// One header test, written as a single-entry table: `{ from = "news@example.com" }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Pattern>",
    into = "BTreeMap<String, Pattern>"
)]
pub struct Predicate {
    pub header: String,
    pub pattern: Pattern,
}

impl Predicate {
    pub fn new(header: &str, pattern: impl Into<Pattern>) -> Self {
        Predicate {
            header: header.to_string(),
            pattern: pattern.into(),
        }
    }
}

impl TryFrom<BTreeMap<String, Pattern>> for Predicate {
    type Error = String;

    fn try_from(map: BTreeMap<String, Pattern>) -> std::result::Result<Self, String> {
        if map.len() != 1 {
            return Err(format!(
                "a predicate names exactly one header, found {}",
                map.len()
            ));
        }
        let (header, pattern) = map
            .into_iter()
            .next()
            .ok_or_else(|| "empty predicate".to_string())?;
        Ok(Predicate { header, pattern })
    }
}

impl From<Predicate> for BTreeMap<String, Pattern> {
    fn from(predicate: Predicate) -> Self {
        let mut map = BTreeMap::new();
        map.insert(predicate.header, predicate.pattern);
        map
    }
}

/// Operator name to predicates, e.g. `{ or = [ { from = "a" }, { to = "b" } ] }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rule(pub BTreeMap<String, Vec<Predicate>>);

impl Rule {
    pub fn new() -> Self {
        Rule::default()
    }

    pub fn with(mut self, op: &str, predicates: Vec<Predicate>) -> Self {
        self.0.insert(op.to_string(), predicates);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Operator> {
        match s.to_lowercase().as_str() {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            other => Err(Error::UnsupportedOperator(other.to_string())),
        }
    }
}

/// Whether any rule in `rules` matches `headers`. The first error aborts the evaluation.
pub fn parse_rule_set(rules: &[Rule], headers: &HeaderMap) -> Result<bool> {
    for rule in rules {
        if rule_matches(rule, headers)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn rule_matches(rule: &Rule, headers: &HeaderMap) -> Result<bool> {
    for (op, predicates) in &rule.0 {
        match op.parse::<Operator>()? {
            Operator::Or => {
                for predicate in predicates {
                    let value = match headers.get(&predicate.header) {
                        Some(value) => value,
                        None => continue,
                    };
                    if predicate_matches(&predicate.pattern, value)? {
                        return Ok(true);
                    }
                }
            }
            Operator::And => {
                let mut matched = false;
                for predicate in predicates {
                    let value = match headers.get(&predicate.header) {
                        Some(value) => value,
                        None => return Ok(false),
                    };
                    if !predicate_matches(&predicate.pattern, value)? {
                        return Ok(false);
                    }
                    matched = true;
                }
                return Ok(matched);
            }
        }
    }
    Ok(false)
}

fn predicate_matches(pattern: &Pattern, value: &HeaderValue) -> Result<bool> {
    for p in pattern.values() {
        for v in value.values() {
            if check_match(p, v)? {
                trace!(pattern = %p, value = %v, "predicate matched");
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Case-insensitive comparison of one pattern against one header value.
pub fn check_match(pattern: &str, value: &str) -> Result<bool> {
    let value = value.to_lowercase();
    if pattern.is_empty() {
        return Ok(value.is_empty());
    }

    let lowered = pattern.to_lowercase();
    if lowered == value || value.contains(&lowered) {
        return Ok(true);
    }

    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| PatternError::new(pattern, e))?;
    Ok(re.is_match(&value))
}
