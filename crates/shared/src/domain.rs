use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionError {
    #[error("option key must be a single uppercase letter, got {0:?}")]
    InvalidKey(String),
    #[error("duplicate option key {0}")]
    DuplicateKey(OptionKey),
    #[error("a question needs at least one option")]
    NoOptions,
}

/// Single letter a voter texts in to pick an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionKey(char);

impl OptionKey {
    pub fn new(key: char) -> Result<Self, QuestionError> {
        if key.is_ascii_uppercase() {
            Ok(Self(key))
        } else {
            Err(QuestionError::InvalidKey(key.to_string()))
        }
    }

    /// Matches normalized vote text against the key alphabet. The full
    /// text must be exactly one uppercase letter; partial matches never
    /// count.
    pub fn parse(text: &str) -> Option<Self> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(key), None) if key.is_ascii_uppercase() => Some(Self(key)),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OptionKey {
    type Err = QuestionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw).ok_or_else(|| QuestionError::InvalidKey(raw.to_string()))
    }
}

impl Serialize for OptionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OptionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One answer a voter can pick. Immutable once the question is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOption {
    pub key: OptionKey,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

/// The question being polled. Fixed for the process lifetime; its option
/// keys define the only texts that count as votes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    options: Vec<VoteOption>,
}

impl Question {
    /// Display order follows the order options are supplied in.
    pub fn new(text: impl Into<String>, options: Vec<VoteOption>) -> Result<Self, QuestionError> {
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }
        let mut seen = BTreeSet::new();
        for option in &options {
            if !seen.insert(option.key) {
                return Err(QuestionError::DuplicateKey(option.key));
            }
        }
        Ok(Self {
            text: text.into(),
            options,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[VoteOption] {
        &self.options
    }

    pub fn has_key(&self, key: OptionKey) -> bool {
        self.options.iter().any(|option| option.key == key)
    }
}

/// Vote counts per option key.
///
/// A value type: reducers hand back a new tally instead of mutating, so a
/// snapshot held by a renderer or already on the wire stays frozen. The
/// key set is always exactly the question's keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tally(BTreeMap<OptionKey, u64>);

impl Tally {
    pub fn zero_for(question: &Question) -> Self {
        Self(
            question
                .options()
                .iter()
                .map(|option| (option.key, 0))
                .collect(),
        )
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn count(&self, key: OptionKey) -> u64 {
        self.0.get(&key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Copy of this tally with `key` bumped by one. Keys not already
    /// tracked are left out, so the key set never grows past the
    /// question's.
    pub fn incremented(&self, key: OptionKey) -> Self {
        let mut counts = self.0.clone();
        if let Some(count) = counts.get_mut(&key) {
            *count += 1;
        }
        Self(counts)
    }

    /// Restates a recovered snapshot over `question`'s key set: counts
    /// for unknown keys are dropped, keys the snapshot lacks start at
    /// zero.
    pub fn reconciled_to(&self, question: &Question) -> Self {
        Self(
            question
                .options()
                .iter()
                .map(|option| (option.key, self.count(option.key)))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, u64)> + '_ {
        self.0.iter().map(|(key, count)| (*key, *count))
    }
}

/// Normalized form of one inbound SMS. Transient: produced per message,
/// folded into the tally, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsEvent {
    pub sender: String,
    pub received_at: DateTime<Utc>,
    pub raw_text: String,
    /// Trimmed, upper-cased text. Empty or non-key values mean the
    /// message was not a vote; consumers skip those without erroring.
    pub normalized: String,
}
