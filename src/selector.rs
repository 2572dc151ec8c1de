//! Tag/ID selectors and the pure resolver that applies them
//!
//! A selector is an unordered `key -> value` map whose entries are AND-ed:
//!
//! - `"*": "*"` matches every resource
//! - `key: "*"` matches resources carrying tag `key` with any value
//! - `key: "a,b"` matches resources tagged `key=a` or `key=b`
//! - `aws-ids: "id-1,id-2"` bypasses tag matching and selects resources by ID
//!
//! An empty selector matches nothing.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::cloud::Filter;
use crate::record::ResolvedRecord;

/// Selector key whose value is a comma-separated list of resource IDs
pub const ID_SENTINEL_KEY: &str = "aws-ids";

/// Wildcard used for "any key" and "any value"
pub const WILDCARD: &str = "*";

/// Inventory filter name for "tag key exists"
pub const TAG_KEY_FILTER: &str = "tag-key";

/// Malformed selector. Retrying cannot fix these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector is empty and would match nothing")]
    Empty,

    #[error("selector contains an empty key")]
    EmptyKey,

    #[error("selector key {key:?} has an empty value")]
    EmptyValue { key: String },

    #[error("wildcard key \"*\" only accepts the value \"*\", got {value:?}")]
    InvalidWildcard { value: String },

    #[error("\"aws-ids\" does not list any resource IDs")]
    EmptyIdList,

    #[error("\"aws-ids\" cannot be combined with other selector entries")]
    ConflictingSentinel,
}

/// A single AND-ed matching clause
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Clause {
    /// `"*": "*"`
    MatchAll,
    /// `key: "*"`
    TagExists(String),
    /// `key: "v1,v2"`
    TagValues { key: String, values: Vec<String> },
}

impl Clause {
    fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        match self {
            Clause::MatchAll => true,
            Clause::TagExists(key) => tags.contains_key(key),
            Clause::TagValues { key, values } => tags
                .get(key)
                .map(|v| values.iter().any(|want| want == v))
                .unwrap_or(false),
        }
    }

    /// Translate into the inventory API's filter syntax. `MatchAll` needs no filter.
    fn to_filter(&self) -> Option<Filter> {
        match self {
            Clause::MatchAll => None,
            Clause::TagExists(key) => Some(Filter::new(TAG_KEY_FILTER, vec![key.clone()])),
            Clause::TagValues { key, values } => {
                Some(Filter::new(format!("tag:{}", key), values.clone()))
            }
        }
    }
}

/// How a selector is answered
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectorQuery {
    /// Empty selector
    Nothing,
    /// Direct lookup by ID; all other entries are ignored
    Ids(Vec<String>),
    /// Tag matching, every clause must hold
    Tags(Vec<Clause>),
}

/// Typed selector with a canonical form
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Selector {
    entries: BTreeMap<String, String>,
}

impl Selector {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    /// Requested IDs when the ID sentinel is present
    pub fn ids(&self) -> Option<Vec<String>> {
        self.entries
            .get(ID_SENTINEL_KEY)
            .map(|v| split_comma_separated(v))
    }

    /// Reject selectors that can never resolve to anything meaningful
    pub fn validate(&self) -> Result<(), SelectorError> {
        if self.entries.is_empty() {
            return Err(SelectorError::Empty);
        }
        if let Some(ids) = self.ids() {
            if self.entries.len() > 1 {
                return Err(SelectorError::ConflictingSentinel);
            }
            if ids.is_empty() {
                return Err(SelectorError::EmptyIdList);
            }
            return Ok(());
        }
        for (key, value) in &self.entries {
            if key.trim().is_empty() {
                return Err(SelectorError::EmptyKey);
            }
            if split_comma_separated(value).is_empty() {
                return Err(SelectorError::EmptyValue { key: key.clone() });
            }
            if key == WILDCARD && value != WILDCARD {
                return Err(SelectorError::InvalidWildcard {
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Canonical serialization: entries in key order, JSON encoded
    pub fn canonical(&self) -> String {
        let mut out = String::from("{");
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            // Encoding a &str as JSON cannot fail
            out.push_str(&serde_json::Value::from(key.as_str()).to_string());
            out.push(':');
            out.push_str(&serde_json::Value::from(value.as_str()).to_string());
        }
        out.push('}');
        out
    }

    /// Stable cache key for this selector
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.canonical().as_bytes()))
    }

    pub fn query(&self) -> SelectorQuery {
        if self.entries.is_empty() {
            return SelectorQuery::Nothing;
        }
        if let Some(ids) = self.ids() {
            return SelectorQuery::Ids(ids);
        }
        let clauses = self
            .entries
            .iter()
            .map(|(key, value)| {
                let values = split_comma_separated(value);
                if key == WILDCARD && value == WILDCARD {
                    Clause::MatchAll
                } else if values.iter().any(|v| v == WILDCARD) {
                    Clause::TagExists(key.clone())
                } else {
                    Clause::TagValues {
                        key: key.clone(),
                        values,
                    }
                }
            })
            .collect();
        SelectorQuery::Tags(clauses)
    }

    /// Inventory filters for the tag path, one per clause
    pub fn filters(&self) -> Vec<Filter> {
        match self.query() {
            SelectorQuery::Tags(clauses) => clauses.iter().filter_map(Clause::to_filter).collect(),
            SelectorQuery::Nothing | SelectorQuery::Ids(_) => Vec::new(),
        }
    }
}

impl From<&BTreeMap<String, String>> for Selector {
    fn from(map: &BTreeMap<String, String>) -> Self {
        Self {
            entries: map.clone(),
        }
    }
}

impl From<BTreeMap<String, String>> for Selector {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Split `"a, b,,c"` into `["a", "b", "c"]`
pub fn split_comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Filter `candidates` down to the records `selector` picks.
///
/// The result is deduplicated by ID (last occurrence wins) and sorted by ID.
/// Requested IDs that are not among the candidates are skipped.
pub fn resolve<I>(selector: &Selector, candidates: I) -> Vec<ResolvedRecord>
where
    I: IntoIterator<Item = ResolvedRecord>,
{
    let query = selector.query();
    if query == SelectorQuery::Nothing {
        return Vec::new();
    }

    let mut unique: BTreeMap<String, ResolvedRecord> = BTreeMap::new();
    for record in candidates {
        unique.insert(record.id.clone(), record);
    }

    match query {
        SelectorQuery::Nothing => Vec::new(),
        SelectorQuery::Ids(ids) => {
            let wanted: BTreeSet<String> = ids.into_iter().collect();
            unique
                .into_values()
                .filter(|r| wanted.contains(&r.id))
                .collect()
        }
        SelectorQuery::Tags(clauses) => unique
            .into_values()
            .filter(|r| clauses.iter().all(|c| c.matches(&r.tags)))
            .collect(),
    }
}
