//! Attribute diffing.
//!
//! [`diff`] compares the attributes an entry currently has with the
//! attributes a caller wants it to have and produces the smallest
//! [`AttributeOperationSet`] that gets there. [`CommitReport`] records how
//! applying such a set went, category by category.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::DirectoryEntry;
use crate::transport::AttributeValues;

// ============================================================================
// Attribute Values
// ============================================================================

/// A single value or an ordered list of values.
///
/// An empty string stands for "no value". In a list, the order given by
/// the caller is the order the directory should end up with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A single-valued attribute.
    Single(String),
    /// A multi-valued attribute.
    Multi(Vec<String>),
}

impl AttributeValue {
    /// The "no value" marker.
    #[must_use]
    pub fn empty() -> Self {
        Self::Single(String::new())
    }

    /// Non-empty values in order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) if v.is_empty() => Vec::new(),
            Self::Single(v) => vec![v.as_str()],
            Self::Multi(vs) => vs
                .iter()
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .collect(),
        }
    }

    /// First non-empty value.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.values().into_iter().next()
    }

    /// Returns true if there is no non-empty value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first().is_none()
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

impl From<Vec<&str>> for AttributeValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Attribute name to value(s).
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Builds an [`AttributeMap`] from a directory entry. Attributes with one
/// value become [`AttributeValue::Single`].
#[must_use]
pub fn attribute_map_from_entry(entry: &DirectoryEntry) -> AttributeMap {
    entry
        .attributes
        .iter()
        .map(|(name, values)| {
            let value = match values.as_slice() {
                [single] => AttributeValue::Single(single.clone()),
                _ => AttributeValue::Multi(values.clone()),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Case-insensitive lookup; LDAP attribute names ignore case.
fn lookup<'a>(map: &'a AttributeMap, name: &str) -> Option<(&'a String, &'a AttributeValue)> {
    map.get_key_value(name)
        .or_else(|| map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
}

// ============================================================================
// Operation Set
// ============================================================================

/// Writes needed to turn the current attributes into the desired ones.
///
/// A single-valued attribute lands in exactly one category. A rewritten
/// multi-valued attribute lands in `to_delete` and `to_add`, which must be
/// applied in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOperationSet {
    /// Attributes to remove entirely.
    pub to_delete: BTreeSet<String>,
    /// Values to add, per attribute.
    pub to_add: BTreeMap<String, Vec<String>>,
    /// New value, per single-valued attribute.
    pub to_replace: BTreeMap<String, String>,
}

impl AttributeOperationSet {
    /// Returns true if nothing needs to be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty() && self.to_replace.is_empty()
    }

    /// Total number of scheduled attribute writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_delete.len() + self.to_add.len() + self.to_replace.len()
    }

    /// The replace category in the shape write operations take.
    #[must_use]
    pub fn replace_values(&self) -> AttributeValues {
        self.to_replace
            .iter()
            .map(|(name, value)| (name.clone(), vec![value.clone()]))
            .collect()
    }

    /// Applies the set to an in-memory map: delete, then add, then replace.
    pub fn apply_to(&self, current: &mut AttributeMap) {
        for name in &self.to_delete {
            if let Some((key, _)) = lookup(current, name) {
                let key = key.clone();
                current.remove(&key);
            }
        }

        for (name, values) in &self.to_add {
            let key = lookup(current, name).map_or_else(|| name.clone(), |(k, _)| k.clone());
            let mut merged: Vec<String> = current
                .get(&key)
                .map(|v| v.values().into_iter().map(str::to_string).collect())
                .unwrap_or_default();
            merged.extend(values.iter().cloned());
            let value = match merged.as_slice() {
                [single] => AttributeValue::Single(single.clone()),
                _ => AttributeValue::Multi(merged),
            };
            current.insert(key, value);
        }

        for (name, value) in &self.to_replace {
            let key = lookup(current, name).map_or_else(|| name.clone(), |(k, _)| k.clone());
            current.insert(key, AttributeValue::Single(value.clone()));
        }
    }
}

/// Computes the writes that turn `current` into `desired`.
///
/// Only keys of `desired` are considered; attributes missing from it are
/// left alone. An empty result means there is nothing to do.
#[must_use]
pub fn diff(current: &AttributeMap, desired: &AttributeMap) -> AttributeOperationSet {
    let mut ops = AttributeOperationSet::default();

    for (name, wanted) in desired {
        let existing = lookup(current, name).map(|(_, v)| v);

        match wanted {
            AttributeValue::Single(value) => {
                let value = Some(value.as_str()).filter(|v| !v.is_empty());
                match (existing, value) {
                    (None, Some(v)) => {
                        ops.to_add.insert(name.clone(), vec![v.to_string()]);
                    }
                    (None, None) => {}
                    (Some(stored), value) if stored.first() == value => {}
                    (Some(_), None) => {
                        ops.to_delete.insert(name.clone());
                    }
                    (Some(_), Some(v)) => {
                        ops.to_replace.insert(name.clone(), v.to_string());
                    }
                }
            }
            AttributeValue::Multi(_) => {
                // A value may appear only once; the first occurrence keeps its place.
                let mut seen = BTreeSet::new();
                let mut values = wanted.values();
                values.retain(|v| seen.insert(*v));
                let stored = existing.map(AttributeValue::values).unwrap_or_default();
                if stored == values {
                    continue;
                }
                // Ordered multi-valued attributes are rewritten whole.
                if !stored.is_empty() {
                    ops.to_delete.insert(name.clone());
                }
                if !values.is_empty() {
                    ops.to_add.insert(
                        name.clone(),
                        values.into_iter().map(str::to_string).collect(),
                    );
                }
            }
        }
    }

    ops
}

// ============================================================================
// Commit Report
// ============================================================================

/// A category of attribute write, in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeCategory {
    /// Attribute removal.
    Delete,
    /// Value addition.
    Add,
    /// Value replacement.
    Replace,
}

impl ChangeCategory {
    /// All categories in the order they are applied.
    pub const COMMIT_ORDER: [Self; 3] = [Self::Delete, Self::Add, Self::Replace];

    /// Lowercase name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Add => "add",
            Self::Replace => "replace",
        }
    }
}

/// How one category fared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryOutcome {
    /// Nothing to write in this category.
    #[default]
    Skipped,
    /// The write succeeded.
    Applied {
        /// Attributes written.
        attributes: usize,
    },
    /// The write failed.
    Failed {
        /// Attributes that were to be written.
        attributes: usize,
        /// Transport error message.
        error: String,
    },
}

impl CategoryOutcome {
    /// Returns true for [`CategoryOutcome::Failed`].
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of committing an [`AttributeOperationSet`] to one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReport {
    /// Entry that was modified.
    pub dn: String,

    /// Outcome of the delete category.
    pub delete: CategoryOutcome,

    /// Outcome of the add category.
    pub add: CategoryOutcome,

    /// Outcome of the replace category.
    pub replace: CategoryOutcome,

    /// When the commit started.
    pub started_at: DateTime<Utc>,

    /// When the commit completed.
    pub completed_at: DateTime<Utc>,

    /// Status message.
    pub status: String,
}

impl CommitReport {
    /// Creates a report with every category skipped.
    #[must_use]
    pub fn new(dn: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            dn: dn.into(),
            delete: CategoryOutcome::Skipped,
            add: CategoryOutcome::Skipped,
            replace: CategoryOutcome::Skipped,
            started_at,
            completed_at: started_at,
            status: String::new(),
        }
    }

    /// Records the outcome of one category.
    pub fn record(&mut self, category: ChangeCategory, outcome: CategoryOutcome) {
        match category {
            ChangeCategory::Delete => self.delete = outcome,
            ChangeCategory::Add => self.add = outcome,
            ChangeCategory::Replace => self.replace = outcome,
        }
    }

    /// Outcome of one category.
    #[must_use]
    pub fn outcome(&self, category: ChangeCategory) -> &CategoryOutcome {
        match category {
            ChangeCategory::Delete => &self.delete,
            ChangeCategory::Add => &self.add,
            ChangeCategory::Replace => &self.replace,
        }
    }

    /// Marks the report as complete.
    #[must_use]
    pub fn complete(mut self) -> Self {
        self.completed_at = Utc::now();
        let describe = |outcome: &CategoryOutcome| match outcome {
            CategoryOutcome::Skipped => "skipped".to_string(),
            CategoryOutcome::Applied { attributes } => format!("{attributes} applied"),
            CategoryOutcome::Failed { attributes, .. } => format!("{attributes} failed"),
        };
        self.status = format!(
            "Update of {}: delete {}, add {}, replace {}",
            self.dn,
            describe(&self.delete),
            describe(&self.add),
            describe(&self.replace)
        );
        self
    }

    /// Returns true if nothing had to be written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        ChangeCategory::COMMIT_ORDER
            .iter()
            .all(|c| *self.outcome(*c) == CategoryOutcome::Skipped)
    }

    /// Returns true if any category failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed_categories().is_empty()
    }

    /// Categories whose write failed, in commit order.
    #[must_use]
    pub fn failed_categories(&self) -> Vec<ChangeCategory> {
        ChangeCategory::COMMIT_ORDER
            .into_iter()
            .filter(|c| self.outcome(*c).is_failed())
            .collect()
    }
}
