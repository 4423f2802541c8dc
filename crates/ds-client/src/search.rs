//! Search results.
//!
//! [`DirectoryEntry`] is one raw entry as handed over by a transport;
//! [`ResultSet`] is the read-only view callers index into.

use crate::error::{DirectoryError, DirectoryResult};

/// A directory entry with its attributes in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Distinguished Name. `None` when the server returned no usable DN.
    pub dn: Option<String>,

    /// Attributes, each with its values in server order.
    pub attributes: Vec<(String, Vec<String>)>,
}

impl DirectoryEntry {
    /// Creates an entry with the given DN and no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: Some(dn.into()),
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute, replacing an existing one of the same name.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_attribute(name, values.into_iter().map(Into::into).collect());
        self
    }

    /// Sets an attribute, replacing an existing one of the same name.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self
            .attributes
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = values,
            None => self.attributes.push((name, values)),
        }
    }

    /// Removes an attribute. Returns true if it was present.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.attributes.len()
    }

    /// Gets a single-valued attribute.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.get_attrs(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets a multi-valued attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// Checks if the entry has an attribute.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attrs(name).is_some()
    }

    /// Returns a copy restricted to the named attributes.
    ///
    /// An empty list or `*` keeps everything; `dn` and `1.1` select no
    /// attribute.
    #[must_use]
    pub fn project(&self, attributes: &[&str]) -> Self {
        if attributes.is_empty() || attributes.contains(&"*") {
            return self.clone();
        }
        let attributes = self
            .attributes
            .iter()
            .filter(|(n, _)| attributes.iter().any(|a| a.eq_ignore_ascii_case(n)))
            .cloned()
            .collect();
        Self {
            dn: self.dn.clone(),
            attributes,
        }
    }
}

/// Read-only snapshot of a search or read response.
///
/// All indices are 0-based. Out-of-range access yields
/// [`DirectoryError::NotFound`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<DirectoryEntry>,
}

impl ResultSet {
    /// Wraps raw entries.
    #[must_use]
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the response held no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// DN of the entry at `index`.
    ///
    /// `None` doubles as the "no usable result" sentinel: it is returned
    /// both for a missing entry and for an entry without a DN.
    #[must_use]
    pub fn dn(&self, index: usize) -> Option<&str> {
        self.entries
            .get(index)
            .and_then(|e| e.dn.as_deref())
            .filter(|dn| !dn.is_empty())
    }

    /// Number of values of `attribute` on the entry at `index`.
    pub fn value_count(&self, index: usize, attribute: &str) -> DirectoryResult<usize> {
        self.attribute(index, attribute).map(<[String]>::len)
    }

    /// One value of `attribute` on the entry at `index`.
    pub fn value(
        &self,
        index: usize,
        attribute: &str,
        value_index: usize,
    ) -> DirectoryResult<&str> {
        self.attribute(index, attribute)?
            .get(value_index)
            .map(String::as_str)
            .ok_or_else(|| {
                DirectoryError::not_found(format!(
                    "value {value_index} of attribute '{attribute}' on entry {index}"
                ))
            })
    }

    /// All values of `attribute` on the entry at `index`, in order.
    pub fn attribute(&self, index: usize, attribute: &str) -> DirectoryResult<&[String]> {
        self.entry(index)?.get_attrs(attribute).ok_or_else(|| {
            DirectoryError::not_found(format!("attribute '{attribute}' on entry {index}"))
        })
    }

    /// The entry at `index`.
    pub fn entry(&self, index: usize) -> DirectoryResult<&DirectoryEntry> {
        self.entries
            .get(index)
            .ok_or_else(|| DirectoryError::not_found(format!("entry {index}")))
    }

    /// Iterates over the entries.
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.iter()
    }

    /// Iterates over the DNs of entries that have one.
    pub fn dns(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter_map(|e| e.dn.as_deref())
            .filter(|dn| !dn.is_empty())
    }

    /// Consumes the result set.
    #[must_use]
    pub fn into_entries(self) -> Vec<DirectoryEntry> {
        self.entries
    }
}

impl From<Vec<DirectoryEntry>> for ResultSet {
    fn from(entries: Vec<DirectoryEntry>) -> Self {
        Self::new(entries)
    }
}
