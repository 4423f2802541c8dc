//! In-memory directory.
//!
//! [`MemoryDirectory`] implements [`DirectoryTransport`] over a list of
//! entries held in memory. It evaluates RFC 4515 filters, keeps a log of
//! every operation it served, and can be told to fail individual
//! operations. Useful for tests and for running the client offline.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{DirectoryError, DirectoryResult};
use crate::escape::unescape_filter_value;
use crate::search::DirectoryEntry;
use crate::transport::{AttributeValues, DirectoryTransport};

/// Operations served by the in-memory directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// Opening the connection.
    Connect,
    /// A user or anonymous bind.
    Bind,
    /// A service-account bind.
    ProxyBind,
    /// A subtree search.
    Search,
    /// A base-scope read.
    Read,
    /// Adding attribute values.
    Add,
    /// Replacing attribute values.
    Replace,
    /// Deleting attributes.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::Bind => "bind",
            Self::ProxyBind => "proxy bind",
            Self::Search => "search",
            Self::Read => "read",
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One logged operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedOperation {
    /// What was requested.
    pub operation: Operation,
    /// Bind DN, search base or modified entry.
    pub target: Option<String>,
    /// Filter, for searches and reads.
    pub filter: Option<String>,
}

/// A directory held in memory.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    entries: Vec<DirectoryEntry>,
    passwords: HashMap<String, String>,
    proxy_available: bool,
    failing: BTreeSet<Operation>,
    log: Vec<LoggedOperation>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Creates an empty directory whose proxy account works.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            passwords: HashMap::new(),
            proxy_available: true,
            failing: BTreeSet::new(),
            log: Vec::new(),
        }
    }

    /// Adds an entry. Search results keep insertion order.
    #[must_use]
    pub fn with_entry(mut self, entry: DirectoryEntry) -> Self {
        self.insert(entry);
        self
    }

    /// Adds an entry that accepts `password` on bind.
    #[must_use]
    pub fn with_user(mut self, entry: DirectoryEntry, password: impl Into<String>) -> Self {
        if let Some(dn) = &entry.dn {
            self.passwords.insert(dn.to_ascii_lowercase(), password.into());
        }
        self.insert(entry);
        self
    }

    /// Accepts `password` for `dn` without adding an entry.
    #[must_use]
    pub fn with_password(mut self, dn: &str, password: impl Into<String>) -> Self {
        self.passwords.insert(dn.to_ascii_lowercase(), password.into());
        self
    }

    /// Makes the proxy account reject binds.
    #[must_use]
    pub fn without_proxy(mut self) -> Self {
        self.proxy_available = false;
        self
    }

    /// Makes `operation` fail with a transport error from now on.
    #[must_use]
    pub fn failing(mut self, operation: Operation) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, entry: DirectoryEntry) {
        let existing = entry.dn.as_deref().and_then(|dn| self.position(dn));
        match existing {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    /// Switches the proxy account on or off.
    pub fn set_proxy_available(&mut self, available: bool) {
        self.proxy_available = available;
    }

    /// Makes `operation` fail, or succeed again.
    pub fn set_failing(&mut self, operation: Operation, failing: bool) {
        if failing {
            self.failing.insert(operation);
        } else {
            self.failing.remove(&operation);
        }
    }

    /// Looks up an entry by DN.
    #[must_use]
    pub fn entry(&self, dn: &str) -> Option<&DirectoryEntry> {
        self.position(dn).map(|i| &self.entries[i])
    }

    /// Returns the operations served so far.
    #[must_use]
    pub fn operations(&self) -> &[LoggedOperation] {
        &self.log
    }

    /// Counts served operations of one kind.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.log.iter().filter(|o| o.operation == operation).count()
    }

    /// Returns the filters of every search served, in order.
    #[must_use]
    pub fn search_filters(&self) -> Vec<&str> {
        self.log
            .iter()
            .filter(|o| o.operation == Operation::Search)
            .filter_map(|o| o.filter.as_deref())
            .collect()
    }

    /// Forgets the operation log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn position(&self, dn: &str) -> Option<usize> {
        self.entries.iter().position(|e| {
            e.dn
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(dn))
        })
    }

    fn record(&mut self, operation: Operation, target: Option<&str>, filter: Option<&str>) {
        self.log.push(LoggedOperation {
            operation,
            target: target.map(str::to_string),
            filter: filter.map(str::to_string),
        });
    }

    fn check(&self, operation: Operation) -> DirectoryResult<()> {
        if self.failing.contains(&operation) {
            return Err(DirectoryError::directory(format!(
                "{operation} failed: server unavailable"
            )));
        }
        Ok(())
    }

    fn entry_mut(&mut self, dn: &str) -> DirectoryResult<&mut DirectoryEntry> {
        let index = self
            .position(dn)
            .ok_or_else(|| DirectoryError::directory(format!("No such object: {dn}")))?;
        Ok(&mut self.entries[index])
    }
}

impl DirectoryTransport for MemoryDirectory {
    fn connect(&mut self) -> DirectoryResult<()> {
        self.record(Operation::Connect, None, None);
        self.check(Operation::Connect)
    }

    fn bind(&mut self, dn: Option<&str>, password: Option<&str>) -> DirectoryResult<bool> {
        self.record(Operation::Bind, dn, None);
        self.check(Operation::Bind)?;

        let dn = match dn.filter(|d| !d.is_empty()) {
            Some(dn) => dn,
            None => return Ok(true),
        };
        let expected = self.passwords.get(&dn.to_ascii_lowercase());
        Ok(matches!((expected, password), (Some(e), Some(p)) if !p.is_empty() && e == p))
    }

    fn proxy_bind(&mut self) -> DirectoryResult<bool> {
        self.record(Operation::ProxyBind, None, None);
        self.check(Operation::ProxyBind)?;
        Ok(self.proxy_available)
    }

    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.record(Operation::Search, Some(base_dn), Some(filter));
        self.check(Operation::Search)?;

        let filter = Filter::parse(filter)?;
        Ok(self
            .entries
            .iter()
            .filter(|e| e.dn.as_deref().is_some_and(|dn| is_under(dn, base_dn)))
            .filter(|e| filter.matches(e))
            .map(|e| e.project(attributes))
            .collect())
    }

    fn read(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.record(Operation::Read, Some(base_dn), Some(filter));
        self.check(Operation::Read)?;

        let filter = Filter::parse(filter)?;
        match self.entry(base_dn) {
            Some(entry) if filter.matches(entry) => Ok(vec![entry.project(attributes)]),
            Some(_) => Ok(Vec::new()),
            None => Err(DirectoryError::directory(format!("No such object: {base_dn}"))),
        }
    }

    fn add_attributes(&mut self, dn: &str, attributes: &AttributeValues) -> DirectoryResult<()> {
        self.record(Operation::Add, Some(dn), None);
        self.check(Operation::Add)?;

        let entry = self.entry_mut(dn)?;
        for (name, values) in attributes {
            let mut merged = entry.get_attrs(name).map(<[String]>::to_vec).unwrap_or_default();
            for value in values {
                if merged.contains(value) {
                    return Err(DirectoryError::directory(format!(
                        "Attribute or value exists: {name}"
                    )));
                }
                merged.push(value.clone());
            }
            entry.set_attribute(name.clone(), merged);
        }
        Ok(())
    }

    fn replace_attributes(
        &mut self,
        dn: &str,
        attributes: &AttributeValues,
    ) -> DirectoryResult<()> {
        self.record(Operation::Replace, Some(dn), None);
        self.check(Operation::Replace)?;

        let entry = self.entry_mut(dn)?;
        for (name, values) in attributes {
            if values.is_empty() {
                entry.remove_attribute(name);
            } else {
                entry.set_attribute(name.clone(), values.clone());
            }
        }
        Ok(())
    }

    fn delete_attributes(
        &mut self,
        dn: &str,
        attributes: &BTreeSet<String>,
    ) -> DirectoryResult<()> {
        self.record(Operation::Delete, Some(dn), None);
        self.check(Operation::Delete)?;

        let entry = self.entry_mut(dn)?;
        for name in attributes {
            if !entry.remove_attribute(name) {
                return Err(DirectoryError::directory(format!(
                    "No such attribute: {name}"
                )));
            }
        }
        Ok(())
    }
}

/// Returns true if `dn` equals `base` or lies below it.
fn is_under(dn: &str, base: &str) -> bool {
    if base.is_empty() {
        return true;
    }
    let dn = dn.to_ascii_lowercase();
    let base = base.to_ascii_lowercase();
    dn == base || dn.ends_with(&format!(",{base}"))
}

// ============================================================================
// Filter Evaluation
// ============================================================================

/// A parsed RFC 4515 search filter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
    GreaterOrEqual(String, String),
    LessOrEqual(String, String),
    Substring(String, Vec<String>),
}

impl Filter {
    fn parse(input: &str) -> DirectoryResult<Self> {
        let input = input.trim();
        let mut parser = FilterParser { input, pos: 0 };
        let filter = parser
            .filter()
            .map_err(|e| DirectoryError::directory(format!("Bad search filter '{input}': {e}")))?;
        if parser.pos != input.len() {
            return Err(DirectoryError::directory(format!(
                "Bad search filter '{input}': trailing characters"
            )));
        }
        Ok(filter)
    }

    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::And(items) => items.iter().all(|f| f.matches(entry)),
            Self::Or(items) => items.iter().any(|f| f.matches(entry)),
            Self::Not(inner) => !inner.matches(entry),
            Self::Present(attr) => {
                is_dn_attribute(attr)
                    || attr.eq_ignore_ascii_case("objectClass")
                    || entry.has_attr(attr)
            }
            Self::Equal(attr, value) => {
                values_of(entry, attr).any(|v| v.eq_ignore_ascii_case(value))
            }
            Self::GreaterOrEqual(attr, value) => values_of(entry, attr)
                .any(|v| v.to_ascii_lowercase() >= value.to_ascii_lowercase()),
            Self::LessOrEqual(attr, value) => values_of(entry, attr)
                .any(|v| v.to_ascii_lowercase() <= value.to_ascii_lowercase()),
            Self::Substring(attr, parts) => {
                values_of(entry, attr).any(|v| substring_match(v, parts))
            }
        }
    }
}

fn is_dn_attribute(attr: &str) -> bool {
    ["dn", "distinguishedName", "entryDN"]
        .iter()
        .any(|a| a.eq_ignore_ascii_case(attr))
}

fn values_of<'a>(entry: &'a DirectoryEntry, attr: &str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
    if is_dn_attribute(attr) && !entry.has_attr(attr) {
        return Box::new(entry.dn.as_deref().into_iter());
    }
    Box::new(
        entry
            .get_attrs(attr)
            .unwrap_or_default()
            .iter()
            .map(String::as_str),
    )
}

fn substring_match(value: &str, parts: &[String]) -> bool {
    let value = value.to_ascii_lowercase();
    let parts: Vec<String> = parts.iter().map(|p| p.to_ascii_lowercase()).collect();
    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return true,
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return value == *first,
    };

    if !value.starts_with(first.as_str()) {
        return false;
    }
    let mut pos = first.len();
    for part in middle {
        match value[pos..].find(part.as_str()) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }
    value.len() >= pos + last.len() && value[pos..].ends_with(last.as_str())
}

struct FilterParser<'a> {
    input: &'a str,
    pos: usize,
}

impl FilterParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), String> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected '{}' at offset {}", byte as char, self.pos))
        }
    }

    fn filter(&mut self) -> Result<Filter, String> {
        self.expect(b'(')?;
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            _ => self.item()?,
        };
        self.expect(b')')?;
        Ok(filter)
    }

    fn list(&mut self) -> Result<Vec<Filter>, String> {
        let mut items = Vec::new();
        while self.peek() == Some(b'(') {
            items.push(self.filter()?);
        }
        if items.is_empty() {
            return Err(format!("empty filter list at offset {}", self.pos));
        }
        Ok(items)
    }

    fn item(&mut self) -> Result<Filter, String> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte == b')' || byte == b'(' {
                break;
            }
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let (attr, value) = raw
            .split_once('=')
            .ok_or_else(|| format!("missing '=' in '{raw}'"))?;
        if attr.is_empty() {
            return Err(format!("missing attribute in '{raw}'"));
        }

        if let Some(attr) = attr.strip_suffix('>') {
            return Ok(Filter::GreaterOrEqual(attr.to_string(), unescape_filter_value(value)));
        }
        if let Some(attr) = attr.strip_suffix('<') {
            return Ok(Filter::LessOrEqual(attr.to_string(), unescape_filter_value(value)));
        }
        let attr = attr.strip_suffix('~').unwrap_or(attr).to_string();

        if value == "*" {
            return Ok(Filter::Present(attr));
        }
        if value.contains('*') {
            let parts = value.split('*').map(unescape_filter_value).collect();
            return Ok(Filter::Substring(attr, parts));
        }
        Ok(Filter::Equal(attr, unescape_filter_value(value)))
    }
}
