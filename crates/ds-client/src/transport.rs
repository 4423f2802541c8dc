//! The directory wire-protocol collaborator.
//!
//! The client core never talks to a server itself. Every bind, search,
//! read and write goes through a [`DirectoryTransport`], which is
//! expected to block until the operation completes or fails.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::DirectoryResult;
use crate::search::DirectoryEntry;

/// Attribute values keyed by attribute name, as sent to write operations.
pub type AttributeValues = BTreeMap<String, Vec<String>>;

/// Synchronous access to a directory server.
///
/// ## Implementation Notes
///
/// - `bind` and `proxy_bind` return `Ok(false)` when the server rejected
///   the credentials and `Err` for transport problems.
/// - Passwords must never be logged.
pub trait DirectoryTransport {
    /// Opens the connection.
    fn connect(&mut self) -> DirectoryResult<()>;

    /// Binds as `dn` with `password`. `None` for both is an anonymous bind.
    fn bind(&mut self, dn: Option<&str>, password: Option<&str>) -> DirectoryResult<bool>;

    /// Binds with the configured service account.
    fn proxy_bind(&mut self) -> DirectoryResult<bool>;

    /// Searches the subtree below `base_dn`.
    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>>;

    /// Reads the single entry at `base_dn` if it matches `filter`.
    fn read(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>>;

    /// Adds values to attributes of `dn`.
    fn add_attributes(&mut self, dn: &str, attributes: &AttributeValues) -> DirectoryResult<()>;

    /// Replaces the values of attributes of `dn`.
    fn replace_attributes(&mut self, dn: &str, attributes: &AttributeValues)
        -> DirectoryResult<()>;

    /// Removes attributes of `dn` entirely.
    fn delete_attributes(&mut self, dn: &str, attributes: &BTreeSet<String>)
        -> DirectoryResult<()>;
}

impl<T: DirectoryTransport + ?Sized> DirectoryTransport for Box<T> {
    fn connect(&mut self) -> DirectoryResult<()> {
        (**self).connect()
    }

    fn bind(&mut self, dn: Option<&str>, password: Option<&str>) -> DirectoryResult<bool> {
        (**self).bind(dn, password)
    }

    fn proxy_bind(&mut self) -> DirectoryResult<bool> {
        (**self).proxy_bind()
    }

    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        (**self).search(base_dn, filter, attributes)
    }

    fn read(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        (**self).read(base_dn, filter, attributes)
    }

    fn add_attributes(&mut self, dn: &str, attributes: &AttributeValues) -> DirectoryResult<()> {
        (**self).add_attributes(dn, attributes)
    }

    fn replace_attributes(
        &mut self,
        dn: &str,
        attributes: &AttributeValues,
    ) -> DirectoryResult<()> {
        (**self).replace_attributes(dn, attributes)
    }

    fn delete_attributes(
        &mut self,
        dn: &str,
        attributes: &BTreeSet<String>,
    ) -> DirectoryResult<()> {
        (**self).delete_attributes(dn, attributes)
    }
}
