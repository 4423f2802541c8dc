//! LDAP transport over `ldap3`.
//!
//! ## Security Requirements
//!
//! - All connections use LDAPS (TLS from connection start)
//! - STARTTLS is NOT supported
//! - Plain LDAP is NOT supported
//! - Passwords are never logged

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, Mod, Scope, SearchEntry};
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};
use crate::search::DirectoryEntry;
use crate::transport::{AttributeValues, DirectoryTransport};

/// LDAP result code for rejected credentials.
const INVALID_CREDENTIALS: u32 = 49;

/// Connection settings for [`Ldap3Transport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// LDAP server URL (MUST be ldaps://).
    pub url: String,

    /// Service account DN. Proxy binds are anonymous without one.
    pub bind_dn: Option<String>,

    /// Service account password.
    #[serde(skip_serializing, default)]
    pub bind_credential: Option<String>,

    /// Whether to validate server certificates.
    #[serde(default = "default_validate_certificates")]
    pub validate_certificates: bool,

    /// Connection timeout.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: Duration,
}

const fn default_validate_certificates() -> bool {
    true
}

const fn default_connection_timeout() -> Duration {
    Duration::from_secs(10)
}

impl ConnectionConfig {
    /// Creates settings for `url` without a service account.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bind_dn: None,
            bind_credential: None,
            validate_certificates: default_validate_certificates(),
            connection_timeout: default_connection_timeout(),
        }
    }

    /// Sets the service account.
    #[must_use]
    pub fn with_service_account(
        mut self,
        bind_dn: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        self.bind_dn = Some(bind_dn.into());
        self.bind_credential = Some(credential.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Validates the settings.
    ///
    /// ## Security
    ///
    /// Only `ldaps://` URLs are accepted.
    pub fn validate(&self) -> DirectoryResult<()> {
        let url = self.url.trim().to_ascii_lowercase();
        if !url.starts_with("ldaps://") {
            return Err(DirectoryError::config(
                "connection url must use ldaps:// (plain LDAP and STARTTLS are not supported)",
            ));
        }
        if url.len() <= "ldaps://".len() {
            return Err(DirectoryError::config("Invalid LDAPS URL: missing host"));
        }
        if self.bind_dn.as_deref().is_some_and(|dn| !dn.is_empty())
            && self.bind_credential.as_deref().map_or(true, str::is_empty)
        {
            return Err(DirectoryError::config(
                "bind_credential is required when bind_dn is set",
            ));
        }
        Ok(())
    }
}

/// [`DirectoryTransport`] backed by a synchronous `ldap3` connection.
///
/// The connection is opened on first use.
pub struct Ldap3Transport {
    config: ConnectionConfig,
    conn: Option<LdapConn>,
}

impl Ldap3Transport {
    /// Creates a transport. Does not connect.
    ///
    /// ## Errors
    ///
    /// Returns an error if the settings fail validation.
    pub fn new(config: ConnectionConfig) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self { config, conn: None })
    }

    /// Returns true once a connection has been opened.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns the settings.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn conn(&mut self) -> DirectoryResult<&mut LdapConn> {
        if self.conn.is_none() {
            self.connect()?;
        }
        self.conn
            .as_mut()
            .ok_or_else(|| DirectoryError::directory("Not connected"))
    }

    fn query(
        &mut self,
        base_dn: &str,
        scope: Scope,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let (entries, _result) = self
            .conn()?
            .search(base_dn, scope, filter, attributes.to_vec())?
            .success()?;

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                let mut names: Vec<&String> = entry.attrs.keys().collect();
                names.sort();
                names.into_iter().fold(
                    DirectoryEntry::new(entry.dn.clone()),
                    |acc, name| acc.with_attribute(name.clone(), entry.attrs[name].clone()),
                )
            })
            .collect())
    }

    fn modify(&mut self, dn: &str, mods: Vec<Mod<String>>) -> DirectoryResult<()> {
        self.conn()?.modify(dn, mods)?.success()?;
        Ok(())
    }
}

fn value_set(values: &[String]) -> HashSet<String> {
    values.iter().cloned().collect()
}

/// Builds one `Add` per value so the server stores values in list order.
fn add_mods(attributes: &AttributeValues) -> Vec<Mod<String>> {
    attributes
        .iter()
        .flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| Mod::Add(name.clone(), HashSet::from([value.clone()])))
        })
        .collect()
}

impl DirectoryTransport for Ldap3Transport {
    fn connect(&mut self) -> DirectoryResult<()> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection_timeout)
            .set_no_tls_verify(!self.config.validate_certificates);

        let conn = LdapConn::with_settings(settings, &self.config.url)?;
        tracing::debug!(url = %self.config.url, "Connected to directory");
        self.conn = Some(conn);
        Ok(())
    }

    fn bind(&mut self, dn: Option<&str>, password: Option<&str>) -> DirectoryResult<bool> {
        let dn = dn.unwrap_or_default();
        let password = password.unwrap_or_default();
        // Servers treat a DN with an empty password as an unauthenticated bind.
        if !dn.is_empty() && password.is_empty() {
            return Ok(false);
        }

        let result = self.conn()?.simple_bind(dn, password)?;

        if result.rc == INVALID_CREDENTIALS {
            return Ok(false);
        }
        result.success()?;
        Ok(true)
    }

    fn proxy_bind(&mut self) -> DirectoryResult<bool> {
        let dn = self.config.bind_dn.clone();
        let credential = self.config.bind_credential.clone();
        self.bind(dn.as_deref(), credential.as_deref())
    }

    fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.query(base_dn, Scope::Subtree, filter, attributes)
    }

    fn read(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.query(base_dn, Scope::Base, filter, attributes)
    }

    fn add_attributes(&mut self, dn: &str, attributes: &AttributeValues) -> DirectoryResult<()> {
        self.modify(dn, add_mods(attributes))
    }

    fn replace_attributes(
        &mut self,
        dn: &str,
        attributes: &AttributeValues,
    ) -> DirectoryResult<()> {
        let mods = attributes
            .iter()
            .map(|(name, values)| Mod::Replace(name.clone(), value_set(values)))
            .collect();
        self.modify(dn, mods)
    }

    fn delete_attributes(
        &mut self,
        dn: &str,
        attributes: &BTreeSet<String>,
    ) -> DirectoryResult<()> {
        let mods = attributes
            .iter()
            .map(|name| Mod::Delete(name.clone(), HashSet::new()))
            .collect();
        self.modify(dn, mods)
    }
}
