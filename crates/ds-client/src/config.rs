//! Directory client configuration.
//!
//! A [`DirectoryConfig`] is built once per client and read-only afterwards.
//! Mode-dependent requirements (a user query template, a base DN for
//! search mode) are checked when a username is resolved, so that they
//! surface as configuration errors from the operation that needs them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Placeholder substituted with the (escaped) username in `user_query`.
pub const USERNAME_PLACEHOLDER: &str = "[username]";

/// Separator between alternative DN templates in direct mode.
pub const CANDIDATE_SEPARATOR: char = ';';

/// Catch-all filter used when a search or read names no filter.
pub const CATCH_ALL_FILTER: &str = "(objectClass=*)";

// ============================================================================
// Modes and Policies
// ============================================================================

/// How a username is turned into a DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveMode {
    /// Search the directory with a filter built from `user_query`.
    #[default]
    Search,
    /// Substitute the username into one or more DN templates.
    Direct,
}

impl ResolveMode {
    /// Returns true for search mode.
    #[must_use]
    pub const fn is_search(&self) -> bool {
        matches!(self, Self::Search)
    }
}

/// What to do when an unauthenticated direct-mode lookup cannot verify
/// that the constructed DN exists because the proxy bind failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnverifiedDirectPolicy {
    /// Trust the first candidate DN. Audited as a warning.
    #[default]
    FailOpen,
    /// Reject the username.
    FailClosed,
}

// ============================================================================
// Directory Configuration
// ============================================================================

/// Per-session directory settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Label used in diagnostics when several directories are configured.
    pub name: String,

    /// Base DN for searches and the default target of reads.
    pub base_dn: String,

    /// Username query template containing [`USERNAME_PLACEHOLDER`].
    ///
    /// A filter in search mode, one or more `;`-separated DN templates
    /// in direct mode.
    pub user_query: String,

    /// Search mode or direct mode.
    pub mode: ResolveMode,

    /// Filter used when a search names none.
    pub default_filter: String,

    /// Filter matching every user entry.
    pub all_users_filter: String,

    /// Unique identifier attribute.
    pub uid_attribute: String,

    /// Full name attribute.
    pub fullname_attribute: String,

    /// Email attribute.
    pub email_attribute: String,

    /// Base DN for group searches. Falls back to `base_dn`.
    pub group_base_dn: Option<String>,

    /// Attribute holding the groups an entry belongs to.
    pub group_member_attribute: String,

    /// Attribute matched against seed DNs during group discovery.
    pub group_query_attribute: String,

    /// Maximum group nesting depth. `0` means unlimited.
    pub group_max_depth: u32,

    /// Behaviour when an unauthenticated direct lookup cannot be verified.
    pub unverified_direct_policy: UnverifiedDirectPolicy,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_dn: String::new(),
            user_query: String::new(),
            mode: ResolveMode::Search,
            default_filter: CATCH_ALL_FILTER.to_string(),
            all_users_filter: "(objectClass=person)".to_string(),
            uid_attribute: "uid".to_string(),
            fullname_attribute: "cn".to_string(),
            email_attribute: "mail".to_string(),
            group_base_dn: None,
            group_member_attribute: "memberOf".to_string(),
            group_query_attribute: "distinguishedName".to_string(),
            group_max_depth: 10,
            unverified_direct_policy: UnverifiedDirectPolicy::FailOpen,
        }
    }
}

impl DirectoryConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> DirectoryConfigBuilder {
        DirectoryConfigBuilder::new()
    }

    /// Parses a single configuration from TOML.
    pub fn from_toml_str(content: &str) -> DirectoryResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DirectoryError::config(format!("Invalid directory config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates settings that are required in every mode.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.name.trim().is_empty() {
            return Err(DirectoryError::config("name cannot be empty"));
        }
        if self.uid_attribute.trim().is_empty() {
            return Err(DirectoryError::config("uid_attribute cannot be empty"));
        }
        Ok(())
    }

    /// Returns the base DN used for group discovery.
    #[must_use]
    pub fn group_search_base(&self) -> &str {
        self.group_base_dn.as_deref().unwrap_or(&self.base_dn)
    }

    /// Returns the filter to use when a caller names none.
    #[must_use]
    pub fn effective_default_filter(&self) -> &str {
        if self.default_filter.trim().is_empty() {
            CATCH_ALL_FILTER
        } else {
            &self.default_filter
        }
    }
}

/// An ordered list of directory configurations, tried in turn by
/// [`crate::selection::authenticate_first`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfigSet {
    /// Configurations in priority order.
    #[serde(default, rename = "directory")]
    pub directories: Vec<DirectoryConfig>,
}

impl DirectoryConfigSet {
    /// Parses `[[directory]]` tables from TOML.
    pub fn from_toml_str(content: &str) -> DirectoryResult<Self> {
        let set: Self = toml::from_str(content)
            .map_err(|e| DirectoryError::config(format!("Invalid directory config: {e}")))?;
        if set.directories.is_empty() {
            return Err(DirectoryError::config("no [[directory]] entries configured"));
        }
        for config in &set.directories {
            config.validate()?;
        }
        Ok(set)
    }

    /// Loads the configuration set from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DirectoryError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for [`DirectoryConfig`].
#[derive(Debug, Default)]
pub struct DirectoryConfigBuilder {
    config: DirectoryConfig,
}

impl DirectoryConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the base DN.
    #[must_use]
    pub fn base_dn(mut self, dn: impl Into<String>) -> Self {
        self.config.base_dn = dn.into();
        self
    }

    /// Sets the user query template.
    #[must_use]
    pub fn user_query(mut self, template: impl Into<String>) -> Self {
        self.config.user_query = template.into();
        self
    }

    /// Sets the resolve mode.
    #[must_use]
    pub const fn mode(mut self, mode: ResolveMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the default search filter.
    #[must_use]
    pub fn default_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.default_filter = filter.into();
        self
    }

    /// Sets the all-users filter.
    #[must_use]
    pub fn all_users_filter(mut self, filter: impl Into<String>) -> Self {
        self.config.all_users_filter = filter.into();
        self
    }

    /// Sets the unique identifier attribute.
    #[must_use]
    pub fn uid_attribute(mut self, attr: impl Into<String>) -> Self {
        self.config.uid_attribute = attr.into();
        self
    }

    /// Sets the full name attribute.
    #[must_use]
    pub fn fullname_attribute(mut self, attr: impl Into<String>) -> Self {
        self.config.fullname_attribute = attr.into();
        self
    }

    /// Sets the email attribute.
    #[must_use]
    pub fn email_attribute(mut self, attr: impl Into<String>) -> Self {
        self.config.email_attribute = attr.into();
        self
    }

    /// Sets the group search base.
    #[must_use]
    pub fn group_base_dn(mut self, dn: impl Into<String>) -> Self {
        self.config.group_base_dn = Some(dn.into());
        self
    }

    /// Sets the group member and query attributes.
    #[must_use]
    pub fn group_attributes(
        mut self,
        member_attribute: impl Into<String>,
        query_attribute: impl Into<String>,
    ) -> Self {
        self.config.group_member_attribute = member_attribute.into();
        self.config.group_query_attribute = query_attribute.into();
        self
    }

    /// Sets the maximum group nesting depth (`0` = unlimited).
    #[must_use]
    pub const fn group_max_depth(mut self, depth: u32) -> Self {
        self.config.group_max_depth = depth;
        self
    }

    /// Sets the unverified direct-mode policy.
    #[must_use]
    pub const fn unverified_direct_policy(mut self, policy: UnverifiedDirectPolicy) -> Self {
        self.config.unverified_direct_policy = policy;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if the name or the uid attribute is empty.
    pub fn build(self) -> DirectoryResult<DirectoryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
