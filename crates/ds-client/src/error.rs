//! Directory client error types.
//!
//! ## Security Note
//!
//! Error messages must not leak sensitive information like
//! passwords or bind credentials. Usernames are carried for
//! diagnostics only.

use std::fmt;

use thiserror::Error;

use crate::diff::CommitReport;

/// Why a user could not be resolved or authenticated.
///
/// The variants keep configuration bugs apart from genuine bad
/// credentials when failures are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidUserReason {
    /// The directory search returned no entry for the username.
    NotFound,
    /// The search found the user but no candidate accepted the password.
    SearchBindRejected,
    /// None of the directly constructed DNs accepted the password.
    DirectBindRejected,
    /// The proxy bind succeeded but no candidate DN could be read back.
    ExistenceUnverifiable,
    /// Authentication was requested without a password.
    EmptyPassword,
    /// The façade could not authenticate the session.
    AuthenticationFailed,
}

impl InvalidUserReason {
    /// Returns the stable machine-readable code for this reason.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "user_not_found",
            Self::SearchBindRejected => "search_bind_rejected",
            Self::DirectBindRejected => "direct_bind_rejected",
            Self::ExistenceUnverifiable => "existence_unverifiable",
            Self::EmptyPassword => "empty_password",
            Self::AuthenticationFailed => "authentication_failed",
        }
    }
}

impl fmt::Display for InvalidUserReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "user not found in directory",
            Self::SearchBindRejected => "user found but the password was rejected",
            Self::DirectBindRejected => "direct bind failed",
            Self::ExistenceUnverifiable => "user existence could not be verified",
            Self::EmptyPassword => "empty password",
            Self::AuthenticationFailed => "authentication failed",
        };
        f.write_str(text)
    }
}

/// Errors raised by the directory client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Missing or invalid setup. Never retried.
    #[error("Directory configuration error: {0}")]
    Configuration(String),

    /// Transport-level bind, search, read or write failure.
    #[error("Directory error: {0}")]
    Directory(String),

    /// `ldap3` connection, protocol or result-code failure.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),

    /// The username could not be resolved or authenticated.
    #[error("Invalid user '{username}': {reason}")]
    InvalidUser {
        /// Username as supplied by the caller.
        username: String,
        /// Sub-code describing the failure.
        reason: InvalidUserReason,
    },

    /// An index or attribute lookup on a result set missed.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A read hook refused to release a result.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// At least one write category failed while committing changes.
    #[error("Directory update incomplete: {}", .0.status)]
    CommitFailed(Box<CommitReport>),

    /// Every configured directory failed.
    #[error(transparent)]
    Stacked(#[from] StackedError),
}

impl DirectoryError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a transport-level error.
    #[must_use]
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }

    /// Creates an invalid user error.
    #[must_use]
    pub fn invalid_user(username: impl Into<String>, reason: InvalidUserReason) -> Self {
        Self::InvalidUser {
            username: username.into(),
            reason,
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Checks if this is a configuration error.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Checks if this is a transport-level error.
    #[must_use]
    pub const fn is_directory_error(&self) -> bool {
        matches!(self, Self::Directory(_) | Self::Ldap3(_))
    }

    /// Checks if this is an invalid user error.
    #[must_use]
    pub const fn is_invalid_user(&self) -> bool {
        matches!(self, Self::InvalidUser { .. })
    }

    /// Returns the invalid user sub-code, if any.
    #[must_use]
    pub const fn invalid_user_reason(&self) -> Option<InvalidUserReason> {
        match self {
            Self::InvalidUser { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Returns a stable code suitable for audit records.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::Directory(_) => "directory_error",
            Self::Ldap3(_) => "ldap_error",
            Self::InvalidUser { reason, .. } => reason.code(),
            Self::NotFound(_) => "not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::CommitFailed(_) => "commit_failed",
            Self::Stacked(_) => "stacked_error",
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Failures collected while trying several directory configurations.
///
/// Only raised when every configuration failed.
#[derive(Debug, Default)]
pub struct StackedError {
    failures: Vec<(String, DirectoryError)>,
}

impl StackedError {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the failure of the named configuration.
    pub fn push(&mut self, config_name: impl Into<String>, error: DirectoryError) {
        self.failures.push((config_name.into(), error));
    }

    /// Returns the recorded failures in the order they happened.
    #[must_use]
    pub fn failures(&self) -> &[(String, DirectoryError)] {
        &self.failures
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for StackedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "All {} directory configurations failed", self.failures.len())?;
        for (name, error) in &self.failures {
            write!(f, "; [{name}] {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StackedError {}
