//! Username to DN resolution.
//!
//! ## Modes
//!
//! - **Search**: proxy bind, then search the subtree below `base_dn` with a
//!   filter built from `user_query`. Every matching entry is a candidate.
//! - **Direct**: substitute the username into one or more DN templates.
//!   Candidates are not known to exist.
//!
//! ## Policy
//!
//! With `must_authenticate`, the first candidate that accepts the password
//! wins. Without it, search mode trusts its first hit, and direct mode
//! reads each candidate back under the proxy account. If that proxy bind
//! fails, [`UnverifiedDirectPolicy`] decides between trusting the first
//! candidate and rejecting the user.
//!
//! Passwords are never logged.

use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditSink, Severity};
use crate::config::{
    DirectoryConfig, ResolveMode, UnverifiedDirectPolicy, CANDIDATE_SEPARATOR, CATCH_ALL_FILTER,
    USERNAME_PLACEHOLDER,
};
use crate::error::{DirectoryError, DirectoryResult, InvalidUserReason};
use crate::escape::{escape_dn_value, escape_filter_value};
use crate::session::Session;
use crate::transport::DirectoryTransport;

/// A username that was turned into a DN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIdentity {
    /// The DN the username maps to.
    pub distinguished_name: String,
    /// The username as supplied.
    pub source_username: String,
}

/// Resolves usernames against one directory configuration.
pub struct IdentityResolver<'a> {
    config: &'a DirectoryConfig,
    audit: &'a dyn AuditSink,
}

impl<'a> IdentityResolver<'a> {
    /// Creates a resolver.
    pub fn new(config: &'a DirectoryConfig, audit: &'a dyn AuditSink) -> Self {
        Self { config, audit }
    }

    /// Resolves `username` to a DN.
    ///
    /// ## Errors
    ///
    /// - `Configuration` if `user_query` is empty, search mode has no base
    ///   DN, or a direct-mode template contains filter syntax
    /// - `Directory` if search mode cannot proxy bind or search
    /// - `InvalidUser` if the user is unknown, the password is wrong, or the
    ///   DN cannot be verified
    pub fn resolve<T: DirectoryTransport>(
        &self,
        session: &mut Session<T>,
        username: &str,
        password: Option<&str>,
        must_authenticate: bool,
    ) -> DirectoryResult<ResolvedIdentity> {
        self.validate()?;

        if username.trim().is_empty() {
            return Err(DirectoryError::invalid_user(
                username,
                InvalidUserReason::NotFound,
            ));
        }

        let password = password.filter(|p| !p.is_empty());
        if must_authenticate && password.is_none() {
            return Err(DirectoryError::invalid_user(
                username,
                InvalidUserReason::EmptyPassword,
            ));
        }

        let candidates = match self.config.mode {
            ResolveMode::Search => self.search_candidates(session, username)?,
            ResolveMode::Direct => self.direct_candidates(username)?,
        };

        let dn = match password {
            Some(password) if must_authenticate => {
                self.authenticate_candidate(session, username, password, &candidates)?
            }
            _ => self.select_candidate(session, username, candidates)?,
        };

        Ok(ResolvedIdentity {
            distinguished_name: dn,
            source_username: username.to_string(),
        })
    }

    /// Builds the search-mode filter for `username`.
    #[must_use]
    pub fn search_filter(&self, username: &str) -> String {
        let template = self.config.user_query.trim();
        let filter = template.replace(USERNAME_PLACEHOLDER, &escape_filter_value(username));
        if template.contains('(') {
            filter
        } else {
            format!("({filter})")
        }
    }

    /// Builds the direct-mode candidate DNs for `username`, in order.
    pub fn direct_candidates(&self, username: &str) -> DirectoryResult<Vec<String>> {
        let template = self.config.user_query.trim();
        if template.contains('(') || template.contains(')') {
            return Err(DirectoryError::config(
                "user_query contains filter syntax but direct mode expects DN templates",
            ));
        }

        let escaped = escape_dn_value(username);
        let candidates: Vec<String> = template
            .split(CANDIDATE_SEPARATOR)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.replace(USERNAME_PLACEHOLDER, &escaped))
            .collect();

        if candidates.is_empty() {
            return Err(DirectoryError::config(
                "user_query yields no candidate DN",
            ));
        }
        Ok(candidates)
    }

    fn validate(&self) -> DirectoryResult<()> {
        if self.config.user_query.trim().is_empty() {
            return Err(DirectoryError::config("user_query is not configured"));
        }
        match self.config.mode {
            ResolveMode::Search if self.config.base_dn.trim().is_empty() => Err(
                DirectoryError::config("base_dn is required to search for users"),
            ),
            ResolveMode::Direct
                if self.config.user_query.contains('(') || self.config.user_query.contains(')') =>
            {
                Err(DirectoryError::config(
                    "user_query contains filter syntax but direct mode expects DN templates",
                ))
            }
            _ => Ok(()),
        }
    }

    fn search_candidates<T: DirectoryTransport>(
        &self,
        session: &mut Session<T>,
        username: &str,
    ) -> DirectoryResult<Vec<String>> {
        if !session.proxy_bind() {
            return Err(DirectoryError::directory(
                "Proxy bind failed; cannot search for user",
            ));
        }

        let filter = self.search_filter(username);
        let result = session.search(
            &self.config.base_dn,
            &filter,
            &[self.config.uid_attribute.as_str()],
        )?;

        let candidates: Vec<String> = result.dns().map(str::to_string).collect();
        tracing::debug!(
            username = %username,
            matches = candidates.len(),
            "User search completed"
        );

        if candidates.is_empty() {
            return Err(DirectoryError::invalid_user(
                username,
                InvalidUserReason::NotFound,
            ));
        }
        Ok(candidates)
    }

    fn authenticate_candidate<T: DirectoryTransport>(
        &self,
        session: &mut Session<T>,
        username: &str,
        password: &str,
        candidates: &[String],
    ) -> DirectoryResult<String> {
        for dn in candidates {
            if session.bind(Some(dn), Some(password)) {
                return Ok(dn.clone());
            }
        }

        let reason = if self.config.mode.is_search() {
            InvalidUserReason::SearchBindRejected
        } else {
            InvalidUserReason::DirectBindRejected
        };
        Err(DirectoryError::invalid_user(username, reason))
    }

    fn select_candidate<T: DirectoryTransport>(
        &self,
        session: &mut Session<T>,
        username: &str,
        candidates: Vec<String>,
    ) -> DirectoryResult<String> {
        // Search hits exist by construction; the first one is taken as is.
        if self.config.mode.is_search() {
            return candidates.into_iter().next().ok_or_else(|| {
                DirectoryError::invalid_user(username, InvalidUserReason::NotFound)
            });
        }

        if !session.proxy_bind() {
            return self.unverified_fallback(username, candidates);
        }

        for dn in &candidates {
            match session.read(dn, CATCH_ALL_FILTER, &["dn"]) {
                Ok(result) if !result.is_empty() => return Ok(dn.clone()),
                Ok(_) => {}
                Err(e) => tracing::debug!(dn = %dn, error = %e, "Candidate DN not readable"),
            }
        }

        Err(DirectoryError::invalid_user(
            username,
            InvalidUserReason::ExistenceUnverifiable,
        ))
    }

    fn unverified_fallback(
        &self,
        username: &str,
        candidates: Vec<String>,
    ) -> DirectoryResult<String> {
        match self.config.unverified_direct_policy {
            UnverifiedDirectPolicy::FailOpen => {
                let dn = candidates.into_iter().next().ok_or_else(|| {
                    DirectoryError::invalid_user(username, InvalidUserReason::NotFound)
                })?;
                self.audit.record(&AuditEvent::new(
                    format!("Proxy bind unavailable; trusting unverified DN {dn} for {username}"),
                    "unverified_dn_trusted",
                    Severity::Warning,
                    "authentication",
                ));
                Ok(dn)
            }
            UnverifiedDirectPolicy::FailClosed => Err(DirectoryError::invalid_user(
                username,
                InvalidUserReason::ExistenceUnverifiable,
            )),
        }
    }
}
