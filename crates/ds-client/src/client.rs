//! Directory client façade.
//!
//! [`DirectoryClient`] owns one session against one directory and tracks
//! the identity it is bound as. It resolves usernames, runs searches and
//! reads through the registered [`ReadHook`]s, discovers nested groups,
//! and commits attribute changes.
//!
//! ## Bind State
//!
//! Every `bind`, `proxy_bind` and `authenticate` call starts by resetting
//! the state to [`BindState::None`]. It is upgraded to `Proxy` or `User`
//! only when the transport confirms the bind.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditSink, Severity, TracingAuditSink};
use crate::config::{DirectoryConfig, CATCH_ALL_FILTER};
use crate::diff::{
    attribute_map_from_entry, diff, AttributeMap, CategoryOutcome, ChangeCategory, CommitReport,
};
use crate::error::{DirectoryError, DirectoryResult, InvalidUserReason};
use crate::groups::GroupRecursionEngine;
use crate::hooks::{HookDecision, ReadContext, ReadHook, ReadKind};
use crate::mapper::{ProfileMapper, UserProfile};
use crate::resolver::{IdentityResolver, ResolvedIdentity};
use crate::search::ResultSet;
use crate::session::{BindState, Session};
use crate::transport::DirectoryTransport;

/// Identity requested by [`DirectoryClient::authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    /// No bind required. A username, if given, is still resolved.
    #[default]
    None,
    /// Bind as the end user.
    User,
    /// Bind with the service account.
    Proxy,
}

/// A client for one directory.
pub struct DirectoryClient<T> {
    config: DirectoryConfig,
    session: Session<T>,
    last_resolved: Option<ResolvedIdentity>,
    hooks: Vec<Box<dyn ReadHook>>,
    audit: Arc<dyn AuditSink>,
}

impl<T: DirectoryTransport> DirectoryClient<T> {
    /// Creates a client over `transport`. Audit events go to `tracing`.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn new(config: DirectoryConfig, transport: T) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: Session::new(transport),
            last_resolved: None,
            hooks: Vec::new(),
            audit: Arc::new(TracingAuditSink),
        })
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Registers a read hook. Hooks run in registration order.
    #[must_use]
    pub fn with_hook(mut self, hook: impl ReadHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns the current bind state.
    #[must_use]
    pub const fn bind_state(&self) -> BindState {
        self.session.bind_state()
    }

    /// Returns the last successfully resolved identity.
    #[must_use]
    pub const fn last_resolved(&self) -> Option<&ResolvedIdentity> {
        self.last_resolved.as_ref()
    }

    /// Returns the DN of the last successfully resolved identity.
    #[must_use]
    pub fn last_dn(&self) -> Option<&str> {
        self.last_resolved
            .as_ref()
            .map(|identity| identity.distinguished_name.as_str())
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        self.session.transport()
    }

    /// Returns the transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        self.session.transport_mut()
    }

    /// Consumes the client.
    pub fn into_transport(self) -> T {
        self.session.into_transport()
    }

    // ========================================================================
    // Binding and Authentication
    // ========================================================================

    /// Opens the connection.
    pub fn connect(&mut self) -> DirectoryResult<()> {
        self.session.connect()
    }

    /// Binds as `dn`. Returns false when the bind was rejected or failed.
    pub fn bind(&mut self, dn: Option<&str>, password: Option<&str>) -> bool {
        self.session.bind(dn, password)
    }

    /// Binds with the service account.
    pub fn proxy_bind(&mut self) -> bool {
        self.session.proxy_bind()
    }

    /// Authenticates the session.
    ///
    /// - `None` without a username succeeds without binding.
    /// - `Proxy` binds with the service account.
    /// - Otherwise the username is resolved, binding as the user for `User`.
    ///
    /// Returns the resulting bind state.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidUser` when the session could not be authenticated and
    /// passes configuration and transport errors from resolution through.
    pub fn authenticate(
        &mut self,
        mode: AuthMode,
        username: Option<&str>,
        password: Option<&str>,
    ) -> DirectoryResult<BindState> {
        self.session.reset();
        let username = username.filter(|u| !u.is_empty());

        let outcome = match (mode, username) {
            (AuthMode::None, None) => return Ok(self.bind_state()),
            (AuthMode::Proxy, _) => {
                if self.session.proxy_bind() {
                    return Ok(self.bind_state());
                }
                Err(DirectoryError::invalid_user(
                    username.unwrap_or_default(),
                    InvalidUserReason::AuthenticationFailed,
                ))
            }
            (_, username) => self
                .get_user_dn(
                    username.unwrap_or_default(),
                    password,
                    mode == AuthMode::User,
                )
                .map(|_| self.bind_state()),
        };

        if let Err(e) = &outcome {
            self.audit.record(&AuditEvent::from_error(e, "authentication"));
        }
        outcome
    }

    /// Resolves `username` to a DN and remembers it as the last resolved
    /// identity.
    ///
    /// With `must_authenticate`, the session ends up bound as the user.
    pub fn get_user_dn(
        &mut self,
        username: &str,
        password: Option<&str>,
        must_authenticate: bool,
    ) -> DirectoryResult<String> {
        let resolver = IdentityResolver::new(&self.config, self.audit.as_ref());
        let identity =
            resolver.resolve(&mut self.session, username, password, must_authenticate)?;

        tracing::debug!(
            directory = %self.config.name,
            username = %identity.source_username,
            dn = %identity.distinguished_name,
            "Resolved username to DN"
        );

        let dn = identity.distinguished_name.clone();
        self.last_resolved = Some(identity);
        Ok(dn)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Searches the subtree below `base_dn`.
    ///
    /// `None` (or empty) arguments default to the configured base DN and
    /// default filter. An empty attribute list requests all attributes.
    pub fn search(
        &mut self,
        base_dn: Option<&str>,
        filter: Option<&str>,
        attributes: &[&str],
    ) -> DirectoryResult<ResultSet> {
        self.run_read(ReadKind::Search, base_dn, filter, attributes)
    }

    /// Reads the single entry at `dn`, with the same defaults as
    /// [`Self::search`].
    pub fn read(
        &mut self,
        dn: Option<&str>,
        filter: Option<&str>,
        attributes: &[&str],
    ) -> DirectoryResult<ResultSet> {
        self.run_read(ReadKind::Read, dn, filter, attributes)
    }

    /// Searches for every user entry.
    pub fn all_users(&mut self, attributes: &[&str]) -> DirectoryResult<ResultSet> {
        let filter = self.config.all_users_filter.clone();
        self.search(None, Some(&filter), attributes)
    }

    /// Reads the profile attributes of `dn`.
    pub fn user_profile(&mut self, dn: &str) -> DirectoryResult<UserProfile> {
        let attributes: Vec<String> = ProfileMapper::new(&self.config)
            .attributes()
            .into_iter()
            .map(str::to_string)
            .collect();
        let refs: Vec<&str> = attributes.iter().map(String::as_str).collect();

        let result = self.read(Some(dn), None, &refs)?;
        let entry = result
            .entry(0)
            .map_err(|_| DirectoryError::not_found(format!("entry {dn}")))?;
        Ok(ProfileMapper::new(&self.config).map_entry(dn, entry))
    }

    fn run_read(
        &mut self,
        kind: ReadKind,
        base_dn: Option<&str>,
        filter: Option<&str>,
        attributes: &[&str],
    ) -> DirectoryResult<ResultSet> {
        let mut context = ReadContext {
            kind,
            base_dn: base_dn
                .filter(|b| !b.is_empty())
                .unwrap_or(&self.config.base_dn)
                .to_string(),
            filter: filter
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| self.config.effective_default_filter())
                .to_string(),
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
        };

        // An empty list already means "everything".
        if !context.attributes.is_empty() {
            for hook in &self.hooks {
                for extra in hook.before_read(&context) {
                    if !context
                        .attributes
                        .iter()
                        .any(|a| a.eq_ignore_ascii_case(&extra))
                    {
                        context.attributes.push(extra);
                    }
                }
            }
        }

        let requested: Vec<&str> = context.attributes.iter().map(String::as_str).collect();
        let result = match kind {
            ReadKind::Search => self
                .session
                .search(&context.base_dn, &context.filter, &requested)?,
            ReadKind::Read => self
                .session
                .read(&context.base_dn, &context.filter, &requested)?,
        };

        for hook in &self.hooks {
            if let HookDecision::Deny(reason) = hook.after_read(&context, &result) {
                let err = DirectoryError::AccessDenied(reason);
                self.audit.record(&AuditEvent::from_error(&err, "read"));
                return Err(err);
            }
        }
        Ok(result)
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Adds every group reachable from `seeds` to `visited`.
    ///
    /// `None` attributes fall back to the configured group attributes.
    pub fn get_recursive_groups(
        &mut self,
        seeds: &[String],
        max_depth: u32,
        visited: &mut BTreeSet<String>,
        member_attribute: Option<&str>,
        query_attribute: Option<&str>,
    ) -> DirectoryResult<()> {
        let engine = GroupRecursionEngine::new(
            self.config.group_search_base(),
            member_attribute.unwrap_or(&self.config.group_member_attribute),
            query_attribute.unwrap_or(&self.config.group_query_attribute),
        );
        engine.recurse(&mut self.session, seeds, max_depth, visited)
    }

    /// Returns every group reachable from `seeds` using the configured
    /// attributes and depth.
    pub fn recursive_groups(&mut self, seeds: &[String]) -> DirectoryResult<BTreeSet<String>> {
        let mut visited = BTreeSet::new();
        let engine = GroupRecursionEngine::from_config(&self.config);
        engine.recurse(
            &mut self.session,
            seeds,
            self.config.group_max_depth,
            &mut visited,
        )?;
        Ok(visited)
    }

    /// Returns the direct and nested groups of the user at `dn`.
    pub fn get_user_groups(&mut self, dn: &str) -> DirectoryResult<BTreeSet<String>> {
        let member_attribute = self.config.group_member_attribute.clone();
        let result = self.read(Some(dn), None, &[member_attribute.as_str()])?;

        let seeds: Vec<String> = result
            .entries()
            .filter_map(|entry| entry.get_attrs(&member_attribute))
            .flatten()
            .filter(|v| !v.is_empty())
            .cloned()
            .collect();

        tracing::debug!(dn = %dn, direct = seeds.len(), "Expanding user groups");
        self.recursive_groups(&seeds)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Brings the attributes of `dn` in line with `desired`.
    ///
    /// Only attributes named in `desired` are read and compared. Writes are
    /// committed delete, then add, then replace; a failed category does not
    /// stop the ones after it.
    ///
    /// ## Errors
    ///
    /// Returns the transport error if the entry cannot be read, and
    /// `CommitFailed` carrying the full report if any category failed.
    pub fn make_changes(
        &mut self,
        dn: &str,
        desired: &AttributeMap,
    ) -> DirectoryResult<CommitReport> {
        let mut report = CommitReport::new(dn, Utc::now());
        if desired.is_empty() {
            return Ok(report.complete());
        }

        let names: Vec<&str> = desired.keys().map(String::as_str).collect();
        let current = self
            .session
            .read(dn, CATCH_ALL_FILTER, &names)?
            .entries()
            .next()
            .map(attribute_map_from_entry)
            .unwrap_or_default();

        let ops = diff(&current, desired);
        if ops.is_empty() {
            tracing::debug!(dn = %dn, "No attribute changes");
            return Ok(report.complete());
        }

        for category in ChangeCategory::COMMIT_ORDER {
            let transport = self.session.transport_mut();
            let (attributes, result) = match category {
                ChangeCategory::Delete if !ops.to_delete.is_empty() => (
                    ops.to_delete.len(),
                    transport.delete_attributes(dn, &ops.to_delete),
                ),
                ChangeCategory::Add if !ops.to_add.is_empty() => {
                    (ops.to_add.len(), transport.add_attributes(dn, &ops.to_add))
                }
                ChangeCategory::Replace if !ops.to_replace.is_empty() => (
                    ops.to_replace.len(),
                    transport.replace_attributes(dn, &ops.replace_values()),
                ),
                _ => continue,
            };

            let name = category.as_str();
            let outcome = match result {
                Ok(()) => {
                    tracing::info!(dn = %dn, category = name, attributes, "Attributes updated");
                    self.audit.record(&AuditEvent::new(
                        format!("{name} of {attributes} attribute(s) on {dn} applied"),
                        "update_applied",
                        Severity::Info,
                        "update",
                    ));
                    CategoryOutcome::Applied { attributes }
                }
                Err(e) => {
                    tracing::warn!(
                        dn = %dn,
                        category = name,
                        error = %e,
                        "Attribute update failed"
                    );
                    self.audit.record(&AuditEvent::new(
                        format!("{name} of {attributes} attribute(s) on {dn} failed: {e}"),
                        "update_failed",
                        Severity::Error,
                        "update",
                    ));
                    CategoryOutcome::Failed {
                        attributes,
                        error: e.to_string(),
                    }
                }
            };
            report.record(category, outcome);
        }

        let report = report.complete();
        if report.has_failures() {
            return Err(DirectoryError::CommitFailed(Box::new(report)));
        }
        Ok(report)
    }
}
