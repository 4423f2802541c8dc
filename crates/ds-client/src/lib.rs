//! # ds-client
//!
//! Directory-service client for LDAP-compatible directories.
//!
//! This crate turns usernames into trusted DNs, authenticates users by
//! binding as them, discovers nested group memberships, and computes and
//! commits attribute updates.
//!
//! ## Modules
//!
//! - [`client`]: the [`DirectoryClient`] façade and its bind state
//! - [`resolver`]: username to DN resolution (search and direct modes)
//! - [`groups`]: nested group discovery
//! - [`diff`]: attribute diffing and commit reports
//! - [`search`]: read-only access to search results
//! - [`transport`]: the wire-protocol seam, with [`Ldap3Transport`] and
//!   [`MemoryDirectory`] implementations
//! - [`selection`]: authentication across several directories
//!
//! ## Security
//!
//! - Network connections are LDAPS only
//! - Usernames are escaped for filters and DNs separately
//! - Passwords are never logged

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod client;
pub mod config;
pub mod connection;
pub mod diff;
pub mod error;
pub mod escape;
pub mod groups;
pub mod hooks;
pub mod mapper;
pub mod memory;
pub mod resolver;
pub mod search;
pub mod selection;
pub mod session;
pub mod transport;

pub use audit::{AuditEvent, AuditSink, NullAuditSink, Severity, TracingAuditSink};
pub use client::{AuthMode, DirectoryClient};
pub use config::{DirectoryConfig, DirectoryConfigSet, ResolveMode, UnverifiedDirectPolicy};
pub use connection::{ConnectionConfig, Ldap3Transport};
pub use diff::{
    diff, AttributeMap, AttributeOperationSet, AttributeValue, CategoryOutcome, ChangeCategory,
    CommitReport,
};
pub use error::{DirectoryError, DirectoryResult, InvalidUserReason, StackedError};
pub use groups::GroupRecursionEngine;
pub use hooks::{HookDecision, ReadContext, ReadHook, ReadKind};
pub use mapper::{ProfileMapper, UserProfile};
pub use memory::{MemoryDirectory, Operation};
pub use resolver::{IdentityResolver, ResolvedIdentity};
pub use search::{DirectoryEntry, ResultSet};
pub use selection::authenticate_first;
pub use session::{BindState, Session};
pub use transport::{AttributeValues, DirectoryTransport};
