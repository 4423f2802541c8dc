//! Bind-state tracking over a transport.

use std::fmt;

use crate::error::DirectoryResult;
use crate::search::ResultSet;
use crate::transport::DirectoryTransport;

/// Strongest identity the session is currently bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum BindState {
    /// Not bound, or bound anonymously.
    #[default]
    None,
    /// Bound with the service account.
    Proxy,
    /// Bound as an end user.
    User,
}

impl fmt::Display for BindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Proxy => "proxy",
            Self::User => "user",
        };
        f.write_str(name)
    }
}

/// A transport plus the bind state it is in.
///
/// Every bind attempt resets the state to [`BindState::None`] first and
/// upgrades it only when the transport confirms success.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    bind_state: BindState,
}

impl<T: DirectoryTransport> Session<T> {
    /// Wraps a transport. The session starts unbound.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            bind_state: BindState::None,
        }
    }

    /// Current bind state.
    #[must_use]
    pub const fn bind_state(&self) -> BindState {
        self.bind_state
    }

    /// Forgets the current bind state.
    pub fn reset(&mut self) {
        self.bind_state = BindState::None;
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the session.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Opens the connection.
    pub fn connect(&mut self) -> DirectoryResult<()> {
        self.transport.connect()
    }

    /// Binds as `dn`. An anonymous bind never upgrades the state.
    ///
    /// Transport errors count as a failed bind.
    pub fn bind(&mut self, dn: Option<&str>, password: Option<&str>) -> bool {
        self.bind_state = BindState::None;
        match self.transport.bind(dn, password) {
            Ok(true) => {
                if dn.is_some_and(|d| !d.is_empty()) {
                    self.bind_state = BindState::User;
                }
                true
            }
            Ok(false) => {
                tracing::debug!(dn = dn.unwrap_or(""), "Bind rejected");
                false
            }
            Err(e) => {
                tracing::warn!(dn = dn.unwrap_or(""), error = %e, "Bind failed");
                false
            }
        }
    }

    /// Binds with the service account.
    pub fn proxy_bind(&mut self) -> bool {
        self.bind_state = BindState::None;
        match self.transport.proxy_bind() {
            Ok(true) => {
                self.bind_state = BindState::Proxy;
                true
            }
            Ok(false) => {
                tracing::debug!("Proxy bind rejected");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Proxy bind failed");
                false
            }
        }
    }

    /// Subtree search. Transport failures are returned unchanged.
    pub fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<ResultSet> {
        self.transport
            .search(base_dn, filter, attributes)
            .map(ResultSet::new)
    }

    /// Base-scope read. Transport failures are returned unchanged.
    pub fn read(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[&str],
    ) -> DirectoryResult<ResultSet> {
        self.transport
            .read(base_dn, filter, attributes)
            .map(ResultSet::new)
    }
}
