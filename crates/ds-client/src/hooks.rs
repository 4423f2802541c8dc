//! Read hooks.
//!
//! A [`ReadHook`] can widen the attribute list of a search or read before
//! it is sent and veto the result after it comes back.

use crate::search::ResultSet;

/// Kind of read being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    /// Subtree search.
    Search,
    /// Base-scope read of one entry.
    Read,
}

/// What a read hook sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadContext {
    /// Search or read.
    pub kind: ReadKind,
    /// Base DN actually used.
    pub base_dn: String,
    /// Filter actually used.
    pub filter: String,
    /// Requested attributes, including ones added by hooks.
    pub attributes: Vec<String>,
}

/// Verdict of [`ReadHook::after_read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Release the result to the caller.
    Allow,
    /// Withhold the result.
    Deny(String),
}

/// Hook around directory reads.
pub trait ReadHook: Send + Sync {
    /// Extra attributes to request.
    fn before_read(&self, _context: &ReadContext) -> Vec<String> {
        Vec::new()
    }

    /// Decides whether the result may be returned.
    fn after_read(&self, _context: &ReadContext, _result: &ResultSet) -> HookDecision {
        HookDecision::Allow
    }
}
