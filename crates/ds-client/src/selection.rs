//! Authentication across several directories.
//!
//! Configurations are tried in order. The first client that authenticates
//! is returned and earlier failures are discarded; if every configuration
//! fails, all failures are raised together as [`StackedError`].

use crate::client::{AuthMode, DirectoryClient};
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult, StackedError};
use crate::transport::DirectoryTransport;

/// Returns the first client that authenticates `username`.
///
/// `factory` builds a client for one configuration; a factory error counts
/// as that configuration's failure.
///
/// ## Errors
///
/// - `Configuration` if `configs` is empty
/// - `Stacked` with one failure per configuration if none succeeded
pub fn authenticate_first<T, F>(
    configs: &[DirectoryConfig],
    mut factory: F,
    mode: AuthMode,
    username: Option<&str>,
    password: Option<&str>,
) -> DirectoryResult<DirectoryClient<T>>
where
    T: DirectoryTransport,
    F: FnMut(&DirectoryConfig) -> DirectoryResult<DirectoryClient<T>>,
{
    if configs.is_empty() {
        return Err(DirectoryError::config("no directory configurations given"));
    }

    let mut failures = StackedError::new();
    for config in configs {
        let attempt = factory(config).and_then(|mut client| {
            client.authenticate(mode, username, password)?;
            Ok(client)
        });

        match attempt {
            Ok(client) => {
                tracing::debug!(
                    directory = %config.name,
                    skipped = failures.len(),
                    "Authenticated against directory"
                );
                return Ok(client);
            }
            Err(e) => {
                tracing::debug!(
                    directory = %config.name,
                    error = %e,
                    "Directory rejected authentication"
                );
                failures.push(config.name.clone(), e);
            }
        }
    }

    Err(failures.into())
}
