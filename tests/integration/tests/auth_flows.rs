//! Authentication flow integration tests.

use ds_client::{
    AuthMode, BindState, DirectoryError, InvalidUserReason, Operation, UnverifiedDirectPolicy,
};
use pretty_assertions::assert_eq;

use crate::common::{self, ALICE_DN, BOB_DN};

/// Tests a search-mode login end-to-end.
#[test]
fn test_search_mode_login() -> anyhow::Result<()> {
    let (mut client, sink) = common::client(common::search_config());

    let state = client.authenticate(AuthMode::User, Some("alice"), Some("wonderland"))?;

    assert_eq!(state, BindState::User);
    assert_eq!(client.last_dn(), Some(ALICE_DN));

    let ops: Vec<Operation> = client
        .transport()
        .operations()
        .iter()
        .map(|o| o.operation)
        .collect();
    assert_eq!(ops, vec![Operation::ProxyBind, Operation::Search, Operation::Bind]);
    assert!(sink.codes().is_empty());
    Ok(())
}

/// Tests that a wrong password is reported distinctly and audited.
#[test]
fn test_search_mode_wrong_password() -> anyhow::Result<()> {
    let (mut client, sink) = common::client(common::search_config());

    let err = client
        .authenticate(AuthMode::User, Some("alice"), Some("alice"))
        .unwrap_err();

    assert_eq!(
        err.invalid_user_reason(),
        Some(InvalidUserReason::SearchBindRejected)
    );
    assert_eq!(client.bind_state(), BindState::None);
    assert_eq!(client.last_dn(), None);
    assert_eq!(sink.codes(), vec!["search_bind_rejected"]);
    Ok(())
}

/// Tests that filter metacharacters in usernames cannot widen the search.
#[test]
fn test_filter_injection_is_escaped() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());

    let err = client
        .authenticate(AuthMode::None, Some("*"), None)
        .unwrap_err();

    assert_eq!(err.invalid_user_reason(), Some(InvalidUserReason::NotFound));
    let filters = client.transport().search_filters();
    assert_eq!(
        filters,
        vec!["(&(objectClass=inetOrgPerson)(uid=\\2a))"]
    );
    Ok(())
}

/// Tests a direct-mode login and the unauthenticated existence check.
#[test]
fn test_direct_mode_flows() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::direct_config());

    client.authenticate(AuthMode::User, Some("bob"), Some("canwefixit"))?;
    assert_eq!(client.last_dn(), Some(BOB_DN));
    assert_eq!(client.transport().count(Operation::Search), 0);

    let state = client.authenticate(AuthMode::None, Some("alice"), None)?;
    assert_eq!(state, BindState::Proxy);
    assert_eq!(client.last_dn(), Some(ALICE_DN));

    let err = client
        .authenticate(AuthMode::None, Some("mallory"), None)
        .unwrap_err();
    assert_eq!(
        err.invalid_user_reason(),
        Some(InvalidUserReason::ExistenceUnverifiable)
    );
    Ok(())
}

/// Tests the fail-open and fail-closed behaviour without a proxy account.
#[test]
fn test_direct_mode_without_proxy() -> anyhow::Result<()> {
    let (mut client, sink) = common::client(common::direct_config());
    client.transport_mut().set_proxy_available(false);

    client.authenticate(AuthMode::None, Some("mallory"), None)?;
    assert_eq!(
        client.last_dn(),
        Some("uid=mallory,ou=people,dc=example,dc=com")
    );
    assert_eq!(sink.codes(), vec!["unverified_dn_trusted"]);

    let mut config = common::direct_config();
    config.unverified_direct_policy = UnverifiedDirectPolicy::FailClosed;
    let (mut strict, _) = common::client(config);
    strict.transport_mut().set_proxy_available(false);

    let err = strict
        .authenticate(AuthMode::None, Some("mallory"), None)
        .unwrap_err();
    assert!(matches!(
        err,
        DirectoryError::InvalidUser {
            reason: InvalidUserReason::ExistenceUnverifiable,
            ..
        }
    ));
    Ok(())
}

/// Tests that every bind attempt starts from an unbound state.
#[test]
fn test_bind_state_transitions() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());
    assert_eq!(client.bind_state(), BindState::None);

    assert!(client.proxy_bind());
    assert_eq!(client.bind_state(), BindState::Proxy);

    assert!(client.bind(Some(BOB_DN), Some("canwefixit")));
    assert_eq!(client.bind_state(), BindState::User);

    assert!(!client.bind(Some(BOB_DN), Some("")));
    assert_eq!(client.bind_state(), BindState::None);

    client.transport_mut().set_failing(Operation::ProxyBind, true);
    let err = client.authenticate(AuthMode::Proxy, None, None).unwrap_err();
    assert_eq!(
        err.invalid_user_reason(),
        Some(InvalidUserReason::AuthenticationFailed)
    );
    assert_eq!(client.bind_state(), BindState::None);
    Ok(())
}
