//! Nested group discovery integration tests.

use std::collections::BTreeSet;

use ds_client::{AuthMode, DirectoryEntry, Operation};
use pretty_assertions::assert_eq;

use crate::common::{self, group_dn, ALICE_DN, BOB_DN};

fn dns(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| group_dn(n)).collect()
}

/// Tests that a user's nested groups are found, including a membership cycle.
#[test]
fn test_user_groups_after_login() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());
    client.authenticate(AuthMode::User, Some("alice"), Some("wonderland"))?;

    let dn = client.last_dn().map(str::to_string);
    assert_eq!(dn.as_deref(), Some(ALICE_DN));

    let groups = client.get_user_groups(ALICE_DN)?;
    assert_eq!(
        groups,
        dns(&["developers", "engineering", "staff", "everyone"])
    );
    Ok(())
}

/// Tests that one search is issued per level.
#[test]
fn test_one_search_per_level() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());

    let seeds = vec![group_dn("developers"), group_dn("ops")];
    let groups = client.recursive_groups(&seeds)?;

    assert_eq!(
        groups,
        dns(&["developers", "ops", "engineering", "staff", "everyone"])
    );
    // developers+ops, engineering, staff, everyone, staff again (already visited)
    assert_eq!(client.transport().count(Operation::Search), 5);

    let first = client.transport().search_filters()[0].to_string();
    assert!(first.starts_with("(|(distinguishedName="));
    Ok(())
}

/// Tests the depth limit and the reuse of a caller-owned visited set.
#[test]
fn test_depth_and_visited_threading() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());

    let mut visited = BTreeSet::new();
    client.get_recursive_groups(&[group_dn("ops")], 2, &mut visited, None, None)?;
    assert_eq!(visited, dns(&["ops", "engineering"]));

    // Groups already visited are not expanded again.
    client.transport_mut().clear_log();
    client.get_recursive_groups(&[group_dn("ops")], 0, &mut visited, None, None)?;
    assert_eq!(visited, dns(&["ops", "engineering"]));
    assert_eq!(client.transport().count(Operation::Search), 1);
    Ok(())
}

/// Tests group discovery with member and query attributes overridden.
#[test]
fn test_custom_group_attributes() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());
    client.transport_mut().insert(
        DirectoryEntry::new("cn=admins,ou=groups,dc=example,dc=com")
            .with_attribute("cn", ["admins"])
            .with_attribute("parentGroup", ["wheel"]),
    );
    client.transport_mut().insert(
        DirectoryEntry::new("cn=wheel,ou=groups,dc=example,dc=com")
            .with_attribute("cn", ["wheel"]),
    );

    let mut visited = BTreeSet::new();
    client.get_recursive_groups(
        &["admins".to_string()],
        0,
        &mut visited,
        Some("parentGroup"),
        Some("cn"),
    )?;

    assert_eq!(visited, dns(&["admins", "wheel"]));
    assert!(!visited.contains(BOB_DN));
    Ok(())
}
