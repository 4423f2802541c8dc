//! Attribute update integration tests.

use ds_client::{
    AttributeMap, AttributeValue, CategoryOutcome, ChangeCategory, DirectoryError, Operation,
    ProfileMapper,
};
use pretty_assertions::assert_eq;

use crate::common::{self, ALICE_DN, BOB_DN};

fn desired(pairs: &[(&str, AttributeValue)]) -> AttributeMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

/// Tests a profile edit round trip through the mapper.
#[test]
fn test_profile_update() -> anyhow::Result<()> {
    let (mut client, sink) = common::client(common::search_config());

    let mut profile = client.user_profile(ALICE_DN)?;
    assert_eq!(profile.email.as_deref(), Some("alice@example.com"));

    profile.full_name = Some("Alice Pleasance Liddell".to_string());
    profile.email = None;
    let attrs = ProfileMapper::new(client.config()).to_attributes(&profile);

    let report = client.make_changes(ALICE_DN, &attrs)?;
    assert_eq!(report.delete, CategoryOutcome::Applied { attributes: 1 });
    assert_eq!(report.add, CategoryOutcome::Skipped);
    assert_eq!(report.replace, CategoryOutcome::Applied { attributes: 1 });
    assert!(report.completed_at >= report.started_at);
    assert!(report.status.contains(ALICE_DN));

    let updated = client.user_profile(ALICE_DN)?;
    assert_eq!(updated.full_name.as_deref(), Some("Alice Pleasance Liddell"));
    assert_eq!(updated.email, None);
    assert_eq!(sink.codes(), vec!["update_applied", "update_applied"]);
    Ok(())
}

/// Tests that reordering a multi-valued attribute rewrites it as a whole.
#[test]
fn test_multi_valued_reorder() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());
    let first = desired(&[(
        "telephoneNumber",
        AttributeValue::from(vec!["+1 555 0100", "+1 555 0199"]),
    )]);
    client.make_changes(BOB_DN, &first)?;

    client.transport_mut().clear_log();
    let reordered = desired(&[(
        "telephoneNumber",
        AttributeValue::from(vec!["+1 555 0199", "+1 555 0100"]),
    )]);
    let report = client.make_changes(BOB_DN, &reordered)?;

    assert_eq!(report.delete, CategoryOutcome::Applied { attributes: 1 });
    assert_eq!(report.add, CategoryOutcome::Applied { attributes: 1 });
    assert_eq!(report.replace, CategoryOutcome::Skipped);
    assert_eq!(client.transport().count(Operation::Replace), 0);

    let entry = client.transport().entry(BOB_DN).expect("bob exists");
    assert_eq!(
        entry.get_attrs("telephoneNumber"),
        Some(&["+1 555 0199".to_string(), "+1 555 0100".to_string()][..])
    );

    // Applying the same state again writes nothing.
    let again = client.make_changes(BOB_DN, &reordered)?;
    assert!(again.is_noop());
    Ok(())
}

/// Tests that a failed category is reported without hiding the others.
#[test]
fn test_partial_failure_is_auditable() -> anyhow::Result<()> {
    let (mut client, sink) = common::client(common::search_config());
    client.transport_mut().set_failing(Operation::Delete, true);

    let changes = desired(&[
        ("mail", AttributeValue::empty()),
        ("title", AttributeValue::from("Rabbit chaser")),
    ]);
    let err = client.make_changes(ALICE_DN, &changes).unwrap_err();

    let DirectoryError::CommitFailed(report) = err else {
        anyhow::bail!("expected CommitFailed");
    };
    assert_eq!(report.failed_categories(), vec![ChangeCategory::Delete]);
    assert_eq!(report.add, CategoryOutcome::Applied { attributes: 1 });
    assert_eq!(sink.codes(), vec!["update_failed", "update_applied"]);

    let entry = client.transport().entry(ALICE_DN).expect("alice exists");
    assert_eq!(entry.get_attr("title"), Some("Rabbit chaser"));
    assert_eq!(entry.get_attr("mail"), Some("alice@example.com"));
    Ok(())
}

/// Tests that writes to a missing entry fail before anything is written.
#[test]
fn test_missing_entry() -> anyhow::Result<()> {
    let (mut client, _) = common::client(common::search_config());

    let changes = desired(&[("cn", AttributeValue::from("Nobody"))]);
    let err = client
        .make_changes("uid=nobody,ou=people,dc=example,dc=com", &changes)
        .unwrap_err();

    assert!(err.is_directory_error());
    assert_eq!(client.transport().count(Operation::Replace), 0);
    Ok(())
}
