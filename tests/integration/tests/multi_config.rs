//! Multi-directory authentication integration tests.

use ds_client::{
    authenticate_first, AuthMode, DirectoryClient, DirectoryConfigSet, DirectoryEntry,
    DirectoryError, MemoryDirectory,
};
use pretty_assertions::assert_eq;

use crate::common::{self, ALICE_DN};

const CONFIGS: &str = r#"
[[directory]]
name = "partners"
base_dn = "dc=partners,dc=com"
user_query = "(mail=[username])"

[[directory]]
name = "example"
base_dn = "dc=example,dc=com"
user_query = "uid=[username],ou=people,dc=example,dc=com"
mode = "DIRECT"
"#;

fn partners() -> MemoryDirectory {
    MemoryDirectory::new().with_user(
        DirectoryEntry::new("cn=carol,dc=partners,dc=com")
            .with_attribute("mail", ["carol@partners.com"])
            .with_attribute("uid", ["carol"]),
        "pw",
    )
}

fn factory(
    config: &ds_client::DirectoryConfig,
) -> ds_client::DirectoryResult<DirectoryClient<MemoryDirectory>> {
    let transport = match config.name.as_str() {
        "partners" => partners(),
        _ => common::directory(),
    };
    DirectoryClient::new(config.clone(), transport)
}

/// Tests that the second directory is used when the first rejects the user.
#[test]
fn test_falls_through_to_second_directory() -> anyhow::Result<()> {
    common::init_tracing();
    let set = DirectoryConfigSet::from_toml_str(CONFIGS)?;

    let client = authenticate_first(
        &set.directories,
        factory,
        AuthMode::User,
        Some("alice"),
        Some("wonderland"),
    )?;

    assert_eq!(client.config().name, "example");
    assert_eq!(client.last_dn(), Some(ALICE_DN));
    Ok(())
}

/// Tests that the first directory wins when it accepts the user.
#[test]
fn test_first_directory_wins() -> anyhow::Result<()> {
    let set = DirectoryConfigSet::from_toml_str(CONFIGS)?;

    let client = authenticate_first(
        &set.directories,
        factory,
        AuthMode::User,
        Some("carol@partners.com"),
        Some("pw"),
    )?;

    assert_eq!(client.config().name, "partners");
    assert_eq!(client.last_dn(), Some("cn=carol,dc=partners,dc=com"));
    Ok(())
}

/// Tests that every per-directory failure is reported when all fail.
#[test]
fn test_all_directories_fail() -> anyhow::Result<()> {
    let set = DirectoryConfigSet::from_toml_str(CONFIGS)?;

    let Err(err) = authenticate_first(
        &set.directories,
        factory,
        AuthMode::User,
        Some("alice"),
        Some("wrong"),
    ) else {
        anyhow::bail!("authentication should fail");
    };

    let DirectoryError::Stacked(stacked) = &err else {
        anyhow::bail!("expected a stacked error, got {err}");
    };
    let names: Vec<&str> = stacked.failures().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["partners", "example"]);

    let codes: Vec<&str> = stacked.failures().iter().map(|(_, e)| e.code()).collect();
    assert_eq!(codes, vec!["user_not_found", "direct_bind_rejected"]);

    let message = err.to_string();
    assert!(message.starts_with("All 2 directory configurations failed"));
    assert!(!message.contains("wrong"));
    Ok(())
}
