//! Common test utilities and fixtures.

use std::sync::{Arc, Mutex};

use ds_client::{
    AuditEvent, AuditSink, DirectoryClient, DirectoryConfig, DirectoryEntry, MemoryDirectory,
    ResolveMode,
};

pub const BASE_DN: &str = "dc=example,dc=com";
pub const PEOPLE_DN: &str = "ou=people,dc=example,dc=com";
pub const GROUPS_DN: &str = "ou=groups,dc=example,dc=com";

pub const ALICE_DN: &str = "uid=alice,ou=people,dc=example,dc=com";
pub const BOB_DN: &str = "uid=bob,ou=people,dc=example,dc=com";

/// Returns the DN of group `cn` below [`GROUPS_DN`].
pub fn group_dn(cn: &str) -> String {
    format!("cn={cn},{GROUPS_DN}")
}

/// Initialises test logging once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("ds_client=debug")
        .with_test_writer()
        .try_init();
}

/// Audit sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    /// Codes of the recorded events, oldest first.
    pub fn codes(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.code).collect())
            .unwrap_or_default()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// The example organisation.
///
/// Group nesting: `developers` and `ops` are in `engineering`, which is in
/// `staff`; `staff` and `everyone` contain each other.
pub fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user(
            DirectoryEntry::new(ALICE_DN)
                .with_attribute("objectClass", ["inetOrgPerson"])
                .with_attribute("uid", ["alice"])
                .with_attribute("cn", ["Alice Liddell"])
                .with_attribute("mail", ["alice@example.com"])
                .with_attribute("memberOf", [group_dn("developers")]),
            "wonderland",
        )
        .with_user(
            DirectoryEntry::new(BOB_DN)
                .with_attribute("objectClass", ["inetOrgPerson"])
                .with_attribute("uid", ["bob"])
                .with_attribute("cn", ["Bob Builder"])
                .with_attribute("memberOf", [group_dn("ops")]),
            "canwefixit",
        )
        .with_entry(
            DirectoryEntry::new(group_dn("developers"))
                .with_attribute("memberOf", [group_dn("engineering")]),
        )
        .with_entry(
            DirectoryEntry::new(group_dn("ops"))
                .with_attribute("memberOf", [group_dn("engineering")]),
        )
        .with_entry(
            DirectoryEntry::new(group_dn("engineering"))
                .with_attribute("memberOf", [group_dn("staff")]),
        )
        .with_entry(
            DirectoryEntry::new(group_dn("staff"))
                .with_attribute("memberOf", [group_dn("everyone")]),
        )
        .with_entry(
            DirectoryEntry::new(group_dn("everyone"))
                .with_attribute("memberOf", [group_dn("staff")]),
        )
}

/// Search-mode configuration for the example organisation.
pub fn search_config() -> DirectoryConfig {
    DirectoryConfig::from_toml_str(&format!(
        r#"
        name = "example"
        base_dn = "{BASE_DN}"
        user_query = "(&(objectClass=inetOrgPerson)(uid=[username]))"
        all_users_filter = "(objectClass=inetOrgPerson)"
        group_base_dn = "{GROUPS_DN}"
        "#
    ))
    .expect("valid search config")
}

/// Direct-mode configuration for the example organisation.
pub fn direct_config() -> DirectoryConfig {
    DirectoryConfig::builder()
        .name("example-direct")
        .base_dn(BASE_DN)
        .user_query(format!("uid=[username],{PEOPLE_DN}"))
        .mode(ResolveMode::Direct)
        .build()
        .expect("valid direct config")
}

/// A client over [`directory`] with a recording audit sink.
pub fn client(config: DirectoryConfig) -> (DirectoryClient<MemoryDirectory>, Arc<RecordingSink>) {
    init_tracing();
    tracing::debug!(directory = %config.name, mode = ?config.mode, "Creating test client");
    let sink = Arc::new(RecordingSink::default());
    let client = DirectoryClient::new(config, directory())
        .expect("valid client")
        .with_audit_sink(sink.clone());
    (client, sink)
}
