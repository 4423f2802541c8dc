//! End-to-End Integration Tests
//!
//! These tests drive `DirectoryClient` against an in-memory directory
//! seeded with a small organisation: people, nested groups and a service
//! account.

mod common;
mod auth_flows;
mod group_recursion;
mod attribute_changes;
mod multi_config;
