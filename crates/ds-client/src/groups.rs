//! Nested group discovery.
//!
//! Directories such as Active Directory store only direct memberships.
//! [`GroupRecursionEngine`] follows `memberOf`-style attributes outwards
//! from a set of seed DNs, one OR-batched search per nesting level.

use std::collections::BTreeSet;

use crate::config::DirectoryConfig;
use crate::error::DirectoryResult;
use crate::escape::escape_filter_value;
use crate::session::Session;
use crate::transport::DirectoryTransport;

/// Walks the group graph below one search base.
#[derive(Debug, Clone, Copy)]
pub struct GroupRecursionEngine<'a> {
    base_dn: &'a str,
    member_attribute: &'a str,
    query_attribute: &'a str,
}

impl<'a> GroupRecursionEngine<'a> {
    /// Creates an engine.
    ///
    /// `query_attribute` is matched against seed DNs; `member_attribute`
    /// of each hit supplies the next level's seeds.
    #[must_use]
    pub const fn new(
        base_dn: &'a str,
        member_attribute: &'a str,
        query_attribute: &'a str,
    ) -> Self {
        Self {
            base_dn,
            member_attribute,
            query_attribute,
        }
    }

    /// Creates an engine from the group settings of `config`.
    #[must_use]
    pub fn from_config(config: &'a DirectoryConfig) -> Self {
        Self::new(
            config.group_search_base(),
            &config.group_member_attribute,
            &config.group_query_attribute,
        )
    }

    /// OR filter matching every seed, or `None` without seeds.
    #[must_use]
    pub fn filter_for<S: AsRef<str>>(&self, seeds: &[S]) -> Option<String> {
        let terms: Vec<String> = seeds
            .iter()
            .map(|dn| {
                format!(
                    "({}={})",
                    self.query_attribute,
                    escape_filter_value(dn.as_ref())
                )
            })
            .collect();

        match terms.len() {
            0 => None,
            1 => terms.into_iter().next(),
            _ => Some(format!("(|{})", terms.concat())),
        }
    }

    /// Adds every group reachable from `seeds` within `max_depth` levels to
    /// `visited`.
    ///
    /// A `max_depth` of `0` means unlimited. Seeds are only added when a
    /// search returns them. DNs already in `visited` are not expanded again,
    /// which bounds the walk on cyclic graphs.
    pub fn recurse<T: DirectoryTransport>(
        &self,
        session: &mut Session<T>,
        seeds: &[String],
        max_depth: u32,
        visited: &mut BTreeSet<String>,
    ) -> DirectoryResult<()> {
        let mut remaining = (max_depth > 0).then_some(max_depth);
        let mut seeds: Vec<String> = seeds.to_vec();
        let mut level = 0u32;

        loop {
            if let Some(depth) = remaining.as_mut() {
                *depth -= 1;
            }
            let Some(filter) = self.filter_for(&seeds) else {
                return Ok(());
            };
            level += 1;

            let result = session.search(self.base_dn, &filter, &[self.member_attribute])?;

            let mut next: Vec<String> = Vec::new();
            let mut discovered = 0usize;
            for entry in result.entries() {
                let Some(dn) = entry.dn.as_deref().filter(|d| !d.is_empty()) else {
                    continue;
                };
                if !visited.insert(dn.to_string()) {
                    continue;
                }
                discovered += 1;
                for parent in entry.get_attrs(self.member_attribute).unwrap_or_default() {
                    if !parent.is_empty() && !next.contains(parent) {
                        next.push(parent.clone());
                    }
                }
            }

            tracing::debug!(
                level,
                seeds = seeds.len(),
                discovered,
                next = next.len(),
                "Group level searched"
            );

            if next.is_empty() || remaining == Some(0) {
                return Ok(());
            }
            seeds = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;
    use crate::memory::{MemoryDirectory, Operation};
    use crate::search::DirectoryEntry;

    const BASE: &str = "dc=test";

    fn group(dn: &str, parents: &[&str]) -> DirectoryEntry {
        let entry = DirectoryEntry::new(dn);
        if parents.is_empty() {
            entry
        } else {
            entry.with_attribute("memberOf", parents.iter().copied())
        }
    }

    fn engine() -> GroupRecursionEngine<'static> {
        GroupRecursionEngine::new(BASE, "memberOf", "distinguishedName")
    }

    fn seeds(dns: &[&str]) -> Vec<String> {
        dns.iter().map(|s| (*s).to_string()).collect()
    }

    fn session(entries: Vec<DirectoryEntry>) -> Session<MemoryDirectory> {
        let directory = entries
            .into_iter()
            .fold(MemoryDirectory::new(), MemoryDirectory::with_entry);
        Session::new(directory)
    }

    #[test]
    fn filter_shapes() {
        let engine = engine();
        assert_eq!(engine.filter_for::<String>(&[]), None);
        assert_eq!(
            engine.filter_for(&["cn=a,dc=test"]).as_deref(),
            Some("(distinguishedName=cn=a,dc=test)")
        );
        assert_eq!(
            engine.filter_for(&["cn=a", "cn=(b)"]).as_deref(),
            Some("(|(distinguishedName=cn=a)(distinguishedName=cn=\\28b\\29))")
        );
    }

    #[test]
    fn empty_seeds_leave_visited_alone() {
        let mut session = session(vec![group("cn=x,dc=test", &[])]);
        let mut visited = BTreeSet::from(["cn=x,dc=test".to_string()]);

        engine().recurse(&mut session, &[], 5, &mut visited).unwrap();

        assert_eq!(visited.len(), 1);
        assert_eq!(session.transport().count(Operation::Search), 0);
    }

    #[test]
    fn two_level_scenario_distinguishes_seeds_from_visited() {
        let mut session = session(vec![
            group("cn=B,dc=test", &["cn=A,dc=test", "cn=C,dc=test"]),
            group("cn=C,dc=test", &[]),
        ]);
        let mut visited = BTreeSet::new();

        engine()
            .recurse(&mut session, &seeds(&["cn=B,dc=test"]), 2, &mut visited)
            .unwrap();

        assert_eq!(
            visited,
            BTreeSet::from(["cn=B,dc=test".to_string(), "cn=C,dc=test".to_string()])
        );
        let filters = session.transport().search_filters();
        assert_eq!(filters.len(), 2);
        assert_eq!(
            filters[1],
            "(|(distinguishedName=cn=A,dc=test)(distinguishedName=cn=C,dc=test))"
        );
    }

    #[test]
    fn seeds_are_not_visited_unless_returned() {
        let mut session = session(vec![group("cn=B,dc=test", &["cn=A,dc=test"])]);
        let mut visited = BTreeSet::new();

        engine()
            .recurse(&mut session, &seeds(&["cn=A,dc=test"]), 2, &mut visited)
            .unwrap();

        assert!(visited.is_empty());
    }

    #[test]
    fn depth_limits_search_count() {
        // g1 -> g2 -> g3 -> g4
        let entries = vec![
            group("cn=g1,dc=test", &["cn=g2,dc=test"]),
            group("cn=g2,dc=test", &["cn=g3,dc=test"]),
            group("cn=g3,dc=test", &["cn=g4,dc=test"]),
            group("cn=g4,dc=test", &[]),
        ];

        let mut one = session(entries.clone());
        let mut visited = BTreeSet::new();
        engine()
            .recurse(&mut one, &seeds(&["cn=g1,dc=test"]), 1, &mut visited)
            .unwrap();
        assert_eq!(one.transport().count(Operation::Search), 1);
        assert_eq!(visited.len(), 1);

        let mut two = session(entries.clone());
        let mut visited = BTreeSet::new();
        engine()
            .recurse(&mut two, &seeds(&["cn=g1,dc=test"]), 2, &mut visited)
            .unwrap();
        assert_eq!(two.transport().count(Operation::Search), 2);
        assert_eq!(visited.len(), 2);

        let mut unlimited = session(entries);
        let mut visited = BTreeSet::new();
        engine()
            .recurse(&mut unlimited, &seeds(&["cn=g1,dc=test"]), 0, &mut visited)
            .unwrap();
        assert_eq!(visited.len(), 4);
        assert_eq!(unlimited.transport().count(Operation::Search), 4);
    }

    #[test]
    fn cycles_terminate() {
        let mut session = session(vec![
            group("cn=a,dc=test", &["cn=b,dc=test"]),
            group("cn=b,dc=test", &["cn=a,dc=test"]),
            group("cn=self,dc=test", &["cn=self,dc=test"]),
        ]);
        let mut visited = BTreeSet::new();

        engine()
            .recurse(
                &mut session,
                &seeds(&["cn=a,dc=test", "cn=self,dc=test"]),
                0,
                &mut visited,
            )
            .unwrap();

        assert_eq!(visited.len(), 3);
    }

    #[test]
    fn search_failure_propagates() {
        let mut session = Session::new(MemoryDirectory::new().failing(Operation::Search));
        let mut visited = BTreeSet::new();

        let err = engine()
            .recurse(&mut session, &seeds(&["cn=a,dc=test"]), 3, &mut visited)
            .unwrap_err();
        assert!(err.is_directory_error());
    }

    fn reachable(edges: &BTreeMap<usize, Vec<usize>>, start: usize, depth: u32) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut frontier = vec![start];
        let mut level = 0;
        while !frontier.is_empty() && (depth == 0 || level < depth) {
            level += 1;
            let mut next = Vec::new();
            for node in frontier {
                if seen.insert(node) {
                    next.extend(edges.get(&node).into_iter().flatten().copied());
                }
            }
            frontier = next;
        }
        seen
    }

    proptest! {
        #[test]
        fn random_graphs_terminate_without_duplicates(
            edges in proptest::collection::vec((0usize..8, 0usize..8), 0..24),
            depth in 0u32..5,
        ) {
            let dn = |n: usize| format!("cn=g{n},dc=test");
            let mut graph: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for (from, to) in &edges {
                let targets = graph.entry(*from).or_default();
                if !targets.contains(to) {
                    targets.push(*to);
                }
            }
            let entries: Vec<DirectoryEntry> = (0..8)
                .map(|n| {
                    let parents: Vec<String> =
                        graph.get(&n).into_iter().flatten().map(|p| dn(*p)).collect();
                    let entry = DirectoryEntry::new(dn(n));
                    if parents.is_empty() {
                        entry
                    } else {
                        entry.with_attribute("memberOf", parents)
                    }
                })
                .collect();

            let mut session = session(entries);
            let mut visited = BTreeSet::new();
            engine().recurse(&mut session, &[dn(0)], depth, &mut visited).unwrap();

            let expected: BTreeSet<String> =
                reachable(&graph, 0, depth).into_iter().map(dn).collect();
            prop_assert_eq!(visited, expected);
            prop_assert!(session.transport().count(Operation::Search) <= 9);
        }
    }
}
