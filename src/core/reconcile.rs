//! Merging remote rules with the local allow and block lists.
//!
//! Precedence, lowest to highest: remote sources, the allow-list, the local
//! block-list. With `collapse_to_psl` remote rules are first widened to their
//! registrable domain, then narrowed again wherever the allow-list needs it:
//!
//! 1. collapse every remote rule to its registrable domain;
//! 2. drop collapsed rules that are allow-listed, or that are the registrable
//!    domain of an allow-listed name;
//! 3. re-add each original remote hostname that is neither allow-listed nor
//!    covered by a surviving collapsed rule.
//!
//! After that (and without collapsing) exact allow-list matches are removed,
//! the local block-list is added on top, and redundant descendants are pruned.

use crate::core::prune::prune_redundant_rules;
use crate::core::psl::PslReducer;
use crate::domain::model::{
    DomainKey, DomainSet, ReconciliationInput, ReconciliationResult, StageCounts,
};
use crate::domain::ports::PslOracle;

pub struct Reconciler<'o, O: PslOracle + ?Sized> {
    reducer: PslReducer<'o, O>,
}

impl<'o, O: PslOracle + ?Sized> Reconciler<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self {
            reducer: PslReducer::new(oracle),
        }
    }

    pub fn reconcile(&self, input: &ReconciliationInput) -> ReconciliationResult {
        let mut stages = StageCounts {
            remote: input.remote.len(),
            rejected: input.rejected,
            ..StageCounts::default()
        };

        // `input.remote` stays untouched for the re-addition pass.
        let mut working = input.remote.clone();

        if input.collapse_to_psl {
            working = self.reducer.reduce_set(&working);
            stages.collapsed = Some(working.len());
            tracing::info!(
                "{} blacklisted domains left after stripping to PSL domains.",
                working.len()
            );

            working.retain(|domain| !input.allow.contains(domain));

            for allowed in &input.allow {
                let registrable = self.reducer.reduce(allowed);
                if working.remove(&registrable) {
                    tracing::debug!(
                        "Unblocking {} so that allow-listed {} is reachable",
                        registrable,
                        allowed
                    );
                }
            }

            for original in &input.remote {
                if input.allow.contains(original) || working.contains(original) {
                    continue;
                }
                let registrable = self.reducer.reduce(original);
                if !working.contains(&registrable) {
                    tracing::debug!("Re-adding: {}", original);
                    working.insert(original.clone());
                    stages.readded += 1;
                }
            }
            tracing::info!(
                "{} blacklisted domains after re-adding {} non-allow-listed subdomains",
                working.len(),
                stages.readded
            );
        }

        working.retain(|domain| !input.allow.contains(domain));
        stages.after_allow = working.len();
        tracing::info!(
            "{} blacklisted domains after subtracting the {} allow-listed domains",
            working.len(),
            input.allow.len()
        );

        if !input.block.is_empty() {
            tracing::info!(
                "Re-adding {} domains from the local block list to override the allow list.",
                input.block.len()
            );
            working.extend(input.block.iter().cloned());
        }
        stages.after_block = working.len();

        // Every member is a DomainKey, so the merged set is valid by construction.
        stages.pruned = prune_redundant_rules(&mut working);
        stages.final_count = working.len();
        tracing::info!(
            "{} blacklisted domains after removing {} redundant rules.",
            working.len(),
            stages.pruned
        );

        let shadowed_allow = self.shadowed_allow(input, &working);

        ReconciliationResult {
            domains: working,
            stages,
            shadowed_allow,
        }
    }

    /// Allow-listed names that stay blocked because they, or one of their
    /// ancestors, are in the result.
    fn shadowed_allow(&self, input: &ReconciliationInput, result: &DomainSet) -> Vec<DomainKey> {
        let mut shadowed: Vec<(&DomainKey, &str)> = input
            .allow
            .iter()
            .filter_map(|allowed| covering_rule(allowed, result).map(|rule| (allowed, rule)))
            .collect();
        shadowed.sort();

        for (allowed, rule) in &shadowed {
            let origin = if input.block.contains(*rule) {
                "the local block list"
            } else if input.remote.contains(*rule) {
                "a remote source"
            } else {
                "a remote source collapsed to its registrable domain"
            };
            tracing::warn!(
                "{} is allow-listed but stays blocked by the rule for {} from {}.",
                allowed,
                rule,
                origin
            );
        }
        shadowed.into_iter().map(|(allowed, _)| allowed.clone()).collect()
    }
}

/// The rule in `result` that blocks `domain`: the domain itself or its closest ancestor.
pub fn covering_rule<'r>(domain: &DomainKey, result: &'r DomainSet) -> Option<&'r str> {
    if let Some(rule) = result.get(domain.as_str()) {
        return Some(rule.as_str());
    }
    // `ancestors` yields the TLD first, so the last hit is the closest one.
    domain
        .ancestors()
        .filter_map(|ancestor| result.get(ancestor))
        .last()
        .map(|rule| rule.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::canonical::canonicalize;
    use crate::core::psl::PublicSuffixList;

    fn set(domains: &[&str]) -> DomainSet {
        domains.iter().map(|d| canonicalize(d).unwrap()).collect()
    }

    fn input(remote: &[&str], allow: &[&str], block: &[&str], collapse: bool) -> ReconciliationInput {
        ReconciliationInput {
            remote: set(remote),
            allow: set(allow),
            block: set(block),
            collapse_to_psl: collapse,
            rejected: 0,
        }
    }

    fn reconcile(input: &ReconciliationInput) -> ReconciliationResult {
        Reconciler::new(&PublicSuffixList).reconcile(input)
    }

    #[test]
    fn test_remote_plus_local_block() {
        let result = reconcile(&input(&["a.b.com", "c.b.com"], &[], &["z.com"], false));
        assert_eq!(result.domains, set(&["a.b.com", "c.b.com", "z.com"]));
        assert_eq!(result.stages.remote, 2);
        assert_eq!(result.stages.after_block, 3);
        assert_eq!(result.stages.final_count, 3);
        assert_eq!(result.stages.collapsed, None);
    }

    #[test]
    fn test_allow_beats_remote() {
        let result = reconcile(&input(&["ads.example.com", "cdn.example.com"], &["cdn.example.com"], &[], false));
        assert_eq!(result.domains, set(&["ads.example.com"]));
    }

    #[test]
    fn test_local_block_beats_allow() {
        let result = reconcile(&input(
            &["ads.example.com"],
            &["ads.example.com", "mine.example.org"],
            &["mine.example.org"],
            false,
        ));
        assert_eq!(result.domains, set(&["mine.example.org"]));
    }

    #[test]
    fn test_allow_is_exact_match_without_collapse() {
        let result = reconcile(&input(&["ads.example.com"], &["example.com"], &[], false));
        assert_eq!(result.domains, set(&["ads.example.com"]));
    }

    #[test]
    fn test_collapse_without_allow_blocks_registrable_domain() {
        let result = reconcile(&input(&["ads.tracker.example.com"], &[], &[], true));
        assert_eq!(result.domains, set(&["example.com"]));
        assert_eq!(result.stages.collapsed, Some(1));
        assert_eq!(result.stages.readded, 0);
    }

    #[test]
    fn test_collapse_with_allow_override_readds_specific_host() {
        let result = reconcile(&input(&["ads.tracker.example.com"], &["tracker.example.com"], &[], true));
        assert!(!result.domains.contains("example.com"));
        assert_eq!(result.domains, set(&["ads.tracker.example.com"]));
        assert_eq!(result.stages.readded, 1);
        assert!(result.shadowed_allow.is_empty());
    }

    #[test]
    fn test_collapse_merges_siblings_and_prunes() {
        let result = reconcile(&input(
            &["a.ads.net", "b.ads.net", "x.analytics.co.uk", "ads.net"],
            &[],
            &[],
            true,
        ));
        assert_eq!(result.domains, set(&["ads.net", "analytics.co.uk"]));
        assert_eq!(result.stages.collapsed, Some(2));
    }

    #[test]
    fn test_collapse_never_readds_allow_listed_host() {
        let result = reconcile(&input(
            &["api.example.com", "ads.example.com"],
            &["api.example.com"],
            &[],
            true,
        ));
        assert_eq!(result.domains, set(&["ads.example.com"]));
    }

    #[test]
    fn test_collapse_allow_of_registrable_domain_itself() {
        let result = reconcile(&input(&["ads.example.com"], &["example.com"], &[], true));
        assert_eq!(result.domains, set(&["ads.example.com"]));
    }

    #[test]
    fn test_local_block_of_ancestor_reports_shadowed_allow() {
        let result = reconcile(&input(&[], &["www.example.com"], &["example.com"], false));
        assert_eq!(result.domains, set(&["example.com"]));
        assert_eq!(result.shadowed_allow, vec![canonicalize("www.example.com").unwrap()]);
    }

    #[test]
    fn test_remote_ancestor_shadows_allow_entry() {
        let result = reconcile(&input(&["example.com"], &["www.example.com"], &[], false));
        assert_eq!(result.domains, set(&["example.com"]));
        assert_eq!(result.shadowed_allow, vec![canonicalize("www.example.com").unwrap()]);
    }

    #[test]
    fn test_covering_rule_is_the_closest_ancestor() {
        let result = set(&["com", "tracker.example.com", "mine.example.org"]);
        let key = |d: &str| canonicalize(d).unwrap();

        assert_eq!(covering_rule(&key("ads.tracker.example.com"), &result), Some("tracker.example.com"));
        assert_eq!(covering_rule(&key("www.example.com"), &result), Some("com"));
        assert_eq!(covering_rule(&key("mine.example.org"), &result), Some("mine.example.org"));
        assert_eq!(covering_rule(&key("example.org"), &result), None);
    }

    #[test]
    fn test_local_block_entries_always_survive_as_or_under_a_rule() {
        let block = ["ads.example.com", "example.net", "deep.sub.example.org"];
        let allow = ["ads.example.com", "example.net", "sub.example.org"];
        for collapse in [false, true] {
            let result = reconcile(&input(&["x.example.org", "example.net"], &allow, &block, collapse));
            for blocked in block {
                let key = canonicalize(blocked).unwrap();
                let covered = result.domains.contains(&key)
                    || key.ancestors().any(|a| result.domains.contains(a));
                assert!(covered, "{blocked} lost (collapse={collapse})");
            }
        }
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let original = input(&["a.tracker.com", "b.tracker.com"], &["b.tracker.com"], &[], true);
        let copy = original.clone();
        reconcile(&original);
        assert_eq!(original.remote, copy.remote);
        assert_eq!(original.allow, copy.allow);
    }
}
