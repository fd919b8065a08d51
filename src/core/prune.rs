use crate::domain::model::DomainSet;

/// Drops every domain that has a strict ancestor in the set (`a.example.com`
/// is redundant next to `example.com`). Membership is checked against the set
/// as it was before pruning, so the result does not depend on iteration order.
///
/// Returns the number of rules removed.
pub fn prune_redundant_rules(domains: &mut DomainSet) -> usize {
    let snapshot = domains.clone();
    let before = domains.len();

    domains.retain(|domain| {
        match domain.ancestors().find(|ancestor| snapshot.contains(*ancestor)) {
            Some(ancestor) => {
                tracing::debug!(
                    "Removing {} because its parent domain {} is already blocked",
                    domain,
                    ancestor
                );
                false
            }
            None => true,
        }
    });

    before - domains.len()
}
