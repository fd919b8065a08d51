use crate::domain::model::{DomainKey, DomainSet};

/// Orders domains by their labels read from the TLD inward, so everything under
/// one TLD, and then one registrable domain, ends up adjacent.
pub fn group_by_tld(domains: &DomainSet) -> Vec<DomainKey> {
    let mut ordered: Vec<DomainKey> = domains.iter().cloned().collect();
    ordered.sort_by(|a, b| a.labels().rev().cmp(b.labels().rev()));
    ordered
}
