//! Collapsing domains to their registrable domain ("PSL domain").

use crate::core::canonical::canonicalize;
use crate::domain::model::{DomainKey, DomainSet};
use crate::domain::ports::PslOracle;

/// Public suffix list compiled into the `psl` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicSuffixList;

impl PslOracle for PublicSuffixList {
    fn registrable_domain<'a>(&self, domain: &'a str) -> Option<&'a str> {
        psl::domain_str(domain)
    }
}

pub struct PslReducer<'o, O: PslOracle + ?Sized> {
    oracle: &'o O,
}

impl<'o, O: PslOracle + ?Sized> PslReducer<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }

    /// `analytics.example.co.uk` -> `example.co.uk`. Names without a registrable
    /// part (bare public suffixes) are returned unchanged.
    pub fn reduce(&self, domain: &DomainKey) -> DomainKey {
        match self.oracle.registrable_domain(domain.as_str()) {
            Some(registrable) if registrable == domain.as_str() => domain.clone(),
            Some(registrable) => canonicalize(registrable).unwrap_or_else(|e| {
                tracing::warn!("Public suffix lookup for {} produced {}, keeping the full name", domain, e);
                domain.clone()
            }),
            None => domain.clone(),
        }
    }

    pub fn reduce_set(&self, domains: &DomainSet) -> DomainSet {
        domains.iter().map(|d| self.reduce(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> DomainKey {
        canonicalize(raw).unwrap()
    }

    #[test]
    fn test_reduce_to_registrable_domain() {
        let reducer = PslReducer::new(&PublicSuffixList);
        assert_eq!(reducer.reduce(&key("analytics.example.co.uk")), key("example.co.uk"));
        assert_eq!(reducer.reduce(&key("ads.tracker.example.com")), key("example.com"));
        assert_eq!(reducer.reduce(&key("example.com")), key("example.com"));
    }

    #[test]
    fn test_public_suffix_is_unchanged() {
        let reducer = PslReducer::new(&PublicSuffixList);
        assert_eq!(reducer.reduce(&key("co.uk")), key("co.uk"));
        assert_eq!(reducer.reduce(&key("com")), key("com"));
    }

    #[test]
    fn test_reduce_set_collapses_siblings() {
        let reducer = PslReducer::new(&PublicSuffixList);
        let domains: DomainSet = ["a.example.com", "b.example.com", "c.example.org"]
            .into_iter()
            .map(key)
            .collect();
        let reduced = reducer.reduce_set(&domains);
        assert_eq!(reduced.len(), 2);
        assert!(reduced.contains("example.com"));
        assert!(reduced.contains("example.org"));
    }

    struct FixedOracle;

    impl PslOracle for FixedOracle {
        fn registrable_domain<'a>(&self, domain: &'a str) -> Option<&'a str> {
            // Last two labels, whatever they are.
            let mut dots = domain.rmatch_indices('.');
            dots.next()?;
            match dots.next() {
                Some((idx, _)) => Some(&domain[idx + 1..]),
                None => Some(domain),
            }
        }
    }

    #[test]
    fn test_reducer_uses_supplied_oracle() {
        let reducer = PslReducer::new(&FixedOracle);
        assert_eq!(reducer.reduce(&key("x.y.internal.corp")), key("internal.corp"));
    }
}
