//! Domain canonicalization.
//!
//! Every domain that enters the engine goes through [`canonicalize`], so two
//! spellings of the same name (case, stray dots, Unicode vs punycode) compare
//! equal as [`DomainKey`]s.

use crate::domain::model::DomainKey;
use crate::utils::error::{InvalidDomain, InvalidDomainReason};
use idna::uts46::{AsciiDenyList, DnsLength, Hyphens, Uts46};
use std::str::FromStr;

/// Everything before the first `#`.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Letters, digits, `-` and `_` (service labels such as `_dmarc`). Anything
/// else could change the meaning of a rendered dnsmasq line.
fn is_label_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn join_labels(name: &str) -> String {
    name.split('.')
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

pub fn canonicalize(raw: &str) -> Result<DomainKey, InvalidDomain> {
    let name = strip_comment(raw).trim();
    let joined = join_labels(name);

    if joined.is_empty() {
        return Err(InvalidDomain::new(raw, InvalidDomainReason::Empty));
    }
    if joined.chars().any(char::is_whitespace) {
        return Err(InvalidDomain::new(raw, InvalidDomainReason::Whitespace));
    }

    let lowered = joined.to_lowercase();
    let ascii = Uts46::new()
        .to_ascii(
            lowered.as_bytes(),
            AsciiDenyList::URL,
            Hyphens::Allow,
            DnsLength::Ignore,
        )
        .map_err(|_| InvalidDomain::new(raw, InvalidDomainReason::Idna))?;

    // UTS 46 maps some Unicode full stops to '.', which can reintroduce empty labels.
    let ascii = join_labels(&ascii);
    if ascii.is_empty() {
        return Err(InvalidDomain::new(raw, InvalidDomainReason::Empty));
    }
    if ascii.chars().any(char::is_whitespace) {
        return Err(InvalidDomain::new(raw, InvalidDomainReason::Whitespace));
    }
    if !ascii.bytes().all(|b| b == b'.' || is_label_byte(b)) {
        return Err(InvalidDomain::new(raw, InvalidDomainReason::Idna));
    }

    Ok(DomainKey::from_canonical(ascii))
}

pub fn canonicalize_bytes(raw: &[u8]) -> Result<DomainKey, InvalidDomain> {
    match std::str::from_utf8(raw) {
        Ok(text) => canonicalize(text),
        Err(_) => Err(InvalidDomain::new(
            String::from_utf8_lossy(raw),
            InvalidDomainReason::NotUtf8,
        )),
    }
}

impl FromStr for DomainKey {
    type Err = InvalidDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        canonicalize(s)
    }
}
