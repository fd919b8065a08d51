//! Rule list parsing: hosts files and plain one-domain-per-line lists.

use crate::core::canonical::canonicalize_bytes;
use crate::domain::model::{Extraction, RuleFormat};
use std::net::IpAddr;

/// Names hosts files carry for the machine itself. Blocking them breaks the resolver host.
const HOSTS_HOUSEKEEPING: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "local",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
    "ip6-localnet",
    "ip6-mcastprefix",
    "ip6-allnodes",
    "ip6-allrouters",
    "ip6-allhosts",
];

pub fn extract_domains(content: &[u8], format: RuleFormat) -> Extraction {
    let mut extraction = Extraction::default();

    for raw_line in content.split(|b| *b == b'\n') {
        let token = match format {
            RuleFormat::Hosts => hosts_token(raw_line),
            RuleFormat::PlainRules => plain_token(raw_line),
        };
        let Some(token) = token else {
            continue;
        };
        if is_ip_literal(token) {
            continue;
        }

        match canonicalize_bytes(token) {
            Ok(domain) => {
                if format == RuleFormat::Hosts && HOSTS_HOUSEKEEPING.contains(&domain.as_str()) {
                    continue;
                }
                extraction.domains.insert(domain);
            }
            Err(e) => {
                tracing::debug!("Skipping {}", e);
                extraction.rejected += 1;
            }
        }
    }

    extraction
}

/// Addresses are not names; `0.0.0.0 0.0.0.0` and `127.0.0.1 ::1` are common in hosts files.
fn is_ip_literal(token: &[u8]) -> bool {
    std::str::from_utf8(token)
        .ok()
        .and_then(|text| text.parse::<IpAddr>().ok())
        .is_some()
}

fn without_comment(line: &[u8]) -> &[u8] {
    match line.iter().position(|b| *b == b'#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Second whitespace-separated field of `<address> <domain>`.
fn hosts_token(line: &[u8]) -> Option<&[u8]> {
    without_comment(line)
        .split(|b| b.is_ascii_whitespace())
        .filter(|field| !field.is_empty())
        .nth(1)
}

fn plain_token(line: &[u8]) -> Option<&[u8]> {
    let trimmed = without_comment(line).trim_ascii();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
