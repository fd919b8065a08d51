//! Serialization of the final rule list.
//!
//! `dnsmasq` lines either redirect (`address=/<domain>/<ip>`) or, without a
//! destination, hand the domain to an empty upstream (`server=/<domain>/`) so
//! dnsmasq answers NXDOMAIN. `hosts` lines are `<ip> <domain>` with
//! `127.0.0.1` as the default address.

use crate::domain::model::{DomainKey, OutputFormat, SourceRef};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr};

const DEFAULT_HOSTS_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Matches every name in dnsmasq's `/domain/` syntax.
const DNSMASQ_WILDCARD: &str = "#";

pub fn render(domains: &[DomainKey], format: OutputFormat, dest_ip: Option<IpAddr>) -> Vec<u8> {
    let mut out = String::with_capacity(domains.len() * 32);
    for domain in domains {
        push_line(&mut out, domain.as_str(), format, dest_ip);
    }
    out.into_bytes()
}

/// A single catch-all rule. Only meaningful for dnsmasq, where `#` matches any domain.
pub fn render_block_all(dest_ip: Option<IpAddr>) -> Vec<u8> {
    let mut out = String::new();
    push_line(&mut out, DNSMASQ_WILDCARD, OutputFormat::Dnsmasq, dest_ip);
    out.into_bytes()
}

fn push_line(out: &mut String, domain: &str, format: OutputFormat, dest_ip: Option<IpAddr>) {
    // Writing into a String cannot fail.
    let _ = match (format, dest_ip) {
        (OutputFormat::Dnsmasq, Some(ip)) => writeln!(out, "address=/{}/{}", domain, ip),
        (OutputFormat::Dnsmasq, None) => writeln!(out, "server=/{}/", domain),
        (OutputFormat::Hosts, ip) => {
            writeln!(out, "{} {}", ip.unwrap_or(DEFAULT_HOSTS_ADDRESS), domain)
        }
    };
}

/// What the generated file records about how it was produced.
#[derive(Debug, Clone)]
pub struct FileHeader<'a> {
    pub mode: OutputFormat,
    pub block_at_psl: bool,
    pub dest_ip: Option<IpAddr>,
    pub sources: &'a [SourceRef],
    pub generated_at: DateTime<Utc>,
}

pub fn render_header(header: &FileHeader<'_>) -> Vec<u8> {
    let mut out = String::new();
    let _ = writeln!(out, "# Generated by dnsgate {}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(
        out,
        "# generated_at: {}",
        header.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "# mode: {}", header.mode);
    let _ = writeln!(out, "# block_at_psl: {}", header.block_at_psl);
    match header.dest_ip {
        Some(ip) => {
            let _ = writeln!(out, "# dest_ip: {}", ip);
        }
        None => {
            let _ = writeln!(out, "# dest_ip: none");
        }
    }
    for source in header.sources {
        let _ = writeln!(out, "# source: {}", source);
    }
    out.push('\n');
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::canonical::canonicalize;

    fn keys(domains: &[&str]) -> Vec<DomainKey> {
        domains.iter().map(|d| canonicalize(d).unwrap()).collect()
    }

    #[test]
    fn test_dnsmasq_nxdomain() {
        let out = render(&keys(&["ads.example.com", "z.com"]), OutputFormat::Dnsmasq, None);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "server=/ads.example.com/\nserver=/z.com/\n"
        );
    }

    #[test]
    fn test_dnsmasq_redirect() {
        let ip: IpAddr = "0.0.0.0".parse().unwrap();
        let out = render(&keys(&["ads.example.com"]), OutputFormat::Dnsmasq, Some(ip));
        assert_eq!(String::from_utf8(out).unwrap(), "address=/ads.example.com/0.0.0.0\n");
    }

    #[test]
    fn test_hosts_defaults_to_loopback() {
        let out = render(&keys(&["ads.example.com"]), OutputFormat::Hosts, None);
        assert_eq!(String::from_utf8(out).unwrap(), "127.0.0.1 ads.example.com\n");

        let ip: IpAddr = "0.0.0.0".parse().unwrap();
        let out = render(&keys(&["ads.example.com"]), OutputFormat::Hosts, Some(ip));
        assert_eq!(String::from_utf8(out).unwrap(), "0.0.0.0 ads.example.com\n");
    }

    #[test]
    fn test_render_keeps_given_order() {
        let out = render(&keys(&["b.com", "a.com", "b.com"]), OutputFormat::Hosts, None);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "127.0.0.1 b.com\n127.0.0.1 a.com\n127.0.0.1 b.com\n"
        );
    }

    #[test]
    fn test_block_all() {
        assert_eq!(render_block_all(None), b"server=/#/\n");
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(render_block_all(Some(ip)), b"address=/#/10.0.0.1\n");
    }

    #[test]
    fn test_header_is_commented() {
        let sources: Vec<SourceRef> = vec!["https://example.com/hosts".parse().unwrap()];
        let header = FileHeader {
            mode: OutputFormat::Dnsmasq,
            block_at_psl: true,
            dest_ip: None,
            sources: &sources,
            generated_at: Utc::now(),
        };
        let text = String::from_utf8(render_header(&header)).unwrap();
        assert!(text.contains("# mode: dnsmasq"));
        assert!(text.contains("# source: https://example.com/hosts"));
        assert!(text.lines().all(|l| l.is_empty() || l.starts_with('#')));
    }
}
