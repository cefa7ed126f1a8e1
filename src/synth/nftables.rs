//! Modern dialect: nftables ruleset for `nft -f`

use std::fmt::Write;

use super::ruleset::{AcceptRule, Family, Match, Policy, Ports, Ruleset};

pub const TABLE_NAME: &str = "voip_armor";

pub fn render(ruleset: &Ruleset) -> String {
    let mut out = String::new();

    out.push_str("#!/usr/sbin/nft -f\n");
    let _ = writeln!(out, "# VoIP hardening firewall (nftables)");
    let _ = writeln!(out, "# {}", ruleset.summary());
    out.push('\n');
    out.push_str("flush ruleset\n\n");

    // `inet` covers both stacks; without IPv6 only the `ip` family is filtered,
    // matching the iptables-only legacy script.
    let family = if ruleset.has_ipv6() { "inet" } else { "ip" };
    let _ = writeln!(out, "table {family} {TABLE_NAME} {{");

    let _ = writeln!(out, "    chain input {{");
    let _ = writeln!(
        out,
        "        type filter hook input priority 0; policy {};",
        policy(ruleset.input_policy)
    );
    for rule in &ruleset.input_rules {
        out.push('\n');
        let _ = writeln!(out, "        # {}", rule.comment);
        for stmt in statements(rule, ruleset) {
            let _ = writeln!(out, "        {stmt} accept");
        }
    }
    out.push_str("    }\n\n");

    let _ = writeln!(out, "    chain forward {{");
    let _ = writeln!(
        out,
        "        type filter hook forward priority 0; policy {};",
        policy(ruleset.forward_policy)
    );
    out.push_str("    }\n\n");

    let _ = writeln!(out, "    chain output {{");
    let _ = writeln!(
        out,
        "        type filter hook output priority 0; policy {};",
        policy(ruleset.output_policy)
    );
    out.push_str("    }\n");
    out.push_str("}\n");

    out
}

fn policy(policy: Policy) -> &'static str {
    match policy {
        Policy::Accept => "accept",
        Policy::Drop => "drop",
    }
}

/// Port argument in nft syntax (`first-last` for ranges)
pub fn port_spec(ports: Ports) -> String {
    match ports {
        Ports::Single(port) => port.to_string(),
        Ports::Range(start, end) => format!("{start}-{end}"),
    }
}

/// Match expressions for a rule; one entry per emitted line
fn statements(rule: &AcceptRule, ruleset: &Ruleset) -> Vec<String> {
    match rule.matcher {
        Match::Loopback => vec!["iif \"lo\"".to_string()],
        Match::Established => vec!["ct state established,related".to_string()],
        Match::Port { protocol, ports } => {
            vec![format!("{protocol} dport {}", port_spec(ports))]
        }
        Match::EchoRequest => {
            let mut stmts = vec!["icmp type echo-request".to_string()];
            if ruleset.has_ipv6() {
                stmts.push("icmpv6 type echo-request".to_string());
            }
            stmts
        }
        Match::NeighborDiscovery => {
            debug_assert_eq!(rule.family, Some(Family::Ipv6));
            vec![
                "icmpv6 type { nd-neighbor-solicit, nd-neighbor-advert, nd-router-advert }"
                    .to_string(),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RawConfigRequest;
    use crate::validator::validate;

    fn render_for(enable_ssh: bool, enable_ipv6: bool) -> String {
        let request = validate(&RawConfigRequest {
            backend: "freeswitch".to_string(),
            sip_port: 5080,
            rtp_start: 16384,
            rtp_end: 32768,
            max_attempts: 4,
            ban_time: 1800,
            enable_ssh,
            enable_ipv6,
        })
        .into_request()
        .unwrap();
        render(&Ruleset::from_request(&request))
    }

    #[test]
    fn test_chains_with_policies() {
        let conf = render_for(false, false);
        assert!(conf.contains("flush ruleset"));
        assert!(conf.contains("table ip voip_armor {"));
        assert!(conf.contains("type filter hook input priority 0; policy drop;"));
        assert!(conf.contains("type filter hook forward priority 0; policy drop;"));
        assert!(conf.contains("type filter hook output priority 0; policy accept;"));
    }

    #[test]
    fn test_port_rules() {
        let conf = render_for(false, false);
        assert!(conf.contains("udp dport 5080 accept"));
        assert!(conf.contains("tcp dport 5080 accept"));
        assert!(conf.contains("udp dport 16384-32768 accept"));
        assert!(conf.contains("icmp type echo-request accept"));
        assert!(!conf.contains("dport 22 "));
        assert!(render_for(true, false).contains("tcp dport 22 accept"));
    }

    #[test]
    fn test_ipv6_switches_to_inet_family() {
        let conf = render_for(false, true);
        assert!(conf.contains("table inet voip_armor {"));
        assert!(conf.contains("icmpv6 type echo-request accept"));
        assert!(conf.contains("nd-neighbor-solicit"));

        let v4 = render_for(false, false);
        assert!(!v4.contains("icmpv6"));
        assert!(!v4.contains("inet"));
    }
}
