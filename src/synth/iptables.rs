//! Legacy dialect: iptables / ip6tables shell script

use std::fmt::Write;

use super::ruleset::{AcceptRule, Family, Match, Policy, Ports, Ruleset};

pub fn render(ruleset: &Ruleset) -> String {
    let mut out = String::new();

    out.push_str("#!/bin/sh\n");
    let _ = writeln!(out, "# VoIP hardening firewall (iptables)");
    let _ = writeln!(out, "# {}", ruleset.summary());
    out.push_str("# Review before applying on a remote host.\n");
    out.push_str("set -e\n");

    for &family in &ruleset.families {
        out.push('\n');
        render_family(&mut out, ruleset, family);
    }

    out
}

fn render_family(out: &mut String, ruleset: &Ruleset, family: Family) {
    let cmd = command(family);

    let _ = writeln!(out, "# {}", family_label(family));
    let _ = writeln!(out, "{cmd} -F");
    let _ = writeln!(out, "{cmd} -X");
    let _ = writeln!(out, "{cmd} -P INPUT {}", policy(ruleset.input_policy));
    let _ = writeln!(out, "{cmd} -P FORWARD {}", policy(ruleset.forward_policy));
    let _ = writeln!(out, "{cmd} -P OUTPUT {}", policy(ruleset.output_policy));

    for rule in ruleset.rules_for(family) {
        out.push('\n');
        let _ = writeln!(out, "# {}", rule.comment);
        for spec in match_specs(rule, family) {
            let _ = writeln!(out, "{cmd} -A INPUT {spec} -j ACCEPT");
        }
    }
}

fn command(family: Family) -> &'static str {
    match family {
        Family::Ipv4 => "iptables",
        Family::Ipv6 => "ip6tables",
    }
}

fn family_label(family: Family) -> &'static str {
    match family {
        Family::Ipv4 => "IPv4",
        Family::Ipv6 => "IPv6",
    }
}

fn policy(policy: Policy) -> &'static str {
    match policy {
        Policy::Accept => "ACCEPT",
        Policy::Drop => "DROP",
    }
}

/// Port argument in iptables syntax (`first:last` for ranges)
pub fn port_spec(ports: Ports) -> String {
    match ports {
        Ports::Single(port) => port.to_string(),
        Ports::Range(start, end) => format!("{start}:{end}"),
    }
}

/// Match arguments for a rule; one entry per emitted line
fn match_specs(rule: &AcceptRule, family: Family) -> Vec<String> {
    match rule.matcher {
        Match::Loopback => vec!["-i lo".to_string()],
        Match::Established => vec!["-m conntrack --ctstate ESTABLISHED,RELATED".to_string()],
        Match::Port { protocol, ports } => {
            vec![format!("-p {protocol} --dport {}", port_spec(ports))]
        }
        Match::EchoRequest => match family {
            Family::Ipv4 => vec!["-p icmp --icmp-type echo-request".to_string()],
            Family::Ipv6 => vec!["-p ipv6-icmp --icmpv6-type echo-request".to_string()],
        },
        Match::NeighborDiscovery => [
            "neighbour-solicitation",
            "neighbour-advertisement",
            "router-advertisement",
        ]
        .iter()
        .map(|t| format!("-p ipv6-icmp --icmpv6-type {t}"))
        .collect(),
    }
}
