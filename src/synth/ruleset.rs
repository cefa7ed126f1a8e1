//! Dialect-neutral packet-filter model
//!
//! Both firewall renderers walk the same [`Ruleset`], so the iptables script
//! and the nftables config make identical accept/deny decisions.

use std::fmt;

use crate::request::{Backend, ConfigRequest};

pub const SSH_PORT: u16 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Accept,
    Drop,
}

/// Destination port match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ports {
    Single(u16),
    /// Inclusive range
    Range(u16, u16),
}

/// What an accept rule matches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    Loopback,
    Established,
    Port { protocol: Protocol, ports: Ports },
    /// ICMP echo-request, or its ICMPv6 counterpart
    EchoRequest,
    /// ICMPv6 neighbor/router discovery, required for IPv6 to function
    NeighborDiscovery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptRule {
    pub matcher: Match,
    pub comment: &'static str,
    /// `None` applies to every rendered family
    pub family: Option<Family>,
}

impl AcceptRule {
    fn any(matcher: Match, comment: &'static str) -> Self {
        Self {
            matcher,
            comment,
            family: None,
        }
    }

    pub fn applies_to(&self, family: Family) -> bool {
        self.family.map_or(true, |f| f == family)
    }
}

/// Input, forward and output chains with their policies and accept rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruleset {
    pub backend: Backend,
    pub sip_port: u16,
    pub rtp_start: u16,
    pub rtp_end: u16,
    pub input_policy: Policy,
    pub forward_policy: Policy,
    pub output_policy: Policy,
    pub families: Vec<Family>,
    pub input_rules: Vec<AcceptRule>,
}

impl Ruleset {
    pub fn from_request(request: &ConfigRequest) -> Self {
        let mut families = vec![Family::Ipv4];
        if request.enable_ipv6() {
            families.push(Family::Ipv6);
        }

        let mut input_rules = vec![
            AcceptRule::any(Match::Loopback, "loopback"),
            AcceptRule::any(Match::Established, "established and related"),
        ];

        if request.enable_ssh() {
            input_rules.push(AcceptRule::any(
                Match::Port {
                    protocol: Protocol::Tcp,
                    ports: Ports::Single(SSH_PORT),
                },
                "SSH",
            ));
        }

        input_rules.push(AcceptRule::any(
            Match::Port {
                protocol: Protocol::Udp,
                ports: Ports::Single(request.sip_port()),
            },
            "SIP signaling (udp)",
        ));
        input_rules.push(AcceptRule::any(
            Match::Port {
                protocol: Protocol::Tcp,
                ports: Ports::Single(request.sip_port()),
            },
            "SIP signaling (tcp)",
        ));
        input_rules.push(AcceptRule::any(
            Match::Port {
                protocol: Protocol::Udp,
                ports: Ports::Range(request.rtp_start(), request.rtp_end()),
            },
            "RTP media",
        ));
        input_rules.push(AcceptRule::any(Match::EchoRequest, "ping"));

        if request.enable_ipv6() {
            input_rules.push(AcceptRule {
                matcher: Match::NeighborDiscovery,
                comment: "IPv6 neighbor discovery",
                family: Some(Family::Ipv6),
            });
        }

        Self {
            backend: request.backend(),
            sip_port: request.sip_port(),
            rtp_start: request.rtp_start(),
            rtp_end: request.rtp_end(),
            input_policy: Policy::Drop,
            forward_policy: Policy::Drop,
            output_policy: Policy::Accept,
            families,
            input_rules,
        }
    }

    pub fn has_ipv6(&self) -> bool {
        self.families.contains(&Family::Ipv6)
    }

    /// Accept rules rendered for one address family
    pub fn rules_for(&self, family: Family) -> impl Iterator<Item = &AcceptRule> {
        self.input_rules.iter().filter(move |r| r.applies_to(family))
    }

    /// Protocol/port pairs opened to inbound traffic
    pub fn open_ports(&self) -> Vec<(Protocol, Ports)> {
        self.input_rules
            .iter()
            .filter_map(|r| match r.matcher {
                Match::Port { protocol, ports } => Some((protocol, ports)),
                _ => None,
            })
            .collect()
    }

    /// One-line summary used in file headers
    pub fn summary(&self) -> String {
        format!(
            "{}: SIP {} (udp/tcp), RTP {}-{} (udp)",
            self.backend.display_name(),
            self.sip_port,
            self.rtp_start,
            self.rtp_end
        )
    }
}
