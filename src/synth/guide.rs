//! Installation guide
//!
//! Built from the artifact names the synthesizer actually produced, so the
//! steps always point at files present in the bundle.

use std::fmt::Write;

use super::fail2ban;
use super::nftables::TABLE_NAME;
use super::ArtifactKind;
use crate::request::{Backend, ConfigRequest};

pub fn render(
    request: &ConfigRequest,
    artifacts: &[(ArtifactKind, &str)],
    guide_name: &str,
) -> String {
    let backend = request.backend();
    let mut out = String::new();

    let _ = writeln!(out, "# VoIP Security Guide: {}", backend.display_name());
    out.push('\n');
    let _ = writeln!(
        out,
        "This bundle hardens a {} server. `{guide_name}` is this file.",
        backend.display_name()
    );

    out.push_str("\n## Parameters\n\n");
    out.push_str("| Setting | Value |\n|---|---|\n");
    let _ = writeln!(out, "| Server type | {} |", backend.as_str());
    let _ = writeln!(out, "| SIP port | {} (udp, tcp) |", request.sip_port());
    let _ = writeln!(
        out,
        "| RTP range | {}-{} (udp) |",
        request.rtp_start(),
        request.rtp_end()
    );
    let _ = writeln!(out, "| Max failed attempts | {} |", request.max_attempts());
    let _ = writeln!(out, "| Ban time | {} seconds |", request.ban_time());
    let _ = writeln!(out, "| SSH access | {} |", enabled(request.enable_ssh()));
    let _ = writeln!(out, "| IPv6 rules | {} |", enabled(request.enable_ipv6()));

    out.push_str("\n## Files\n\n");
    for (kind, name) in artifacts {
        let _ = writeln!(out, "- `{name}`: {}", describe(*kind, backend));
    }

    out.push_str("\n## Installation\n\n");
    if !request.enable_ssh() {
        out.push_str(
            "> SSH is not allowed by these rules. Apply them from a local console, \
             or an active SSH session will be the last one.\n\n",
        );
    }
    for (step, (kind, name)) in artifacts.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", step + 1, instruction(*kind, name, request));
    }

    out.push_str("\n## Verification\n\n");
    let _ = writeln!(
        out,
        "- `iptables -L INPUT -n -v` or `nft list table {TABLE_NAME}` (whichever you applied)"
    );
    let _ = writeln!(out, "- `fail2ban-client status {}`", fail2ban::jail_name(backend));
    let _ = writeln!(out, "- {}", verify_backend(backend));

    out
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

fn describe(kind: ArtifactKind, backend: Backend) -> String {
    match kind {
        ArtifactKind::LegacyRules => "firewall rules as an iptables shell script".to_string(),
        ArtifactKind::ModernRules => "the same firewall rules for nftables".to_string(),
        ArtifactKind::BanFilter => {
            format!("fail2ban filter for {} authentication failures", backend.display_name())
        }
        ArtifactKind::BanJail => "fail2ban jail binding the filter to the SIP port".to_string(),
        ArtifactKind::AppConfig => {
            format!("{} ACL, RTP range and rate limits", backend.display_name())
        }
        ArtifactKind::Guide => "this guide".to_string(),
    }
}

fn instruction(kind: ArtifactKind, name: &str, request: &ConfigRequest) -> String {
    match kind {
        ArtifactKind::LegacyRules => {
            format!("Apply the firewall with `sudo sh {name}` (skip if you use nftables).")
        }
        ArtifactKind::ModernRules => format!(
            "Or, on nftables hosts, load `sudo nft -f {name}` instead of the iptables script."
        ),
        ArtifactKind::BanFilter => format!("Copy `{name}` to `/etc/{name}`."),
        ArtifactKind::BanJail => format!(
            "Copy `{name}` to `/etc/{name}` and run `sudo systemctl restart fail2ban`. \
             Offenders are banned for {} seconds after {} failures.",
            request.ban_time(),
            request.max_attempts()
        ),
        ArtifactKind::AppConfig => format!(
            "Merge `{name}` into your {} configuration, then {}.",
            request.backend().display_name(),
            reload_backend(request.backend())
        ),
        ArtifactKind::Guide => format!("Keep `{name}` with your change records."),
    }
}

fn reload_backend(backend: Backend) -> &'static str {
    match backend {
        Backend::Asterisk => "run `asterisk -rx \"core reload\"`",
        Backend::FreeSwitch => "run `fs_cli -x reloadacl` and `fs_cli -x reloadxml`",
        Backend::OpenSips => {
            "route `local0` to `/var/log/opensips.log`, then restart rtpengine and opensips"
        }
    }
}

fn verify_backend(backend: Backend) -> &'static str {
    match backend {
        Backend::Asterisk => "`asterisk -rx \"pjsip show transports\"`",
        Backend::FreeSwitch => "`fs_cli -x \"sofia status\"`",
        Backend::OpenSips => "`opensips-cli -x mi pike_list`",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RawConfigRequest;
    use crate::validator::validate;

    fn request(enable_ssh: bool) -> ConfigRequest {
        validate(&RawConfigRequest {
            backend: "freeswitch".to_string(),
            sip_port: 5080,
            rtp_start: 16384,
            rtp_end: 32768,
            max_attempts: 4,
            ban_time: 900,
            enable_ssh,
            enable_ipv6: true,
        })
        .into_request()
        .unwrap()
    }

    #[test]
    fn test_steps_follow_given_names() {
        let artifacts = [
            (ArtifactKind::LegacyRules, "custom_rules.sh"),
            (ArtifactKind::BanJail, "jail/custom.local"),
        ];
        let guide = render(&request(true), &artifacts, "GUIDE.md");

        assert!(guide.contains("1. Apply the firewall with `sudo sh custom_rules.sh`"));
        assert!(guide.contains("2. Copy `jail/custom.local`"));
        assert!(!guide.contains("3. "));
        assert!(!guide.contains("nftables.conf"));
    }

    #[test]
    fn test_parameters_table() {
        let guide = render(&request(false), &[], "GUIDE.md");
        assert!(guide.contains("| Server type | freeswitch |"));
        assert!(guide.contains("| SIP port | 5080 (udp, tcp) |"));
        assert!(guide.contains("| RTP range | 16384-32768 (udp) |"));
        assert!(guide.contains("| Max failed attempts | 4 |"));
        assert!(guide.contains("| Ban time | 900 seconds |"));
        assert!(guide.contains("| SSH access | disabled |"));
        assert!(guide.contains("| IPv6 rules | enabled |"));
    }

    #[test]
    fn test_ssh_warning_only_when_disabled() {
        assert!(render(&request(false), &[], "G.md").contains("SSH is not allowed"));
        assert!(!render(&request(true), &[], "G.md").contains("SSH is not allowed"));
    }
}
