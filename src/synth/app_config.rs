//! Backend hardening config
//!
//! One syntax per backend, each expressing the same three controls:
//! a deny-by-default signaling ACL, the RTP port range, and call/registration
//! rate limits with fixed defaults suited to that backend.

use std::fmt::Write;

use crate::request::{Backend, ConfigRequest};

/// Networks the signaling ACL lets through
pub const TRUSTED_NETWORKS: [&str; 3] = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Tag OpenSIPS log lines carry so the fail2ban filter can match them
pub const OPENSIPS_LOG_TAG: &str = "VOIP_ARMOR";

/// Fixed throttling defaults per backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    /// Concurrent call ceiling, where the backend supports one
    pub max_calls: Option<u32>,
    /// New INVITEs accepted per second, where the backend supports one
    pub calls_per_second: Option<u32>,
    /// Per-source request throttle, where the backend supports one
    pub request_throttle: Option<RequestThrottle>,
    /// Contacts one extension may register at once
    pub registrations_per_extension: Option<u32>,
}

/// At most `burst` requests from one source per `window_secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestThrottle {
    pub burst: u32,
    pub window_secs: u32,
}

pub fn rate_limits(backend: Backend) -> RateLimits {
    match backend {
        Backend::Asterisk => RateLimits {
            max_calls: Some(200),
            calls_per_second: None,
            request_throttle: Some(RequestThrottle {
                burst: 5,
                window_secs: 5,
            }),
            registrations_per_extension: None,
        },
        Backend::FreeSwitch => RateLimits {
            max_calls: Some(1000),
            calls_per_second: Some(30),
            request_throttle: None,
            registrations_per_extension: Some(10),
        },
        Backend::OpenSips => RateLimits {
            max_calls: None,
            calls_per_second: Some(30),
            request_throttle: Some(RequestThrottle {
                burst: 16,
                window_secs: 2,
            }),
            registrations_per_extension: None,
        },
    }
}

/// Asterisk refuses new calls above this one-minute load average
const ASTERISK_MAX_LOAD: &str = "0.9";

pub fn file_name(backend: Backend) -> &'static str {
    match backend {
        Backend::Asterisk => "asterisk/hardening.conf",
        Backend::FreeSwitch => "freeswitch/hardening.conf.xml",
        Backend::OpenSips => "opensips/hardening.cfg",
    }
}

pub fn render(request: &ConfigRequest) -> String {
    match request.backend() {
        Backend::Asterisk => render_asterisk(request),
        Backend::FreeSwitch => render_freeswitch(request),
        Backend::OpenSips => render_opensips(request),
    }
}

/// Dotted netmask for an IPv4 prefix length, as Asterisk ACLs expect
fn netmask(prefix_len: u8) -> String {
    let bits: u32 = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    };
    std::net::Ipv4Addr::from(bits).to_string()
}

fn split_cidr(cidr: &str) -> (&str, u8) {
    match cidr.split_once('/') {
        Some((addr, len)) => (addr, len.parse().unwrap_or(32)),
        None => (cidr, 32),
    }
}

fn render_asterisk(request: &ConfigRequest) -> String {
    let limits = rate_limits(Backend::Asterisk);
    let port = request.sip_port();
    let mut out = String::new();

    out.push_str("; Asterisk hardening. Merge each section into the file named above it.\n");

    out.push_str("\n; ---- acl.conf ----\n");
    out.push_str("[voip_armor_acl]\n");
    out.push_str("deny = 0.0.0.0/0.0.0.0\n");
    for cidr in TRUSTED_NETWORKS {
        let (addr, len) = split_cidr(cidr);
        let _ = writeln!(out, "permit = {addr}/{}", netmask(len));
    }

    out.push_str("\n; ---- rtp.conf ----\n");
    out.push_str("[general]\n");
    let _ = writeln!(out, "rtpstart = {}", request.rtp_start());
    let _ = writeln!(out, "rtpend = {}", request.rtp_end());
    out.push_str("icesupport = no\n");
    out.push_str("strictrtp = yes\n");

    out.push_str("\n; ---- pjsip.conf ----\n");
    out.push_str("[global]\n");
    out.push_str("type = global\n");
    if let Some(throttle) = limits.request_throttle {
        let _ = writeln!(out, "unidentified_request_count = {}", throttle.burst);
        let _ = writeln!(out, "unidentified_request_period = {}", throttle.window_secs);
    }
    out.push_str("unidentified_request_prune_interval = 30\n");
    out.push_str("user_agent = SIP\n");
    for proto in ["udp", "tcp"] {
        out.push('\n');
        let _ = writeln!(out, "[transport-{proto}]");
        out.push_str("type = transport\n");
        let _ = writeln!(out, "protocol = {proto}");
        let _ = writeln!(out, "bind = 0.0.0.0:{port}");
    }
    out.push_str("\n[acl]\n");
    out.push_str("type = acl\n");
    out.push_str("acl = voip_armor_acl\n");

    out.push_str("\n; ---- asterisk.conf ----\n");
    out.push_str("[options]\n");
    if let Some(max_calls) = limits.max_calls {
        let _ = writeln!(out, "maxcalls = {max_calls}");
    }
    let _ = writeln!(out, "maxload = {ASTERISK_MAX_LOAD}");

    out.push_str("\n; ---- logger.conf ----\n");
    out.push_str("[logfiles]\n");
    out.push_str("messages => notice,warning,error,security\n");

    out
}

fn render_freeswitch(request: &ConfigRequest) -> String {
    let limits = rate_limits(Backend::FreeSwitch);
    let mut out = String::new();

    out.push_str(
        "<!-- FreeSWITCH hardening. Merge each block into the file named in its comment. -->\n",
    );

    out.push_str("\n<!-- autoload_configs/acl.conf.xml -->\n");
    out.push_str("<configuration name=\"acl.conf\" description=\"Network Lists\">\n");
    out.push_str("  <network-lists>\n");
    out.push_str("    <list name=\"voip_armor\" default=\"deny\">\n");
    for cidr in TRUSTED_NETWORKS {
        let _ = writeln!(out, "      <node type=\"allow\" cidr=\"{cidr}\"/>");
    }
    out.push_str("    </list>\n");
    out.push_str("  </network-lists>\n");
    out.push_str("</configuration>\n");

    out.push_str("\n<!-- autoload_configs/switch.conf.xml, inside <settings> -->\n");
    let _ = writeln!(out, "<param name=\"rtp-start-port\" value=\"{}\"/>", request.rtp_start());
    let _ = writeln!(out, "<param name=\"rtp-end-port\" value=\"{}\"/>", request.rtp_end());
    if let Some(max_calls) = limits.max_calls {
        let _ = writeln!(out, "<param name=\"max-sessions\" value=\"{max_calls}\"/>");
    }
    if let Some(cps) = limits.calls_per_second {
        let _ = writeln!(out, "<param name=\"sessions-per-second\" value=\"{cps}\"/>");
    }

    out.push_str("\n<!-- sip_profiles/internal.xml, inside <settings> -->\n");
    let _ = writeln!(out, "<param name=\"sip-port\" value=\"{}\"/>", request.sip_port());
    out.push_str("<param name=\"apply-inbound-acl\" value=\"voip_armor\"/>\n");
    out.push_str("<param name=\"apply-register-acl\" value=\"voip_armor\"/>\n");
    out.push_str("<param name=\"auth-calls\" value=\"true\"/>\n");
    out.push_str("<param name=\"auth-all-packets\" value=\"false\"/>\n");
    out.push_str("<param name=\"log-auth-failures\" value=\"true\"/>\n");
    if let Some(registrations) = limits.registrations_per_extension {
        let _ = writeln!(
            out,
            "<param name=\"max-registrations-per-extension\" value=\"{registrations}\"/>"
        );
    }

    out
}

fn render_opensips(request: &ConfigRequest) -> String {
    let limits = rate_limits(Backend::OpenSips);
    let port = request.sip_port();
    let tag = OPENSIPS_LOG_TAG;
    let mut out = String::new();

    out.push_str("# OpenSIPS hardening. Merge each section into the file named above it.\n");

    out.push_str("\n# ---- opensips.cfg ----\n");
    out.push_str("log_facility = LOG_LOCAL0\n\n");
    let _ = writeln!(out, "socket = udp:*:{port}");
    let _ = writeln!(out, "socket = tcp:*:{port}");

    out.push_str("\nloadmodule \"permissions.so\"\n");
    out.push_str("modparam(\"permissions\", \"db_url\", \"text:///etc/opensips/voip_armor\")\n");
    out.push_str("modparam(\"permissions\", \"address_table\", \"address\")\n");

    if let Some(throttle) = limits.request_throttle {
        out.push_str("\nloadmodule \"pike.so\"\n");
        let _ = writeln!(
            out,
            "modparam(\"pike\", \"sampling_time_unit\", {})",
            throttle.window_secs
        );
        let _ = writeln!(
            out,
            "modparam(\"pike\", \"reqs_density_per_unit\", {})",
            throttle.burst
        );
        out.push_str("modparam(\"pike\", \"remove_latency\", 4)\n");
    }

    out.push_str("\nloadmodule \"ratelimit.so\"\n");
    out.push_str("modparam(\"ratelimit\", \"timer_interval\", 1)\n");

    out.push_str("\nloadmodule \"rtpengine.so\"\n");
    out.push_str("modparam(\"rtpengine\", \"rtpengine_sock\", \"udp:127.0.0.1:2223\")\n");

    out.push_str("\n# Trusted source networks (permissions address table, group 1):\n");
    for cidr in TRUSTED_NETWORKS {
        let (addr, len) = split_cidr(cidr);
        let _ = writeln!(out, "#   grp=1 ip={addr} mask={len} port=0 proto=any");
    }

    out.push_str("\nroute {\n");
    if limits.request_throttle.is_some() {
        out.push_str("    if (!pike_check_req()) {\n");
        let _ = writeln!(
            out,
            "        xlog(\"L_ALERT\", \"{tag} flood_blocked src=$si\\n\");"
        );
        out.push_str("        exit;\n");
        out.push_str("    }\n");
    }
    out.push_str("    if (!check_source_address(1)) {\n");
    let _ = writeln!(
        out,
        "        xlog(\"L_WARN\", \"{tag} acl_denied method=$rm src=$si\\n\");"
    );
    out.push_str("        sl_send_reply(403, \"Forbidden\");\n");
    out.push_str("        exit;\n");
    out.push_str("    }\n");
    if let Some(cps) = limits.calls_per_second {
        let _ = writeln!(
            out,
            "    if (is_method(\"INVITE\") && !rl_check(\"invite\", {cps}, \"TAILDROP\")) {{"
        );
        out.push_str("        sl_send_reply(503, \"Service Unavailable\");\n");
        out.push_str("        exit;\n");
        out.push_str("    }\n");
    }
    out.push_str("    if (is_method(\"REGISTER\") && !www_authorize(\"\", \"subscriber\")) {\n");
    // -2 bad password, -3 unknown user; missing or stale credentials only get a challenge
    out.push_str("        if ($rc == -2 || $rc == -3) {\n");
    let _ = writeln!(
        out,
        "            xlog(\"L_WARN\", \"{tag} auth_failed user=$fU src=$si\\n\");"
    );
    out.push_str("        }\n");
    out.push_str("        www_challenge(\"\", \"auth\");\n");
    out.push_str("        exit;\n");
    out.push_str("    }\n");
    out.push_str("    if (has_body(\"application/sdp\")) {\n");
    out.push_str("        rtpengine_manage();\n");
    out.push_str("    }\n");
    out.push_str("}\n");

    out.push_str("\n# ---- /etc/rtpengine/rtpengine.conf ----\n");
    out.push_str("[rtpengine]\n");
    out.push_str("listen-ng = 127.0.0.1:2223\n");
    let _ = writeln!(out, "port-min = {}", request.rtp_start());
    let _ = writeln!(out, "port-max = {}", request.rtp_end());

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RawConfigRequest;
    use crate::synth::fail2ban;
    use crate::validator::validate;

    fn request(backend: &str) -> ConfigRequest {
        validate(&RawConfigRequest {
            backend: backend.to_string(),
            sip_port: 5070,
            rtp_start: 12000,
            rtp_end: 12999,
            max_attempts: 3,
            ban_time: 3600,
            enable_ssh: false,
            enable_ipv6: false,
        })
        .into_request()
        .unwrap()
    }

    #[test]
    fn test_netmask() {
        assert_eq!(netmask(8), "255.0.0.0");
        assert_eq!(netmask(12), "255.240.0.0");
        assert_eq!(netmask(16), "255.255.0.0");
        assert_eq!(netmask(0), "0.0.0.0");
        assert_eq!(netmask(32), "255.255.255.255");
    }

    #[test]
    fn test_asterisk_config() {
        let conf = render(&request("asterisk"));
        assert!(conf.contains("deny = 0.0.0.0/0.0.0.0"));
        assert!(conf.contains("permit = 172.16.0.0/255.240.0.0"));
        assert!(conf.contains("rtpstart = 12000"));
        assert!(conf.contains("rtpend = 12999"));
        assert!(conf.contains("bind = 0.0.0.0:5070"));
        assert!(conf.contains("maxcalls = 200"));
        assert!(conf.contains("maxload = 0.9"));
        assert!(conf.contains("unidentified_request_count = 5"));
    }

    #[test]
    fn test_freeswitch_config() {
        let conf = render(&request("freeswitch"));
        assert!(conf.contains("<list name=\"voip_armor\" default=\"deny\">"));
        assert!(conf.contains("<param name=\"rtp-start-port\" value=\"12000\"/>"));
        assert!(conf.contains("<param name=\"rtp-end-port\" value=\"12999\"/>"));
        assert!(conf.contains("<param name=\"sip-port\" value=\"5070\"/>"));
        assert!(conf.contains("<param name=\"sessions-per-second\" value=\"30\"/>"));
        assert!(conf.contains("<param name=\"log-auth-failures\" value=\"true\"/>"));
    }

    #[test]
    fn test_opensips_config() {
        let conf = render(&request("opensips"));
        assert!(conf.contains("socket = udp:*:5070"));
        assert!(conf.contains("socket = tcp:*:5070"));
        assert!(conf.contains("check_source_address(1)"));
        assert!(conf.contains("sl_send_reply(403, \"Forbidden\")"));
        assert!(conf.contains("modparam(\"pike\", \"reqs_density_per_unit\", 16)"));
        assert!(conf.contains("rl_check(\"invite\", 30, \"TAILDROP\")"));
    }

    #[test]
    fn test_opensips_rtp_range_is_a_directive() {
        let conf = render(&request("opensips"));
        let lines: Vec<&str> = conf.lines().collect();
        let section = lines
            .iter()
            .position(|l| *l == "[rtpengine]")
            .expect("rtpengine section missing");

        assert!(lines[section..].contains(&"port-min = 12000"));
        assert!(lines[section..].contains(&"port-max = 12999"));
        assert!(conf.contains("rtpengine_manage();"));
    }

    #[test]
    fn test_opensips_challenge_is_not_logged_as_failure() {
        let conf = render(&request("opensips"));
        let lines: Vec<&str> = conf.lines().map(str::trim).collect();
        let logged = lines
            .iter()
            .position(|l| l.contains("auth_failed"))
            .expect("auth_failed is never logged");

        assert_eq!(lines[logged - 1], "if ($rc == -2 || $rc == -3) {");
        assert!(lines[logged - 2].contains("!www_authorize("));
        assert_eq!(lines[logged + 1], "}");
        assert_eq!(lines[logged + 2], "www_challenge(\"\", \"auth\");");
    }

    #[test]
    fn test_request_throttles_are_rendered() {
        let conf = render(&request("asterisk"));
        assert!(conf.contains("unidentified_request_count = 5"));
        assert!(conf.contains("unidentified_request_period = 5"));

        let conf = render(&request("opensips"));
        assert!(conf.contains("modparam(\"pike\", \"sampling_time_unit\", 2)"));
        assert!(conf.contains("modparam(\"pike\", \"reqs_density_per_unit\", 16)"));

        let conf = render(&request("freeswitch"));
        assert_eq!(rate_limits(Backend::FreeSwitch).request_throttle, None);
        assert!(conf.contains("<param name=\"max-registrations-per-extension\" value=\"10\"/>"));
    }

    #[test]
    fn test_file_names_are_distinct() {
        let names: Vec<&str> = Backend::ALL.iter().map(|b| file_name(*b)).collect();
        assert_eq!(names.len(), 3);
        assert_ne!(names[0], names[1]);
        assert_ne!(names[1], names[2]);
        assert_ne!(names[0], names[2]);
    }
}
