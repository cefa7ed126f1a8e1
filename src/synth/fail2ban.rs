//! fail2ban filter and jail generation
//!
//! Each backend has a fixed pattern catalog. The catalogs only depend on the
//! backend; the jail binds the catalog's filter to the request's SIP port,
//! retry threshold and ban duration.

use std::fmt::Write;

use crate::request::{Backend, ConfigRequest};

/// Observation window for `maxretry`, in seconds
pub const FIND_TIME_SECS: u32 = 600;

/// Failure patterns for one backend
#[derive(Debug, Clone, Copy)]
pub struct FilterCatalog {
    /// Value of `log_prefix`, referenced as `%(log_prefix)s` by the patterns
    pub log_prefix: &'static str,
    pub failregex: &'static [&'static str],
    pub ignoreregex: &'static [&'static str],
}

static ASTERISK: FilterCatalog = FilterCatalog {
    log_prefix: r"(?:NOTICE|SECURITY|WARNING)(?:\[\d+\])?(?:\[C-[\da-f]*\])?:? [^:]+:\d*(?:(?: in)? [^:]+:)?",
    failregex: &[
        r"^%(log_prefix)s Registration from '[^']*' failed for '<HOST>(?::\d+)?' - (?:Wrong password|No matching peer found|No matching endpoint found|Not matched endpoint|Username/auth name mismatch|Device does not match ACL|Peer is not supposed to register|ACL error \(permit/deny\)|Not a local domain)$",
        r"^%(log_prefix)s Call from '[^']*' \(<HOST>:\d+\) to extension '[^']*' rejected because extension not found in context '[^']*'\.$",
        r"^%(log_prefix)s Host <HOST> failed to authenticate as '[^']*'$",
        r"^%(log_prefix)s No registration for peer '[^']*' \(from <HOST>\)$",
        r"^%(log_prefix)s Host <HOST> failed MD5 authentication for '[^']*' \([^)]+\)$",
        r"^%(log_prefix)s Request '(?:REGISTER|INVITE)' from '[^']*' failed for '<HOST>(?::\d+)?' \(callid: [^)]*\) - (?:No matching endpoint found|Not matched endpoint|Failed to authenticate)$",
        r#"^%(log_prefix)s SecurityEvent="(?:FailedACL|InvalidAccountID|ChallengeResponseFailed|InvalidPassword)".*,RemoteAddress="IPV[46]/(?:UDP|TCP|TLS|WS|WSS)/<HOST>/\d+""#,
    ],
    ignoreregex: &[],
};

static FREESWITCH: FilterCatalog = FilterCatalog {
    log_prefix: r"(?:\S+ )?\[WARNING\] sofia(?:_reg)?\.c:\d+",
    failregex: &[
        r"^%(log_prefix)s SIP auth failure \((?:REGISTER|INVITE)\) on sofia profile '[^']+' for \[[^\]]*\] from ip <HOST>$",
        r"^%(log_prefix)s SIP auth challenge \((?:REGISTER|INVITE)\) on sofia profile '[^']+' for \[[^\]]*\] from ip <HOST>$",
        r"^%(log_prefix)s Can't find user \[[^\]]*\] from <HOST>$",
        r#"^%(log_prefix)s IP <HOST> Rejected by (?:register |inbound )?acl "[^"]*""#,
    ],
    ignoreregex: &[r"^%(log_prefix)s SIP auth challenge \((?:REGISTER|INVITE)\) on sofia profile '[^']+' for \[[^\]]*\] from ip 127\.0\.0\.1$"],
};

static OPENSIPS: FilterCatalog = FilterCatalog {
    log_prefix: r"\S*\s*opensips(?:\[\d+\])?:(?: \S+:)?",
    failregex: &[
        r"^.*%(log_prefix)s VOIP_ARMOR auth_failed user=\S* src=<HOST>$",
        r"^.*%(log_prefix)s VOIP_ARMOR acl_denied method=\S+ src=<HOST>$",
        r"^.*%(log_prefix)s VOIP_ARMOR flood_blocked src=<HOST>$",
    ],
    ignoreregex: &[],
};

/// Fixed failure-pattern catalog for a backend
pub fn catalog(backend: Backend) -> &'static FilterCatalog {
    match backend {
        Backend::Asterisk => &ASTERISK,
        Backend::FreeSwitch => &FREESWITCH,
        Backend::OpenSips => &OPENSIPS,
    }
}

/// Jail section name, also used as the filter name
pub fn jail_name(backend: Backend) -> String {
    format!("{}-voip", backend.as_str())
}

/// Log file the backend writes authentication failures to
pub fn log_path(backend: Backend) -> &'static str {
    match backend {
        Backend::Asterisk => "/var/log/asterisk/messages",
        Backend::FreeSwitch => "/var/log/freeswitch/freeswitch.log",
        Backend::OpenSips => "/var/log/opensips.log",
    }
}

pub fn render_filter(backend: Backend) -> String {
    let catalog = catalog(backend);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "# fail2ban filter: {} authentication failures",
        backend.display_name()
    );
    out.push_str("\n[INCLUDES]\nbefore = common.conf\n\n[Definition]\n");
    let _ = writeln!(out, "log_prefix = {}", catalog.log_prefix);
    out.push('\n');
    write_multiline(&mut out, "failregex", catalog.failregex);
    out.push('\n');
    write_multiline(&mut out, "ignoreregex", catalog.ignoreregex);

    out
}

/// `key = first` followed by continuation lines indented under the value
fn write_multiline(out: &mut String, key: &str, values: &[&str]) {
    let indent = " ".repeat(key.len() + 3);
    match values.split_first() {
        None => {
            let _ = writeln!(out, "{key} =");
        }
        Some((first, rest)) => {
            let _ = writeln!(out, "{key} = {first}");
            for value in rest {
                let _ = writeln!(out, "{indent}{value}");
            }
        }
    }
}

pub fn render_jail(request: &ConfigRequest) -> String {
    let backend = request.backend();
    let name = jail_name(backend);
    let port = request.sip_port();
    let mut out = String::new();

    let _ = writeln!(out, "# fail2ban jail: {}", backend.display_name());
    out.push('\n');
    let _ = writeln!(out, "[{name}]");
    out.push_str("enabled  = true\n");
    let _ = writeln!(out, "filter   = {name}");
    let _ = writeln!(out, "port     = {port}");
    out.push_str("protocol = udp\n");
    let _ = writeln!(out, "logpath  = {}", log_path(backend));
    let _ = writeln!(out, "maxretry = {}", request.max_attempts());
    let _ = writeln!(out, "findtime = {FIND_TIME_SECS}");
    let _ = writeln!(out, "bantime  = {}", request.ban_time());
    let _ = writeln!(
        out,
        "action   = %(banaction)s[name=%(__name__)s-udp, port=\"{port}\", protocol=\"udp\"]"
    );
    let _ = writeln!(
        out,
        "           %(banaction)s[name=%(__name__)s-tcp, port=\"{port}\", protocol=\"tcp\"]"
    );

    out
}
