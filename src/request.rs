//! Request model: supported backends, raw form values, validated requests
//!
//! A [`ConfigRequest`] can only be obtained from the validator, so everything
//! downstream may rely on the port, threshold and duration ranges holding.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// SIP server flavour the artifacts are generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Asterisk,
    FreeSwitch,
    OpenSips,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Asterisk, Backend::FreeSwitch, Backend::OpenSips];

    /// Identifier used in form input, file names and fail2ban section names
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Asterisk => "asterisk",
            Backend::FreeSwitch => "freeswitch",
            Backend::OpenSips => "opensips",
        }
    }

    /// Human-readable product name
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Asterisk => "Asterisk",
            Backend::FreeSwitch => "FreeSWITCH",
            Backend::OpenSips => "OpenSIPS",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown backend: {0}")]
pub struct UnknownBackend(pub String);

/// Accepts the lowercase names in any case, ignoring surrounding whitespace,
/// so `" Asterisk "` parses as [`Backend::Asterisk`]
impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asterisk" => Ok(Backend::Asterisk),
            "freeswitch" => Ok(Backend::FreeSwitch),
            "opensips" => Ok(Backend::OpenSips),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// Parameters as coerced from user input, before any range checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfigRequest {
    pub backend: String,
    pub sip_port: i64,
    pub rtp_start: i64,
    pub rtp_end: i64,
    pub max_attempts: i64,
    pub ban_time: i64,
    pub enable_ssh: bool,
    pub enable_ipv6: bool,
}

/// Validated parameter set consumed by the synthesizer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigRequest {
    backend: Backend,
    sip_port: u16,
    rtp_start: u16,
    rtp_end: u16,
    max_attempts: u8,
    ban_time: u32,
    enable_ssh: bool,
    enable_ipv6: bool,
}

impl ConfigRequest {
    /// Only the validator calls this, after every range check has passed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_unchecked(
        backend: Backend,
        sip_port: u16,
        rtp_start: u16,
        rtp_end: u16,
        max_attempts: u8,
        ban_time: u32,
        enable_ssh: bool,
        enable_ipv6: bool,
    ) -> Self {
        Self {
            backend,
            sip_port,
            rtp_start,
            rtp_end,
            max_attempts,
            ban_time,
            enable_ssh,
            enable_ipv6,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn sip_port(&self) -> u16 {
        self.sip_port
    }

    pub fn rtp_start(&self) -> u16 {
        self.rtp_start
    }

    pub fn rtp_end(&self) -> u16 {
        self.rtp_end
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Ban duration in seconds
    pub fn ban_time(&self) -> u32 {
        self.ban_time
    }

    pub fn enable_ssh(&self) -> bool {
        self.enable_ssh
    }

    pub fn enable_ipv6(&self) -> bool {
        self.enable_ipv6
    }
}
