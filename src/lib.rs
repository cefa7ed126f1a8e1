//! VoIP Armor - hardening artifact generator for SIP servers
//!
//! Turns a handful of parameters into a consistent bundle:
//! - Firewall rules (iptables and nftables)
//! - fail2ban filter and jail
//! - Backend hardening config (Asterisk, FreeSWITCH, OpenSIPS)
//! - An installation guide

pub mod config;
pub mod error;
pub mod request;
pub mod server;
pub mod synth;
pub mod validator;

pub use request::{Backend, ConfigRequest, RawConfigRequest};
pub use synth::{synthesize, Artifact, ArtifactBundle, ArtifactKind};
pub use validator::{validate, Field, ValidationFailure, ValidationReport, Violation};
