//! Artifact synthesis
//!
//! Turns one validated [`ConfigRequest`] into the full hardening bundle:
//! - Packet-filter rules in iptables and nftables dialects
//! - fail2ban filter and jail
//! - Backend-specific application hardening config
//! - An installation guide listing the artifacts actually produced
//!
//! Every generator reads the same request, so ports and backend identity
//! agree across all files.

pub mod app_config;
pub mod fail2ban;
pub mod guide;
pub mod iptables;
pub mod nftables;
pub mod ruleset;

use serde::Serialize;

use crate::request::{Backend, ConfigRequest};

/// The six artifacts every bundle contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    LegacyRules,
    ModernRules,
    BanFilter,
    BanJail,
    AppConfig,
    Guide,
}

impl ArtifactKind {
    /// Generation order, which is also bundle order
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::LegacyRules,
        ArtifactKind::ModernRules,
        ArtifactKind::BanFilter,
        ArtifactKind::BanJail,
        ArtifactKind::AppConfig,
        ArtifactKind::Guide,
    ];

    /// Path of the artifact inside the bundle
    pub fn file_name(&self, backend: Backend) -> String {
        match self {
            ArtifactKind::LegacyRules => "iptables_rules.sh".to_string(),
            ArtifactKind::ModernRules => "nftables.conf".to_string(),
            ArtifactKind::BanFilter => {
                format!("fail2ban/filter.d/{}.conf", fail2ban::jail_name(backend))
            }
            ArtifactKind::BanJail => {
                format!("fail2ban/jail.d/{}.local", fail2ban::jail_name(backend))
            }
            ArtifactKind::AppConfig => app_config::file_name(backend).to_string(),
            ArtifactKind::Guide => "SECURITY_GUIDE.md".to_string(),
        }
    }
}

/// A generated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub name: String,
    pub content: String,
}

/// Ordered name → text mapping produced by [`synthesize`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactBundle {
    backend: Backend,
    artifacts: Vec<Artifact>,
}

impl ArtifactBundle {
    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Artifact text by file name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.content.as_str())
    }

    /// Artifact text by kind
    pub fn content(&self, kind: ArtifactKind) -> &str {
        self.artifacts
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.content.as_str())
            .unwrap_or_default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().map(|a| a.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }
}

/// Generate the full artifact bundle for a validated request
pub fn synthesize(request: &ConfigRequest) -> ArtifactBundle {
    let backend = request.backend();
    let ruleset = ruleset::Ruleset::from_request(request);

    let mut artifacts = vec![
        artifact(ArtifactKind::LegacyRules, backend, iptables::render(&ruleset)),
        artifact(ArtifactKind::ModernRules, backend, nftables::render(&ruleset)),
        artifact(ArtifactKind::BanFilter, backend, fail2ban::render_filter(backend)),
        artifact(ArtifactKind::BanJail, backend, fail2ban::render_jail(request)),
        artifact(ArtifactKind::AppConfig, backend, app_config::render(request)),
    ];

    let guide_name = ArtifactKind::Guide.file_name(backend);
    let listed: Vec<(ArtifactKind, &str)> = artifacts
        .iter()
        .map(|a| (a.kind, a.name.as_str()))
        .collect();
    let guide = guide::render(request, &listed, &guide_name);

    artifacts.push(Artifact {
        kind: ArtifactKind::Guide,
        name: guide_name,
        content: guide,
    });

    tracing::debug!(
        backend = %backend,
        artifacts = artifacts.len(),
        "Synthesized artifact bundle"
    );

    ArtifactBundle { backend, artifacts }
}

fn artifact(kind: ArtifactKind, backend: Backend, content: String) -> Artifact {
    Artifact {
        kind,
        name: kind.file_name(backend),
        content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RawConfigRequest;
    use crate::validator::validate;

    fn request(backend: &str) -> ConfigRequest {
        validate(&RawConfigRequest {
            backend: backend.to_string(),
            sip_port: 5060,
            rtp_start: 10000,
            rtp_end: 20000,
            max_attempts: 3,
            ban_time: 3600,
            enable_ssh: false,
            enable_ipv6: false,
        })
        .into_request()
        .unwrap()
    }

    #[test]
    fn test_bundle_has_one_artifact_per_kind_in_order() {
        let bundle = synthesize(&request("asterisk"));
        let kinds: Vec<ArtifactKind> = bundle.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, ArtifactKind::ALL.to_vec());
        assert_eq!(bundle.len(), 6);
    }

    #[test]
    fn test_file_names_follow_backend() {
        let bundle = synthesize(&request("freeswitch"));
        let names: Vec<&str> = bundle.names().collect();
        assert_eq!(
            names,
            vec![
                "iptables_rules.sh",
                "nftables.conf",
                "fail2ban/filter.d/freeswitch-voip.conf",
                "fail2ban/jail.d/freeswitch-voip.local",
                "freeswitch/hardening.conf.xml",
                "SECURITY_GUIDE.md",
            ]
        );
    }

    #[test]
    fn test_lookup_by_name_and_kind_agree() {
        let bundle = synthesize(&request("opensips"));
        for artifact in bundle.iter() {
            assert_eq!(bundle.get(&artifact.name), Some(artifact.content.as_str()));
            assert_eq!(bundle.content(artifact.kind), artifact.content);
        }
        assert!(bundle.get("missing.conf").is_none());
    }
}
