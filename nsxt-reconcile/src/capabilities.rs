//! Server-version gating.
//!
//! The manager version is read once per run from the upgrade summary and
//! turned into a [`Capabilities`] value; nothing else in the pipeline looks
//! at version strings.

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::model::{SectionSpec, TargetType};
use crate::transport::{ApiRequest, Transport, TransportError};

pub const UPGRADE_SUMMARY_PATH: &str = "/api/v1/upgrade/summary";

/// First release with rule context profiles.
const CONTEXT_PROFILES_SINCE: (u32, u32) = (2, 4);

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("failed to read the manager version: {0}")]
    Transport(#[from] TransportError),
    #[error("upgrade summary did not include system_version")]
    MissingVersion,
    #[error("unparseable manager version '{raw}'")]
    UnparseableVersion { raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub raw: String,
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse `major.minor[...]`; anything after the minor number is kept only in `raw`.
pub fn parse_version(raw: &str) -> Result<ServerVersion, CapabilityError> {
    let unparseable = || CapabilityError::UnparseableVersion {
        raw: raw.to_string(),
    };
    let mut parts = raw.trim().split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or_else(unparseable)?;
    let minor = parts
        .next()
        .map(|p| p.chars().take_while(char::is_ascii_digit).collect::<String>())
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or_else(unparseable)?;
    Ok(ServerVersion {
        major,
        minor,
        raw: raw.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub version: ServerVersion,
    pub context_profiles: bool,
}

impl Capabilities {
    pub fn from_version(version: ServerVersion) -> Self {
        let context_profiles = (version.major, version.minor) >= CONTEXT_PROFILES_SINCE;
        Self {
            version,
            context_profiles,
        }
    }

    /// Catalog types a firewall section may reference on this server.
    pub fn firewall_catalog_types(&self) -> Vec<TargetType> {
        let mut kinds = vec![
            TargetType::NsGroup,
            TargetType::IpSet,
            TargetType::LogicalSwitch,
            TargetType::LogicalPort,
            TargetType::NsServiceGroup,
            TargetType::NsService,
        ];
        if self.context_profiles {
            kinds.push(TargetType::NsProfile);
        }
        kinds
    }

    /// Drop fields the server cannot accept.
    pub fn gate_section<R>(&self, spec: &mut SectionSpec<R>) {
        if self.context_profiles {
            return;
        }
        for rule in &mut spec.rules {
            rule.context_profiles.clear();
        }
    }
}

/// Read `system_version` from the upgrade summary.
pub fn detect(transport: &dyn Transport) -> Result<Capabilities, CapabilityError> {
    let summary = transport.request(&ApiRequest::get(UPGRADE_SUMMARY_PATH))?;
    let raw = summary
        .get("system_version")
        .and_then(Value::as_str)
        .ok_or(CapabilityError::MissingVersion)?;
    let capabilities = Capabilities::from_version(parse_version(raw)?);
    info!(
        version = %capabilities.version,
        context_profiles = capabilities.context_profiles,
        "detected manager capabilities"
    );
    Ok(capabilities)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{detect, parse_version, Capabilities, CapabilityError};
    use crate::model::{SectionSpec, TargetType};
    use crate::transport::fake::FakeTransport;
    use crate::transport::Method;

    #[test]
    fn context_profiles_start_at_2_4() {
        let old = Capabilities::from_version(parse_version("2.3.1").expect("parse"));
        assert!(!old.context_profiles);
        assert!(!old.firewall_catalog_types().contains(&TargetType::NsProfile));

        let new = Capabilities::from_version(parse_version("2.4.0").expect("parse"));
        assert!(new.context_profiles);
        assert!(new.firewall_catalog_types().contains(&TargetType::NsProfile));

        let three = Capabilities::from_version(parse_version("3.0.2.0.0.16887200").expect("parse"));
        assert!(three.context_profiles);
    }

    #[test]
    fn garbage_versions_fail() {
        for raw in ["banana", "2", "", "x.4"] {
            assert!(
                matches!(parse_version(raw), Err(CapabilityError::UnparseableVersion { .. })),
                "{raw} should not parse"
            );
        }
    }

    #[test]
    fn gating_strips_context_profiles() {
        let mut spec: SectionSpec = serde_json::from_value(json!({
            "display_name": "S1",
            "stateful": true,
            "rules": [{
                "display_name": "R1",
                "action": "ALLOW",
                "context_profiles": [{"target_type": "NSProfile", "target_display_name": "HTTP"}]
            }]
        }))
        .expect("section");

        let old = Capabilities::from_version(parse_version("2.3").expect("parse"));
        old.gate_section(&mut spec);
        assert!(spec.rules[0].context_profiles.is_empty());
    }

    #[test]
    fn detect_reads_upgrade_summary() {
        let transport = FakeTransport::new().on(
            Method::Get,
            "/api/v1/upgrade/summary",
            json!({"system_version": "2.5.1.0.0.15314288"}),
        );
        let caps = detect(&transport).expect("detect");
        assert_eq!((caps.version.major, caps.version.minor), (2, 5));

        let broken = FakeTransport::new().on(
            Method::Get,
            "/api/v1/upgrade/summary",
            json!({"system_version": "banana"}),
        );
        assert!(matches!(
            detect(&broken),
            Err(CapabilityError::UnparseableVersion { .. })
        ));
    }
}
