//! Serializable views printed by the CLI.
//!
//! Reports are built from the archive and match results without holding
//! references, so they can be printed as JSON or text.
use crate::archive::Archive;
use crate::bundle::{BundleIdentity, IdentityKind};
use crate::matching::ProfileMatch;
use crate::profile::ProvisioningProfile;
use crate::util::relative_display;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub uuid: String,
    pub team_id: String,
    pub bundle_id: String,
    pub export_type: String,
    pub expires_at_epoch_secs: u64,
    pub xcode_managed: bool,
}

impl From<&ProvisioningProfile> for ProfileSummary {
    fn from(profile: &ProvisioningProfile) -> Self {
        ProfileSummary {
            name: profile.name.clone(),
            uuid: profile.uuid.clone(),
            team_id: profile.team_id.clone(),
            bundle_id: profile.bundle_id.clone(),
            export_type: profile.export_type.to_string(),
            expires_at_epoch_secs: epoch_secs(profile.expiration_date),
            xcode_managed: profile.is_xcode_managed(),
        }
    }
}

fn epoch_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityReport {
    pub kind: IdentityKind,
    pub bundle_id: String,
    pub path: String,
    pub entitlement_keys: Vec<String>,
    pub embedded_profile: Option<ProfileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub archive: String,
    pub team_id: Option<String>,
    pub team_ids: Vec<String>,
    pub signing_identity: String,
    pub xcode_managed: bool,
    pub duplicate_bundle_ids: Vec<String>,
    pub identities: Vec<IdentityReport>,
}

impl ArchiveReport {
    pub fn new(archive: &Archive) -> Self {
        let identities = archive
            .identities()
            .iter()
            .map(|identity| identity_report(archive, identity))
            .collect();
        ArchiveReport {
            archive: archive.path.display().to_string(),
            team_id: archive.team_id().ok(),
            team_ids: archive.team_ids().into_iter().collect(),
            signing_identity: archive.signing_identity(),
            xcode_managed: archive.is_xcode_managed(),
            duplicate_bundle_ids: archive.duplicate_bundle_ids(),
            identities,
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("archive: {}\n", self.archive);
        out.push_str(&format!(
            "team: {}\n",
            self.team_id.as_deref().unwrap_or("<unknown>")
        ));
        if !self.signing_identity.is_empty() {
            out.push_str(&format!("signing identity: {}\n", self.signing_identity));
        }
        for identity in &self.identities {
            out.push_str(&format!(
                "- {} {} ({})\n",
                identity.kind, identity.bundle_id, identity.path
            ));
            match &identity.embedded_profile {
                Some(profile) => out.push_str(&format!(
                    "    profile: {} [{}]\n",
                    profile.name, profile.export_type
                )),
                None => out.push_str("    profile: <unreadable>\n"),
            }
            if !identity.entitlement_keys.is_empty() {
                out.push_str(&format!(
                    "    entitlements: {}\n",
                    identity.entitlement_keys.join(", ")
                ));
            }
        }
        if self.team_ids.len() > 1 {
            out.push_str(&format!(
                "warning: profiles from multiple teams: {}\n",
                self.team_ids.join(", ")
            ));
        }
        if !self.duplicate_bundle_ids.is_empty() {
            out.push_str(&format!(
                "warning: duplicate bundle ids: {}\n",
                self.duplicate_bundle_ids.join(", ")
            ));
        }
        out
    }
}

fn identity_report(archive: &Archive, identity: &BundleIdentity<'_>) -> IdentityReport {
    IdentityReport {
        kind: identity.kind(),
        bundle_id: identity.bundle_id().to_string(),
        path: relative_display(identity.path(), &archive.path),
        entitlement_keys: identity.entitlements().keys().map(str::to_string).collect(),
        embedded_profile: identity.provisioning_profile().map(ProfileSummary::from),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchEntry {
    pub bundle_id: String,
    pub pass: Option<&'static str>,
    pub profile: Option<ProfileSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl MatchEntry {
    pub fn new(bundle_id: &str, found: Option<&ProfileMatch>, request_summary: &str) -> Self {
        match found {
            Some(found) => MatchEntry {
                bundle_id: bundle_id.to_string(),
                pass: Some(found.pass.name()),
                profile: Some(ProfileSummary::from(&found.profile)),
                remediation: None,
            },
            None => MatchEntry {
                bundle_id: bundle_id.to_string(),
                pass: None,
                profile: None,
                remediation: Some(format!(
                    "create or download a manually managed {request_summary} profile for {bundle_id}"
                )),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub archive: String,
    pub profiles_dir: String,
    pub local_profile_count: usize,
    pub matches: Vec<MatchEntry>,
}

impl MatchReport {
    pub fn unmatched(&self) -> impl Iterator<Item = &MatchEntry> {
        self.matches.iter().filter(|entry| entry.profile.is_none())
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "archive: {}\nprofiles: {} ({} installed)\n",
            self.archive, self.profiles_dir, self.local_profile_count
        );
        for entry in &self.matches {
            match (&entry.profile, entry.pass) {
                (Some(profile), Some(pass)) => out.push_str(&format!(
                    "- {}: {} ({}) via {pass} match\n",
                    entry.bundle_id, profile.name, profile.uuid
                )),
                _ => out.push_str(&format!(
                    "- {}: no matching profile; {}\n",
                    entry.bundle_id,
                    entry.remediation.as_deref().unwrap_or_default()
                )),
            }
        }
        out
    }
}
