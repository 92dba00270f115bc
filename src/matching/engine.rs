use super::filters;
use super::MatchRequest;
use crate::entitlements::{first_unsatisfied, EntitlementMode};
use crate::profile::ProvisioningProfile;
use serde::Serialize;
use std::fmt;

/// Parameters of one scan over the local profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchPass {
    pub entitlements: EntitlementMode,
    pub exclude_xcode_managed: bool,
}

impl MatchPass {
    /// Exact entitlements, manual signing only.
    pub const EXACT: MatchPass = MatchPass {
        entitlements: EntitlementMode::Exact,
        exclude_xcode_managed: true,
    };
    /// Superset entitlements for requirements added at build time (package
    /// dependencies). Xcode-managed profiles are not excluded here.
    pub const SUPERSET: MatchPass = MatchPass {
        entitlements: EntitlementMode::Superset,
        exclude_xcode_managed: false,
    };
    /// Passes in preference order.
    pub const ORDER: [MatchPass; 2] = [MatchPass::EXACT, MatchPass::SUPERSET];

    pub fn name(&self) -> &'static str {
        self.entitlements.as_str()
    }
}

/// First filter a profile failed in a given pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Inactive,
    DistributionType,
    BundleId,
    Platform,
    Certificates,
    Entitlement(String),
    Devices,
    XcodeManaged,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Inactive => f.write_str("expired or expiring within the validity window"),
            Rejection::DistributionType => f.write_str("distribution type differs"),
            Rejection::BundleId => f.write_str("bundle id differs"),
            Rejection::Platform => f.write_str("platform differs"),
            Rejection::Certificates => f.write_str("missing a required certificate"),
            Rejection::Entitlement(key) => write!(f, "entitlement {key} not satisfied"),
            Rejection::Devices => f.write_str("missing a required device"),
            Rejection::XcodeManaged => f.write_str("managed by Xcode"),
        }
    }
}

/// Run the filter chain for one profile.
pub fn evaluate(
    profile: &ProvisioningProfile,
    request: &MatchRequest,
    pass: MatchPass,
) -> Result<(), Rejection> {
    if !filters::is_active(profile, request.min_profile_days_valid, request.evaluated_at) {
        return Err(Rejection::Inactive);
    }
    if !filters::has_matching_distribution_type(profile, request.distribution_type) {
        return Err(Rejection::DistributionType);
    }
    if !filters::has_matching_bundle_id(profile, &request.bundle_id) {
        return Err(Rejection::BundleId);
    }
    if !filters::has_matching_platform(profile, request.platform) {
        return Err(Rejection::Platform);
    }
    if !filters::has_matching_local_certificates(profile, &request.certificate_serials) {
        return Err(Rejection::Certificates);
    }
    if let Some(key) = first_unsatisfied(
        pass.entitlements,
        &profile.entitlements,
        &request.entitlements,
    ) {
        return Err(Rejection::Entitlement(key.to_string()));
    }
    if !filters::provisions_devices(profile, &request.device_udids) {
        return Err(Rejection::Devices);
    }
    if pass.exclude_xcode_managed && filters::is_xcode_managed(profile) {
        return Err(Rejection::XcodeManaged);
    }
    Ok(())
}

/// First profile, in input order, accepted by `pass`.
pub fn first_matching<'a>(
    profiles: &'a [ProvisioningProfile],
    request: &MatchRequest,
    pass: MatchPass,
) -> Option<&'a ProvisioningProfile> {
    profiles.iter().find(|profile| match evaluate(profile, request, pass) {
        Ok(()) => true,
        Err(reason) => {
            tracing::trace!(
                pass = pass.name(),
                profile = %profile.name,
                %reason,
                "profile rejected"
            );
            false
        }
    })
}

/// A selected profile, detached from the scanned collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatch {
    pub profile: ProvisioningProfile,
    pub pass: MatchPass,
}

/// Exact pass first, superset pass only when the exact pass finds nothing.
pub fn find_profile(
    profiles: &[ProvisioningProfile],
    request: &MatchRequest,
) -> Option<ProfileMatch> {
    for pass in MatchPass::ORDER {
        if let Some(profile) = first_matching(profiles, request, pass) {
            tracing::info!(
                bundle_id = %request.bundle_id,
                pass = pass.name(),
                profile = %profile.name,
                "profile matched"
            );
            return Some(ProfileMatch {
                profile: profile.clone(),
                pass,
            });
        }
        tracing::debug!(bundle_id = %request.bundle_id, pass = pass.name(), "no profile matched");
    }
    None
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
