//! Profile predicates. Each check reads only the profile and its argument.
use crate::profile::{DistributionType, Platform, ProvisioningProfile};
use std::time::{Duration, SystemTime};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// `now + min_days_valid < expiration`; non-positive windows reduce to `now < expiration`.
pub fn is_active(profile: &ProvisioningProfile, min_days_valid: i64, now: SystemTime) -> bool {
    let mut horizon = now;
    if min_days_valid > 0 {
        let later = min_days_valid
            .unsigned_abs()
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|secs| now.checked_add(Duration::from_secs(secs)));
        match later {
            Some(later) => horizon = later,
            None => return false,
        }
    }
    horizon < profile.expiration_date
}

pub fn has_matching_distribution_type(
    profile: &ProvisioningProfile,
    distribution_type: DistributionType,
) -> bool {
    profile.export_type == distribution_type
}

pub fn has_matching_bundle_id(profile: &ProvisioningProfile, bundle_id: &str) -> bool {
    profile.bundle_id == bundle_id
}

pub fn has_matching_platform(profile: &ProvisioningProfile, platform: Platform) -> bool {
    platform.as_str().to_ascii_lowercase() == profile.platform
}

/// Every required serial must be among the profile's certificates.
pub fn has_matching_local_certificates(
    profile: &ProvisioningProfile,
    certificate_serials: &[String],
) -> bool {
    certificate_serials
        .iter()
        .all(|serial| profile.certificate_serials.contains(serial))
}

/// Vacuously true for all-devices profiles or when no devices are required.
pub fn provisions_devices(profile: &ProvisioningProfile, device_udids: &[String]) -> bool {
    if profile.provisions_all_devices || device_udids.is_empty() {
        return true;
    }
    device_udids
        .iter()
        .all(|udid| profile.provisioned_devices.contains(udid))
}

/// Exclusion filter: Xcode-managed profiles are not used for manual signing.
pub fn is_xcode_managed(profile: &ProvisioningProfile) -> bool {
    profile.is_xcode_managed()
}
