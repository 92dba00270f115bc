//! Local profile selection for a single bundle identity.
//!
//! Filters are independent predicates; the engine chains them under a
//! [`MatchPass`] and scans the local profiles twice, exact pass first.
mod engine;
pub mod filters;

pub use engine::{evaluate, find_profile, first_matching, MatchPass, ProfileMatch, Rejection};

use crate::entitlements::Entitlements;
use crate::profile::{DistributionType, Platform};
use std::time::SystemTime;

/// Parameters for one match attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub platform: Platform,
    pub distribution_type: DistributionType,
    pub bundle_id: String,
    pub entitlements: Entitlements,
    /// Days the profile must stay valid; non-positive means "not yet expired".
    pub min_profile_days_valid: i64,
    pub certificate_serials: Vec<String>,
    pub device_udids: Vec<String>,
    /// Instant the validity window is measured from.
    pub evaluated_at: SystemTime,
}

impl MatchRequest {
    pub fn new(
        platform: Platform,
        distribution_type: DistributionType,
        bundle_id: impl Into<String>,
        entitlements: Entitlements,
    ) -> Self {
        MatchRequest {
            platform,
            distribution_type,
            bundle_id: bundle_id.into(),
            entitlements,
            min_profile_days_valid: 0,
            certificate_serials: Vec::new(),
            device_udids: Vec::new(),
            evaluated_at: SystemTime::now(),
        }
    }
}
