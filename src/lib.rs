//! Provisioning profile lookup for compiled application archives.
//!
//! [`archive::Archive`] decomposes an `.xcarchive` into signable bundle
//! identities; [`matching::find_profile`] picks a locally installed
//! provisioning profile for each of them.
pub mod archive;
pub mod bundle;
pub mod codesign;
pub mod config;
pub mod entitlements;
pub mod error;
pub mod export;
pub mod matching;
pub mod profile;
pub mod report;
#[cfg(test)]
mod test_support;
pub mod util;

pub use archive::Archive;
pub use error::{Result, SigningError};
pub use matching::{find_profile, MatchRequest, ProfileMatch};
pub use profile::ProvisioningProfile;
