//! Signing configuration supplying the per-identity match parameters.
//!
//! The config is a small JSON document; CLI flags override its values.
use crate::entitlements::Entitlements;
use crate::matching::MatchRequest;
use crate::profile::{DistributionType, Platform};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current schema version for the signing config file.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Default location of locally installed profiles, relative to the home directory.
const DEFAULT_PROFILES_REL: &str = "Library/MobileDevice/Provisioning Profiles";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    pub schema_version: u32,
    pub platform: Platform,
    pub distribution_type: DistributionType,
    #[serde(default)]
    pub min_profile_days_valid: i64,
    #[serde(default)]
    pub certificate_serials: Vec<String>,
    #[serde(default)]
    pub device_udids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_dir: Option<PathBuf>,
}

/// Values supplied on the command line; `None` keeps the config value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub platform: Option<Platform>,
    pub distribution_type: Option<DistributionType>,
    pub min_profile_days_valid: Option<i64>,
    pub certificate_serials: Vec<String>,
    pub device_udids: Vec<String>,
    pub profiles_dir: Option<PathBuf>,
}

/// Config used when no file is given: iOS app-store signing, no validity margin.
pub fn default_config() -> SigningConfig {
    SigningConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        platform: Platform::Ios,
        distribution_type: DistributionType::AppStore,
        min_profile_days_valid: 0,
        certificate_serials: Vec::new(),
        device_udids: Vec::new(),
        profiles_dir: None,
    }
}

pub fn load_config(path: &Path) -> Result<SigningConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: SigningConfig =
        serde_json::from_slice(&bytes).context("parse signing config JSON")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &SigningConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported signing config schema_version {}",
            config.schema_version
        ));
    }
    if config
        .certificate_serials
        .iter()
        .any(|serial| serial.trim().is_empty())
    {
        return Err(anyhow!("certificate_serials entries must be non-empty"));
    }
    if config.device_udids.iter().any(|udid| udid.trim().is_empty()) {
        return Err(anyhow!("device_udids entries must be non-empty"));
    }
    Ok(())
}

impl SigningConfig {
    /// Apply CLI overrides. Repeated list flags replace the config lists.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(platform) = overrides.platform {
            self.platform = platform;
        }
        if let Some(distribution_type) = overrides.distribution_type {
            self.distribution_type = distribution_type;
        }
        if let Some(days) = overrides.min_profile_days_valid {
            self.min_profile_days_valid = days;
        }
        if !overrides.certificate_serials.is_empty() {
            self.certificate_serials = overrides.certificate_serials;
        }
        if !overrides.device_udids.is_empty() {
            self.device_udids = overrides.device_udids;
        }
        if overrides.profiles_dir.is_some() {
            self.profiles_dir = overrides.profiles_dir;
        }
    }

    /// Build the match request for one bundle identity.
    pub fn request_for(&self, bundle_id: &str, entitlements: &Entitlements) -> MatchRequest {
        let mut request = MatchRequest::new(
            self.platform,
            self.distribution_type,
            bundle_id,
            entitlements.clone(),
        );
        request.min_profile_days_valid = self.min_profile_days_valid;
        request.certificate_serials = self.certificate_serials.clone();
        request.device_udids = self.device_udids.clone();
        request
    }

    /// Configured profiles directory, else the per-user default.
    pub fn resolve_profiles_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.profiles_dir {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
        Ok(home.join(DEFAULT_PROFILES_REL))
    }
}
