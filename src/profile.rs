//! Provisioning profile values and their decoding from `.mobileprovision`
//! files.
//!
//! Profiles are read once and treated as immutable values. The CMS envelope
//! is decoded to reach the embedded property list; its signature is not
//! verified.
use crate::entitlements::Entitlements;
use crate::error::{Result, SigningError};
use cryptographic_message_syntax::SignedData;
use plist::{Dictionary, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

/// File extensions recognized as provisioning profiles in a profiles directory.
pub const PROFILE_EXTENSIONS: [&str; 2] = ["mobileprovision", "provisionprofile"];

const XCODE_MANAGED_PREFIX: &str = "XC";
const XCODE_MANAGED_NAMES: [&str; 4] = [
    "iOS Team Provisioning Profile",
    "tvOS Team Provisioning Profile",
    "Mac Team Provisioning Profile",
    "Mac Catalyst Team Provisioning Profile",
];

/// Platform a signing request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "iOS")]
    Ios,
    #[serde(rename = "tvOS")]
    TvOs,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::TvOs => "tvOS",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "tvos" => Ok(Platform::TvOs),
            _ => Err(format!("unsupported platform {s:?} (expected iOS or tvOS)")),
        }
    }
}

/// Distribution channel a profile authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionType {
    Development,
    AppStore,
    AdHoc,
    Enterprise,
}

impl DistributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionType::Development => "development",
            DistributionType::AppStore => "app-store",
            DistributionType::AdHoc => "ad-hoc",
            DistributionType::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(DistributionType::Development),
            "app-store" => Ok(DistributionType::AppStore),
            "ad-hoc" => Ok(DistributionType::AdHoc),
            "enterprise" => Ok(DistributionType::Enterprise),
            _ => Err(format!(
                "unsupported distribution type {s:?} (expected development, app-store, ad-hoc or enterprise)"
            )),
        }
    }
}

/// A local signing credential.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningProfile {
    pub uuid: String,
    pub name: String,
    pub team_id: String,
    pub team_name: String,
    /// Bundle ID pattern from `application-identifier`, without the team prefix.
    pub bundle_id: String,
    pub export_type: DistributionType,
    /// Lower-cased platform tag (`ios`, `tvos`, `osx`).
    pub platform: String,
    pub expiration_date: SystemTime,
    /// Decimal serial numbers of the developer certificates.
    pub certificate_serials: Vec<String>,
    pub provisioned_devices: Vec<String>,
    pub provisions_all_devices: bool,
    pub entitlements: Entitlements,
}

impl ProvisioningProfile {
    /// Read and decode a profile file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SigningError::not_found("provisioning profile", path));
        }
        let bytes = fs::read(path).map_err(|err| SigningError::io(path, err))?;
        Self::from_bytes(&bytes, path)
    }

    /// Decode a profile from its CMS `SignedData` envelope. Input that is not
    /// CMS is read as a bare property list (XML or binary).
    ///
    /// `origin` is only used for error reporting.
    pub fn from_bytes(bytes: &[u8], origin: &Path) -> Result<Self> {
        let signed_data = SignedData::parse_ber(bytes).ok();
        let content = match &signed_data {
            Some(signed_data) => signed_data
                .signed_content()
                .ok_or_else(|| SigningError::parse(origin, "signed envelope has no content"))?,
            None => bytes,
        };
        let value = Value::from_reader(Cursor::new(content))
            .map_err(|err| SigningError::parse(origin, err.to_string()))?;
        let dictionary = value
            .into_dictionary()
            .ok_or_else(|| SigningError::parse(origin, "profile is not a dictionary"))?;
        Self::from_dictionary(&dictionary, origin)
    }

    fn from_dictionary(dictionary: &Dictionary, origin: &Path) -> Result<Self> {
        let missing = |key: &str| SigningError::parse(origin, format!("missing {key}"));

        let expiration_date = dictionary
            .get("ExpirationDate")
            .and_then(Value::as_date)
            .map(SystemTime::from)
            .ok_or_else(|| missing("ExpirationDate"))?;
        let entitlements = dictionary
            .get("Entitlements")
            .and_then(Value::as_dictionary)
            .cloned()
            .map(Entitlements::from_dictionary)
            .unwrap_or_default();

        let team_id = first_string(dictionary, "TeamIdentifier")
            .or_else(|| first_string(dictionary, "ApplicationIdentifierPrefix"))
            .unwrap_or_default();
        let application_identifier = entitlements
            .get("application-identifier")
            .or_else(|| entitlements.get("com.apple.application-identifier"))
            .and_then(Value::as_string)
            .ok_or_else(|| missing("application-identifier entitlement"))?;
        let bundle_id = application_identifier
            .strip_prefix(&format!("{team_id}."))
            .unwrap_or(application_identifier)
            .to_string();

        let provisioned_devices = string_array(dictionary, "ProvisionedDevices");
        let provisions_all_devices = dictionary
            .get("ProvisionsAllDevices")
            .and_then(Value::as_boolean)
            .unwrap_or(false);
        let get_task_allow = entitlements
            .get("get-task-allow")
            .and_then(Value::as_boolean)
            .unwrap_or(false);
        let export_type = export_type(
            provisions_all_devices,
            provisioned_devices.is_some(),
            get_task_allow,
        );

        let certificate_serials = match dictionary.get("DeveloperCertificates") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_data)
                .map(|der| certificate_serial(der, origin))
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(ProvisioningProfile {
            uuid: string_value(dictionary, "UUID").unwrap_or_default(),
            name: string_value(dictionary, "Name").unwrap_or_default(),
            team_name: string_value(dictionary, "TeamName").unwrap_or_default(),
            platform: first_string(dictionary, "Platform")
                .unwrap_or_else(|| "iOS".to_string())
                .to_ascii_lowercase(),
            team_id,
            bundle_id,
            export_type,
            expiration_date,
            certificate_serials,
            provisioned_devices: provisioned_devices.unwrap_or_default(),
            provisions_all_devices,
            entitlements,
        })
    }

    /// Whether the profile is generated and renewed by Xcode.
    pub fn is_xcode_managed(&self) -> bool {
        self.name.starts_with(XCODE_MANAGED_PREFIX)
            || XCODE_MANAGED_NAMES
                .iter()
                .any(|marker| self.name.contains(marker))
    }
}

/// Load every profile in `dir`, ordered by file name.
///
/// Files that fail to decode are skipped with a warning; a missing directory
/// is an error.
pub fn load_profiles_dir(dir: &Path) -> Result<Vec<ProvisioningProfile>> {
    if !dir.is_dir() {
        return Err(SigningError::not_found("profiles directory", dir));
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|err| SigningError::io(dir, err))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| PROFILE_EXTENSIONS.contains(&ext))
        })
        .collect();
    paths.sort();

    let mut profiles = Vec::with_capacity(paths.len());
    for path in paths {
        match ProvisioningProfile::from_file(&path) {
            Ok(profile) => profiles.push(profile),
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping profile"),
        }
    }
    tracing::debug!(dir = %dir.display(), count = profiles.len(), "loaded local profiles");
    Ok(profiles)
}

fn export_type(
    provisions_all_devices: bool,
    has_devices: bool,
    get_task_allow: bool,
) -> DistributionType {
    if provisions_all_devices {
        DistributionType::Enterprise
    } else if has_devices && get_task_allow {
        DistributionType::Development
    } else if has_devices {
        DistributionType::AdHoc
    } else {
        DistributionType::AppStore
    }
}

fn string_value(dictionary: &Dictionary, key: &str) -> Option<String> {
    dictionary
        .get(key)
        .and_then(Value::as_string)
        .map(str::to_string)
}

fn string_array(dictionary: &Dictionary, key: &str) -> Option<Vec<String>> {
    dictionary.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_string)
            .map(str::to_string)
            .collect()
    })
}

fn first_string(dictionary: &Dictionary, key: &str) -> Option<String> {
    string_array(dictionary, key).and_then(|items| items.into_iter().next())
}

fn certificate_serial(der: &[u8], origin: &Path) -> Result<String> {
    let certificate = x509_certificate::X509Certificate::from_der(der)
        .map_err(|err| SigningError::parse(origin, format!("developer certificate: {err}")))?;
    Ok(serial_to_decimal(certificate.serial_number_asn1().as_slice()))
}

/// Render a big-endian unsigned serial as a decimal string.
pub fn serial_to_decimal(bytes: &[u8]) -> String {
    // little-endian base-10 digits
    let mut digits: Vec<u8> = vec![0];
    for byte in bytes {
        let mut carry = u32::from(*byte);
        for digit in digits.iter_mut() {
            let value = u32::from(*digit) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }
    digits.iter().rev().map(|digit| char::from(b'0' + digit)).collect()
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
