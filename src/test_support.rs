//! Fixture builders shared by unit tests.
use crate::codesign::EntitlementsReader;
use crate::entitlements::Entitlements;
use crate::error::Result;
use crate::profile::{DistributionType, ProvisioningProfile};
use plist::{Dictionary, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const TEAM_ID: &str = "ABCDE12345";
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// An app-store profile for `bundle_id` valid for 30 more days.
pub fn profile(bundle_id: &str) -> ProvisioningProfile {
    ProvisioningProfile {
        uuid: format!("uuid-{bundle_id}"),
        name: format!("{bundle_id} AppStore"),
        team_id: TEAM_ID.to_string(),
        team_name: "Acme Inc".to_string(),
        bundle_id: bundle_id.to_string(),
        export_type: DistributionType::AppStore,
        platform: "ios".to_string(),
        expiration_date: SystemTime::now() + DAY * 30,
        certificate_serials: vec!["1234".to_string()],
        provisioned_devices: Vec::new(),
        provisions_all_devices: false,
        entitlements: Entitlements::new(),
    }
}

pub fn entitlements(pairs: &[(&str, Value)]) -> Entitlements {
    pairs
        .iter()
        .map(|(key, value)| (*key, value.clone()))
        .collect()
}

/// Property list for a profile as found inside a `.mobileprovision` file.
pub fn profile_plist(name: &str, bundle_id: &str, expires_in: Duration) -> Dictionary {
    let mut entitlements = Dictionary::new();
    entitlements.insert(
        "application-identifier".to_string(),
        Value::String(format!("{TEAM_ID}.{bundle_id}")),
    );
    entitlements.insert(
        "com.apple.developer.team-identifier".to_string(),
        Value::String(TEAM_ID.to_string()),
    );

    let mut dictionary = Dictionary::new();
    dictionary.insert("Name".to_string(), Value::String(name.to_string()));
    dictionary.insert(
        "UUID".to_string(),
        Value::String(format!("uuid-{bundle_id}")),
    );
    dictionary.insert("TeamName".to_string(), Value::String("Acme Inc".to_string()));
    dictionary.insert(
        "TeamIdentifier".to_string(),
        Value::Array(vec![Value::String(TEAM_ID.to_string())]),
    );
    dictionary.insert(
        "Platform".to_string(),
        Value::Array(vec![Value::String("iOS".to_string())]),
    );
    dictionary.insert(
        "ExpirationDate".to_string(),
        Value::Date((SystemTime::now() + expires_in).into()),
    );
    dictionary.insert("Entitlements".to_string(), Value::Dictionary(entitlements));
    dictionary
}

pub fn plist_bytes(dictionary: Dictionary) -> Vec<u8> {
    let mut bytes = Vec::new();
    Value::Dictionary(dictionary)
        .to_writer_xml(&mut bytes)
        .expect("serialize plist");
    bytes
}

pub fn binary_plist_bytes(dictionary: Dictionary) -> Vec<u8> {
    let mut bytes = Vec::new();
    Value::Dictionary(dictionary)
        .to_writer_binary(&mut bytes)
        .expect("serialize binary plist");
    bytes
}

const OID_SIGNED_DATA: [u8; 11] = [
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02,
];
const OID_DATA: [u8; 11] = [
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01,
];

/// DER `ContentInfo` holding an unsigned `SignedData` with `payload` inline.
pub fn signed_envelope(payload: &[u8]) -> Vec<u8> {
    let mut encapsulated = OID_DATA.to_vec();
    encapsulated.extend(der(0xa0, &der(0x04, payload)));

    // version 1, no digest algorithms, no signer infos
    let mut signed_data = vec![0x02, 0x01, 0x01, 0x31, 0x00];
    signed_data.extend(der(0x30, &encapsulated));
    signed_data.extend([0x31, 0x00]);

    let mut content_info = OID_SIGNED_DATA.to_vec();
    content_info.extend(der(0xa0, &der(0x30, &signed_data)));
    der(0x30, &content_info)
}

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    if content.len() < 0x80 {
        out.push(content.len() as u8);
    } else {
        let length = content.len().to_be_bytes();
        let significant: Vec<u8> = length.into_iter().skip_while(|byte| *byte == 0).collect();
        out.push(0x80 | significant.len() as u8);
        out.extend(significant);
    }
    out.extend_from_slice(content);
    out
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, bytes).expect("write file");
}

pub fn info_plist(bundle_id: &str, executable: &str) -> Vec<u8> {
    let mut dictionary = Dictionary::new();
    dictionary.insert(
        "CFBundleIdentifier".to_string(),
        Value::String(bundle_id.to_string()),
    );
    dictionary.insert(
        "CFBundleExecutable".to_string(),
        Value::String(executable.to_string()),
    );
    plist_bytes(dictionary)
}

/// Lay out a signable bundle with a manifest and an embedded profile.
pub fn write_bundle(path: &Path, bundle_id: &str) {
    let executable = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("App");
    write_file(&path.join("Info.plist"), &info_plist(bundle_id, executable));
    write_file(
        &path.join("embedded.mobileprovision"),
        &signed_envelope(&plist_bytes(profile_plist(
            &format!("{bundle_id} AppStore"),
            bundle_id,
            DAY * 30,
        ))),
    );
}

/// Entitlements reader keyed by bundle directory, standing in for `codesign`.
#[derive(Debug, Default)]
pub struct FakeEntitlements {
    by_bundle: BTreeMap<PathBuf, Entitlements>,
    failing: Vec<PathBuf>,
}

impl FakeEntitlements {
    pub fn with(mut self, bundle: &Path, entitlements: Entitlements) -> Self {
        self.by_bundle.insert(bundle.to_path_buf(), entitlements);
        self
    }

    pub fn failing(mut self, bundle: &Path) -> Self {
        self.failing.push(bundle.to_path_buf());
        self
    }
}

impl EntitlementsReader for FakeEntitlements {
    fn read_entitlements(&self, bundle_path: &Path, _executable: &str) -> Result<Entitlements> {
        if self.failing.iter().any(|path| path == bundle_path) {
            return Err(crate::error::SigningError::parse(
                bundle_path,
                "codesign failed",
            ));
        }
        Ok(self
            .by_bundle
            .get(bundle_path)
            .cloned()
            .unwrap_or_default())
    }
}
