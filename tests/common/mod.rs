//! Shared archive and profile fixtures for integration tests.

use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub const TEAM_ID: &str = "ABCDE12345";
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// An archive on disk plus a directory of locally installed profiles.
pub struct Workspace {
    _dir: TempDir,
    pub archive: PathBuf,
    pub profiles_dir: PathBuf,
}

impl Workspace {
    /// Archive whose primary application carries `bundle_id`.
    pub fn with_app(bundle_id: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let archive = dir.path().join("Acme.xcarchive");
        let profiles_dir = dir.path().join("Provisioning Profiles");
        fs::create_dir_all(&profiles_dir).expect("create profiles dir");
        write_file(
            &archive.join("Info.plist"),
            &plist_bytes(archive_manifest("Applications/Acme.app")),
        );
        let workspace = Workspace {
            _dir: dir,
            archive,
            profiles_dir,
        };
        workspace.add_bundle("", bundle_id);
        workspace
    }

    pub fn app(&self) -> PathBuf {
        self.archive.join("Products/Applications/Acme.app")
    }

    /// Lay out a bundle at `relative` (under the app) with its embedded profile.
    pub fn add_bundle(&self, relative: &str, bundle_id: &str) -> PathBuf {
        let path = if relative.is_empty() {
            self.app()
        } else {
            self.app().join(relative)
        };
        write_file(&path.join("Info.plist"), &plist_bytes(info_plist(bundle_id)));
        write_file(
            &path.join("embedded.mobileprovision"),
            &cms_wrapped(&plist_bytes(
                ProfileSpec::new(&format!("{bundle_id} Embedded"), bundle_id).build(),
            )),
        );
        path
    }

    /// Record the entitlements the bundle at `path` was signed with.
    pub fn sign_with(&self, path: &Path, entitlements: Dictionary) {
        write_file(
            &path.join("archived-expanded-entitlements.xcent"),
            &plist_bytes(entitlements),
        );
    }

    pub fn install_profile(&self, file_name: &str, spec: ProfileSpec) {
        write_file(
            &self.profiles_dir.join(file_name),
            &cms_wrapped(&plist_bytes(spec.build())),
        );
    }
}

/// Builder for the property list inside a `.mobileprovision` file.
pub struct ProfileSpec {
    name: String,
    bundle_id: String,
    expiration: SystemTime,
    entitlements: Dictionary,
    devices: Option<Vec<String>>,
}

impl ProfileSpec {
    pub fn new(name: &str, bundle_id: &str) -> Self {
        let mut entitlements = Dictionary::new();
        entitlements.insert(
            "application-identifier".to_string(),
            Value::String(format!("{TEAM_ID}.{bundle_id}")),
        );
        ProfileSpec {
            name: name.to_string(),
            bundle_id: bundle_id.to_string(),
            expiration: SystemTime::now() + DAY * 90,
            entitlements,
            devices: None,
        }
    }

    #[allow(dead_code)]
    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expiration = SystemTime::now() + expires_in;
        self
    }

    #[allow(dead_code)]
    pub fn expired(mut self) -> Self {
        self.expiration = SystemTime::now() - DAY;
        self
    }

    pub fn entitlement(mut self, key: &str, value: Value) -> Self {
        self.entitlements.insert(key.to_string(), value);
        self
    }

    #[allow(dead_code)]
    pub fn devices(mut self, devices: &[&str]) -> Self {
        self.devices = Some(devices.iter().map(|udid| udid.to_string()).collect());
        self
    }

    pub fn build(self) -> Dictionary {
        let mut dictionary = Dictionary::new();
        dictionary.insert("Name".to_string(), Value::String(self.name));
        dictionary.insert(
            "UUID".to_string(),
            Value::String(format!("uuid-{}", self.bundle_id)),
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
            Value::Date(self.expiration.into()),
        );
        if let Some(devices) = self.devices {
            dictionary.insert(
                "ProvisionedDevices".to_string(),
                Value::Array(devices.into_iter().map(Value::String).collect()),
            );
        }
        dictionary.insert(
            "Entitlements".to_string(),
            Value::Dictionary(self.entitlements),
        );
        dictionary
    }
}

pub fn entitlements(pairs: &[(&str, Value)]) -> Dictionary {
    let mut dictionary = Dictionary::new();
    for (key, value) in pairs {
        dictionary.insert(key.to_string(), value.clone());
    }
    dictionary
}

fn archive_manifest(application_path: &str) -> Dictionary {
    let mut properties = Dictionary::new();
    properties.insert(
        "ApplicationPath".to_string(),
        Value::String(application_path.to_string()),
    );
    properties.insert(
        "SigningIdentity".to_string(),
        Value::String(format!("Apple Distribution: Acme Inc ({TEAM_ID})")),
    );
    let mut manifest = Dictionary::new();
    manifest.insert(
        "ApplicationProperties".to_string(),
        Value::Dictionary(properties),
    );
    manifest
}

fn info_plist(bundle_id: &str) -> Dictionary {
    let mut dictionary = Dictionary::new();
    dictionary.insert(
        "CFBundleIdentifier".to_string(),
        Value::String(bundle_id.to_string()),
    );
    dictionary.insert(
        "CFBundleExecutable".to_string(),
        Value::String("Main".to_string()),
    );
    dictionary
}

/// Wrap the plist in a DER `ContentInfo`/`SignedData`, as a downloaded
/// profile is. The envelope carries no signers.
fn cms_wrapped(plist: &[u8]) -> Vec<u8> {
    const OID_SIGNED_DATA: [u8; 11] = [
        0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02,
    ];
    const OID_DATA: [u8; 11] = [
        0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01,
    ];

    let mut encapsulated = OID_DATA.to_vec();
    encapsulated.extend(der(0xa0, &der(0x04, plist)));
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

pub fn plist_bytes(dictionary: Dictionary) -> Vec<u8> {
    let mut bytes = Vec::new();
    Value::Dictionary(dictionary)
        .to_writer_xml(&mut bytes)
        .expect("serialize plist");
    bytes
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, bytes).expect("write file");
}
