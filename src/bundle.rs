//! Typed model of the signable bundles inside an archive.
//!
//! The tree has a fixed shape: an application owns extensions, an optional
//! watch application (with its own extensions), an optional app clip and
//! the embedded frameworks that are signed independently. Every node wraps
//! a [`BaseIdentity`] except frameworks, which only carry what matching needs.
use crate::codesign::EntitlementsReader;
use crate::entitlements::Entitlements;
use crate::error::{Result, SigningError};
use crate::profile::ProvisioningProfile;
use plist::{Dictionary, Value};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const INFO_PLIST: &str = "Info.plist";
pub const EMBEDDED_PROFILE: &str = "embedded.mobileprovision";
const BUNDLE_ID_KEY: &str = "CFBundleIdentifier";
const EXECUTABLE_KEY: &str = "CFBundleExecutable";

/// Convenience wrapper for locating artifacts inside a bundle directory.
#[derive(Debug, Clone)]
pub struct BundlePaths {
    root: PathBuf,
}

impl BundlePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the `Info.plist` path.
    pub fn info_plist(&self) -> PathBuf {
        self.root.join(INFO_PLIST)
    }

    /// Return the `embedded.mobileprovision` path.
    pub fn embedded_profile(&self) -> PathBuf {
        self.root.join(EMBEDDED_PROFILE)
    }

    /// Return the `PlugIns/` directory holding app extensions.
    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("PlugIns")
    }

    /// Return the `Watch/` directory holding a companion watch app.
    pub fn watch_dir(&self) -> PathBuf {
        self.root.join("Watch")
    }

    /// Return the `AppClips/` directory.
    pub fn app_clips_dir(&self) -> PathBuf {
        self.root.join("AppClips")
    }

    /// Return the `Frameworks/` directory.
    pub fn frameworks_dir(&self) -> PathBuf {
        self.root.join("Frameworks")
    }

    /// Directory name without its extension (`App.app` -> `App`).
    pub fn stem(&self) -> String {
        self.root
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Read and decode a bundle manifest.
pub fn read_info_plist(path: &Path) -> Result<Dictionary> {
    if !path.is_file() {
        return Err(SigningError::not_found("Info.plist", path));
    }
    Value::from_file(path)
        .map_err(|err| SigningError::parse(path, err.to_string()))?
        .into_dictionary()
        .ok_or_else(|| SigningError::parse(path, "manifest is not a dictionary"))
}

/// Fields shared by every bundle that carries its own manifest and profile.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseIdentity {
    pub path: PathBuf,
    pub bundle_id: String,
    pub info_plist: Dictionary,
    pub entitlements: Entitlements,
    pub provisioning_profile: ProvisioningProfile,
}

impl BaseIdentity {
    /// Build an identity from a bundle directory.
    ///
    /// The manifest and the embedded profile are mandatory. Entitlements that
    /// cannot be extracted are recorded as empty.
    pub fn open(path: &Path, reader: &dyn EntitlementsReader) -> Result<Self> {
        let paths = BundlePaths::new(path.to_path_buf());
        let info_plist_path = paths.info_plist();
        let info_plist = read_info_plist(&info_plist_path)?;
        let bundle_id = info_plist
            .get(BUNDLE_ID_KEY)
            .and_then(Value::as_string)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SigningError::parse(&info_plist_path, "missing CFBundleIdentifier"))?;

        let profile_path = paths.embedded_profile();
        if !profile_path.is_file() {
            return Err(SigningError::not_found("embedded profile", &profile_path));
        }
        let provisioning_profile = ProvisioningProfile::from_file(&profile_path)?;

        let executable = executable_name(&info_plist, &paths);
        let entitlements = match reader.read_entitlements(path, &executable) {
            Ok(entitlements) => entitlements,
            Err(err) => {
                tracing::warn!(
                    bundle_id = %bundle_id,
                    error = %err,
                    "entitlements unavailable, continuing without them"
                );
                Entitlements::new()
            }
        };

        Ok(BaseIdentity {
            path: path.to_path_buf(),
            bundle_id,
            info_plist,
            entitlements,
            provisioning_profile,
        })
    }
}

fn executable_name(info_plist: &Dictionary, paths: &BundlePaths) -> String {
    info_plist
        .get(EXECUTABLE_KEY)
        .and_then(Value::as_string)
        .map(str::to_string)
        .unwrap_or_else(|| paths.stem())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub base: BaseIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchApplication {
    pub base: BaseIdentity,
    pub extensions: Vec<Extension>,
}

/// App clips carry no nested extensions in this model.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipApplication {
    pub base: BaseIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub base: BaseIdentity,
    pub watch_application: Option<WatchApplication>,
    pub clip_application: Option<ClipApplication>,
    pub extensions: Vec<Extension>,
    pub frameworks: Vec<FrameworkIdentity>,
}

/// An embedded framework that ships its own provisioning profile.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkIdentity {
    pub path: PathBuf,
    pub bundle_id: String,
    pub entitlements: Entitlements,
    /// `None` when the embedded profile exists but cannot be decoded.
    pub provisioning_profile: Option<ProvisioningProfile>,
}

impl FrameworkIdentity {
    /// Build a framework identity, or `None` when the framework does not
    /// need independent signing or its Info.plist is unreadable.
    pub fn open(path: &Path, reader: &dyn EntitlementsReader) -> Option<Self> {
        let paths = BundlePaths::new(path.to_path_buf());
        let profile_path = paths.embedded_profile();
        if !profile_path.is_file() {
            return None;
        }
        let info_plist = match read_info_plist(&paths.info_plist()) {
            Ok(info_plist) => info_plist,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping framework");
                return None;
            }
        };
        let bundle_id = info_plist
            .get(BUNDLE_ID_KEY)
            .and_then(Value::as_string)
            .filter(|id| !id.is_empty())?
            .to_string();
        let provisioning_profile = match ProvisioningProfile::from_file(&profile_path) {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::debug!(
                    bundle_id = %bundle_id,
                    error = %err,
                    "framework profile unreadable"
                );
                None
            }
        };
        let entitlements = reader
            .read_entitlements(path, &paths.stem())
            .unwrap_or_else(|err| {
                tracing::debug!(
                    bundle_id = %bundle_id,
                    error = %err,
                    "framework without entitlements"
                );
                Entitlements::new()
            });

        Some(FrameworkIdentity {
            path: path.to_path_buf(),
            bundle_id,
            entitlements,
            provisioning_profile,
        })
    }
}

/// Node kind of a [`BundleIdentity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    Application,
    Extension,
    WatchApplication,
    WatchExtension,
    ClipApplication,
    Framework,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Application => "application",
            IdentityKind::Extension => "extension",
            IdentityKind::WatchApplication => "watch_application",
            IdentityKind::WatchExtension => "watch_extension",
            IdentityKind::ClipApplication => "clip_application",
            IdentityKind::Framework => "framework",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view over any node of the bundle tree.
#[derive(Debug, Clone, Copy)]
pub enum BundleIdentity<'a> {
    Application(&'a Application),
    Extension(&'a Extension),
    WatchApplication(&'a WatchApplication),
    WatchExtension(&'a Extension),
    ClipApplication(&'a ClipApplication),
    Framework(&'a FrameworkIdentity),
}

impl<'a> BundleIdentity<'a> {
    pub fn kind(&self) -> IdentityKind {
        match self {
            BundleIdentity::Application(_) => IdentityKind::Application,
            BundleIdentity::Extension(_) => IdentityKind::Extension,
            BundleIdentity::WatchApplication(_) => IdentityKind::WatchApplication,
            BundleIdentity::WatchExtension(_) => IdentityKind::WatchExtension,
            BundleIdentity::ClipApplication(_) => IdentityKind::ClipApplication,
            BundleIdentity::Framework(_) => IdentityKind::Framework,
        }
    }

    fn node(&self) -> Node<'a> {
        match *self {
            BundleIdentity::Application(app) => Node::Base(&app.base),
            BundleIdentity::Extension(ext) | BundleIdentity::WatchExtension(ext) => {
                Node::Base(&ext.base)
            }
            BundleIdentity::WatchApplication(watch) => Node::Base(&watch.base),
            BundleIdentity::ClipApplication(clip) => Node::Base(&clip.base),
            BundleIdentity::Framework(framework) => Node::Framework(framework),
        }
    }

    pub fn bundle_id(&self) -> &'a str {
        match self.node() {
            Node::Base(base) => &base.bundle_id,
            Node::Framework(framework) => &framework.bundle_id,
        }
    }

    pub fn path(&self) -> &'a Path {
        match self.node() {
            Node::Base(base) => &base.path,
            Node::Framework(framework) => &framework.path,
        }
    }

    pub fn entitlements(&self) -> &'a Entitlements {
        match self.node() {
            Node::Base(base) => &base.entitlements,
            Node::Framework(framework) => &framework.entitlements,
        }
    }

    /// Embedded profile; only a framework can lack a decodable one.
    pub fn provisioning_profile(&self) -> Option<&'a ProvisioningProfile> {
        match self.node() {
            Node::Base(base) => Some(&base.provisioning_profile),
            Node::Framework(framework) => framework.provisioning_profile.as_ref(),
        }
    }
}

enum Node<'a> {
    Base(&'a BaseIdentity),
    Framework(&'a FrameworkIdentity),
}
