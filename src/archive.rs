//! Decomposition of a compiled `.xcarchive` into its signable identities.
//!
//! Traversal is read-only. Missing mandatory artifacts of the primary
//! application abort with the originating error; optional components
//! (extensions, watch app, clip, frameworks) may simply be absent.
use crate::bundle::{
    read_info_plist, Application, BaseIdentity, BundleIdentity, BundlePaths, ClipApplication,
    Extension, FrameworkIdentity, WatchApplication, INFO_PLIST,
};
use crate::codesign::{CodesignReader, EntitlementsReader};
use crate::entitlements::Entitlements;
use crate::error::{Result, SigningError};
use crate::profile::ProvisioningProfile;
use plist::{Dictionary, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

const PRODUCTS_DIR: &str = "Products";
const APPLICATIONS_DIR: &str = "Applications";
const APPLICATION_PROPERTIES_KEY: &str = "ApplicationProperties";
const APPLICATION_PATH_KEY: &str = "ApplicationPath";
const SIGNING_IDENTITY_KEY: &str = "SigningIdentity";
const APP_EXTENSION: &str = "app";
const APPEX_EXTENSION: &str = "appex";
const FRAMEWORK_EXTENSION: &str = "framework";

/// A decomposed archive: its manifest and the primary application tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    pub path: PathBuf,
    pub info_plist: Dictionary,
    pub application: Application,
}

impl Archive {
    /// Decompose the archive at `path`, reading entitlements with `codesign`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &CodesignReader::new())
    }

    pub fn open_with(path: &Path, reader: &dyn EntitlementsReader) -> Result<Self> {
        let info_plist = read_info_plist(&path.join(INFO_PLIST))?;
        let app_path = application_path(path, &info_plist)?;
        if !app_path.is_dir() {
            return Err(SigningError::not_found("application", &app_path));
        }
        tracing::info!(archive = %path.display(), app = %app_path.display(), "decomposing archive");
        let application = open_application(&app_path, reader)?;
        Ok(Archive {
            path: path.to_path_buf(),
            info_plist,
            application,
        })
    }

    /// Every identity in the tree: application, its extensions, watch app,
    /// watch extensions, clip, then qualifying frameworks.
    pub fn identities(&self) -> Vec<BundleIdentity<'_>> {
        let app = &self.application;
        let mut identities = vec![BundleIdentity::Application(app)];
        identities.extend(app.extensions.iter().map(BundleIdentity::Extension));
        if let Some(watch) = &app.watch_application {
            identities.push(BundleIdentity::WatchApplication(watch));
            identities.extend(watch.extensions.iter().map(BundleIdentity::WatchExtension));
        }
        if let Some(clip) = &app.clip_application {
            identities.push(BundleIdentity::ClipApplication(clip));
        }
        identities.extend(app.frameworks.iter().map(BundleIdentity::Framework));
        identities
    }

    /// Bundle ID to entitlements. A repeated bundle ID keeps the later entry.
    pub fn bundle_id_entitlements(&self) -> BTreeMap<String, Entitlements> {
        self.identities()
            .into_iter()
            .map(|identity| {
                (
                    identity.bundle_id().to_string(),
                    identity.entitlements().clone(),
                )
            })
            .collect()
    }

    /// Bundle ID to embedded profile. A repeated bundle ID keeps the later
    /// entry; a framework whose profile cannot be decoded has none.
    pub fn bundle_id_profiles(&self) -> BTreeMap<String, ProvisioningProfile> {
        self.identities()
            .into_iter()
            .filter_map(|identity| {
                let profile = identity.provisioning_profile()?;
                Some((identity.bundle_id().to_string(), profile.clone()))
            })
            .collect()
    }

    /// Bundle IDs that occur more than once in the tree.
    pub fn duplicate_bundle_ids(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for identity in self.identities() {
            if !seen.insert(identity.bundle_id()) {
                duplicates.insert(identity.bundle_id().to_string());
            }
        }
        duplicates.into_iter().collect()
    }

    /// First non-empty team ID in the bundle ID profile map.
    ///
    /// With profiles from several teams the pick is arbitrary; use
    /// [`Archive::unique_team_id`] to reject that case.
    pub fn team_id(&self) -> Result<String> {
        self.bundle_id_profiles()
            .into_values()
            .map(|profile| profile.team_id)
            .find(|team_id| !team_id.is_empty())
            .ok_or(SigningError::TeamIdNotFound)
    }

    /// Distinct team IDs across all embedded profiles.
    pub fn team_ids(&self) -> BTreeSet<String> {
        self.identities()
            .into_iter()
            .filter_map(|identity| identity.provisioning_profile())
            .map(|profile| profile.team_id.clone())
            .filter(|team_id| !team_id.is_empty())
            .collect()
    }

    /// The single team ID of the archive, failing when profiles disagree.
    pub fn unique_team_id(&self) -> Result<String> {
        let team_ids = self.team_ids();
        let mut iter = team_ids.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Err(SigningError::TeamIdNotFound),
            (Some(team_id), None) => Ok(team_id.clone()),
            _ => Err(SigningError::AmbiguousTeamId(team_ids.into_iter().collect())),
        }
    }

    /// `ApplicationProperties.SigningIdentity`, empty when absent.
    pub fn signing_identity(&self) -> String {
        application_property(&self.info_plist, SIGNING_IDENTITY_KEY).unwrap_or_default()
    }

    /// Whether the primary application was signed with an Xcode-managed profile.
    pub fn is_xcode_managed(&self) -> bool {
        self.application.base.provisioning_profile.is_xcode_managed()
    }
}

fn application_property(info_plist: &Dictionary, key: &str) -> Option<String> {
    info_plist
        .get(APPLICATION_PROPERTIES_KEY)
        .and_then(Value::as_dictionary)
        .and_then(|properties| properties.get(key))
        .and_then(Value::as_string)
        .map(str::to_string)
}

/// Primary application path from the manifest, else the first
/// `Products/Applications/*.app`.
fn application_path(archive_path: &Path, info_plist: &Dictionary) -> Result<PathBuf> {
    let products = archive_path.join(PRODUCTS_DIR);
    if let Some(relative) = application_property(info_plist, APPLICATION_PATH_KEY) {
        return Ok(products.join(relative));
    }
    let applications = products.join(APPLICATIONS_DIR);
    search_bundles(&applications, APP_EXTENSION)?
        .into_iter()
        .next()
        .ok_or_else(|| SigningError::not_found("application", &applications))
}

/// Direct children of `dir` with the given extension, sorted by name.
///
/// A missing directory yields no matches.
pub fn search_bundles(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(SigningError::io(dir, err)),
    };
    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| SigningError::io(dir, err))?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

fn open_extensions(
    paths: &BundlePaths,
    reader: &dyn EntitlementsReader,
) -> Result<Vec<Extension>> {
    search_bundles(&paths.plugins_dir(), APPEX_EXTENSION)?
        .iter()
        .map(|path| {
            Ok(Extension {
                base: BaseIdentity::open(path, reader)?,
            })
        })
        .collect()
}

fn open_watch_application(
    paths: &BundlePaths,
    reader: &dyn EntitlementsReader,
) -> Result<Option<WatchApplication>> {
    let Some(path) = search_bundles(&paths.watch_dir(), APP_EXTENSION)?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };
    let base = BaseIdentity::open(&path, reader)?;
    let extensions = open_extensions(&BundlePaths::new(path), reader)?;
    tracing::debug!(
        bundle_id = %base.bundle_id,
        extensions = extensions.len(),
        "found watch application"
    );
    Ok(Some(WatchApplication { base, extensions }))
}

fn open_clip_application(
    paths: &BundlePaths,
    reader: &dyn EntitlementsReader,
) -> Result<Option<ClipApplication>> {
    let Some(path) = search_bundles(&paths.app_clips_dir(), APP_EXTENSION)?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };
    let base = BaseIdentity::open(&path, reader)?;
    tracing::debug!(bundle_id = %base.bundle_id, "found app clip");
    Ok(Some(ClipApplication { base }))
}

fn open_frameworks(
    paths: &BundlePaths,
    reader: &dyn EntitlementsReader,
) -> Vec<FrameworkIdentity> {
    match search_bundles(&paths.frameworks_dir(), FRAMEWORK_EXTENSION) {
        Ok(found) => found
            .iter()
            .filter_map(|path| FrameworkIdentity::open(path, reader))
            .collect(),
        Err(err) => {
            tracing::debug!(error = %err, "frameworks directory unreadable");
            Vec::new()
        }
    }
}

fn open_application(path: &Path, reader: &dyn EntitlementsReader) -> Result<Application> {
    let base = BaseIdentity::open(path, reader)?;
    let paths = BundlePaths::new(path.to_path_buf());
    let watch_application = open_watch_application(&paths, reader)?;
    let clip_application = open_clip_application(&paths, reader)?;
    let extensions = open_extensions(&paths, reader)?;
    let frameworks = open_frameworks(&paths, reader);
    tracing::info!(
        bundle_id = %base.bundle_id,
        extensions = extensions.len(),
        watch = watch_application.is_some(),
        clip = clip_application.is_some(),
        frameworks = frameworks.len(),
        "found application"
    );
    Ok(Application {
        base,
        watch_application,
        clip_application,
        extensions,
        frameworks,
    })
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
