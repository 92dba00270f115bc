//! Entitlement maps and the comparison rules used to decide whether a
//! profile grants what a bundle was signed with.
//!
//! Only keys on the app side are compared. Extra keys granted by a profile
//! are never treated as mismatches.
use plist::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Entitlement key whose value is compared as a set of container IDs.
pub const ICLOUD_CONTAINER_IDENTIFIERS_KEY: &str =
    "com.apple.developer.icloud-container-identifiers";

/// Capability key to heterogeneous value (boolean, string, string list, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entitlements(BTreeMap<String, Value>);

impl Entitlements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dictionary(dictionary: plist::Dictionary) -> Self {
        Entitlements(dictionary.into_iter().collect())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Read `key` as a list of strings; `Ok(None)` when the key is absent.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, ContainerError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let malformed = || ContainerError::NotStringList {
            key: key.to_string(),
        };
        let items = value.as_array().ok_or_else(malformed)?;
        items
            .iter()
            .map(|item| item.as_string().map(str::to_string).ok_or_else(malformed))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Entitlements {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Entitlements(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    #[error("entitlement {key} is not a list of strings")]
    NotStringList { key: String },
}

/// Containers required by the app but not granted by the profile.
///
/// An app without the container key requires nothing. A profile without the
/// key is missing every required container. A value on either side that is
/// not a list of strings is an error, even when the app list is empty.
pub fn find_missing_containers(
    app: &Entitlements,
    profile: &Entitlements,
) -> Result<Vec<String>, ContainerError> {
    let Some(required) = app.string_list(ICLOUD_CONTAINER_IDENTIFIERS_KEY)? else {
        return Ok(Vec::new());
    };
    let Some(granted) = profile.string_list(ICLOUD_CONTAINER_IDENTIFIERS_KEY)? else {
        return Ok(required);
    };
    Ok(required
        .into_iter()
        .filter(|container| !granted.contains(container))
        .collect())
}

/// How strictly app-side entitlement values must be reproduced by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementMode {
    /// Every value must be deep-equal.
    Exact,
    /// The profile may grant more than required (`true` where `false` is asked).
    Superset,
}

impl EntitlementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementMode::Exact => "exact",
            EntitlementMode::Superset => "superset",
        }
    }
}

impl fmt::Display for EntitlementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact containment: every app entitlement is granted with an equal value.
pub fn contains_all_app_entitlements(profile: &Entitlements, app: &Entitlements) -> bool {
    satisfies(EntitlementMode::Exact, profile, app)
}

/// Superset containment: the profile may carry more capability than the app.
pub fn profile_supports_app_entitlements(profile: &Entitlements, app: &Entitlements) -> bool {
    satisfies(EntitlementMode::Superset, profile, app)
}

/// Compare every app-side key against the profile under `mode`.
pub fn satisfies(mode: EntitlementMode, profile: &Entitlements, app: &Entitlements) -> bool {
    first_unsatisfied(mode, profile, app).is_none()
}

/// The first app-side key the profile fails to satisfy, if any.
pub fn first_unsatisfied<'a>(
    mode: EntitlementMode,
    profile: &Entitlements,
    app: &'a Entitlements,
) -> Option<&'a str> {
    for (key, required) in app.iter() {
        if key == ICLOUD_CONTAINER_IDENTIFIERS_KEY {
            match find_missing_containers(app, profile) {
                Ok(missing) if missing.is_empty() => continue,
                _ => return Some(key.as_str()),
            }
        }

        let granted = profile.get(key);
        if granted == Some(required) {
            continue;
        }
        let allowed = match mode {
            EntitlementMode::Exact => false,
            EntitlementMode::Superset => superset_allows(required, granted),
        };
        if !allowed {
            return Some(key.as_str());
        }
    }
    None
}

fn superset_allows(required: &Value, granted: Option<&Value>) -> bool {
    let Some(granted) = granted else {
        return false;
    };
    match (required, granted) {
        (Value::Boolean(required), Value::Boolean(granted)) => *granted || !*required,
        // A boolean requirement against a non-boolean grant is let through.
        (Value::Boolean(_), _) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "entitlements_tests.rs"]
mod tests;
