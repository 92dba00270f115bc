//! Entitlement extraction from a bundle's main executable.
use crate::entitlements::Entitlements;
use crate::error::{Result, SigningError};
use plist::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Entitlements file Xcode leaves inside archived bundles.
pub const ARCHIVED_ENTITLEMENTS: &str = "archived-expanded-entitlements.xcent";

/// Source of the entitlements a bundle executable was signed with.
pub trait EntitlementsReader {
    fn read_entitlements(&self, bundle_path: &Path, executable: &str) -> Result<Entitlements>;
}

/// Reads the archived `.xcent` file when present, otherwise asks `codesign`.
#[derive(Debug, Clone, Default)]
pub struct CodesignReader {
    codesign: Option<PathBuf>,
}

impl CodesignReader {
    pub fn new() -> Self {
        CodesignReader {
            codesign: which::which("codesign").ok(),
        }
    }

    fn run_codesign(&self, codesign: &Path, executable: &Path) -> Result<Entitlements> {
        let output = Command::new(codesign)
            .arg("--display")
            .arg("--entitlements")
            .arg(":-")
            .arg(executable)
            .output()
            .map_err(|err| SigningError::io(executable, err))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SigningError::parse(
                executable,
                format!("codesign exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        parse_codesign_output(&String::from_utf8_lossy(&output.stdout), executable)
    }
}

impl EntitlementsReader for CodesignReader {
    fn read_entitlements(&self, bundle_path: &Path, executable: &str) -> Result<Entitlements> {
        let archived = bundle_path.join(ARCHIVED_ENTITLEMENTS);
        if archived.is_file() {
            let value = Value::from_file(&archived)
                .map_err(|err| SigningError::parse(&archived, err.to_string()))?;
            return dictionary_entitlements(value, &archived);
        }

        let executable_path = bundle_path.join(executable);
        if !executable_path.is_file() {
            return Err(SigningError::not_found("executable", &executable_path));
        }
        let codesign = self
            .codesign
            .as_deref()
            .ok_or_else(|| SigningError::not_found("codesign", Path::new("codesign")))?;
        self.run_codesign(codesign, &executable_path)
    }
}

/// Parse `codesign --display --entitlements :-` stdout.
///
/// Older toolchains prefix the plist with an `Executable=` line; unsigned or
/// entitlement-free binaries print nothing.
pub fn parse_codesign_output(stdout: &str, origin: &Path) -> Result<Entitlements> {
    let mut content = stdout;
    if let Some((first, rest)) = stdout.split_once('\n') {
        if first.contains("Executable=") {
            content = rest;
        }
    }
    if content.trim().is_empty() {
        return Ok(Entitlements::new());
    }
    let value = Value::from_reader(Cursor::new(content.as_bytes()))
        .map_err(|err| SigningError::parse(origin, err.to_string()))?;
    dictionary_entitlements(value, origin)
}

fn dictionary_entitlements(value: Value, origin: &Path) -> Result<Entitlements> {
    value
        .into_dictionary()
        .map(Entitlements::from_dictionary)
        .ok_or_else(|| SigningError::parse(origin, "entitlements are not a dictionary"))
}
