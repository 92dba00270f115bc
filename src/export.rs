//! Thin glue around `xcodebuild -exportArchive`.
//!
//! Only the argument list and the raw output cross this boundary; log
//! scanning pulls out the lines that explain a failed export.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const XCODEBUILD: &str = "xcodebuild";

/// Inputs for one export invocation.
#[derive(Debug, Clone)]
pub struct ExportCommand {
    pub archive_path: PathBuf,
    pub export_options_plist: PathBuf,
    pub export_dir: PathBuf,
    pub extra_args: Vec<String>,
}

impl ExportCommand {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-exportArchive".to_string(),
            "-archivePath".to_string(),
            self.archive_path.display().to_string(),
            "-exportPath".to_string(),
            self.export_dir.display().to_string(),
            "-exportOptionsPlist".to_string(),
            self.export_options_plist.display().to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Shell-quoted command line, for logs and dry runs.
    pub fn command_line(&self) -> String {
        let mut words = vec![XCODEBUILD.to_string()];
        words.extend(self.args());
        shell_words::join(words)
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub raw_out: String,
    pub success: bool,
}

pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands found on `PATH`, combining stdout and stderr.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let resolved =
            which::which(program).with_context(|| format!("locate {program} on PATH"))?;
        let output = Command::new(&resolved)
            .args(args)
            .output()
            .with_context(|| format!("spawn {}", resolved.display()))?;
        let mut raw_out = String::from_utf8_lossy(&output.stdout).to_string();
        raw_out.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(CommandOutput {
            raw_out,
            success: output.status.success(),
        })
    }
}

/// What an export run produced.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub success: bool,
    pub raw_out: String,
    pub errors: Vec<String>,
    pub missing_profiles: Vec<String>,
}

impl ExportOutcome {
    /// Fail with the first reported error when the export did not succeed.
    pub fn ensure_success(&self) -> Result<()> {
        if self.success {
            return Ok(());
        }
        let detail = self
            .errors
            .first()
            .map(String::as_str)
            .unwrap_or("no error lines in output");
        Err(anyhow!("{XCODEBUILD} export failed: {detail}"))
    }
}

pub fn run_export(runner: &dyn CommandRunner, command: &ExportCommand) -> Result<ExportOutcome> {
    tracing::info!(command = %command.command_line(), "running export");
    let output = runner.run(XCODEBUILD, &command.args())?;
    Ok(ExportOutcome {
        success: output.success,
        errors: export_errors(&output.raw_out),
        missing_profiles: missing_profile_bundle_ids(&output.raw_out),
        raw_out: output.raw_out,
    })
}

/// `error:` lines reported by xcodebuild, without the prefix.
pub fn export_errors(output: &str) -> Vec<String> {
    let error_line = Regex::new(r"(?m)^\s*error:\s*(.+?)\s*$").expect("regex for export errors");
    error_line
        .captures_iter(output)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Bundle IDs xcodebuild could not find a profile for.
pub fn missing_profile_bundle_ids(output: &str) -> Vec<String> {
    let no_profiles = Regex::new(r#"No profiles for ['"]([^'"]+)['"] were found"#)
        .expect("regex for missing profiles");
    let mut ids: Vec<String> = no_profiles
        .captures_iter(output)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Default export options location next to the archive.
pub fn default_export_options(archive_path: &Path) -> PathBuf {
    archive_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("ExportOptions.plist")
}
