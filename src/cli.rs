//! CLI argument parsing for archive inspection and profile lookup.
//!
//! Flags map one-to-one onto [`ConfigOverrides`]; the matching itself lives
//! in the library modules.
use clap::{Parser, Subcommand};
use signmatch::config::ConfigOverrides;
use signmatch::profile::{DistributionType, Platform};
use std::path::PathBuf;

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "SIGNMATCH_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "signmatch",
    version,
    about = "Match archived app bundles against locally installed provisioning profiles",
    after_help = "Commands:\n  inspect --archive <path>                  List signable bundles and their embedded profiles\n  match --archive <path>                    Find a local profile for every bundle ID\n  export-args --archive <path> --output <dir>  Print (or run) the xcodebuild export command\n\nExamples:\n  signmatch inspect --archive build/Acme.xcarchive --json\n  signmatch match --archive build/Acme.xcarchive --distribution ad-hoc --device 00008030-001A\n  signmatch export-args --archive build/Acme.xcarchive --output build/ipa --run",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log debug detail to stderr (SIGNMATCH_LOG takes precedence)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Inspect(InspectArgs),
    Match(MatchArgs),
    ExportArgs(ExportArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Decompose an archive into its signable bundle identities")]
pub struct InspectArgs {
    /// Path to the .xcarchive directory
    #[arg(long, value_name = "PATH")]
    pub archive: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Select a local provisioning profile for every bundle ID in an archive")]
pub struct MatchArgs {
    /// Path to the .xcarchive directory
    #[arg(long, value_name = "PATH")]
    pub archive: PathBuf,

    /// Signing config JSON (defaults: iOS, app-store, no validity margin)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory of installed .mobileprovision / .provisionprofile files
    #[arg(long, value_name = "DIR")]
    pub profiles_dir: Option<PathBuf>,

    /// Target platform (iOS or tvOS)
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Distribution type (development, app-store, ad-hoc, enterprise)
    #[arg(long)]
    pub distribution: Option<DistributionType>,

    /// Days a profile must remain valid
    #[arg(long, value_name = "DAYS", allow_negative_numbers = true)]
    pub min_days: Option<i64>,

    /// Decimal serial of a locally installed signing certificate (repeatable)
    #[arg(long = "certificate", value_name = "SERIAL")]
    pub certificates: Vec<String>,

    /// Device UDID the profile must provision (repeatable)
    #[arg(long = "device", value_name = "UDID")]
    pub devices: Vec<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Exit with an error when any bundle ID has no matching profile
    #[arg(long)]
    pub require_all: bool,
}

impl MatchArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            platform: self.platform,
            distribution_type: self.distribution,
            min_profile_days_valid: self.min_days,
            certificate_serials: self.certificates.clone(),
            device_udids: self.devices.clone(),
            profiles_dir: self.profiles_dir.clone(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Build the xcodebuild -exportArchive invocation for an archive")]
pub struct ExportArgs {
    /// Path to the .xcarchive directory
    #[arg(long, value_name = "PATH")]
    pub archive: PathBuf,

    /// Export options plist (defaults to ExportOptions.plist next to the archive)
    #[arg(long, value_name = "PATH")]
    pub export_options: Option<PathBuf>,

    /// Directory the exported package is written to
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,

    /// Run xcodebuild instead of printing the command line
    #[arg(long)]
    pub run: bool,

    /// Extra arguments passed through to xcodebuild
    #[arg(last = true, value_name = "ARGS")]
    pub extra: Vec<String>,
}
