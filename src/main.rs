use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Command, ExportArgs, InspectArgs, MatchArgs, RootArgs, LOG_ENV};
use signmatch::config::{default_config, load_config, validate_config};
use signmatch::export::{default_export_options, run_export, ExportCommand, ProcessRunner};
use signmatch::profile::load_profiles_dir;
use signmatch::report::{ArchiveReport, MatchEntry, MatchReport};
use signmatch::util::{clip_to_bytes, print_json};
use signmatch::{find_profile, Archive, SigningError};

/// Upper bound on raw xcodebuild output echoed to the debug log.
const MAX_LOGGED_OUTPUT_BYTES: usize = 16 * 1024;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Match(args) => cmd_match(args),
        Command::ExportArgs(args) => cmd_export(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_archive(path: &Path) -> Result<Archive> {
    Archive::open(path).with_context(|| format!("decompose archive {}", path.display()))
}

fn cmd_inspect(args: InspectArgs) -> Result<()> {
    let archive = open_archive(&args.archive)?;
    let report = ArchiveReport::new(&archive);
    if args.json {
        print_json(&report)
    } else {
        print!("{}", report.render_text());
        Ok(())
    }
}

fn cmd_match(args: MatchArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    config.apply(args.overrides());
    validate_config(&config)?;

    let archive = open_archive(&args.archive)?;
    let profiles_dir = config.resolve_profiles_dir()?;
    let profiles = load_profiles_dir(&profiles_dir)?;
    let request_summary = format!("{} {}", config.platform, config.distribution_type);

    let matches: Vec<MatchEntry> = archive
        .bundle_id_entitlements()
        .iter()
        .map(|(bundle_id, entitlements)| {
            let request = config.request_for(bundle_id, entitlements);
            let found = find_profile(&profiles, &request);
            MatchEntry::new(bundle_id, found.as_ref(), &request_summary)
        })
        .collect();

    let report = MatchReport {
        archive: archive.path.display().to_string(),
        profiles_dir: profiles_dir.display().to_string(),
        local_profile_count: profiles.len(),
        matches,
    };
    if args.json {
        print_json(&report)?;
    } else {
        print!("{}", report.render_text());
    }

    if args.require_all {
        if let Some(entry) = report.unmatched().next() {
            return Err(SigningError::NoMatch {
                bundle_id: entry.bundle_id.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn cmd_export(args: ExportArgs) -> Result<()> {
    let export_options_plist = args
        .export_options
        .unwrap_or_else(|| default_export_options(&args.archive));
    let command = ExportCommand {
        archive_path: args.archive,
        export_options_plist,
        export_dir: args.output,
        extra_args: args.extra,
    };
    if !args.run {
        println!("{}", command.command_line());
        return Ok(());
    }

    let outcome = run_export(&ProcessRunner, &command)?;
    tracing::debug!(
        output = %clip_to_bytes(&outcome.raw_out, MAX_LOGGED_OUTPUT_BYTES),
        "xcodebuild output"
    );
    for bundle_id in &outcome.missing_profiles {
        eprintln!("missing provisioning profile for {bundle_id}");
    }
    outcome.ensure_success()?;
    println!(
        "exported {} to {}",
        command.archive_path.display(),
        command.export_dir.display()
    );
    Ok(())
}
