use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

use flavor_icons::config::loader::{load_config_from_file, save_config_to_file};
use flavor_icons::config::validator::{validate_asset_key, validate_backup_suffix, validate_flavor_name};
use flavor_icons::config::DEFAULT_BUILD_TYPES;
use flavor_icons::log_collector::{init_global_logger, level_for_verbosity};
use flavor_icons::models::{capitalize_flavor, default_asset_name};
use flavor_icons::patcher::backup::DEFAULT_BACKUP_SUFFIX;
use flavor_icons::patcher::project::DEFAULT_ASSET_KEY;
use flavor_icons::patcher::scheme::{discover_schemes, DEFAULT_SCRIPT_PATH};
use flavor_icons::{
    BackupStore, DescriptorPatcher, FileReport, FlavorEntry, FlavorMapping, PatchSummary,
    PatcherConfig, ProjectPatcher, SchemePatcher, SchemeTarget,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Compute every edit and print the summary without writing files
    #[arg(long, global = true)]
    dry_run: bool,
    /// Backup suffix (overrides the configuration file)
    #[arg(long, global = true)]
    backup_suffix: Option<String>,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Print reports and summary as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Patch the project and schemes listed in a configuration file
    Run {
        /// Path to a .toml or .json configuration
        config: PathBuf,
    },
    /// Add the icon pre-action to scheme descriptors
    Schemes {
        /// Directory holding the .xcscheme files
        dir: PathBuf,
        /// Explicit scheme mapping, e.g. main.xcscheme=Demo
        #[arg(long = "scheme", value_parser = parse_assignment)]
        schemes: Vec<(String, String)>,
        /// Only patch the schemes given with --scheme
        #[arg(long)]
        no_discover: bool,
        /// Scheme files to leave alone when discovering
        #[arg(long = "exclude", default_value = "Runner.xcscheme")]
        excluded: Vec<String>,
        /// Script invoked by the pre-action, relative to $SRCROOT
        #[arg(long, default_value = DEFAULT_SCRIPT_PATH)]
        script: String,
    },
    /// Set the icon asset of build configurations in a project descriptor
    Project {
        /// Path to project.pbxproj
        project: PathBuf,
        /// Flavor mapping, e.g. demo=AppIcon-Demo (asset defaults to AppIcon-<Flavor>)
        #[arg(long = "map", value_parser = parse_mapping, required = true)]
        map: Vec<(String, String)>,
        /// Build types to expand each flavor into (default: Debug, Release, Profile)
        #[arg(long = "build-type")]
        build_types: Vec<String>,
        /// Build setting that names the icon asset set
        #[arg(long, default_value = DEFAULT_ASSET_KEY)]
        key: String,
    },
    /// Copy a descriptor's backup back over it
    Restore {
        /// Descriptor file to restore
        path: PathBuf,
    },
    /// Write a starter configuration for a Flutter iOS project
    Init {
        /// Where to write the configuration (.toml or .json)
        output: PathBuf,
        /// Flutter project root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Flavor names to list
        #[arg(long = "flavor")]
        flavors: Vec<String>,
    },
}

#[derive(Serialize)]
struct RunOutput<'a> {
    reports: &'a [FileReport],
    summary: &'a PatchSummary,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    init_global_logger(level_for_verbosity(args.verbose), args.log_file.as_deref())
        .map_err(anyhow::Error::msg)?;
    log::debug!("[Main] flavor-icons {}", flavor_icons::VERSION);

    match &args.cmd {
        Command::Run { config } => cmd_run(&args, config),
        Command::Schemes {
            dir,
            schemes,
            no_discover,
            excluded,
            script,
        } => cmd_schemes(&args, dir, schemes, *no_discover, excluded, script),
        Command::Project {
            project,
            map,
            build_types,
            key,
        } => cmd_project(&args, project, map, build_types, key),
        Command::Restore { path } => cmd_restore(&args, path),
        Command::Init {
            output,
            root,
            flavors,
        } => cmd_init(output, root, flavors),
    }
}

fn driver(args: &Args, config_suffix: Option<&str>) -> Result<DescriptorPatcher> {
    let suffix = args
        .backup_suffix
        .as_deref()
        .or(config_suffix)
        .unwrap_or(DEFAULT_BACKUP_SUFFIX);
    validate_backup_suffix(suffix)?;
    Ok(DescriptorPatcher::new(BackupStore::new(suffix)).dry_run(args.dry_run))
}

fn cmd_run(args: &Args, config_path: &Path) -> Result<ExitCode> {
    let config = load_config_from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let reports = driver(args, Some(config.backup_suffix.as_str()))?.run(&config);
    finish(args, &reports)
}

fn cmd_schemes(
    args: &Args,
    dir: &Path,
    schemes: &[(String, String)],
    no_discover: bool,
    excluded: &[String],
    script: &str,
) -> Result<ExitCode> {
    let explicit: Vec<SchemeTarget> = schemes
        .iter()
        .map(|(file, flavor)| SchemeTarget::new(dir.join(file), flavor))
        .collect();

    let targets = if no_discover {
        explicit
    } else {
        discover_schemes(dir, &explicit, excluded)?
    };
    if targets.is_empty() {
        bail!("no scheme files to patch in {}", dir.display());
    }

    let reports = driver(args, None)?.patch_schemes(&targets, &SchemePatcher::new(script));
    finish(args, &reports)
}

fn cmd_project(
    args: &Args,
    project: &Path,
    map: &[(String, String)],
    build_types: &[String],
    key: &str,
) -> Result<ExitCode> {
    validate_asset_key(key)?;
    for (flavor, _) in map {
        validate_flavor_name(flavor)?;
    }

    let build_types: Vec<String> = if build_types.is_empty() {
        DEFAULT_BUILD_TYPES.iter().map(|s| s.to_string()).collect()
    } else {
        build_types.to_vec()
    };
    let configurations = FlavorMapping::from_pairs(map.iter().cloned()).configurations(&build_types);

    let report = driver(args, None)?.patch_project(project, &ProjectPatcher::new(key), &configurations);
    finish(args, &[report])
}

fn cmd_restore(args: &Args, path: &Path) -> Result<ExitCode> {
    let handle = driver(args, None)?
        .restore(path)
        .with_context(|| format!("restoring {}", path.display()))?;
    if args.dry_run {
        println!("would restore {} from {}", path.display(), handle.backup.display());
    } else {
        println!("restored {} from {}", path.display(), handle.backup.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(output: &Path, root: &Path, flavors: &[String]) -> Result<ExitCode> {
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    for flavor in flavors {
        validate_flavor_name(flavor)?;
    }

    let root = root
        .canonicalize()
        .with_context(|| format!("resolving project root {}", root.display()))?;
    let config = PatcherConfig {
        flavors: flavors.iter().map(FlavorEntry::new).collect(),
        ..PatcherConfig::for_ios_root(&root)
    };
    save_config_to_file(&config, output)?;
    println!("wrote {}", output.display());
    Ok(ExitCode::SUCCESS)
}

fn finish(args: &Args, reports: &[FileReport]) -> Result<ExitCode> {
    let summary = PatchSummary::from_reports(reports);

    if args.json {
        let out = RunOutput {
            reports,
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for report in reports {
            print_report(report);
        }
        if args.dry_run {
            println!("(dry run: nothing was written)");
        }
        println!("{}", summary);
    }

    if summary.files_failed > 0 || summary.ambiguous > 0 || summary.failed_targets > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &FileReport) {
    let state = match (&report.error, report.changed) {
        (Some(_), _) => "FAILED",
        (None, true) => "patched",
        (None, false) => "unchanged",
    };
    println!("{} [{}]", report.path.display(), state);
    if let Some(error) = &report.error {
        println!("    {}", error);
    }
    for target in &report.targets {
        println!("    {:<32} {}", target.target, target.status);
        if let Some(hint) = target.status.hint() {
            println!("    {:<32} hint: {}", "", hint);
        }
    }
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() && !v.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

/// `flavor=Asset`, or a bare `flavor` mapped to `AppIcon-<Flavor>`
fn parse_mapping(s: &str) -> std::result::Result<(String, String), String> {
    if s.contains('=') {
        return parse_assignment(s);
    }
    if s.is_empty() {
        return Err("flavor name cannot be empty".to_string());
    }
    Ok((s.to_string(), default_asset_name(&capitalize_flavor(s))))
}
