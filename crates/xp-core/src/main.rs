//! xp-installer - expansion pack installer and bundler
//!
//! The main entry point, handling:
//! - Installing an expansion pack onto a server installation
//! - Building installer archives
//! - Inspecting installer archives
//! - Generating patch-config templates

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use xp_bundle::ArchiveSummary;
use xp_config::{load_config, InstallerConfig};
use xp_core::bundler::{create_patch_config, AddedConfig, PatchAssembler, PatchSource, TemplateSource};
use xp_core::exit_codes::ExitCode;
use xp_core::installer::{InstallationOrchestrator, StdioServerLauncher, TargetInstallation};
use xp_core::logging::{init_logging, LogConfig, LogFormat};
use xp_core::{InstallError, Result};

/// Install and build microprofile expansion packs
#[derive(Parser)]
#[command(name = "xp-installer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to installer.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human or jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install an expansion pack onto a pristine server installation
    Install(InstallArgs),

    /// Build an installer archive
    Bundle(BundleArgs),

    /// Show what an installer archive contains
    Inspect(InspectArgs),

    /// Generate patch-config-<version>.xml from a template
    CreateConfig(CreateConfigArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct InstallArgs {
    /// Server installation to install into
    #[arg(long, env = "JBOSS_HOME")]
    jboss_home: PathBuf,

    /// Installer archive (defaults to this executable when it is a .jar or .zip)
    #[arg(long)]
    archive: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BundleArgs {
    /// Core runtime template archive: a local .jar/.zip or an http(s) URL
    #[arg(long)]
    installer_core: String,

    /// Existing patch payload
    #[arg(long, conflicts_with = "patch_generator", required_unless_present = "patch_generator")]
    patch: Option<PathBuf>,

    /// Command that writes a patch to --output-file=<path>
    #[arg(long)]
    patch_generator: Option<String>,

    /// Argument passed to the patch generator (repeatable)
    #[arg(long = "patch-generator-arg", allow_hyphen_values = true, requires = "patch_generator")]
    patch_generator_args: Vec<String>,

    /// Directory added configuration paths are relative to
    #[arg(long)]
    config_root: Option<PathBuf>,

    /// Configuration file to ship, relative to --config-root (repeatable)
    #[arg(long = "added-config", requires = "config_root")]
    added_configs: Vec<PathBuf>,

    /// Directory for the produced archive
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// File name of the produced archive
    #[arg(long)]
    archive_name: Option<String>,

    /// Layer written when the template manifest declares none
    #[arg(long)]
    default_layer: Option<String>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Installer archive
    archive: PathBuf,
}

#[derive(Args, Debug)]
#[command(disable_version_flag = true)]
struct CreateConfigArgs {
    /// Expansion pack version, e.g. 1.0.1.GA
    #[arg(long)]
    version: String,

    /// patch-config.xml template
    #[arg(long)]
    template: PathBuf,

    /// Directory for the generated file
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(ExitCode::ArgsError.as_i32());
        }
    };

    let cli_level = (cli.global.verbose > 0 || cli.global.quiet)
        .then(|| LogConfig::level_from_verbosity(cli.global.verbose, cli.global.quiet));
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let exit_code = match cli.command {
        Commands::Install(args) => run_install(&cli.global, &args),
        Commands::Bundle(args) => run_bundle(&cli.global, &args),
        Commands::Inspect(args) => run_inspect(&args),
        Commands::CreateConfig(args) => run_create_config(&args),
        Commands::Version => {
            println!("xp-installer {}", env!("CARGO_PKG_VERSION"));
            ExitCode::Clean
        }
    };

    tracing::debug!(exit = %exit_code, "Exiting");
    std::process::exit(exit_code.as_i32());
}

fn report_error(err: &InstallError) -> ExitCode {
    eprintln!("xp-installer: {}", err);
    err.exit_code()
}

fn load(global: &GlobalOpts) -> Result<InstallerConfig> {
    let (config, paths) = load_config(global.config.as_deref())?;
    tracing::debug!(
        source = %paths.source,
        path = ?paths.config,
        "Loaded configuration"
    );
    Ok(config)
}

// ============================================================================
// install
// ============================================================================

fn run_install(global: &GlobalOpts, args: &InstallArgs) -> ExitCode {
    let prepared = load(global).and_then(|config| {
        let archive = match &args.archive {
            Some(path) => path.clone(),
            None => own_archive()?,
        };
        let target = TargetInstallation::locate(&args.jboss_home)?;
        Ok((config, archive, target))
    });
    let (config, archive, target) = match prepared {
        Ok(p) => p,
        Err(e) => return report_error(&e),
    };

    let launcher = StdioServerLauncher::new(config.server);
    let orchestrator = InstallationOrchestrator::new(target, &launcher);

    match orchestrator.install_archive(&archive) {
        Ok(report) => {
            for file in &report.overlaid {
                if let Some(existing) = &file.preserved {
                    println!(
                        "{} already exists; the new version was written to {}",
                        existing.display(),
                        file.destination.display()
                    );
                }
            }
            println!(
                "Installed layers {} into {} (server {})",
                report.layers.join(","),
                orchestrator.target().home().display(),
                report.product_version.as_deref().unwrap_or("unknown")
            );
            ExitCode::Clean
        }
        Err(failure) => {
            for (path, reason) in &failure.rollback.failures {
                eprintln!(
                    "xp-installer: could not remove {}: {}",
                    path.display(),
                    reason
                );
            }
            report_error(&failure.error)
        }
    }
}

/// The running executable, when it is itself an installer archive.
fn own_archive() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| InstallError::InvalidArgument(e.to_string()))?;
    if is_archive(&exe) {
        Ok(exe)
    } else {
        Err(InstallError::InvalidArgument(
            "--archive is required when not running from an installer archive".to_string(),
        ))
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

// ============================================================================
// bundle
// ============================================================================

fn run_bundle(global: &GlobalOpts, args: &BundleArgs) -> ExitCode {
    match bundle(global, args) {
        Ok(output) => {
            println!("Created installer {}", output.display());
            ExitCode::Clean
        }
        Err(e) => report_error(&e),
    }
}

fn bundle(global: &GlobalOpts, args: &BundleArgs) -> Result<PathBuf> {
    let config = load(global)?;

    let archive_name = args
        .archive_name
        .clone()
        .unwrap_or(config.bundle.archive_name);
    if archive_name.is_empty() || archive_name.contains(['/', '\\']) {
        return Err(InstallError::InvalidArgument(format!(
            "archive name '{}' must be a plain file name",
            archive_name
        )));
    }
    let default_layer = args
        .default_layer
        .clone()
        .unwrap_or(config.bundle.default_layer);

    let template = TemplateSource::parse(&args.installer_core)?;
    let patch = match (&args.patch, &args.patch_generator) {
        (Some(path), _) => PatchSource::File(path.clone()),
        (None, Some(command)) => PatchSource::Generate {
            command: command.clone(),
            args: args.patch_generator_args.clone(),
        },
        (None, None) => {
            return Err(InstallError::MissingPayload(
                "either --patch or --patch-generator is required".to_string(),
            ))
        }
    };

    let added = match &args.config_root {
        Some(root) => args
            .added_configs
            .iter()
            .map(|relative| AddedConfig::resolve(root, relative))
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let template = template.materialize()?;
    let patch = patch.materialize()?;
    let output = args.output_dir.join(&archive_name);

    let report = PatchAssembler::new(template.path(), default_layer).assemble(
        patch.path(),
        &added,
        &output,
    )?;
    Ok(report.output)
}

// ============================================================================
// inspect / create-config
// ============================================================================

fn run_inspect(args: &InspectArgs) -> ExitCode {
    let summary = match ArchiveSummary::open(&args.archive) {
        Ok(s) => s,
        Err(e) => return report_error(&e.into()),
    };

    println!("archive: {}", args.archive.display());
    match &summary.manifest {
        Some(manifest) => {
            match manifest.layers() {
                Ok(layers) => println!("layers: {}", layers.join(",")),
                Err(e) => println!("layers: <{}>", e),
            }
            if let Some(digest) = manifest.patch_digest() {
                println!("patch sha256: {}", digest);
            }
        }
        None => println!("manifest: <missing>"),
    }
    println!("patch: {}", if summary.has_patch { "present" } else { "missing" });
    for config in &summary.added_configs {
        println!("added config: {}", config);
    }
    println!("entries: {}", summary.entries.len());

    if summary.has_patch && summary.manifest.is_some() {
        ExitCode::Clean
    } else {
        ExitCode::MalformedArchive
    }
}

fn run_create_config(args: &CreateConfigArgs) -> ExitCode {
    match create_patch_config(&args.version, &args.template, &args.output_dir) {
        Ok(path) => {
            println!("Created patch config at {}", path.display());
            ExitCode::Clean
        }
        Err(e) => report_error(&e),
    }
}
