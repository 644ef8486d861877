//! alacarte - main entry point

use std::process::ExitCode;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use alacarte::cli::{Cli, Commands, PlanFormat, SelectionArgs};
use alacarte::events::{EVENT_BUFFER, EventSink, spawn_printer};
use alacarte::{
    CommandRunner, DryRunRunner, HostSystem, Manifest, ProcessRunner, ProvisionConfig,
    Provisioner, ScriptExecutor, installed_packages,
};

type HostProvisioner = Provisioner<HostSystem, Box<dyn CommandRunner>>;

/// Initialize logging. `RUST_LOG` overrides the level chosen by `--debug`.
fn init_logger(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logger(cli.debug);
    info!("alacarte starting up");

    // Terminate running installers if we are interrupted
    #[cfg(unix)]
    if let Err(e) = alacarte::process_guard::init_signal_handlers() {
        tracing::warn!("Failed to initialize signal handlers: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = ProvisionConfig::discover(cli.config.as_deref())?;
    if let Some(manifest) = &cli.manifest {
        config.manifest_path = manifest.clone();
        config.source = None;
    }
    config.lazy_only |= cli.lazy;
    debug!("Effective configuration: {:?}", config);

    match cli.command {
        Some(Commands::Validate) => validate(&config),
        Some(Commands::Detect) => {
            let installed = installed_packages(&ProcessRunner::new());
            for name in installed.iter() {
                println!("{}", name);
            }
            Ok(())
        }
        Some(Commands::Wrappers) => {
            let (provisioner, printer) = build_provisioner(&config, cli.dry_run, true)?;
            let written = provisioner.post_install();
            finish(provisioner, printer);
            info!("{} wrapper(s) written", written.len());
            Ok(())
        }
        Some(Commands::Plan { selection, format }) => plan(&config, &selection, format),
        Some(Commands::Install {
            selection,
            no_post_install,
        }) => install(&config, &selection, cli.dry_run, !no_post_install),
        None => install(&config, &SelectionArgs::default(), cli.dry_run, true),
    }
}

fn validate(config: &ProvisionConfig) -> Result<()> {
    config.validate()?;
    let path = config.resolve_manifest_path();
    let manifest = Manifest::load(&path)?;
    let planned = alacarte::expand_deps(&manifest, &manifest.keys().collect::<Vec<_>>())?;
    println!(
        "✓ Configuration is valid; {} has {} entries ({} after dependency expansion)",
        path.display(),
        manifest.len(),
        planned.len()
    );
    Ok(())
}

fn plan(config: &ProvisionConfig, selection: &SelectionArgs, format: PlanFormat) -> Result<()> {
    // Planning never installs anything, so no progress stream.
    let (provisioner, _) = build_provisioner(config, true, false)?;
    let installed = installed_packages(provisioner.runner());
    let keys = selection.selection().resolve(provisioner.manifest());
    let plan = provisioner.plan_provision(&keys, &installed)?;

    match format {
        PlanFormat::Text => {
            for inst in &plan {
                println!("{}", inst);
            }
        }
        PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}

fn install(
    config: &ProvisionConfig,
    selection: &SelectionArgs,
    dry_run: bool,
    post_install: bool,
) -> Result<()> {
    let (mut provisioner, printer) = build_provisioner(config, dry_run, true)?;
    info!("Target system: {}", provisioner.system());

    let installed = installed_packages(provisioner.runner());
    let keys = selection.selection().resolve(provisioner.manifest());
    let plan = provisioner.plan_provision(&keys, &installed)?;
    let outcome = provisioner.execute_plan(&plan);

    if post_install {
        provisioner.post_install();
    }
    let dry_run_commands = provisioner.dry_run_commands().to_vec();
    finish(provisioner, printer);

    if dry_run {
        println!("Dry run: {} instruction(s) would run", dry_run_commands.len());
        for line in &dry_run_commands {
            println!("  {}", line);
        }
    }
    outcome.context("Installation finished with errors")
}

/// Provisioner for the host. A real run streams progress through the
/// printer thread returned alongside it.
fn build_provisioner(
    config: &ProvisionConfig,
    dry_run: bool,
    progress: bool,
) -> Result<(HostProvisioner, Option<JoinHandle<()>>)> {
    config.validate()?;
    let manifest_path = config.resolve_manifest_path();
    let manifest = Manifest::load(&manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;
    info!("Loaded {} manifest entries from {}", manifest.len(), manifest_path.display());

    let mut system = HostSystem::detect();
    if let Some(headless) = config.headless {
        system = system.with_headless(headless);
    }

    let mut printer = None;
    let runner: Box<dyn CommandRunner> = if dry_run {
        Box::new(DryRunRunner::new())
    } else {
        let mut scripts = ScriptExecutor::new();
        if config.template_command.is_some() {
            scripts = scripts.with_template_command(config.template_command.clone());
        }
        let mut runner = ProcessRunner::new().with_script_executor(scripts);
        if progress {
            let (sink, rx) = EventSink::channel(EVENT_BUFFER);
            printer = Some(spawn_printer(rx));
            runner = runner.with_events(sink);
        }
        Box::new(runner)
    };

    let mut provisioner = Provisioner::new(system, manifest, runner)
        .with_installer_order(config.installer_order()?)
        .lazy_only(config.lazy_only)
        .dry_run(dry_run);
    if let Some(log_file) = &config.log_file {
        provisioner = provisioner.with_log_file(log_file);
    }
    Ok((provisioner, printer))
}

/// Drop the provisioner (closing the event channel) and wait for the
/// printer to flush.
fn finish(provisioner: HostProvisioner, printer: Option<JoinHandle<()>>) {
    drop(provisioner);
    if let Some(handle) = printer {
        if handle.join().is_err() {
            debug!("Progress printer thread panicked");
        }
    }
}
