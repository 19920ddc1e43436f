//! csctl: host-local control of managed sysv-style services.

use clap::{ArgAction, Args, Parser, Subcommand};
use cs_common::{ConfigResolver, Error, OutputFormat, Result, ServiceName};
use cs_core::catalog::{FamilyCatalog, InstalledCatalog};
use cs_core::collect::{ProcessRecord, ProcessSource, ProcfsSource};
use cs_core::exit_codes::ExitCode;
use cs_core::host::HostIdentity;
use cs_core::lifecycle::{LifecycleController, OsSpawner, Selector};
use cs_core::logging::init_logging;
use cs_core::output::Printer;
use cs_core::provision::Provisioner;
use cs_core::registry::{JsonFileStore, Reconciler};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "csctl",
    version,
    about = "Control, provision, and register managed services on this host"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOpts {
    /// Path to a TOML config file (overrides CSCTL_CONFIG and XDG lookup)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start installed services that are not running
    Start {
        /// Service name or name prefix
        name: Option<String>,
        /// Target every installed service
        #[arg(long, conflicts_with_all = ["name", "group"])]
        all: bool,
        /// Target every service sharing this name prefix
        #[arg(long, value_name = "NAME", conflicts_with = "name")]
        group: Option<String>,
    },

    /// Stop running services
    Stop {
        name: Option<String>,
        #[arg(long, conflicts_with_all = ["name", "group"])]
        all: bool,
        #[arg(long, value_name = "NAME", conflicts_with = "name")]
        group: Option<String>,
    },

    /// Stop then start running services
    Restart {
        name: Option<String>,
        #[arg(long, conflicts_with_all = ["name", "group"])]
        all: bool,
        #[arg(long, value_name = "NAME", conflicts_with = "name")]
        group: Option<String>,
    },

    /// Show running/down state of installed services
    Status {
        name: Option<String>,
        #[arg(long, conflicts_with_all = ["name", "group"])]
        all: bool,
        #[arg(long, value_name = "NAME", conflicts_with = "name")]
        group: Option<String>,
    },

    /// Provision new service scripts from the template
    Add {
        /// Base service name (must belong to a known family)
        name: String,
        /// Create exactly this one service
        #[arg(long, conflicts_with = "between")]
        single: bool,
        /// Create a numbered range, inclusive
        #[arg(long, value_name = "START-END")]
        between: Option<String>,
    },

    /// Remove provisioned service scripts
    Remove {
        name: String,
        #[arg(long, conflicts_with = "between")]
        single: bool,
        #[arg(long, value_name = "START-END")]
        between: Option<String>,
    },

    /// Inspect one running service
    Show {
        /// Service name or name prefix
        name: String,
        /// Managed environment variables
        #[arg(long)]
        env: bool,
        /// Launch parameters
        #[arg(long)]
        params: bool,
        /// Active TCP connections
        #[arg(long)]
        conn: bool,
        /// Registration state of matching installed services
        #[arg(long)]
        registry: bool,
    },

    /// Cross-host registry: view or register this host's instances
    Registry {
        /// Component the instance belongs to
        #[arg(long, requires = "instance", requires = "kind")]
        component: Option<String>,
        /// Instance name to register
        #[arg(long, requires = "component")]
        instance: Option<String>,
        /// Instance type tag
        #[arg(long = "type", requires = "component")]
        kind: Option<String>,
        /// Create this host's server entry if absent
        #[arg(long)]
        add_host: bool,
    },
}

fn main() {
    // Usage errors exit 1, not clap's default 2; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::UsageError.as_i32()
            } else {
                ExitCode::Clean.as_i32()
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.global.verbose, cli.global.quiet);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            // Aborting errors bypass the log filter: the status line must
            // reach the user even at default verbosity.
            eprintln!("csctl: error: {e}");
            match e {
                Error::Store(_) => ExitCode::StoreError,
                _ => ExitCode::UsageError,
            }
        }
    };
    std::process::exit(code.as_i32());
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let (config, resolution) = ConfigResolver::new(cli.global.config.clone()).load()?;
    debug!(%resolution, "configuration loaded");

    let printer = Printer::new(cli.global.format, cli.global.no_color);
    let catalog = InstalledCatalog::new(&config);
    let source = ProcfsSource::new(&config);

    match &cli.command {
        Commands::Start { name, all, group } => {
            let selector = selector_of(name, *all, group);
            let spawner = OsSpawner;
            let controller = LifecycleController::new(&config, &catalog, &source, &spawner);
            printer.actions(&controller.start(&selector)?);
            Ok(ExitCode::Clean)
        }
        Commands::Stop { name, all, group } => {
            let selector = selector_of(name, *all, group);
            let spawner = OsSpawner;
            let controller = LifecycleController::new(&config, &catalog, &source, &spawner);
            printer.actions(&controller.stop(&selector)?);
            Ok(ExitCode::Clean)
        }
        Commands::Restart { name, all, group } => {
            let selector = selector_of(name, *all, group);
            let spawner = OsSpawner;
            let controller = LifecycleController::new(&config, &catalog, &source, &spawner);
            printer.actions(&controller.restart(&selector)?);
            Ok(ExitCode::Clean)
        }
        Commands::Status { name, all, group } => {
            // Bare `status` means everything; only start/stop/restart
            // treat the unscoped form as an empty selection.
            let selector = match selector_of(name, *all, group) {
                Selector::None => Selector::All,
                other => other,
            };
            let spawner = OsSpawner;
            let controller = LifecycleController::new(&config, &catalog, &source, &spawner);
            printer.status(&controller.status(&selector)?)?;
            Ok(ExitCode::Clean)
        }
        Commands::Add {
            name,
            single,
            between,
        } => {
            let families = FamilyCatalog::new(&config);
            let provisioner = Provisioner::new(&config, &catalog, &families);
            let name = ServiceName::new(name.as_str());
            match (single, between) {
                (true, None) => {
                    let report = provisioner.add_single(&name)?;
                    printer.provision(&[report]);
                    Ok(ExitCode::Clean)
                }
                (false, Some(spec)) => {
                    printer.provision(&provisioner.add_range(&name, spec)?);
                    Ok(ExitCode::Clean)
                }
                _ => Err(Error::Validation(
                    "add requires exactly one of --single or --between".into(),
                )),
            }
        }
        Commands::Remove {
            name,
            single,
            between,
        } => {
            let families = FamilyCatalog::new(&config);
            let provisioner = Provisioner::new(&config, &catalog, &families);
            let name = ServiceName::new(name.as_str());
            match (single, between) {
                (true, None) => {
                    let report = provisioner.remove_single(&name)?;
                    printer.provision(&[report]);
                    Ok(ExitCode::Clean)
                }
                (false, Some(spec)) => {
                    printer.provision(&provisioner.remove_range(&name, spec)?);
                    Ok(ExitCode::Clean)
                }
                _ => Err(Error::Validation(
                    "remove requires exactly one of --single or --between".into(),
                )),
            }
        }
        Commands::Show {
            name,
            env,
            params,
            conn,
            registry,
        } => {
            if *registry {
                let store = JsonFileStore::new(
                    config.registry.path.clone(),
                    Duration::from_millis(config.registry.lock_timeout_ms),
                );
                let host = HostIdentity::resolve()?;
                let reconciler = Reconciler::new(&store, host);
                let installed: Vec<ServiceName> = catalog
                    .list_installed()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|n| n.as_str().starts_with(name.as_str()))
                    .collect();
                let rows: Vec<_> = reconciler
                    .reconcile_view(&installed)?
                    .into_iter()
                    .filter(|row| row.instance.starts_with(name.as_str()))
                    .collect();
                printer.registry(&rows)?;
                return Ok(ExitCode::Clean);
            }

            let record = find_running(&source, name)?;
            // No view flag selects every process view.
            let all_views = !(*env || *params || *conn);
            if *env || all_views {
                printer.show_env(&record, &config.prefix)?;
            }
            if *params || all_views {
                printer.show_params(&record)?;
            }
            if *conn || all_views {
                printer.show_connections(&record)?;
            }
            Ok(ExitCode::Clean)
        }
        Commands::Registry {
            component,
            instance,
            kind,
            add_host,
        } => {
            let store = JsonFileStore::new(
                config.registry.path.clone(),
                Duration::from_millis(config.registry.lock_timeout_ms),
            );
            let host = HostIdentity::resolve()?;
            let ipaddr = host.ipaddr.clone();
            let reconciler = Reconciler::new(&store, host);

            match (component, instance, kind) {
                (Some(component), Some(instance), Some(kind)) => {
                    let outcome = reconciler.register(component, instance, kind, *add_host)?;
                    printer.register_outcome(&outcome, instance, &ipaddr);
                    Ok(ExitCode::Clean)
                }
                (None, None, None) => {
                    let installed = catalog.list_installed().unwrap_or_default();
                    printer.registry(&reconciler.reconcile_view(&installed)?)?;
                    Ok(ExitCode::Clean)
                }
                _ => Err(Error::Validation(
                    "registering requires --component, --instance, and --type together".into(),
                )),
            }
        }
    }
}

/// Fold a positional name, `--all`, and `--group` into one selector.
/// `--group` is the explicit spelling of the positional prefix form.
fn selector_of(name: &Option<String>, all: bool, group: &Option<String>) -> Selector {
    let target = name.as_deref().or(group.as_deref());
    Selector::from_flags(target, all)
}

/// Locate the first snapshot record whose name matches the given name or
/// name prefix. A service that is not running cannot be inspected.
fn find_running(source: &dyn ProcessSource, name: &str) -> Result<ProcessRecord> {
    let mut records = source.snapshot()?;
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
        .into_iter()
        .find(|record| record.name.as_str() == name || record.name.as_str().starts_with(name))
        .ok_or_else(|| Error::NotFound(format!("service '{name}' is not running")))
}
