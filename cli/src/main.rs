//! CLI entrypoint for herd
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use herd_application::{
    BackendConnector, CleanupSweep, EventJournal, EventRouter, EventSink, InstanceRegistry,
    MemoryUserStore, NoEventJournal, SessionCorrelator, UserStateStore,
};
use herd_infrastructure::{
    ConfigLoader, EventStreamConfig, FileConfig, InstanceLauncher, JsonlEventJournal,
    LaunchSignature, LauncherConfig, OpenCodeConnector, PathGuard, ProcessDiscoverer,
    Supervisor, SystemProcessEnumerator,
};
use herd_presentation::{Cli, Commands, ConsoleDelivery, ConsoleFormatter, PlainNoticeFormatter};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow!("{}", e))?
    };

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_tracing(cli.verbose, config.logging.directory.as_deref());

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!("{}", problem);
        }
        bail!("Invalid configuration ({} problem(s))", problems.len());
    }

    info!("Starting herd (no chat transport: events are journaled, not delivered)");
    let herd = Herd::build(&config);

    match cli.action() {
        Commands::Serve => serve(herd, &config).await,
        Commands::Discover => discover(herd).await,
        Commands::Launch { directory } => launch(herd, &directory).await,
    }
}

/// Initialize logging based on verbosity level; `RUST_LOG` wins when set.
fn init_tracing(verbose: u8, log_directory: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "herd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    guard
}

/// Every long-lived component, wired once.
///
/// Events reach a user only through sessions recorded in the user store.
/// This binary has no chat transport and records none, so every routed
/// event ends as a correlation miss. A transport embedding herd builds a
/// `UserSessionService` over the same store, registry and correlator, and
/// opens sessions through it.
struct Herd {
    registry: Arc<InstanceRegistry>,
    connector: Arc<dyn BackendConnector>,
    supervisor: Arc<Supervisor>,
    discoverer: Arc<ProcessDiscoverer>,
    launcher: InstanceLauncher,
    cleanup: Arc<CleanupSweep>,
}

impl Herd {
    fn build(config: &FileConfig) -> Self {
        // === Dependency Injection ===
        let registry = Arc::new(InstanceRegistry::new());
        let store: Arc<dyn UserStateStore> = Arc::new(MemoryUserStore::new());
        let correlator = Arc::new(SessionCorrelator::new(store.clone()));

        let journal: Arc<dyn EventJournal> = match &config.logging.journal {
            Some(path) => match JsonlEventJournal::new(path) {
                Some(journal) => Arc::new(journal),
                None => {
                    warn!("Event journal disabled: cannot open {}", path.display());
                    Arc::new(NoEventJournal)
                }
            },
            None => Arc::new(NoEventJournal),
        };

        let router: Arc<dyn EventSink> = Arc::new(EventRouter::new(
            config.delivery.to_routing_config(),
            correlator.clone(),
            Arc::new(ConsoleDelivery::stdout()),
            Arc::new(PlainNoticeFormatter),
            journal,
        ));

        let stream_config = EventStreamConfig {
            reconnect_delay: config.stream.reconnect_delay(),
            connect_timeout: config.stream.connect_timeout(),
        };
        let supervisor = Arc::new(Supervisor::new(registry.clone(), Some(router), stream_config));

        let connector: Arc<dyn BackendConnector> =
            Arc::new(OpenCodeConnector::new(config.backend.request_timeout()));
        let subcommand = config
            .backend
            .args
            .first()
            .map(String::as_str)
            .unwrap_or("serve");
        let discoverer = Arc::new(ProcessDiscoverer::new(
            Arc::new(SystemProcessEnumerator::new()),
            connector.clone(),
            LaunchSignature::for_command(
                &config.backend.command,
                subcommand,
                config.backend.default_port,
            ),
        ));

        let launcher = InstanceLauncher::new(
            LauncherConfig::from(&config.backend),
            PathGuard::new(config.projects.to_policy()),
            discoverer.clone(),
            connector.clone(),
            supervisor.clone(),
        );

        let cleanup = Arc::new(CleanupSweep::new(store, correlator, config.cleanup.to_policy()));

        Self {
            registry,
            connector,
            supervisor,
            discoverer,
            launcher,
            cleanup,
        }
    }

    /// Register pre-configured instances that answer their health probe.
    async fn register_configured(&self, config: &FileConfig) {
        for entry in &config.instances {
            let instance = match entry.to_instance() {
                Ok(instance) => instance,
                Err(e) => {
                    warn!("Skipping configured instance '{}': {}", entry.id, e);
                    continue;
                }
            };
            let client = match self
                .connector
                .connect(&instance.base_url, &instance.working_directory)
            {
                Ok(client) => client,
                Err(e) => {
                    warn!("Skipping configured instance {}: {}", instance.id, e);
                    continue;
                }
            };
            if let Err(e) = client.health().await {
                warn!("Configured instance {} is not reachable: {}", instance.id, e);
                continue;
            }
            info!("Registered configured instance {}", instance.id);
            self.supervisor.attach(instance, client);
        }
    }

    /// Register every healthy backend found in the process table.
    async fn register_discovered(&self) {
        let instances = match self.discoverer.discover_running_instances().await {
            Ok(instances) => instances,
            Err(e) => {
                warn!("Process discovery failed: {}", e);
                return;
            }
        };

        for instance in instances {
            if self.registry.contains(&instance.id) {
                continue;
            }
            if !self.discoverer.is_healthy(&instance).await {
                warn!(
                    "Ignoring unresponsive backend {} at {}",
                    instance.id, instance.base_url
                );
                continue;
            }
            match self
                .connector
                .connect(&instance.base_url, &instance.working_directory)
            {
                Ok(client) => {
                    info!("Registered discovered instance {}", instance.id);
                    self.supervisor.attach(instance, client);
                }
                Err(e) => warn!("Cannot connect to {}: {}", instance.id, e),
            }
        }
    }

    async fn shutdown(&self) {
        self.supervisor.shutdown().await;
        self.launcher.shutdown().await;
    }
}

async fn serve(herd: Herd, config: &FileConfig) -> Result<()> {
    herd.register_configured(config).await;
    herd.register_discovered().await;

    let listing: Vec<_> = herd
        .registry
        .instances()
        .into_iter()
        .map(|instance| (instance, true))
        .collect();
    println!("{}", ConsoleFormatter::instances(&listing));

    let stop = CancellationToken::new();
    let cleanup = {
        let sweep = herd.cleanup.clone();
        let token = stop.clone();
        tokio::spawn(async move { sweep.run(token).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    stop.cancel();
    if let Err(e) = cleanup.await {
        warn!("Cleanup task ended abnormally: {}", e);
    }
    herd.shutdown().await;
    Ok(())
}

async fn discover(herd: Herd) -> Result<()> {
    let instances = herd
        .discoverer
        .discover_running_instances()
        .await
        .context("Process discovery failed")?;

    let mut listing = Vec::with_capacity(instances.len());
    for instance in instances {
        let healthy = herd.discoverer.is_healthy(&instance).await;
        listing.push((instance, healthy));
    }
    println!("{}", ConsoleFormatter::instances(&listing));
    Ok(())
}

async fn launch(herd: Herd, directory: &Path) -> Result<()> {
    let instance = match herd.launcher.launch(directory).await {
        Ok(instance) => instance,
        Err(e) => {
            // A child that never became healthy is still ours to stop
            herd.shutdown().await;
            return Err(e).with_context(|| format!("Cannot launch in {}", directory.display()));
        }
    };
    println!("{}", ConsoleFormatter::instance_line(&instance, true));

    if !instance.was_launched() {
        return Ok(());
    }

    println!("Press Ctrl-C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    herd.shutdown().await;
    Ok(())
}
