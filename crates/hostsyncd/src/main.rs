// # hostsyncd - Hosts Sync Daemon
//
// This is a thin integration layer. All resolution, merge and refresh logic
// lives in hostsync-core; the daemon only wires it together.
//
// The hostsyncd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the lookup transport and key-value store
// 4. Running the scheduled refresh engine, or a one-shot mode
// 5. Writing the hosts block into a hosts file, when asked to
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Domains and Lookup
// - `HOSTSYNC_DOMAINS`: Comma-separated domain list (default: built-in GitHub list)
// - `HOSTSYNC_PROVIDERS`: Comma-separated providers in preference order
//   (cloudflare, google, ip_address; default: all three)
// - `HOSTSYNC_PROVIDER_FALLBACK`: Try the next provider on failure (default: false)
//
// ### Store
// - `HOSTSYNC_STORE_TYPE`: Type of key-value store (file, memory; default: memory)
// - `HOSTSYNC_STORE_PATH`: Store directory (for file store)
//
// ### Schedule and Output
// - `HOSTSYNC_REFRESH_INTERVAL_SECS`: Refresh interval (default: 3600)
// - `HOSTSYNC_HOSTS_FILE`: Hosts file to keep updated (optional)
//
// ### Mode
// - `HOSTSYNC_MODE`: daemon (default), once, reset, show, domain
// - `HOSTSYNC_DOMAIN`: Domain to look up (for domain mode)
// - `HOSTSYNC_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export HOSTSYNC_STORE_TYPE=file
// export HOSTSYNC_STORE_PATH=/var/lib/hostsync
// export HOSTSYNC_HOSTS_FILE=/etc/hosts
//
// hostsyncd
// ```

use anyhow::{Context, Result};
use hostsync_core::config::{StoreConfig, SyncConfig, validate_domain_name};
use hostsync_core::render::{DEFAULT_TEMPLATE, render_hosts, splice_hosts_block};
use hostsync_core::traits::{KvStore, LookupTransport};
use hostsync_core::{
    FileKvStore, HostEntry, MemoryKvStore, Provider, RefreshCoordinator, SyncEngine, SyncEvent,
    UpdateOutcome,
};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum HostsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<HostsyncExitCode> for ExitCode {
    fn from(code: HostsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the process does once wired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Scheduled refresh loop until SIGTERM/SIGINT
    Daemon,
    /// One scheduled refresh, then exit
    Once,
    /// Drop the dataset, rebuild it, print the hosts block
    Reset,
    /// Print the hosts block (refreshing if stale)
    Show,
    /// Live lookup of `HOSTSYNC_DOMAIN`
    Domain,
}

impl Mode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daemon" => Ok(Mode::Daemon),
            "once" => Ok(Mode::Once),
            "reset" => Ok(Mode::Reset),
            "show" => Ok(Mode::Show),
            "domain" => Ok(Mode::Domain),
            other => anyhow::bail!(
                "HOSTSYNC_MODE '{}' is not supported. \
                Supported modes: daemon, once, reset, show, domain",
                other
            ),
        }
    }
}

/// Application configuration
struct Config {
    sync: SyncConfig,
    mode: Mode,
    domain: Option<String>,
    hosts_file: Option<PathBuf>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut sync = SyncConfig::new();

        if let Some(domains) = env_opt("HOSTSYNC_DOMAINS") {
            sync.domains = split_list(&domains);
        }

        if let Some(providers) = env_opt("HOSTSYNC_PROVIDERS") {
            sync.providers = split_list(&providers)
                .iter()
                .map(|name| name.parse::<Provider>())
                .collect::<std::result::Result<_, _>>()
                .context("Invalid HOSTSYNC_PROVIDERS")?;
        }

        if let Some(fallback) = env_opt("HOSTSYNC_PROVIDER_FALLBACK") {
            sync.provider_fallback = parse_bool(&fallback)
                .with_context(|| format!("Invalid HOSTSYNC_PROVIDER_FALLBACK '{}'", fallback))?;
        }

        let store_type = env_opt("HOSTSYNC_STORE_TYPE").unwrap_or_else(|| "memory".to_string());
        sync.store = match store_type.as_str() {
            "memory" => StoreConfig::Memory,
            "file" => StoreConfig::File {
                path: env_opt("HOSTSYNC_STORE_PATH").ok_or_else(|| {
                    anyhow::anyhow!(
                        "HOSTSYNC_STORE_PATH is required when HOSTSYNC_STORE_TYPE=file. \
                        Set it via: export HOSTSYNC_STORE_PATH=/var/lib/hostsync"
                    )
                })?,
            },
            other => anyhow::bail!(
                "HOSTSYNC_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                other
            ),
        };

        if let Some(interval) = env_opt("HOSTSYNC_REFRESH_INTERVAL_SECS") {
            sync.schedule.interval_secs = interval.parse().with_context(|| {
                format!("HOSTSYNC_REFRESH_INTERVAL_SECS must be a number. Got: {}", interval)
            })?;
        }

        let mode = match env_opt("HOSTSYNC_MODE") {
            Some(mode) => Mode::parse(&mode)?,
            None => Mode::Daemon,
        };

        Ok(Self {
            sync,
            mode,
            domain: env_opt("HOSTSYNC_DOMAIN"),
            hosts_file: env_opt("HOSTSYNC_HOSTS_FILE").map(PathBuf::from),
            log_level: env_opt("HOSTSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.sync.validate()?;

        let interval = self.sync.schedule.interval_secs;
        if !(60..=86_400).contains(&interval) {
            anyhow::bail!(
                "HOSTSYNC_REFRESH_INTERVAL_SECS must be between 60 and 86400 seconds. Got: {}",
                interval
            );
        }

        if self.mode == Mode::Domain {
            match &self.domain {
                Some(domain) => validate_domain_name(domain)?,
                None => anyhow::bail!(
                    "HOSTSYNC_DOMAIN is required when HOSTSYNC_MODE=domain. \
                    Set it via: export HOSTSYNC_DOMAIN=github.com"
                ),
            }
        }

        if let StoreConfig::File { path } = &self.sync.store
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "HOSTSYNC_STORE_PATH parent directory does not exist: {}. \
                Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if let Some(hosts_file) = &self.hosts_file
            && hosts_file.is_dir()
        {
            anyhow::bail!(
                "HOSTSYNC_HOSTS_FILE must be a file, got a directory: {}",
                hosts_file.display()
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "HOSTSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Non-empty value of an environment variable
fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Split a comma-separated list, dropping blanks
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected true or false, got '{}'", other),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return HostsyncExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return HostsyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries the hosts block in one-shot modes
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return HostsyncExitCode::ConfigError.into();
    }

    info!("Starting hostsyncd ({:?} mode)", config.mode);
    info!(
        "Configuration loaded: {} domain(s), providers [{}], {} store",
        config.sync.domains.len(),
        config
            .sync
            .providers
            .iter()
            .map(Provider::name)
            .collect::<Vec<_>>()
            .join(", "),
        config.sync.store.type_name()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return HostsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run(config).await {
            error!("hostsyncd error: {:#}", e);
            HostsyncExitCode::RuntimeError
        } else {
            HostsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Wire the stack and run the selected mode
async fn run(config: Config) -> Result<()> {
    let transport = build_transport()?;
    let kv = build_store(&config.sync.store).await?;
    let coordinator = Arc::new(RefreshCoordinator::from_config(transport, kv, &config.sync));

    match config.mode {
        Mode::Daemon => run_daemon(coordinator, &config).await,
        Mode::Once => {
            let outcome = coordinator.run_scheduled_refresh().await;
            if let UpdateOutcome::Failed { reason } = outcome {
                anyhow::bail!("Refresh failed: {}", reason);
            }
            if let Some(path) = &config.hosts_file {
                write_hosts_file(path, &coordinator.get_hosts_data().await).await?;
            }
            Ok(())
        }
        Mode::Reset => {
            let entries = coordinator.reset_hosts_data().await;
            print_hosts(&entries);
            if let Some(path) = &config.hosts_file {
                write_hosts_file(path, &entries).await?;
            }
            Ok(())
        }
        Mode::Show => {
            print_hosts(&coordinator.get_hosts_data().await);
            Ok(())
        }
        Mode::Domain => {
            let domain = config
                .domain
                .as_deref()
                .context("HOSTSYNC_DOMAIN is required in domain mode")?;
            match coordinator.get_domain_data(domain).await {
                Some(record) => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "domain": domain,
                            "ip": record.ip.to_string(),
                            "lastUpdated": record.last_updated.to_rfc3339(),
                            "lastChecked": record.last_checked.to_rfc3339(),
                        })
                    );
                    Ok(())
                }
                None => anyhow::bail!("Lookup of {} failed", domain),
            }
        }
    }
}

/// Run the scheduled engine until SIGTERM/SIGINT
async fn run_daemon(coordinator: Arc<RefreshCoordinator>, config: &Config) -> Result<()> {
    let (engine, mut events) = SyncEngine::new(coordinator.clone(), &config.sync.schedule)?;

    // Follow engine events; rewrite the hosts file after every refresh
    let hosts_file = config.hosts_file.clone();
    let follower = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SyncEvent::RefreshCompleted { cycle, outcome } => {
                    info!("Refresh #{} completed: {}", cycle, outcome);
                    if let Some(path) = &hosts_file {
                        let entries = coordinator.get_hosts_data().await;
                        if let Err(e) = write_hosts_file(path, &entries).await {
                            error!("Failed to update {}: {:#}", path.display(), e);
                        }
                    }
                }
                SyncEvent::RefreshFailed { cycle, reason } => {
                    warn!("Refresh #{} failed, retrying next cycle: {}", cycle, reason);
                }
                other => info!("Engine event: {:?}", other),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown handler error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    info!("Starting sync engine");
    engine.run_with_shutdown(Some(shutdown_rx)).await?;
    drop(engine);

    // The event channel closes with the engine
    if tokio::time::timeout(Duration::from_secs(30), follower).await.is_err() {
        warn!("Event follower did not finish within 30s");
    }

    info!("Shutting down daemon");
    Ok(())
}

#[cfg(feature = "http")]
fn build_transport() -> Result<Arc<dyn LookupTransport>> {
    info!("Using HTTP lookup transport");
    Ok(Arc::new(hostsync_lookup_http::HttpTransport::new()))
}

#[cfg(not(feature = "http"))]
fn build_transport() -> Result<Arc<dyn LookupTransport>> {
    anyhow::bail!("hostsyncd was built without the `http` feature; no lookup transport available")
}

async fn build_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>> {
    match config {
        StoreConfig::File { path } => {
            info!("Using file store at {}", path);
            Ok(Arc::new(FileKvStore::new(path).await?))
        }
        StoreConfig::Memory => {
            warn!("Using memory store: the dataset is rebuilt on every start");
            Ok(Arc::new(MemoryKvStore::new()))
        }
    }
}

fn print_hosts(entries: &[HostEntry]) {
    print!("{}", render_hosts(entries, DEFAULT_TEMPLATE, chrono::Utc::now()));
}

/// Splice the hosts block into `path`, keeping everything outside the markers
///
/// Nothing is written when there are no entries.
async fn write_hosts_file(path: &Path, entries: &[HostEntry]) -> Result<()> {
    if entries.is_empty() {
        warn!("No entries resolved, leaving {} untouched", path.display());
        return Ok(());
    }

    let existing = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    let block = render_hosts(entries, DEFAULT_TEMPLATE, chrono::Utc::now());
    let updated = splice_hosts_block(&existing, &block);

    tokio::fs::write(path, updated)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
