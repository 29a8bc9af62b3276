use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ferry_config::{check_module_dir, ConfigLoader, FerryConfig, LogFormat, LogLevel};
use ferry_execution::{NoopCredentialService, NoopLeaseService, Scheduler};
use ferry_server::{RequestServer, StaticTokenAuthenticator};

mod cli;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::new();
    let mut config = loader
        .load(cli.config.as_deref())
        .context("failed to load configuration")?;

    if let Some(addr) = &cli.bind_addr {
        config.server.bind_addr = addr.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = LogLevel::from_str(level)
            .map_err(|_| anyhow::anyhow!("invalid log level: {}", level))?;
    }

    if cli.check_config {
        println!("configuration is valid");
        return Ok(());
    }

    init_tracing(&config);

    check_module_dir(&config.paths.module_dir).context("module directory check failed")?;

    let paths = config.paths.clone();
    let bind_addr = config.server.bind_addr.clone();
    let auth = Arc::new(StaticTokenAuthenticator::from_config(&config.server));
    let config = Arc::new(RwLock::new(config));

    let (scheduler, handle) = Scheduler::new(
        Arc::clone(&config),
        paths,
        Arc::new(NoopLeaseService),
        Arc::new(NoopCredentialService),
    )
    .context("failed to initialize scheduler")?;
    let scheduler_task = tokio::spawn(scheduler.run());

    let server = RequestServer::new(handle.clone(), auth);
    tokio::spawn(async move {
        if let Err(e) = server.serve(&bind_addr).await {
            error!(error = %e, "request server terminated");
        }
    });

    info!("ferryd started");
    wait_for_shutdown(&cli, &loader, &config).await;

    info!("shutting down");
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "scheduler shutdown handshake failed");
    }
    let _ = scheduler_task.await;
    Ok(())
}

fn init_tracing(config: &FerryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_filter_str()));
    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Block until ctrl-c or SIGTERM. SIGHUP reloads the configuration in
/// place; monitor periods and limits take effect on their next use.
async fn wait_for_shutdown(cli: &Cli, loader: &ConfigLoader, config: &Arc<RwLock<FerryConfig>>) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "cannot install SIGTERM handler");
            return;
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "cannot install SIGHUP handler");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return,
            _ = sigterm.recv() => return,
            _ = sighup.recv() => {
                match loader.load(cli.config.as_deref()) {
                    Ok(fresh) => {
                        *config.write().await = fresh;
                        info!("configuration reloaded");
                    }
                    Err(e) => warn!(error = %e, "configuration reload failed, keeping current"),
                }
            }
        }
    }
}
