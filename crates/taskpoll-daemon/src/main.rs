use std::path::PathBuf;

use clap::Parser;
use taskpoll_core::TaskpollConfig;
use taskpoll_scheduler::Scheduler;
use tracing::{error, info, warn};

mod lock;
mod logging;
mod startup;

use lock::InstanceLock;
use startup::StartupManager;

/// taskpoll: poll-based periodic task scheduler driven by a CSV table.
#[derive(Parser)]
#[command(name = "taskpoll", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle, wait for dispatched tasks, and exit.
    #[arg(long, conflicts_with_all = ["install", "uninstall"])]
    once: bool,

    /// Register taskpoll to start at login (Windows).
    #[arg(long, conflicts_with = "uninstall")]
    install: bool,

    /// Remove the login registration (Windows).
    #[arg(long)]
    uninstall: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // load config: --config > TASKPOLL_CONFIG > <exe dir>/taskpoll.toml
    let (config, config_err) = match TaskpollConfig::load(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (TaskpollConfig::default(), Some(e)),
    };

    let _log_guard = logging::init_logging(&config.resolved_log_path());
    if let Some(e) = config_err {
        warn!("Config load failed ({e}), using defaults");
    }

    if cli.install || cli.uninstall {
        let manager = StartupManager::for_current_user(&config.app_name);
        if cli.install {
            manager.install(&config.base_dir)?;
        } else {
            manager.uninstall()?;
        }
        return Ok(());
    }

    // A second instance exits quietly with success; duplicate launches at
    // login are expected.
    let Some(_lock) = InstanceLock::acquire(config.lock_port) else {
        return Ok(());
    };

    let mut scheduler = Scheduler::new(config);

    if cli.once {
        if let Err(e) = scheduler.run_cycle().await {
            error!("scheduler cycle error: {e}");
        }
        scheduler.shutdown().await;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current cycle");
            let _ = shutdown_tx.send(true);
        }
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}
