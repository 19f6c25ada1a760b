//! Process entry point (spec §4.5, §5): parses configuration, runs
//! migrations, bootstraps the node's Bot identity, then runs the scheduler,
//! heartbeat, and git-watch tasks until a shutdown signal arrives.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use autoposter::config::Config;
use autoposter::logging;
use autoposter::messaging::telegram::TelegramClient;
use autoposter::messaging::MessagingClient;
use autoposter::services::heartbeat;
use autoposter::services::rate_limiter::RateLimiter;
use autoposter::services::scheduler::{PostingScheduler, SchedulerConfig};
use autoposter::store::Store;

#[derive(Parser, Debug)]
#[command(name = "autoposter", about = "Multi-bot broadcast scheduler and distribution engine")]
struct Cli {
    /// Path to a `.env`-style file to load before reading the environment.
    #[arg(long, default_value = ".env")]
    env_file: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _cli = Cli::parse();
    let config = Config::load()?;
    let _logging_guard = logging::init(&config.log_level, config.log_file.as_deref());

    info!("autoposter starting");

    let store = Store::connect(&config.database_url).await?;
    store.migrate().await?;
    info!("migrations applied");

    let client: Box<dyn MessagingClient> = Box::new(TelegramClient::new(&config.token));

    let install_dir = config.install_dir.clone().unwrap_or_else(|| ".".to_string());
    let bot_id = heartbeat::bootstrap(&store, client.as_ref(), &config.token, None).await?;
    info!(bot_id = %bot_id, "bot identity bootstrapped");

    let shutdown = CancellationToken::new();

    let rate_limiter = RateLimiter::new(config.rate_limiter_max_calls as usize, Duration::from_secs(config.rate_limiter_period_s));
    let scheduler = PostingScheduler::new(
        store.clone(),
        Box::new(TelegramClient::new(&config.token)),
        rate_limiter,
        SchedulerConfig {
            tick_interval: Duration::from_secs(config.scheduler_tick_s),
            max_posts_per_second: config.max_posts_per_second,
        },
    );

    let scheduler_shutdown = shutdown.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(bot_id, scheduler_shutdown).await;
    });

    let heartbeat_store = store.clone();
    let heartbeat_client: Box<dyn MessagingClient> = Box::new(TelegramClient::new(&config.token));
    let heartbeat_shutdown = shutdown.clone();
    let heartbeat_token = config.token.clone();
    let heartbeat_install_dir = PathBuf::from(install_dir);
    let git_repo_path = heartbeat_install_dir.clone();
    let git_remote = config.git_remote.clone();
    let git_branch = config.git_branch.clone();
    let git_check_interval = Duration::from_secs(config.git_check_interval_s);
    let heartbeat_handle = tokio::spawn(async move {
        heartbeat::run(
            heartbeat_store,
            heartbeat_client,
            heartbeat_token,
            heartbeat_install_dir,
            git_repo_path,
            git_remote,
            git_branch,
            git_check_interval,
            heartbeat_shutdown,
        )
        .await;
    });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping tasks");
    shutdown.cancel();

    let bounded = Duration::from_secs(30);
    if tokio::time::timeout(bounded, async {
        let _ = scheduler_handle.await;
        let _ = heartbeat_handle.await;
    })
    .await
    .is_err()
    {
        error!("graceful shutdown timed out after {bounded:?}");
    }

    info!("autoposter stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
