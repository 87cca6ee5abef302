// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sgd: the coordinator daemon binary.

use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use sg_daemon::{env, Config, Daemon, ExitKind, RESTART_EXIT_CODE};

fn main() -> ExitCode {
    match run() {
        Ok(ExitKind::Normal) => ExitCode::SUCCESS,
        Ok(ExitKind::Restart) => ExitCode::from(RESTART_EXIT_CODE as u8),
        Err(e) => {
            eprintln!("sgd: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitKind, Box<dyn std::error::Error>> {
    let workspace = env::workspace_root();
    let default_base = workspace.join(".shogun");
    let config = Config::load(&env::config_path(&default_base))?.resolved(&workspace);

    std::fs::create_dir_all(config.base_dir.join("logs"))?;
    let appender = tracing_appender::rolling::never(config.base_dir.join("logs"), "server.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(EnvFilter::new(env::log_filter()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(file_writer))
        .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    info!(base_dir = %config.base_dir.display(), "sgd starting");

    let runtime = tokio::runtime::Runtime::new()?;
    let kind = runtime.block_on(async move {
        let daemon = Daemon::start(config)?;
        let shutdown = daemon.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown.send(ExitKind::Normal);
            }
        });
        Ok::<_, sg_daemon::lifecycle::LifecycleError>(daemon.wait().await)
    })?;
    Ok(kind)
}
