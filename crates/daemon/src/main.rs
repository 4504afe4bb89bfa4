// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cnapid: the compute node control-plane daemon.

use cnapi_daemon::{startup, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn config_path() -> PathBuf {
    std::env::var("CNAPI_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/cnapi/cnapid.toml"))
}

fn init_tracing(log_path: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_path {
        Some(path) => {
            let path = PathBuf::from(path);
            let dir = path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
            let file = path.file_name().map(PathBuf::from).unwrap_or_else(|| "cnapid.log".into());
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load(&config_path()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cnapid: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_tracing(config.log_path.as_deref());

    let daemon = match startup(&config).await {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("signal handler unavailable");
        daemon.shutdown();
        return ExitCode::FAILURE;
    }

    tracing::info!("shutting down");
    daemon.shutdown();
    ExitCode::SUCCESS
}
