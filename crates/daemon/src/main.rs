// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! devicelab daemon (dld)
//!
//! Background process that owns the orchestration core: sessions, the test
//! queue, the parallel dispatcher, schedules, and the event bus. The HTTP
//! and realtime transports attach to the [`dl_daemon::System`] this binary
//! hosts.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::fs::File;
use std::time::Duration;

use fs2::FileExt;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use dl_core::SystemClock;
use dl_daemon::{env, Config, LifecycleError, System};
use dl_driver::{AdbDriver, NoopMatcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("dld {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("dld {}", env!("CARGO_PKG_VERSION"));
                println!("devicelab daemon - owns the device test orchestration core");
                println!();
                println!("USAGE:");
                println!("    dld");
                println!();
                println!("Configuration comes from DL_DATA_DIR and an optional");
                println!("daemon.toml inside the data directory.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: dld [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let (data_dir, config) = Config::load()?;
    std::fs::create_dir_all(&data_dir)?;

    // Single instance per data dir
    let lock_path = data_dir.join("dld.lock");
    let lock_file = File::create(&lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(Box::new(LifecycleError::LockHeld));
    }

    let log_dir = env::log_dir(&data_dir);
    std::fs::create_dir_all(&log_dir)?;
    let appender = tracing_appender::rolling::daily(&log_dir, "dld.log");
    let (writer, _guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    info!(data_dir = %data_dir.display(), "dld starting");

    let system = System::new(
        AdbDriver::new(),
        NoopMatcher,
        SystemClock,
        &data_dir,
        &config,
    );

    match system.init_schedules() {
        Ok(count) => info!(count, "schedules registered"),
        Err(e) => warn!(error = %e, "schedule init failed"),
    }

    // Periodic fleet scan keeps saved device documents fresh
    let system = std::sync::Arc::new(system);
    let scan_secs = config.inventory_scan_secs.unwrap_or(30);
    let scanner = (scan_secs > 0).then(|| {
        let system = std::sync::Arc::clone(&system);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(scan_secs));
            loop {
                ticker.tick().await;
                if let Err(e) = system.scan_devices().await {
                    warn!(error = %e, "inventory scan failed");
                }
            }
        })
    });

    // Run until SIGINT/SIGTERM, then tear down cooperatively
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
        _ = sigterm.recv() => info!("SIGTERM received"),
    }

    if let Some(handle) = scanner {
        handle.abort();
    }
    if let Err(e) = std::fs::remove_file(&lock_path) {
        error!(error = %e, "lock file cleanup failed");
    }
    system.shutdown().await;
    info!("dld stopped");
    Ok(())
}
