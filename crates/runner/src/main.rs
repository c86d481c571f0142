mod args;
mod commands;
mod error;
mod metadata_cache;

use crate::args::Args;
use crate::commands::{forward_commands, USAGE};
use crate::error::RunnerError;
use crate::metadata_cache::MetadataCache;
use auth::ApiCredentials;
use binance_rest::BinanceRestClient;
use clap::Parser;
use common::{init_logging, LogFormat};
use connector_core::SessionConfig;
use delay_check::{
    create_notice_channel, App, AppConfig, AppEvent, Command, DelayCheckConfig, Notice,
    NoticeReceiver,
};
use metrics::create_metrics;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` may carry BINANCE_ENVIRONMENT, which clap reads.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    init_logging(if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "delay-monitor failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), RunnerError> {
    info!(environment = %args.environment, "Starting delay-monitor");
    if args.environment.is_production() {
        warn!("Running against PRODUCTION: orders use real funds");
    }

    let credentials = ApiCredentials::from_env()?;
    let client = Arc::new(BinanceRestClient::with_environment(
        credentials,
        args.environment,
    )?);
    info!(base_url = %client.base_url(), "REST client ready");

    let filters = Arc::new(MetadataCache::new(
        args.cache_path.clone(),
        args.cache_max_age(),
        client.clone(),
    ));

    let config = AppConfig {
        session: SessionConfig::for_environment(args.environment),
        delay_check: DelayCheckConfig {
            default_delay_threshold_ms: args.delay,
            fill_timeout: args.fill_timeout(),
            ..DelayCheckConfig::default()
        },
        ..AppConfig::default()
    };

    let metrics = create_metrics();
    let (notices_tx, mut notices) = create_notice_channel();
    let app = App::new(
        config,
        client.clone(),
        filters,
        client,
        metrics.clone(),
        notices_tx.clone(),
    );
    let events = app.event_sender();

    println!("{USAGE}");

    // Blocking stdin lives on its own thread so it never holds up runtime shutdown.
    let stdin_events = events.clone();
    let recv_window = args.recv_window;
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        forward_commands(stdin.lock(), &stdin_events, &notices_tx, recv_window);
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating shutdown");
            let _ = events.send(AppEvent::Command(Command::Done));
        }
    });

    let mut app_task = tokio::spawn(app.run());
    let result = loop {
        tokio::select! {
            Some(notice) = notices.recv() => print_notice(&notice),
            joined = &mut app_task => break joined,
        }
    };
    flush_notices(&mut notices);

    let snapshot = metrics.snapshot();
    println!("\n{snapshot}");
    if snapshot.parse_errors > 0 {
        warn!(
            ratio = format!("{:.3}", snapshot.parse_error_ratio()),
            "Some stream frames could not be parsed"
        );
    }
    info!("Shutdown complete");

    result.map_err(|e| RunnerError::Task(e.to_string()))??;
    Ok(())
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Error(_) => eprintln!("{notice}"),
        _ => println!("{notice}"),
    }
}

fn flush_notices(notices: &mut NoticeReceiver) {
    while let Ok(notice) = notices.try_recv() {
        print_notice(&notice);
    }
}
