mod cli;
mod config;
mod logging;

use std::future::Future;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use recall_core::{RunError, RunResult};
use recall_engine::{
    Collaborators, FileRecipientStore, FileSnapshotStore, HttpDetailFetcher, MemoryDetailCache,
    Pipeline, ReqwestFetcher, RssFeedSource, SmtpMailer,
};
use recall_logging::{recall_error, recall_info, recall_warn};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command, RecipientsAction};
use crate::config::AppConfig;

const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            recall_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let loaded = AppConfig::load(&cli.config)?;
    let config_found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    config.apply_env(|key| std::env::var(key).ok())?;
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        config.level_filter()?
    };
    logging::initialize(config.log_destination, level);
    if !config_found {
        recall_warn!("No config at {}; using defaults", cli.config.display());
    }
    recall_info!(
        "recall-watch {} config={} data_dir={}",
        env!("CARGO_PKG_VERSION"),
        cli.config.display(),
        config.data_dir.display()
    );

    match cli.command {
        Command::Run => {
            let pipeline = build_pipeline(&config)?;
            let cancel = cancel_on_ctrl_c();
            Ok(report(pipeline.run_once(&cancel).await))
        }
        Command::TestEmail => {
            let pipeline = build_pipeline(&config)?;
            let cancel = cancel_on_ctrl_c();
            Ok(report(pipeline.send_test_digest(&cancel).await))
        }
        Command::Recipients { action } => {
            let store = FileRecipientStore::new(&config.data_dir);
            match action {
                RecipientsAction::List => {
                    let recipients = store.load()?;
                    if recipients.is_empty() {
                        println!("no recipients configured ({})", store.path().display());
                    }
                    for recipient in recipients {
                        println!("{}", recipient.describe());
                    }
                }
                RecipientsAction::Set { recipients } => {
                    let requested = recipients.len();
                    let saved = store
                        .save(recipients)
                        .with_context(|| format!("saving {}", store.path().display()))?;
                    if saved.len() < requested {
                        recall_warn!(
                            "Dropped {} invalid or duplicate recipients",
                            requested - saved.len()
                        );
                    }
                    for recipient in saved {
                        println!("{}", recipient.describe());
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let fetcher = ReqwestFetcher::new(config.fetch.clone());
    let mailer = SmtpMailer::new(config.smtp.clone()).context("configuring SMTP")?;
    let collaborators = Collaborators {
        feed: Arc::new(RssFeedSource::new(fetcher.clone(), config.feed_url.clone())),
        snapshots: Arc::new(FileSnapshotStore::new(&config.data_dir)),
        details: Arc::new(HttpDetailFetcher::new(fetcher, config.detail_hosts.clone())),
        cache: Arc::new(MemoryDetailCache::new()),
        recipients: Arc::new(FileRecipientStore::new(&config.data_dir)),
        mailer: Arc::new(mailer),
    };
    Ok(Pipeline::new(collaborators, config.pipeline_settings()))
}

/// Ctrl-C abandons outstanding detail fetches; the run itself still finishes.
/// A second Ctrl-C exits immediately.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, trigger).await {
            recall_error!("Interrupted twice; exiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    cancel
}

/// Cancels `cancel` on the first interrupt and returns `true` on the second.
/// Returns `false` if the signal source fails.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    recall_warn!("Interrupted; cancelling enrichment (Ctrl-C again to exit)");
    cancel.cancel();
    next_interrupt().await.is_ok()
}

fn report(outcome: Result<RunResult, RunError>) -> ExitCode {
    match outcome {
        Ok(result) => {
            print_json(&result);
            ExitCode::SUCCESS
        }
        Err(err) => {
            print_json(&json!({
                "error": err.reason.code(),
                "message": err.to_string(),
                "stage": err.stage,
                "counts": err.counts,
                "deliveries": err.deliveries,
            }));
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("error: could not render result: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use super::*;

    #[tokio::test]
    async fn second_interrupt_requests_exit() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let exit = watch_interrupts(
            || {
                calls += 1;
                ready(Ok(()))
            },
            cancel.clone(),
        )
        .await;
        assert!(exit);
        assert!(cancel.is_cancelled());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn first_interrupt_only_cancels() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let exit = watch_interrupts(
            || {
                calls += 1;
                ready(if calls == 1 {
                    Ok(())
                } else {
                    Err(io::Error::other("signal stream closed"))
                })
            },
            cancel.clone(),
        )
        .await;
        assert!(!exit);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn failed_signal_setup_leaves_run_alone() {
        let cancel = CancellationToken::new();
        let exit = watch_interrupts(
            || ready(Err(io::Error::other("no signal handler"))),
            cancel.clone(),
        )
        .await;
        assert!(!exit);
        assert!(!cancel.is_cancelled());
    }
}
