use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::LevelFilter;
use recall_core::{ContentOptions, EmailMode, SendPolicy};
use recall_engine::{
    FetchSettings, PipelineSettings, SmtpSettings, DEFAULT_CONCURRENCY, DEFAULT_DETAIL_HOST,
    DEFAULT_FEED_URL,
};
use serde::Deserialize;

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "recall_watch.ron";

const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";
const ENV_EMAIL_MODE: &str = "RECALL_EMAIL_MODE";

/// Everything the binary reads from `recall_watch.ron`. Every field has a
/// default, so an empty `()` document is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed_url: String,
    pub data_dir: PathBuf,
    pub detail_hosts: Vec<String>,
    pub email_mode: EmailMode,
    pub send_policy: SendPolicy,
    pub enrich_concurrency: usize,
    pub brand: String,
    pub footer: String,
    pub log_level: String,
    pub log_destination: LogDestination,
    pub fetch: FetchSettings,
    pub smtp: SmtpSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        let content = ContentOptions::default();
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            data_dir: PathBuf::from("./data"),
            detail_hosts: vec![DEFAULT_DETAIL_HOST.to_string()],
            email_mode: EmailMode::default(),
            send_policy: SendPolicy::default(),
            enrich_concurrency: DEFAULT_CONCURRENCY,
            brand: content.brand,
            footer: content.footer,
            log_level: "info".to_string(),
            log_destination: LogDestination::default(),
            fetch: FetchSettings::default(),
            smtp: SmtpSettings::default(),
        }
    }
}

impl AppConfig {
    /// Read `path`. `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text)
                .map(Some)
                .with_context(|| format!("parsing {}", path.display())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Apply `SMTP_PASSWORD` and `RECALL_EMAIL_MODE` from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(ENV_SMTP_PASSWORD) {
            self.smtp.password = password;
        }
        if let Some(mode) = lookup(ENV_EMAIL_MODE) {
            self.email_mode = mode
                .parse::<EmailMode>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("{ENV_EMAIL_MODE}={mode}"))?;
        }
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse::<LevelFilter>()
            .with_context(|| format!("unknown log level '{}'", self.log_level))
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            email_mode: self.email_mode,
            send_policy: self.send_policy,
            enrich_concurrency: self.enrich_concurrency,
            content: ContentOptions {
                brand: self.brand.clone(),
                footer: self.footer.clone(),
            },
        }
    }
}
