use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use recall_core::RecipientConfig;

use crate::config::DEFAULT_CONFIG_FILE;

/// Watch the RappelConso feed and mail recall alerts.
#[derive(Debug, Parser)]
#[command(name = "recall-watch", version, about)]
pub struct Cli {
    /// RON configuration file.
    #[arg(short, long, env = "RECALL_WATCH_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log at debug level regardless of the configured level.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the feed once, store a snapshot and mail what changed.
    ///
    /// Ctrl-C cancels outstanding detail fetches and lets the run finish;
    /// a second Ctrl-C exits immediately.
    Run,
    /// Mail every recipient the latest items without storing a snapshot.
    TestEmail,
    /// Show or replace the stored recipients.
    Recipients {
        #[command(subcommand)]
        action: RecipientsAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum RecipientsAction {
    List,
    /// Replace the list. Each entry is `email[:distA|distB][:new]`.
    Set {
        #[arg(required = true, value_parser = parse_recipient)]
        recipients: Vec<RecipientConfig>,
    },
}

/// `ops@example.com`, `ops@example.com:Acme|Lidl`, `ops@example.com:new`,
/// `ops@example.com:Acme:new`.
pub fn parse_recipient(raw: &str) -> Result<RecipientConfig> {
    let mut parts = raw.split(':');
    let email = parts.next().unwrap_or_default().trim();
    if email.is_empty() {
        bail!("missing email in '{raw}'");
    }
    let mut config = RecipientConfig::new(email);
    for part in parts {
        let part = part.trim();
        if part.eq_ignore_ascii_case("new") {
            config = config.only_new();
        } else if !part.is_empty() {
            config.distributeurs.extend(part.split('|').map(|d| d.trim().to_string()));
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_recipient_forms() {
        assert_eq!(
            parse_recipient("ops@example.com").unwrap(),
            RecipientConfig::new("ops@example.com")
        );
        assert_eq!(
            parse_recipient("ops@example.com:Acme|Lidl").unwrap(),
            RecipientConfig::new("ops@example.com").with_distributeurs(["Acme", "Lidl"])
        );
        assert_eq!(
            parse_recipient("ops@example.com:Acme:new").unwrap(),
            RecipientConfig::new("ops@example.com")
                .with_distributeurs(["Acme"])
                .only_new()
        );
        assert_eq!(
            parse_recipient("ops@example.com:NEW").unwrap(),
            RecipientConfig::new("ops@example.com").only_new()
        );
        assert!(parse_recipient(":Acme").is_err());
    }

    #[test]
    fn set_requires_entries() {
        assert!(Cli::try_parse_from(["recall-watch", "recipients", "set"]).is_err());
        let cli = Cli::try_parse_from([
            "recall-watch",
            "-v",
            "recipients",
            "set",
            "a@example.com",
            "b@example.com:new",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Recipients {
                action: RecipientsAction::Set { recipients },
            } => assert_eq!(recipients.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
