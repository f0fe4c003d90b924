use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Per-address delivery preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientConfig {
    pub email: String,
    /// Case-insensitive distributor filter. Empty means every item passes.
    #[serde(default)]
    pub distributeurs: Vec<String>,
    #[serde(default)]
    pub only_new_items: bool,
}

impl RecipientConfig {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_distributeurs<I, S>(mut self, distributeurs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distributeurs = distributeurs.into_iter().map(Into::into).collect();
        self
    }

    pub fn only_new(mut self) -> Self {
        self.only_new_items = true;
        self
    }

    /// One-line description used by listings and logs.
    pub fn describe(&self) -> String {
        let mode = if self.only_new_items {
            "new only"
        } else {
            "latest 10 + new first"
        };
        if self.distributeurs.is_empty() {
            format!("{} (all distributeurs) · {mode}", self.email)
        } else {
            format!("{} ({}) · {mode}", self.email, self.distributeurs.join(", "))
        }
    }
}

/// Clean up a recipient list.
///
/// Emails are trimmed and entries without an `@` dropped; the first entry per
/// lower-cased email wins. Filters are trimmed and de-duplicated
/// case-insensitively.
pub fn normalize_recipients(configs: Vec<RecipientConfig>) -> Vec<RecipientConfig> {
    let mut seen = HashSet::new();
    configs
        .into_iter()
        .filter_map(|config| {
            let email = config.email.trim().to_string();
            if !is_plausible_email(&email) || !seen.insert(email.to_lowercase()) {
                return None;
            }
            let mut filters_seen = HashSet::new();
            let distributeurs = config
                .distributeurs
                .iter()
                .map(|d| d.trim())
                .filter(|d| !d.is_empty() && filters_seen.insert(d.to_lowercase()))
                .map(ToOwned::to_owned)
                .collect();
            Some(RecipientConfig {
                email,
                distributeurs,
                only_new_items: config.only_new_items,
            })
        })
        .collect()
}

/// Parse the legacy comma-separated address list into unfiltered recipients.
pub fn parse_address_list(raw: &str) -> Vec<RecipientConfig> {
    normalize_recipients(raw.split(',').map(RecipientConfig::new).collect())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
