use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::FeedItem;

/// Hex SHA-256 over the content-bearing fields of a [`FeedItem`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Field order is part of the digest.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Fields<'a> {
    id: &'a str,
    title: &'a str,
    link: &'a str,
    pub_date: &'a str,
    description_html: &'a str,
    enclosure_url: &'a str,
}

/// Deterministic content fingerprint. Exact string equality, no normalization.
pub fn fingerprint(item: &FeedItem) -> Fingerprint {
    let fields = Fields {
        id: &item.id,
        title: &item.title,
        link: &item.link,
        pub_date: &item.pub_date,
        description_html: &item.description_html,
        enclosure_url: &item.enclosure_url,
    };
    // Serializing a struct of &str cannot fail.
    let payload = serde_json::to_vec(&fields).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&payload);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest.iter() {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    Fingerprint(hex)
}
