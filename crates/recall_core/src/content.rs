//! Subject, plain-text and HTML rendering of a recipient's items.
//!
//! Rendering is pure: the same [`ContentSpec`] always yields byte-identical
//! output.

use serde::Serialize;

use crate::{ContentSpec, FeedItem};

pub const DISTRIBUTEUR_LIMIT: usize = 80;
pub const MOTIF_LIMIT: usize = 140;

/// Rendered message body, without addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// A rendered message addressed to its recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
    pub recipients: Vec<String>,
}

impl EmailMessage {
    pub fn new(content: EmailContent, recipients: Vec<String>) -> Self {
        Self {
            subject: content.subject,
            text: content.text,
            html: content.html,
            recipients,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentOptions {
    pub brand: String,
    pub footer: String,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            brand: "RappelConso".to_string(),
            footer: "View the full feed in the RappelConso RSS dashboard.".to_string(),
        }
    }
}

struct Section<'a> {
    title: &'static str,
    items: &'a [FeedItem],
}

#[derive(Debug, Clone, Default)]
pub struct ContentBuilder {
    options: ContentOptions,
}

impl ContentBuilder {
    pub fn new(options: ContentOptions) -> Self {
        Self { options }
    }

    pub fn build(&self, spec: &ContentSpec) -> EmailContent {
        let brand = &self.options.brand;
        let (subject, intro, sections) = match spec {
            ContentSpec::NewOnly(items) => (
                format!("{brand}: {}", count_label(items.len(), "new")),
                "New recalls published since the last check.",
                vec![Section {
                    title: "New items",
                    items,
                }],
            ),
            ContentSpec::LatestPlusNew { items, new_count } => {
                let split = (*new_count).min(items.len());
                let (new_items, latest) = items.split_at(split);
                (
                    format!("{brand}: {}", count_label(items.len(), "latest")),
                    "Latest recalls from the feed, new ones first.",
                    vec![
                        Section {
                            title: "New items",
                            items: new_items,
                        },
                        Section {
                            title: "Latest items",
                            items: latest,
                        },
                    ],
                )
            }
        };

        EmailContent {
            text: render_text(intro, &sections),
            html: self.render_html(intro, &sections),
            subject,
        }
    }

    fn render_html(&self, intro: &str, sections: &[Section<'_>]) -> String {
        let mut body = String::new();
        for section in sections {
            body.push_str(&render_section(section));
        }
        format!(
            concat!(
                "<!doctype html>\n<html>\n<body style=\"margin:0;padding:0;background:#f8fafc;font-family:Arial, Helvetica, sans-serif;\">\n",
                "<table role=\"presentation\" width=\"100%\" style=\"background:#f8fafc;padding:24px 12px;\"><tr><td align=\"center\">\n",
                "<table role=\"presentation\" width=\"100%\" style=\"max-width:640px;background:#ffffff;border-radius:16px;border:1px solid #e2e8f0;\"><tr><td style=\"padding:24px;\">\n",
                "<div style=\"font-size:22px;font-weight:700;color:#0f172a;margin:0 0 8px;\">{title}</div>\n",
                "<p style=\"margin:0 0 16px;color:#475569;font-size:14px;line-height:1.5;\">{intro}</p>\n",
                "{body}",
                "<p style=\"margin:24px 0 0;color:#94a3b8;font-size:12px;line-height:1.5;\">{footer}</p>\n",
                "</td></tr></table>\n</td></tr></table>\n</body>\n</html>\n"
            ),
            title = escape_html(&format!("{} updates", self.options.brand)),
            intro = escape_html(intro),
            body = body,
            footer = escape_html(&self.options.footer),
        )
    }
}

fn count_label(count: usize, kind: &str) -> String {
    if count == 1 {
        format!("1 {kind} item")
    } else {
        format!("{count} {kind} items")
    }
}

fn render_text(intro: &str, sections: &[Section<'_>]) -> String {
    let mut lines = vec![intro.to_string()];
    for section in sections {
        lines.push(String::new());
        lines.push(format!("{} ({}):", section.title, section.items.len()));
        if section.items.is_empty() {
            lines.push("- none".to_string());
        }
        for item in section.items {
            let link = if item.link.is_empty() {
                "no link"
            } else {
                item.link.as_str()
            };
            lines.push(format!("- {} ({link})", item.display_title()));
        }
    }
    lines.join("\n")
}

fn render_section(section: &Section<'_>) -> String {
    let mut out = format!(
        "<div style=\"margin:24px 0 8px;font-size:18px;font-weight:600;color:#0f172a;\">{} ({})</div>\n",
        escape_html(section.title),
        section.items.len()
    );
    if section.items.is_empty() {
        out.push_str("<div style=\"font-size:14px;color:#64748b;margin:0 0 16px;\">- none</div>\n");
    }
    for item in section.items {
        out.push_str(&render_card(item));
    }
    out
}

fn render_card(item: &FeedItem) -> String {
    let title = escape_html(item.display_title());

    let image = if item.enclosure_url.is_empty() {
        "<div style=\"width:100%;padding:24px;background:#f1f5f9;border-radius:10px;text-align:center;color:#64748b;font-size:13px;margin:0 0 12px;\">No image</div>".to_string()
    } else {
        format!(
            "<img src=\"{}\" alt=\"{title}\" style=\"display:block;width:100%;height:auto;border-radius:10px;margin:0 0 12px;\" />",
            escape_html(&item.enclosure_url)
        )
    };

    let date = display_date(item);
    let date_block = if date.is_empty() {
        String::new()
    } else {
        format!(
            "<div style=\"font-size:12px;color:#64748b;margin:0 0 8px;\">{}</div>",
            escape_html(date)
        )
    };

    let (distributeurs, motif) = item
        .distributor
        .as_ref()
        .map(|info| (info.display_distributeurs(), info.motif_raw.clone()))
        .unwrap_or_default();

    let motif = truncate_text(motif.trim(), MOTIF_LIMIT);
    let motif_block = if motif.is_empty() {
        String::new()
    } else {
        format!(
            "<div style=\"font-size:13px;line-height:1.5;color:#475569;margin:0 0 12px;\">{}</div>",
            escape_html(&motif)
        )
    };

    let distributeurs = truncate_text(distributeurs.trim(), DISTRIBUTEUR_LIMIT);
    let distributeur_block = if distributeurs.is_empty() {
        String::new()
    } else {
        format!(
            "<span style=\"display:inline-block;padding:8px 12px;background:#0f172a;color:#ffffff;border-radius:8px;font-size:13px;\">{}</span>",
            escape_html(&distributeurs)
        )
    };
    let link_block = if item.link.is_empty() {
        String::new()
    } else {
        format!(
            "<a href=\"{}\" style=\"display:inline-block;padding:8px 12px;background:#0f172a;color:#ffffff;text-decoration:none;border-radius:8px;font-size:13px;\">Open fiche</a>",
            escape_html(&item.link)
        )
    };
    let actions = if distributeur_block.is_empty() && link_block.is_empty() {
        String::new()
    } else {
        format!("<div style=\"display:flex;flex-wrap:wrap;gap:8px;\">{distributeur_block}{link_block}</div>")
    };

    format!(
        concat!(
            "<table role=\"presentation\" width=\"100%\" style=\"border:1px solid #e2e8f0;border-radius:12px;margin:0 0 16px;background:#ffffff;\"><tr><td style=\"padding:16px;\">\n",
            "{image}\n",
            "<div style=\"font-size:16px;font-weight:600;color:#0f172a;margin:0 0 6px;\">{title}</div>\n",
            "{date}{motif}{actions}\n",
            "</td></tr></table>\n"
        ),
        image = image,
        title = title,
        date = date_block,
        motif = motif_block,
        actions = actions,
    )
}

fn display_date(item: &FeedItem) -> &str {
    if !item.pub_date.is_empty() {
        return &item.pub_date;
    }
    item.pub_date_iso.as_deref().unwrap_or("")
}

/// Cut `text` to at most `limit` characters, ending in an ellipsis when cut.
pub fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{escape_html, truncate_text};

    #[test]
    fn truncation_counts_chars_not_bytes() {
        assert_eq!(truncate_text("éééé", 4), "éééé");
        assert_eq!(truncate_text("ééééé", 4), "ééé…");
        assert_eq!(truncate_text("abc", 0), "…");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
