use recall_core::{split_distributeurs, DistributorInfo};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::decode::decode_html;
use crate::fetch::ReqwestFetcher;
use crate::{FailureKind, FetchError};

pub const DEFAULT_DETAIL_HOST: &str = "rappel.conso.gouv.fr";

const DETAIL_ACCEPT: &str = "text/html, */*";
const DETAIL_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

const DISTRIBUTEURS_LABEL: &str = "Distributeurs";
const MOTIF_LABEL: &str = "Motif du rappel";

/// Scrapes distributor and motif data from a recall's detail page.
#[async_trait::async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch_detail(&self, link: &str) -> Result<DistributorInfo, FetchError>;
}

pub struct HttpDetailFetcher {
    fetcher: ReqwestFetcher,
    allowed_hosts: Vec<String>,
    require_https: bool,
}

impl HttpDetailFetcher {
    pub fn new(fetcher: ReqwestFetcher, allowed_hosts: Vec<String>) -> Self {
        Self {
            fetcher,
            allowed_hosts,
            require_https: true,
        }
    }

    /// Accept plain `http` links as well. Meant for local test servers.
    pub fn allow_plain_http(mut self) -> Self {
        self.require_https = false;
        self
    }

    fn check_url(&self, link: &str) -> Result<(), FetchError> {
        let url = Url::parse(link)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let scheme_ok = url.scheme() == "https" || (!self.require_https && url.scheme() == "http");
        let host_ok = url
            .host_str()
            .is_some_and(|host| self.allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)));
        if scheme_ok && host_ok {
            Ok(())
        } else {
            Err(FetchError::new(FailureKind::DisallowedUrl, link.to_string()))
        }
    }
}

#[async_trait::async_trait]
impl DetailFetcher for HttpDetailFetcher {
    async fn fetch_detail(&self, link: &str) -> Result<DistributorInfo, FetchError> {
        self.check_url(link)?;
        let output = self
            .fetcher
            .get(link, DETAIL_ACCEPT, DETAIL_CONTENT_TYPES)
            .await?;
        let decoded = decode_html(&output.bytes, output.metadata.content_type.as_deref())?;
        Ok(extract_distributor_info(&decoded.html))
    }
}

/// Read the `<dt>`/`<dd>` pairs labelled "Distributeurs" and "Motif du rappel".
///
/// Missing labels yield empty fields; the last matching `<dt>` wins.
pub fn extract_distributor_info(html: &str) -> DistributorInfo {
    let doc = Html::parse_document(html);
    let Ok(dt_sel) = Selector::parse("dt") else {
        return DistributorInfo::default();
    };

    let mut distributeurs_raw = String::new();
    let mut motif_raw = String::new();
    for dt in doc.select(&dt_sel) {
        let label = collapse_whitespace(&dt.text().collect::<String>());
        let target = match label.as_str() {
            DISTRIBUTEURS_LABEL => &mut distributeurs_raw,
            MOTIF_LABEL => &mut motif_raw,
            _ => continue,
        };
        *target = next_dd(dt)
            .map(|dd| collapse_whitespace(&dd.text().collect::<String>()))
            .unwrap_or_default();
    }

    DistributorInfo {
        distributeurs_list: split_distributeurs(&distributeurs_raw),
        distributeurs_raw,
        motif_raw,
    }
}

/// The immediately following element sibling, when it is a `<dd>`.
fn next_dd(dt: ElementRef<'_>) -> Option<ElementRef<'_>> {
    dt.next_siblings()
        .find_map(ElementRef::wrap)
        .filter(|el| el.value().name().eq_ignore_ascii_case("dd"))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
