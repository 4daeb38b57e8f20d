//! Multi-hop share negotiation.
//!
//! A share link is turned into downloadable file metadata through a fixed
//! sequence of upstream requests, each consuming state produced by the last:
//!
//! 1. fetch the share page, following redirects and collecting cookies
//! 2. extract the share identifier (from the final URL) and the page token
//! 3. query the listing API and select the first entry
//! 4. optionally follow the entry's download link to its direct URL
//!
//! Any failed step aborts the whole resolution with a [`ResolveError`]. The
//! cookie jar accumulated along the way is returned to the caller so it can be
//! persisted for the next run.
//!
//! # Example
//!
//! ```no_run
//! use sharelink_core::fetch::RedirectingClient;
//! use sharelink_core::resolver::{ResolveOptions, ShareResolver, ShareSite};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = ShareResolver::new(ShareSite::default(), RedirectingClient::new()?);
//! let outcome = resolver
//!     .resolve("https://www.terabox.com/s/1abc", "ndus=seed", ResolveOptions::default())
//!     .await?;
//! println!("{} -> {:?}", outcome.share.file_name, outcome.share.direct_link);
//! # Ok(())
//! # }
//! ```

mod error;
mod listing;
pub(crate) mod utils;

pub use error::ResolveError;
pub use utils::{extract_share_id, format_size};

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cookies::CookieJar;
use crate::fetch::{FetchError, RedirectingClient};
use crate::token::TokenExtractor;
use crate::user_agent;

use listing::{FileEntry, FileListResponse};

/// Default upstream origin.
pub const DEFAULT_BASE_URL: &str = "https://www.terabox.com";

/// Path of the listing API, relative to the site origin.
const LIST_PATH: &str = "/share/list";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_JSON: &str = "application/json, text/plain, */*";

/// Fixed parameters of the upstream web client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSite {
    /// Origin the listing API and download referer are built from.
    pub base_url: String,
    /// `app_id` query parameter.
    pub app_id: String,
    /// `channel` query parameter.
    pub channel: String,
    /// `clienttype` query parameter.
    pub client_type: String,
    /// `num` query parameter (entries per listing page).
    pub page_size: u32,
}

impl Default for ShareSite {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            app_id: "250528".to_string(),
            channel: "dubox".to_string(),
            client_type: "0".to_string(),
            page_size: 20,
        }
    }
}

impl ShareSite {
    /// Creates site parameters for `base_url` with the default client identity.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Referer presented when following download links.
    #[must_use]
    pub fn download_referer(&self) -> String {
        format!("{}/", self.origin())
    }

    /// Builds the listing API URL for one share.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidLink`] when the configured base URL does not parse.
    pub fn list_url(&self, token: &str, share_id: &str, share_page: &Url) -> Result<Url, ResolveError> {
        let raw = format!("{}{LIST_PATH}", self.origin());
        let mut url = Url::parse(&raw).map_err(|e| ResolveError::InvalidLink {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("app_id", &self.app_id)
            .append_pair("web", "1")
            .append_pair("channel", &self.channel)
            .append_pair("clienttype", &self.client_type)
            .append_pair("jsToken", token)
            .append_pair("page", "1")
            .append_pair("num", &self.page_size.to_string())
            .append_pair("by", "name")
            .append_pair("order", "asc")
            .append_pair("site_referer", share_page.as_str())
            .append_pair("shorturl", share_id)
            .append_pair("root", "1");
        Ok(url)
    }
}

/// Per-call switches for [`ShareResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Follow the file's download link to its final direct URL.
    pub resolve_direct_link: bool,
}

impl ResolveOptions {
    /// Options that stop after the listing step.
    #[must_use]
    pub fn metadata_only() -> Self {
        Self {
            resolve_direct_link: false,
        }
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            resolve_direct_link: true,
        }
    }
}

/// Metadata for the first file of a share.
///
/// Serializes to the public JSON shape (`file_name`, `link`, `direct_link`,
/// `thumb`, `size`, `sizebytes`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedShare {
    /// Display name of the file.
    pub file_name: String,
    /// Download link as listed by the upstream (before redirects).
    #[serde(rename = "link")]
    pub canonical_link: String,
    /// Final direct URL, absent when resolution stopped after the listing.
    pub direct_link: Option<String>,
    /// Preview image URL.
    #[serde(rename = "thumb")]
    pub thumbnail_url: Option<String>,
    /// Human-readable size.
    #[serde(rename = "size")]
    pub formatted_size: String,
    /// Exact size in bytes.
    #[serde(rename = "sizebytes")]
    pub size_bytes: u64,
}

impl ResolvedShare {
    fn from_entry(entry: FileEntry, direct_link: Option<String>) -> Self {
        let thumbnail_url = entry.thumbnail();
        Self {
            file_name: entry.server_filename,
            canonical_link: entry.dlink,
            direct_link,
            thumbnail_url,
            formatted_size: format_size(entry.size),
            size_bytes: entry.size,
        }
    }
}

/// Result of one successful negotiation.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    /// The resolved file.
    pub share: ResolvedShare,
    /// Serialized session cookie after every hop.
    pub cookie: String,
    /// Whether [`cookie`](Self::cookie) differs from the seed cookie.
    pub cookie_changed: bool,
}

/// Runs the share negotiation against one upstream site.
#[derive(Debug)]
pub struct ShareResolver {
    site: ShareSite,
    client: RedirectingClient,
    extractor: TokenExtractor,
    user_agent: String,
}

impl ShareResolver {
    /// Creates a resolver with the default token strategies and browser identity.
    #[must_use]
    pub fn new(site: ShareSite, client: RedirectingClient) -> Self {
        Self {
            site,
            client,
            extractor: TokenExtractor::default(),
            user_agent: user_agent::default_browser_user_agent(),
        }
    }

    /// Replaces the token strategy chain.
    #[must_use]
    pub fn with_extractor(mut self, extractor: TokenExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replaces the User-Agent sent on every hop.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Site parameters in use.
    #[must_use]
    pub fn site(&self) -> &ShareSite {
        &self.site
    }

    /// Resolves `link` starting from the session in `seed_cookie`.
    ///
    /// # Errors
    ///
    /// Each negotiation step maps its failure to one [`ResolveError`] variant:
    /// - page fetch: [`ResolveError::InvalidLink`], [`ResolveError::TooManyRedirects`],
    ///   [`ResolveError::Timeout`], [`ResolveError::Transport`]
    /// - identifiers: [`ResolveError::MissingShareIdentifier`], [`ResolveError::MissingToken`]
    /// - listing: [`ResolveError::FileListRejected`], [`ResolveError::InvalidFileList`],
    ///   [`ResolveError::EmptyFileList`]
    /// - direct link: [`ResolveError::DirectLinkResolutionFailed`]
    #[instrument(skip(self, seed_cookie), fields(link = %link))]
    pub async fn resolve(
        &self,
        link: &str,
        seed_cookie: &str,
        options: ResolveOptions,
    ) -> Result<ResolveOutcome, ResolveError> {
        let link = link.trim();
        if link.is_empty() {
            return Err(ResolveError::MissingInput);
        }

        let mut jar = CookieJar::from_header(seed_cookie);
        let seed = jar.to_header_value();

        let page = self
            .client
            .resolve(link, &self.page_headers(), Method::GET, &mut jar)
            .await?;
        let share_page = page.final_url().clone();
        let page_status = page.status();
        if !page_status.is_success() {
            warn!(status = page_status.as_u16(), url = %share_page, "share page returned non-success status");
        }
        let html = page.text().await?;
        debug!(url = %share_page, body_len = html.len(), "fetched share page");

        let share_id = extract_share_id(&share_page)
            .ok_or_else(|| ResolveError::missing_share_identifier(share_page.as_str()))?;
        let token = self
            .extractor
            .extract(&html)
            .ok_or_else(|| ResolveError::missing_token(share_page.as_str()))?;

        let entry = self.first_entry(&token, &share_id, &share_page, &mut jar).await?;

        let direct_link = if options.resolve_direct_link {
            Some(self.resolve_direct_link(&entry.dlink, &mut jar).await?)
        } else {
            None
        };

        let cookie = jar.to_header_value();
        let cookie_changed = cookie != seed;
        let share = ResolvedShare::from_entry(entry, direct_link);
        info!(
            share_id = %share_id,
            file = %share.file_name,
            size = share.size_bytes,
            direct = share.direct_link.is_some(),
            cookie_changed,
            "share resolved"
        );

        Ok(ResolveOutcome {
            share,
            cookie,
            cookie_changed,
        })
    }

    async fn first_entry(
        &self,
        token: &str,
        share_id: &str,
        share_page: &Url,
        jar: &mut CookieJar,
    ) -> Result<FileEntry, ResolveError> {
        let list_url = self.site.list_url(token, share_id, share_page)?;
        let response = self
            .client
            .resolve(list_url.as_str(), &self.api_headers(share_page), Method::GET, jar)
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let listing: FileListResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(status = status.as_u16(), error = %e, "listing response is not JSON");
            ResolveError::invalid_file_list(e)
        })?;
        if listing.errno != 0 {
            return Err(ResolveError::FileListRejected {
                errno: listing.errno,
            });
        }
        debug!(entries = listing.list.len(), "listing received");

        listing
            .list
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::EmptyFileList {
                share_id: share_id.to_string(),
            })
    }

    /// Follows a download link to its terminal URL without reading the body.
    ///
    /// HEAD is tried first; if the upstream rejects it or the request fails,
    /// the chain is retried with GET.
    async fn resolve_direct_link(
        &self,
        dlink: &str,
        jar: &mut CookieJar,
    ) -> Result<String, ResolveError> {
        if dlink.trim().is_empty() {
            return Err(ResolveError::direct_link_failed("file entry has no download link"));
        }
        let headers = self.download_headers();

        match self.client.resolve(dlink, &headers, Method::HEAD, jar).await {
            Ok(response) if !is_failure(response.status()) => {
                return Ok(response.final_url().to_string());
            }
            Ok(response) => {
                debug!(status = response.status().as_u16(), "HEAD rejected, retrying with GET");
            }
            Err(e @ (FetchError::TooManyRedirects { .. } | FetchError::Timeout { .. })) => {
                return Err(e.into());
            }
            Err(e) => debug!(error = %e, "HEAD failed, retrying with GET"),
        }

        let response = self
            .client
            .resolve(dlink, &headers, Method::GET, jar)
            .await
            .map_err(direct_link_error)?;
        let status = response.status();
        if is_failure(status) {
            return Err(ResolveError::direct_link_failed(format!(
                "HTTP {} from {}",
                status.as_u16(),
                response.final_url()
            )));
        }
        Ok(response.final_url().to_string())
    }

    fn page_headers(&self) -> HeaderMap {
        let mut headers = self.base_headers(ACCEPT_HTML);
        insert_header(&mut headers, REFERER, &self.site.download_referer());
        headers
    }

    fn api_headers(&self, share_page: &Url) -> HeaderMap {
        let mut headers = self.base_headers(ACCEPT_JSON);
        insert_header(&mut headers, REFERER, share_page.as_str());
        headers
    }

    fn download_headers(&self) -> HeaderMap {
        let mut headers = self.base_headers("*/*");
        insert_header(&mut headers, REFERER, &self.site.download_referer());
        headers
    }

    fn base_headers(&self, accept: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert_header(&mut headers, USER_AGENT, &self.user_agent);
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers
    }
}

fn insert_header(headers: &mut HeaderMap, name: reqwest::header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "skipping header with invalid value"),
    }
}

fn is_failure(status: reqwest::StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

fn direct_link_error(error: FetchError) -> ResolveError {
    match error {
        FetchError::TooManyRedirects { .. } | FetchError::Timeout { .. } => error.into(),
        other => ResolveError::direct_link_failed(other),
    }
}
