//! Sharelink Core Library
//!
//! This library resolves public share links issued by a cloud-storage service
//! into time-limited direct download URLs, and relays the file bytes on demand.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaf-first:
//! - [`cookies`] - Cookie jar merging and the persistent cookie store capability
//! - [`fetch`] - Redirect-following HTTP client that threads a cookie jar through every hop
//! - [`token`] - Ordered strategy chain for extracting the page's anti-scraping token
//! - [`resolver`] - Multi-hop share negotiation producing a [`ResolvedShare`]
//! - [`cache`] - Time-to-live result cache with an injectable clock
//! - [`service`] - Cache-fronted resolution with cookie write-back
//! - [`proxy`] - Range-aware streaming proxy to the resolved direct link
//! - [`server`] - HTTP front end exposing JSON, redirect and proxy modes
//! - [`config`] - Configuration file and environment loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod config;
pub mod cookies;
pub mod fetch;
pub mod proxy;
pub mod resolver;
pub mod server;
pub mod service;
pub mod token;
pub(crate) mod user_agent;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use cache::{CacheEntry, Clock, DEFAULT_CACHE_TTL, ManualClock, ResultCache, SystemClock};
pub use config::{ServerConfig, load_config};
pub use cookies::{
    COOKIE_STORE_KEY, CookieJar, CookieStore, CookieStoreError, FileCookieStore,
    MemoryCookieStore, is_cookie_attribute,
};
pub use fetch::{DEFAULT_MAX_HOPS, FetchError, FetchHop, FetchResponse, RedirectingClient};
pub use proxy::{ProxiedResponse, ProxyError, StreamingProxy, is_forwardable_header};
pub use resolver::{
    ResolveError, ResolveOptions, ResolveOutcome, ResolvedShare, ShareResolver, ShareSite,
    extract_share_id, format_size,
};
pub use server::{AppState, create_router};
pub use service::{ShareService, normalize_share_link};
pub use token::{
    EncodedTemplateStrategy, InlineStateStrategy, PercentEncodedCallStrategy,
    QuotedCallStrategy, TokenExtractor, TokenStrategy,
};
