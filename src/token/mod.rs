//! Extraction of the share page's embedded authorization token.
//!
//! The upstream embeds a short-lived token in its page markup and changes the
//! obfuscation format from time to time and across regional domains. Instead of
//! parsing the page, an ordered chain of [`TokenStrategy`] implementations is
//! tried and the first match wins. No match is an expected outcome, usually
//! caused by a stale or missing session cookie.
//!
//! # Example
//!
//! ```
//! use sharelink_core::token::TokenExtractor;
//!
//! let html = r#"<script>try{eval(fn("0A1B2C3D4E5F60718293A4B5C6D7E8F9"))}catch(e){}</script>"#;
//! let token = TokenExtractor::default().extract(html);
//! assert_eq!(token.as_deref(), Some("0A1B2C3D4E5F60718293A4B5C6D7E8F9"));
//! ```

mod strategies;

pub use strategies::{
    EncodedTemplateStrategy, InlineStateStrategy, PercentEncodedCallStrategy, QuotedCallStrategy,
};

use tracing::{debug, trace};

/// One heuristic for locating the token in page markup.
pub trait TokenStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Returns the token if this strategy recognizes the markup.
    fn extract(&self, html: &str) -> Option<String>;
}

/// Ordered chain of token strategies; the first match wins.
pub struct TokenExtractor {
    strategies: Vec<Box<dyn TokenStrategy>>,
}

impl TokenExtractor {
    /// Creates an extractor from an explicit strategy list, tried in order.
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn TokenStrategy>>) -> Self {
        Self { strategies }
    }

    /// Appends a strategy to the end of the chain.
    pub fn push(&mut self, strategy: Box<dyn TokenStrategy>) {
        self.strategies.push(strategy);
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.iter().map(|strategy| strategy.name())
    }

    /// Runs the chain over `html`; `None` when no strategy matches.
    #[must_use]
    pub fn extract(&self, html: &str) -> Option<String> {
        for strategy in &self.strategies {
            if let Some(token) = strategy.extract(html) {
                debug!(
                    strategy = strategy.name(),
                    token_len = token.len(),
                    "extracted page token"
                );
                return Some(token);
            }
            trace!(strategy = strategy.name(), "token strategy did not match");
        }
        debug!(
            strategies = self.strategies.len(),
            body_len = html.len(),
            "no token strategy matched"
        );
        None
    }
}

impl Default for TokenExtractor {
    /// Known upstream formats, most common first.
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(QuotedCallStrategy::default()),
            Box::new(PercentEncodedCallStrategy::default()),
            Box::new(EncodedTemplateStrategy::default()),
            Box::new(InlineStateStrategy::default()),
        ])
    }
}

impl std::fmt::Debug for TokenExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenExtractor")
            .field("strategies", &self.strategy_names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOKEN: &str = "7F3C2A9B01D4E5F60718293A4B5C6D7E8F90A1B2C3D4E5F6";

    struct FixedStrategy(&'static str, Option<&'static str>);

    impl TokenStrategy for FixedStrategy {
        fn name(&self) -> &'static str {
            self.0
        }

        fn extract(&self, _html: &str) -> Option<String> {
            self.1.map(ToString::to_string)
        }
    }

    #[test]
    fn test_default_chain_order() {
        let names: Vec<_> = TokenExtractor::default().strategy_names().collect();
        assert_eq!(
            names,
            ["quoted-call", "percent-encoded-call", "encoded-template", "inline-state"]
        );
    }

    #[test]
    fn test_first_matching_strategy_wins() {
        let extractor = TokenExtractor::with_strategies(vec![
            Box::new(FixedStrategy("miss", None)),
            Box::new(FixedStrategy("first", Some("AAA"))),
            Box::new(FixedStrategy("second", Some("BBB"))),
        ]);
        assert_eq!(extractor.extract("").as_deref(), Some("AAA"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let html = "<html><body><h1>Please log in</h1></body></html>";
        assert_eq!(TokenExtractor::default().extract(html), None);
    }

    #[test]
    fn test_empty_chain_returns_none() {
        let extractor = TokenExtractor::with_strategies(Vec::new());
        assert_eq!(extractor.extract(&format!("fn(\"{TOKEN}\")")), None);
    }

    #[test]
    fn test_push_extends_chain() {
        let mut extractor = TokenExtractor::with_strategies(Vec::new());
        extractor.push(Box::new(FixedStrategy("custom", Some("CUSTOM"))));
        assert_eq!(extractor.extract("anything").as_deref(), Some("CUSTOM"));
    }

    #[test]
    fn test_default_chain_handles_each_known_format() {
        let extractor = TokenExtractor::default();
        let pages = [
            format!("<script>eval(fn(\"{TOKEN}\"))</script>"),
            format!("<script>var t=decodeURIComponent('fn%28%22{TOKEN}%22%29')</script>"),
            format!(
                "<script>eval(decodeURIComponent(`window.x%3D1%3Bfn%28%22{TOKEN}%22%29`))</script>"
            ),
            format!(
                "<script>window.__INITIAL_STATE__ = {{\"share\":{{\"jsToken\":\"{TOKEN}\"}}}};</script>"
            ),
        ];
        for page in pages {
            assert_eq!(
                extractor.extract(&page).as_deref(),
                Some(TOKEN),
                "failed for page: {page}"
            );
        }
    }
}
