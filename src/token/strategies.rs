//! Concrete token strategies for the known upstream obfuscation formats.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::TokenStrategy;
use crate::resolver::utils::compile_static_regex;

/// Character class accepted as token text.
const TOKEN_CHARS: &str = r"[A-Za-z0-9+/=_\-]{16,}";

/// Call name the upstream wraps its token in.
const DEFAULT_CALL_NAME: &str = "fn";

/// Key holding the token inside inline state objects.
const TOKEN_KEY: &str = "jsToken";

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?s)decodeURIComponent\(\s*`([^`]*)`\s*\)"));

static TOKEN_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(&format!(
        r#"["']?{TOKEN_KEY}["']?\s*[:=]\s*["']({TOKEN_CHARS})["']"#
    ))
});

/// Assignments that introduce an inline state object in page scripts.
const STATE_MARKERS: [&str; 3] = ["window.__INITIAL_STATE__", "locals.mset(", "window.jsData"];

fn first_capture(regex: &Regex, haystack: &str) -> Option<String> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Literal quoted token passed to a known call, e.g. `fn("TOKEN")`.
#[derive(Debug)]
pub struct QuotedCallStrategy {
    regex: Regex,
}

impl QuotedCallStrategy {
    /// Matches `<call_name>("TOKEN")` with either quote style.
    ///
    /// # Panics
    ///
    /// Never in practice: the call name is escaped before compilation.
    #[must_use]
    pub fn new(call_name: &str) -> Self {
        let pattern = format!(
            r#"{}\(\s*["']({TOKEN_CHARS})["']\s*\)"#,
            regex::escape(call_name)
        );
        Self {
            regex: compile_static_regex(&pattern),
        }
    }
}

impl Default for QuotedCallStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_NAME)
    }
}

impl TokenStrategy for QuotedCallStrategy {
    fn name(&self) -> &'static str {
        "quoted-call"
    }

    fn extract(&self, html: &str) -> Option<String> {
        first_capture(&self.regex, html)
    }
}

/// Percent-encoded variant of the quoted call, e.g. `fn%28%22TOKEN%22%29`.
#[derive(Debug)]
pub struct PercentEncodedCallStrategy {
    regex: Regex,
}

impl PercentEncodedCallStrategy {
    /// Matches the encoded form of `<call_name>("TOKEN")`.
    ///
    /// # Panics
    ///
    /// Never in practice: the call name is escaped before compilation.
    #[must_use]
    pub fn new(call_name: &str) -> Self {
        let pattern = format!(
            r"{}%28(?i:%22|%27)({TOKEN_CHARS})(?i:%22|%27)%29",
            regex::escape(call_name)
        );
        Self {
            regex: compile_static_regex(&pattern),
        }
    }
}

impl Default for PercentEncodedCallStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_NAME)
    }
}

impl TokenStrategy for PercentEncodedCallStrategy {
    fn name(&self) -> &'static str {
        "percent-encoded-call"
    }

    fn extract(&self, html: &str) -> Option<String> {
        first_capture(&self.regex, html)
    }
}

/// Token hidden in a `decodeURIComponent(`...`)` template literal.
///
/// Each template is percent-decoded, JS quote escapes are undone, and the
/// decoded script is searched for the quoted call or a token assignment.
#[derive(Debug, Default)]
pub struct EncodedTemplateStrategy {
    call: QuotedCallStrategy,
}

impl TokenStrategy for EncodedTemplateStrategy {
    fn name(&self) -> &'static str {
        "encoded-template"
    }

    fn extract(&self, html: &str) -> Option<String> {
        TEMPLATE_RE.captures_iter(html).find_map(|caps| {
            let encoded = caps.get(1)?.as_str();
            let decoded = urlencoding::decode(encoded).ok()?;
            let script = decoded.replace("\\\"", "\"").replace("\\'", "'");
            self.call
                .extract(&script)
                .or_else(|| first_capture(&TOKEN_KEY_RE, &script))
        })
    }
}

/// Token stored under `jsToken` in an inline state object.
///
/// The object following a known state marker is parsed as JSON and searched
/// recursively; if it does not parse, a plain key/value scan is used instead.
#[derive(Debug, Default)]
pub struct InlineStateStrategy;

impl TokenStrategy for InlineStateStrategy {
    fn name(&self) -> &'static str {
        "inline-state"
    }

    fn extract(&self, html: &str) -> Option<String> {
        STATE_MARKERS
            .iter()
            .filter_map(|marker| html.find(marker).map(|pos| &html[pos + marker.len()..]))
            .find_map(parse_state_object)
            .or_else(|| first_capture(&TOKEN_KEY_RE, html))
    }
}

fn parse_state_object(after_marker: &str) -> Option<String> {
    let start = after_marker.find('{')?;
    let mut stream =
        serde_json::Deserializer::from_str(&after_marker[start..]).into_iter::<Value>();
    let state = stream.next()?.ok()?;
    find_token(&state)
}

fn find_token(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(ToString::to_string)
            .or_else(|| map.values().find_map(find_token)),
        Value::Array(items) => items.iter().find_map(find_token),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOKEN: &str = "C0FFEE0123456789ABCDEF0123456789";

    #[test]
    fn test_quoted_call_double_and_single_quotes() {
        let strategy = QuotedCallStrategy::default();
        assert_eq!(
            strategy.extract(&format!("x;fn(\"{TOKEN}\");y")).as_deref(),
            Some(TOKEN)
        );
        assert_eq!(
            strategy.extract(&format!("fn( '{TOKEN}' )")).as_deref(),
            Some(TOKEN)
        );
    }

    #[test]
    fn test_quoted_call_rejects_short_values() {
        let strategy = QuotedCallStrategy::default();
        assert_eq!(strategy.extract("fn(\"abc\")"), None);
    }

    #[test]
    fn test_quoted_call_custom_name_is_escaped() {
        let strategy = QuotedCallStrategy::new("a.b");
        assert_eq!(
            strategy.extract(&format!("a.b(\"{TOKEN}\")")).as_deref(),
            Some(TOKEN)
        );
        assert_eq!(strategy.extract(&format!("axb(\"{TOKEN}\")")), None);
    }

    #[test]
    fn test_percent_encoded_call_any_hex_case() {
        let strategy = PercentEncodedCallStrategy::default();
        assert_eq!(
            strategy
                .extract(&format!("jsToken%20%3D%20a%7D%3Bfn%28%22{TOKEN}%22%29"))
                .as_deref(),
            Some(TOKEN)
        );
        assert_eq!(
            strategy.extract(&format!("fn%28%27{TOKEN}%27%29")).as_deref(),
            Some(TOKEN)
        );
        assert_eq!(strategy.extract(&format!("fn(\"{TOKEN}\")")), None);
    }

    #[test]
    fn test_encoded_template_with_escaped_quotes() {
        let html = format!(
            "<script>eval(decodeURIComponent(`var%20a%3D1%3Bfn%28%5C%22{TOKEN}%5C%22%29`))</script>"
        );
        assert_eq!(
            PercentEncodedCallStrategy::default().extract(&html),
            None,
            "escaped quotes must not match the plain encoded strategy"
        );
        assert_eq!(
            EncodedTemplateStrategy::default().extract(&html).as_deref(),
            Some(TOKEN)
        );
    }

    #[test]
    fn test_encoded_template_assignment_form() {
        let html = format!(
            "decodeURIComponent(`window.jsToken%20%3D%20%22{TOKEN}%22`)"
        );
        assert_eq!(
            EncodedTemplateStrategy::default().extract(&html).as_deref(),
            Some(TOKEN)
        );
    }

    #[test]
    fn test_encoded_template_skips_non_matching_templates() {
        let html = format!(
            "decodeURIComponent(`nothing%20here`); decodeURIComponent(`fn%28%22{TOKEN}%22%29`)"
        );
        assert_eq!(
            EncodedTemplateStrategy::default().extract(&html).as_deref(),
            Some(TOKEN)
        );
    }

    #[test]
    fn test_inline_state_nested_object() {
        let html = format!(
            r#"<script>locals.mset({{"user":{{"name":"x"}},"page":[{{"jsToken":"{TOKEN}"}}]}});</script>"#
        );
        assert_eq!(InlineStateStrategy.extract(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_inline_state_falls_back_to_key_scan() {
        // Trailing JS expression makes the object invalid JSON.
        let html = format!(r#"window.__INITIAL_STATE__ = {{jsToken: "{TOKEN}", t: Date.now()}}"#);
        assert_eq!(InlineStateStrategy.extract(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn test_inline_state_ignores_empty_token() {
        let html = r#"window.__INITIAL_STATE__ = {"jsToken":""}"#;
        assert_eq!(InlineStateStrategy.extract(html), None);
    }
}
