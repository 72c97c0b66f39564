//! Parsing of `If-None-Match` / `If-Modified-Since` request headers.
//!
//! Both headers go through the same lenient tokenizer: the value is
//! lowercased, split on commas or semicolons, and every token is stripped
//! of whitespace, quotes, commas and semicolons. The server's own validator
//! goes through the same tokenizer, and it matches when its tokens appear
//! in the client's list side by side and in the same order. An HTTP date
//! splits at its weekday comma, so an echoed `Last-Modified` matches while
//! halves of two different client dates do not.

use crate::sink::RequestMetadata;

pub const IF_NONE_MATCH: &str = "if-none-match";
pub const IF_MODIFIED_SINCE: &str = "if-modified-since";

/// Stands in for an empty client set so that nothing matches by accident.
pub const MISS_SENTINEL: &str = "MISS";
pub const WILDCARD: &str = "*";

fn is_trimmed(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B' | '"' | '\'' | ',' | ';')
}

/// Validator tokens supplied by the client for one conditional header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorTokens {
    tokens: Vec<String>,
}

fn tokenize(raw: &str) -> Vec<String> {
    raw.to_lowercase()
        .trim_matches(is_trimmed)
        .split([',', ';'])
        .map(|token| token.trim_matches(is_trimmed))
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

impl ValidatorTokens {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut tokens = tokenize(raw.unwrap_or_default());
        if tokens.is_empty() {
            tokens.push(MISS_SENTINEL.to_owned());
        }
        Self { tokens }
    }

    pub fn is_wildcard(&self) -> bool {
        self.tokens.iter().any(|token| token == WILDCARD)
    }

    /// True when `validator` was echoed back, or the client sent `*`.
    pub fn matches(&self, validator: &str) -> bool {
        if self.is_wildcard() {
            return true;
        }
        let wanted = tokenize(validator);
        !wanted.is_empty() && self.tokens.windows(wanted.len()).any(|run| run == wanted.as_slice())
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

/// Both conditional headers of one request, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_none_match: ValidatorTokens,
    pub if_modified_since: ValidatorTokens,
}

impl ConditionalHeaders {
    pub fn parse(if_none_match: Option<&str>, if_modified_since: Option<&str>) -> Self {
        Self {
            if_none_match: ValidatorTokens::parse(if_none_match),
            if_modified_since: ValidatorTokens::parse(if_modified_since),
        }
    }

    pub fn from_request(request: &dyn RequestMetadata) -> Self {
        Self::parse(request.header(IF_NONE_MATCH), request.header(IF_MODIFIED_SINCE))
    }

    /// Hit when either header matches its validator.
    pub fn is_hit(&self, content_hash: &str, last_modified: &str) -> bool {
        self.if_none_match.matches(content_hash) || self.if_modified_since.matches(last_modified)
    }
}
