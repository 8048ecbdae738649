//! Point-in-time quote scraped from an instrument page.
//!
//! Instrument pages render each live field in a `<span>` whose class carries
//! `{instrument_id}-{field}` (e.g. `pid-8873-last`). The values are the same
//! ones the stream later updates, so a snapshot gives subscribers a first
//! reading before the first live frame arrives.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::client::InvestingClient;
use crate::error::Result;
use crate::types::quote::Quote;

/// Field suffixes looked up on the page.
pub const SNAPSHOT_FIELDS: [&str; 8] = ["bid", "ask", "last", "high", "low", "pcp", "turnover", "pc"];

static SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<span\b([^>]*)>([^<]*)</span>").expect("span pattern is valid")
});

static CLASS_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*["']([^"']*)["']"#).expect("class pattern is valid")
});

impl InvestingClient {
    /// Fetch the instrument page at `link` and scrape a quote for
    /// `instrument_id` out of it.
    ///
    /// `link` may be absolute or relative to the web base URL (as returned by
    /// the site search). The snapshot is stamped with the current time.
    pub async fn get_snapshot(&self, instrument_id: u64, link: &str) -> Result<Quote> {
        let page = self.get_page(link).await?;
        let quote = parse_snapshot(&page, instrument_id, chrono::Utc::now().timestamp());

        tracing::debug!(instrument_id, last = ?quote.last, "Scraped quote snapshot");
        Ok(quote)
    }
}

/// Extract a quote for `instrument_id` from page HTML.
///
/// Fields with no matching element, or whose text is not numeric, are left
/// missing. The first parsable element per field wins.
pub fn parse_snapshot(html: &str, instrument_id: u64, timestamp: i64) -> Quote {
    let mut values: HashMap<&str, f64> = HashMap::new();

    for span in SPAN.captures_iter(html) {
        let Some(class) = CLASS_ATTR.captures(&span[1]).map(|c| c[1].to_owned()) else {
            continue;
        };
        let Some(field) = field_for_class(&class, instrument_id) else {
            continue;
        };
        if values.contains_key(field) {
            continue;
        }
        if let Some(value) = parse_number(&span[2]) {
            values.insert(field, value);
        }
    }

    let get = |field: &str| values.get(field).copied();
    Quote::new(
        instrument_id,
        get("bid"),
        get("ask"),
        get("last"),
        get("high"),
        get("low"),
        get("turnover"),
        get("pc"),
        Some(timestamp),
    )
}

/// Which snapshot field a class attribute marks for `instrument_id`, if any.
///
/// Matches whole class tokens so that `pid-8873-pc` is never taken for
/// `pid-8873-pcp`, nor `pid-18873-last` for instrument `8873`.
fn field_for_class(class: &str, instrument_id: u64) -> Option<&'static str> {
    class.split_whitespace().find_map(|token| {
        SNAPSHOT_FIELDS.iter().copied().find(|field| {
            let pattern = format!("{instrument_id}-{field}");
            token == pattern || token.ends_with(&format!("-{pattern}"))
        })
    })
}

fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != '%').collect();
    cleaned.trim().parse().ok()
}
