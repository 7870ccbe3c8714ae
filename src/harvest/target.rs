//! Opportunistic "showing X of Y" parsing.

use crate::core::types::TargetCount;
use crate::scraping::RenderSurface;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

static SHOWING: OnceLock<Regex> = OnceLock::new();

fn showing_regex() -> &'static Regex {
    SHOWING.get_or_init(|| {
        // "showing 10 of 10", "Showing 1-50 of 2,849", "showing 1 – 50 of 2849"
        Regex::new(r"(?i)showing\s+(?:[\d,]+\s*[-–]\s*)?([\d,]+)\s+of\s+([\d,]+)")
            .expect("valid showing regex")
    })
}

fn parse_count(s: &str) -> Option<u64> {
    s.replace(',', "").parse().ok()
}

/// First "showing X of Y" in `text`, if any.
pub fn parse_target(text: &str) -> Option<TargetCount> {
    let caps = showing_regex().captures(text)?;
    let shown = parse_count(caps.get(1)?.as_str())?;
    let total = parse_count(caps.get(2)?.as_str())?;
    Some(TargetCount { shown, total })
}

/// Read the page text and parse the advertised count. Read failures are
/// swallowed: the harvest must work without a target.
pub async fn read_target(surface: &dyn RenderSurface) -> Option<TargetCount> {
    match surface.page_text().await {
        Ok(text) => parse_target(&text),
        Err(e) => {
            debug!("page text unavailable for target parsing: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_form() {
        assert_eq!(
            parse_target("Products\nShowing 10 of 10"),
            Some(TargetCount { shown: 10, total: 10 })
        );
    }

    #[test]
    fn case_insensitive_with_range_and_separators() {
        assert_eq!(
            parse_target("SHOWING 1-50 OF 2,849 products"),
            Some(TargetCount { shown: 50, total: 2849 })
        );
        assert_eq!(
            parse_target("showing 51 – 100 of 2849"),
            Some(TargetCount { shown: 100, total: 2849 })
        );
    }

    #[test]
    fn absent_or_malformed() {
        assert_eq!(parse_target("no counters here"), None);
        assert_eq!(parse_target("showing all of them"), None);
    }
}
