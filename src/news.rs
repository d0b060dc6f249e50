use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use reqwest::Client;

use crate::core::types::{Headline, NewsProvider};

pub const NO_NEWS_PLACEHOLDER: &str = "No relevant news found.";

const GOOGLE_NEWS_RSS: &str = "https://news.google.com/rss/search";
const GENERAL_MARKET_QUERY: &str = "cryptocurrency market";

/// Renders headlines as the bulleted context block handed to the model.
pub fn format_news_block(headlines: &[Headline]) -> String {
    if headlines.is_empty() {
        return NO_NEWS_PLACEHOLDER.to_string();
    }
    headlines
        .iter()
        .map(|h| format!("- “{}” — {}", h.title, h.source))
        .join("\n")
}

/// Headline provider backed by the Google News RSS search feed.
pub struct GoogleNewsProvider {
    client: Client,
}

impl GoogleNewsProvider {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for GoogleNewsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsProvider for GoogleNewsProvider {
    async fn headlines(&self, token: Option<&str>, max_items: usize) -> Result<Vec<Headline>> {
        let query = match token {
            Some(token) => format!("{} crypto", token),
            None => GENERAL_MARKET_QUERY.to_string(),
        };

        let body = self
            .client
            .get(GOOGLE_NEWS_RSS)
            .query(&[("q", query.as_str()), ("hl", "en-US"), ("gl", "US")])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
            .context("failed to read news feed body")?;

        parse_feed(&body, max_items)
    }
}

fn parse_feed(xml: &str, max_items: usize) -> Result<Vec<Headline>> {
    let doc = roxmltree::Document::parse(xml).context("invalid RSS feed")?;

    let mut headlines = Vec::new();
    for item in doc.descendants().filter(|n| n.has_tag_name("item")) {
        if headlines.len() >= max_items {
            break;
        }
        let title = match child_text(item, "title") {
            Some(title) => title,
            None => continue,
        };
        let source = child_text(item, "source").unwrap_or_else(|| "unknown".to_string());
        let published = child_text(item, "pubDate")
            .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        headlines.push(Headline {
            title,
            source,
            published,
        });
    }
    Ok(headlines)
}

fn child_text(node: roxmltree::Node, tag: &str) -> Option<String> {
    node.children()
        .find(|c| c.has_tag_name(tag))
        .and_then(|c| c.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>search results</title>
  <item>
    <title>ETH rallies on upgrade news</title>
    <source url="https://example.com">Example Wire</source>
    <pubDate>Mon, 24 Aug 2026 09:00:00 GMT</pubDate>
  </item>
  <item>
    <title>Staking yields fall</title>
    <pubDate>not a date</pubDate>
  </item>
  <item>
    <title>Third story</title>
    <source>Other Desk</source>
  </item>
</channel></rss>"#;

    #[test]
    fn parses_items_with_missing_fields() {
        let headlines = parse_feed(FEED, 10).unwrap();
        assert_eq!(headlines.len(), 3);
        assert_eq!(headlines[0].title, "ETH rallies on upgrade news");
        assert_eq!(headlines[0].source, "Example Wire");
        assert_eq!(headlines[1].source, "unknown");
    }

    #[test]
    fn respects_max_items() {
        let headlines = parse_feed(FEED, 2).unwrap();
        assert_eq!(headlines.len(), 2);
    }

    #[test]
    fn rejects_non_xml_body() {
        assert!(parse_feed("<html>rate limited</html", 5).is_err());
    }

    #[test]
    fn formats_bulleted_block() {
        let headlines = parse_feed(FEED, 1).unwrap();
        assert_eq!(
            format_news_block(&headlines),
            "- “ETH rallies on upgrade news” — Example Wire"
        );
    }

    #[test]
    fn empty_headlines_use_placeholder() {
        assert_eq!(format_news_block(&[]), NO_NEWS_PLACEHOLDER);
    }
}
