//! Display-ready projections of articles

use chrono::DateTime;
use serde::Serialize;

use crate::articles::Article;

const EXCERPT_CHARS: usize = 200;
const NO_CONTENT: &str = "No content available.";

/// Entry in an article listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleCard {
    pub id: String,
    pub title: String,
    pub date: String,
    pub excerpt: String,
}

/// Full article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleDetail {
    pub id: String,
    pub title: String,
    pub date: String,
    pub content: String,
}

/// `YYYY-MM-DD` for an RFC 3339 timestamp; anything else is shown as is.
pub fn display_date(created: Option<&str>) -> String {
    match created {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => String::new(),
    }
}

impl ArticleCard {
    pub fn from_article(article: &Article) -> Self {
        let attributes = &article.attributes;
        let body = attributes.body.as_ref();
        let excerpt = body
            .and_then(|b| {
                b.summary
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
            })
            .or_else(|| {
                body.and_then(|b| b.value.as_deref())
                    .filter(|v| !v.is_empty())
                    .map(|v| v.chars().take(EXCERPT_CHARS).collect())
            })
            .unwrap_or_default();

        Self {
            id: article.id.clone(),
            title: attributes.title.clone(),
            date: display_date(attributes.created.as_deref()),
            excerpt,
        }
    }
}

impl ArticleDetail {
    pub fn from_article(article: &Article) -> Self {
        let attributes = &article.attributes;
        let content = attributes
            .body
            .as_ref()
            .and_then(|b| {
                b.processed
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .or(b.value.as_deref().filter(|v| !v.is_empty()))
            })
            .unwrap_or(NO_CONTENT)
            .to_string();

        Self {
            id: article.id.clone(),
            title: attributes.title.clone(),
            date: display_date(attributes.created.as_deref()),
            content,
        }
    }
}
