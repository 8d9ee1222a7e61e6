use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External identifier of an article, derived from its [`ArticleKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ArticleId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ArticleId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Immutable fields an article's identity is computed from.
///
/// `news_id` is the feed's own identifier. It is needed to ask the detail
/// endpoint for enrichment but is never serialized to API consumers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleKey {
    pub team_id: String,
    #[serde(skip)]
    pub news_id: String,
    pub published: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(flatten)]
    pub key: ArticleKey,
    pub id: ArticleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teaser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery_urls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opta_match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub has_details: bool,
}

impl Article {
    /// A list-only stub with no content and no id yet.
    pub fn stub(key: ArticleKey) -> Self {
        Self {
            key,
            id: ArticleId::default(),
            title: None,
            teaser: None,
            content: None,
            image_url: None,
            gallery_urls: None,
            opta_match_id: None,
            url: None,
            video_url: None,
            categories: Vec::new(),
            has_details: false,
        }
    }

    pub fn news_id(&self) -> &str {
        &self.key.news_id
    }

    /// Fills `id` from the key unless one is already set.
    pub fn assign_id(&mut self) -> &ArticleId {
        if self.id.is_empty() {
            self.id = ArticleId::derive(&self.key);
        }
        &self.id
    }
}
