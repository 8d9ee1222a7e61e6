use std::borrow::Cow;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::article::{Article, ArticleKey};
use crate::error::ParseError;

/// Layout of `PublishDate` in both feeds. Values carry no zone and are read as UTC.
pub const PUBLISH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Root of the list endpoint (`<NewListInformation>`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewsList {
    #[serde(rename = "ClubName")]
    pub club_name: String,
    #[serde(rename = "ClubWebsiteURL")]
    pub club_website_url: String,
    #[serde(rename = "NewsletterNewsItems")]
    pub items: NewsItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewsItems {
    #[serde(rename = "NewsletterNewsItem")]
    pub records: Vec<NewsElement>,
}

/// Root of the detail endpoint (`<NewsArticleInformation>`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewsDetail {
    #[serde(rename = "ClubName")]
    pub club_name: String,
    #[serde(rename = "ClubWebsiteURL")]
    pub club_website_url: String,
    #[serde(rename = "NewsArticle")]
    pub article: NewsElement,
}

/// One news record. The list and detail feeds share this shape; the list
/// leaves the body, gallery and video fields empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NewsElement {
    #[serde(rename = "ArticleURL")]
    pub article_url: String,
    #[serde(rename = "NewsArticleID")]
    pub news_article_id: String,
    #[serde(rename = "PublishDate")]
    pub publish_date: String,
    #[serde(rename = "Taxonomies")]
    pub taxonomies: String,
    #[serde(rename = "TeaserText")]
    pub teaser_text: String,
    #[serde(rename = "ThumbnailImageURL")]
    pub thumbnail_image_url: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "OptaMatchId")]
    pub opta_match_id: String,
    #[serde(rename = "LastUpdateDate")]
    pub last_update_date: String,
    #[serde(rename = "IsPublished")]
    pub is_published: String,
    #[serde(rename = "Subtitle")]
    pub subtitle: String,
    #[serde(rename = "BodyText")]
    pub body_text: String,
    #[serde(rename = "GalleryImageURLs")]
    pub gallery_image_urls: String,
    #[serde(rename = "VideoURL")]
    pub video_url: String,
}

pub fn decode_list(body: &str) -> Result<NewsList, quick_xml::DeError> {
    quick_xml::de::from_str(&escape_stray_ampersands(body))
}

pub fn decode_detail(body: &str) -> Result<NewsDetail, quick_xml::DeError> {
    quick_xml::de::from_str(&escape_stray_ampersands(body))
}

/// Maps a feed record onto the canonical article and assigns its id.
pub fn normalize(
    record: &NewsElement,
    team_id: &str,
    has_details: bool,
) -> Result<Article, ParseError> {
    let raw_date = record.publish_date.trim();
    let published = NaiveDateTime::parse_from_str(raw_date, PUBLISH_DATE_FORMAT)
        .map_err(|source| ParseError::PublishDate {
            value: record.publish_date.clone(),
            source,
        })?
        .and_utc();

    let mut article = Article::stub(ArticleKey {
        team_id: team_id.to_owned(),
        news_id: record.news_article_id.clone(),
        published,
    });
    article.title = non_empty(&record.title);
    article.teaser = non_empty(&record.teaser_text);
    article.content = non_empty(&record.body_text);
    article.image_url = non_empty(&record.thumbnail_image_url);
    article.gallery_urls = non_empty(&record.gallery_image_urls);
    article.opta_match_id = non_empty(&record.opta_match_id);
    article.url = non_empty(&record.article_url);
    article.video_url = non_empty(&record.video_url);
    article.categories = split_taxonomies(&record.taxonomies);
    article.has_details = has_details;
    article.assign_id();
    Ok(article)
}

/// Splits `"Club News,Academy:Interviews"` into its labels, in order.
pub fn split_taxonomies(raw: &str) -> Vec<String> {
    raw.split([',', ':'])
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// Lenient pre-pass: the feed is not always well-formed, mostly because HTML
/// entities (`&nbsp;`, `&rsquo;`) and bare `&` leak into text nodes. Any `&`
/// that does not start a predefined or numeric entity is escaped so it
/// decodes as literal text. CDATA sections are copied untouched.
pub fn escape_stray_ampersands(input: &str) -> Cow<'_, str> {
    const CDATA_OPEN: &str = "<![CDATA[";
    const CDATA_CLOSE: &str = "]]>";

    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 16);
    let mut rest = input;
    while let Some(pos) = rest.find(['&', '<']) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with(CDATA_OPEN) {
            let end = rest
                .find(CDATA_CLOSE)
                .map(|i| i + CDATA_CLOSE.len())
                .unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        } else if rest.starts_with('<') {
            out.push('<');
            rest = &rest[1..];
        } else {
            if starts_with_entity(rest) {
                out.push('&');
            } else {
                out.push_str("&amp;");
            }
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn starts_with_entity(s: &str) -> bool {
    // longest accepted form is `&#x10FFFF;`
    const MAX_ENTITY_LEN: usize = 10;

    let window = &s.as_bytes()[..s.len().min(MAX_ENTITY_LEN)];
    let Some(end) = window.iter().position(|&b| b == b';') else {
        return false;
    };
    let name = &s[1..end];
    match name.strip_prefix('#') {
        Some(num) => {
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) if hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                    u32::from_str_radix(hex, 16).ok()
                }
                None if num.chars().all(|c| c.is_ascii_digit()) => num.parse::<u32>().ok(),
                _ => None,
            };
            // references to NUL or past the codepoint range stay literal text
            matches!(code, Some(n) if n != 0 && char::from_u32(n).is_some())
        }
        None => matches!(name, "amp" | "lt" | "gt" | "quot" | "apos"),
    }
}
