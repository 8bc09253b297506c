//! Textual items as the host sees them, and the text they are embedded from.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Separator placed between title and content in the embedded text.
pub const TITLE_CONTENT_SEPARATOR: &str = "</s></s>";

/// Title suffix separators such as " - ", " | ", ": " and " (".
static TITLE_SPLIT: OnceLock<Regex> = OnceLock::new();

fn title_split() -> &'static Regex {
    TITLE_SPLIT.get_or_init(|| Regex::new(r"\s*[-|:(]\s+").expect("title regex must compile"))
}

/// Kind of textual item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextualItemKind {
    /// Web page
    #[default]
    Page,
    /// User note
    Note,
}

/// Identity of an item within a session: the same item may be open in
/// several tabs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub id: String,
    pub tab_id: String,
}

impl ItemKey {
    pub fn new(id: impl Into<String>, tab_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tab_id: tab_id.into(),
        }
    }
}

/// A page or note to be grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextualItem {
    pub id: String,
    #[serde(default)]
    pub tab_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub kind: TextualItemKind,
}

impl TextualItem {
    /// Create an item with no url, title or content.
    pub fn new(id: impl Into<String>, tab_id: impl Into<String>, kind: TextualItemKind) -> Self {
        Self {
            id: id.into(),
            tab_id: tab_id.into(),
            url: String::new(),
            title: String::new(),
            content: String::new(),
            kind,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the content, trimmed.
    pub fn with_content(mut self, content: impl AsRef<str>) -> Self {
        self.content = content.as_ref().trim().to_string();
        self
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.id.clone(), self.tab_id.clone())
    }

    /// The title with its site suffix dropped and words capitalized.
    pub fn processed_title(&self) -> String {
        process_title(&self.title)
    }

    /// Host part of the url, if it has one.
    pub fn host(&self) -> Option<&str> {
        url_host(&self.url)
    }

    /// Text handed to the embedding provider.
    ///
    /// Items whose host contains one of `title_only_hosts` are embedded from
    /// the title alone, unless the title is empty. An item with neither
    /// title nor content yields the empty string.
    pub fn embedding_text(&self, title_only_hosts: &[String]) -> String {
        let title = self.processed_title();
        let content = self.content.trim();
        if title.is_empty() && content.is_empty() {
            return String::new();
        }

        let title_only = self
            .host()
            .is_some_and(|host| title_only_hosts.iter().any(|h| host.contains(h.as_str())));
        if title_only && !title.is_empty() {
            return format!("{}{}", title, TITLE_CONTENT_SEPARATOR);
        }

        format!("{}{}{}", title, TITLE_CONTENT_SEPARATOR, content)
            .trim()
            .to_string()
    }
}

/// Strip a trailing site name from a page title and capitalize its words.
///
/// "mozart - Google Search" becomes "Mozart". A title without separators is
/// kept whole.
pub fn process_title(title: &str) -> String {
    if title.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = title_split().split(title).collect();
    let kept = if parts.len() > 1 {
        &parts[..parts.len() - 1]
    } else {
        &parts[..]
    };
    capitalize_words(&kept.join(" ")).trim().to_string()
}

/// Upper-case the first letter of every whitespace-separated word and
/// lower-case the rest.
fn capitalize_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if word_start {
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Host of an absolute url: the authority without user info or port.
pub fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match authority.strip_prefix('[') {
        // IPv6 literal
        Some(v6) => v6.split(']').next()?,
        None => authority.split(':').next()?,
    };
    (!host.is_empty()).then_some(host)
}
