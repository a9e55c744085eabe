//! Source discussion threads.
//!
//! Threads are read from disk in one of two shapes:
//!
//! - the crate's own thread document (`{"id", "title", "body", "locator", "comments"}`)
//! - a saved Reddit JSON API listing (the array returned by appending `.json`
//!   to a post URL)
//!
//! ```rust
//! use threadreel::Thread;
//!
//! let thread = Thread::from_json_str(r#"{
//!     "id": "abc123",
//!     "title": "Hello World",
//!     "locator": "/r/rust/comments/abc123/hello_world/",
//!     "comments": [{ "id": "c1", "body": "First!" }]
//! }"#).unwrap();
//!
//! assert_eq!(thread.comments.len(), 1);
//! assert_eq!(thread.locator, "https://www.reddit.com/r/rust/comments/abc123/hello_world/");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ReelError, Result};

const LOCATOR_BASE: &str = "https://www.reddit.com";

/// A single reply candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub body: String,
    /// Pinned by a moderator
    #[serde(default, alias = "pinned")]
    pub stickied: bool,
}

impl Comment {
    #[must_use]
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: None,
            body: body.into(),
            stickied: false,
        }
    }

    #[must_use]
    pub fn stickied(mut self) -> Self {
        self.stickied = true;
        self
    }

    /// Length of the body in characters, before any cleaning.
    #[must_use]
    pub fn raw_len(&self) -> usize {
        self.body.chars().count()
    }
}

/// The source discussion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Absolute URL of the discussion, used for screenshot capture
    #[serde(default, alias = "permalink")]
    pub locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default)]
    pub nsfw: bool,
}

impl Thread {
    /// Load a thread from a JSON file in either supported shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse a thread document or a Reddit API listing.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let mut thread = if value.is_array() {
            let listings: Vec<RedditListing> = serde_json::from_value(value)?;
            from_reddit_listings(listings)?
        } else {
            serde_json::from_value::<Thread>(value)?
        };

        if thread.id.trim().is_empty() {
            return Err(ReelError::Thread("thread id is empty".to_string()));
        }
        if !thread.locator.is_empty() {
            thread.locator = normalize_locator(&thread.locator)?;
        }

        Ok(thread)
    }

    /// Body text, if present and not blank.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.trim().is_empty())
    }
}

/// Turn a permalink or URL into an absolute URL without query string.
pub fn normalize_locator(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(LOCATOR_BASE)
            .and_then(|base| base.join(raw))
            .map_err(|e| ReelError::Thread(format!("invalid locator '{raw}': {e}")))?,
        Err(e) => return Err(ReelError::Thread(format!("invalid locator '{raw}': {e}"))),
    };

    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

fn from_reddit_listings(listings: Vec<RedditListing>) -> Result<Thread> {
    let mut listings = listings.into_iter();

    // First listing is the post, second is comments
    let post = listings
        .next()
        .and_then(|l| l.data.children.into_iter().find(|c| c.kind == "t3"))
        .ok_or_else(|| ReelError::Thread("no post data found in listing".to_string()))?;
    let post: RedditPost = serde_json::from_value(post.data)?;

    let mut comments = Vec::new();
    if let Some(listing) = listings.next() {
        for child in listing.data.children {
            // "more" stubs are not expanded
            if child.kind != "t1" {
                continue;
            }
            let c: RedditComment = serde_json::from_value(child.data)?;
            comments.push(Comment {
                id: c.id,
                author: c.author.filter(|a| a != "[deleted]"),
                body: c.body,
                stickied: c.stickied,
            });
        }
    }

    Ok(Thread {
        id: post.id,
        title: post.title,
        body: post.selftext.filter(|s| !s.is_empty()),
        comments,
        locator: post.permalink,
        community: post.subreddit_name_prefixed,
        score: post.score,
        nsfw: post.over_18,
    })
}

// ============================================================================
// Reddit API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Deserialize)]
struct RedditListingData {
    children: Vec<RedditChild>,
}

#[derive(Debug, Deserialize)]
struct RedditChild {
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RedditPost {
    id: String,
    title: String,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    subreddit_name_prefixed: Option<String>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    over_18: bool,
}

#[derive(Debug, Deserialize)]
struct RedditComment {
    id: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    stickied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"[
        {"kind": "Listing", "data": {"children": [
            {"kind": "t3", "data": {
                "id": "abc123",
                "title": "What is your favourite crate?",
                "selftext": "Mine is serde.",
                "permalink": "/r/rust/comments/abc123/what_is_your_favourite_crate/",
                "subreddit_name_prefixed": "r/rust",
                "score": 420,
                "over_18": false
            }}
        ]}},
        {"kind": "Listing", "data": {"children": [
            {"kind": "t1", "data": {"id": "c1", "author": "ferris", "body": "crabs all the way down", "stickied": true}},
            {"kind": "t1", "data": {"id": "c2", "author": "[deleted]", "body": "[deleted]"}},
            {"kind": "more", "data": {"count": 12, "children": ["c9"]}}
        ]}}
    ]"#;

    #[test]
    fn parses_reddit_listing() {
        let thread = Thread::from_json_str(LISTING).unwrap();

        assert_eq!(thread.id, "abc123");
        assert_eq!(thread.body_text(), Some("Mine is serde."));
        assert_eq!(thread.community.as_deref(), Some("r/rust"));
        assert_eq!(
            thread.locator,
            "https://www.reddit.com/r/rust/comments/abc123/what_is_your_favourite_crate/"
        );
        assert_eq!(thread.comments.len(), 2);
        assert!(thread.comments[0].stickied);
        assert_eq!(thread.comments[1].author, None);
    }

    #[test]
    fn parses_thread_document() {
        let json = r#"{
            "id": "t1",
            "title": "Hello World",
            "permalink": "https://reddit.com/r/test/comments/t1/?utm_source=share",
            "comments": [{"id": "a", "body": "hi", "pinned": true}]
        }"#;
        let thread = Thread::from_json_str(json).unwrap();

        assert_eq!(thread.locator, "https://reddit.com/r/test/comments/t1/");
        assert!(thread.body_text().is_none());
        assert!(thread.comments[0].stickied);
    }

    #[test]
    fn rejects_listing_without_post() {
        let json = r#"[{"kind": "Listing", "data": {"children": []}}]"#;
        assert!(matches!(
            Thread::from_json_str(json),
            Err(ReelError::Thread(_))
        ));
    }

    #[test]
    fn rejects_empty_id() {
        let json = r#"{"id": " ", "title": "x"}"#;
        assert!(Thread::from_json_str(json).is_err());
    }

    #[test]
    fn raw_len_counts_characters() {
        let comment = Comment::new("c", "héllo");
        assert_eq!(comment.raw_len(), 5);
    }
}
